//! Current and historical rate points.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Currency, CurrencyPair};

/// Source label for rates derived from the USD reference feed.
pub const SYNTHETIC_SOURCE: &str = "FxRates-Synthetic";

/// Fractional digits kept on every stored rate.
pub const RATE_DECIMAL_PLACES: u32 = 6;

/// The current known rate for an ordered pair.
///
/// Exactly one exists per pair; it is superseded in place on every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePoint {
    /// The currency pair.
    pub pair: CurrencyPair,
    /// Units of quote currency per unit of base currency.
    pub rate: Decimal,
    /// When this rate was last confirmed by a sync.
    pub timestamp: DateTime<Utc>,
    /// Rate source.
    pub source: String,
}

impl RatePoint {
    /// Create a new rate point.
    pub fn new(
        pair: CurrencyPair,
        rate: Decimal,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            pair,
            rate,
            timestamp,
            source: source.into(),
        }
    }

    pub fn base(&self) -> Currency {
        self.pair.base
    }

    pub fn target(&self) -> Currency {
        self.pair.quote
    }

    /// Refresh the timestamp without touching the value.
    pub fn heartbeat(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    /// Snapshot this point as a history row.
    pub fn to_history(&self) -> RateHistoryPoint {
        RateHistoryPoint {
            pair: self.pair,
            rate: self.rate,
            created_at: self.timestamp,
            source: self.source.clone(),
        }
    }
}

/// An append-only historical rate observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateHistoryPoint {
    /// The currency pair.
    pub pair: CurrencyPair,
    /// Rate at the time of the observation.
    pub rate: Decimal,
    /// When the observation was made.
    pub created_at: DateTime<Utc>,
    /// Rate source.
    pub source: String,
}

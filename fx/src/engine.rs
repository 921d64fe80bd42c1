//! Rate synchronization engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use forexalert_common::{
    constants, Currency, CurrencyPair, CurrencySet, DurationExt, RatePoint, SYNTHETIC_SOURCE,
};
use forexalert_store::{RateStore, StoreFactory};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use crate::cross_rate::CrossRateCalculator;
use crate::error::{FxError, FxResult};
use crate::provider::MarketDataClient;

/// Configuration for the rate synchronization engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Currencies to fetch and cross.
    pub currencies: CurrencySet,
    /// Time between ticks.
    pub interval: Duration,
    /// Moves at or below this are heartbeats.
    pub change_epsilon: Decimal,
    /// Source label written on every point.
    pub source: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            currencies: CurrencySet::default(),
            interval: constants::sync_interval().as_std(),
            change_epsilon: constants::change_epsilon(),
            source: SYNTHETIC_SOURCE.to_string(),
        }
    }
}

/// What one sync tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Timestamp shared by every point written this tick.
    pub timestamp: DateTime<Utc>,
    pub pairs_computed: usize,
    pub pairs_skipped: usize,
    /// Pairs seen for the first time.
    pub inserted: usize,
    /// Pairs whose value moved by more than the change epsilon.
    pub changed: usize,
    /// Pairs only refreshed.
    pub heartbeats: usize,
    pub history_rows: usize,
}

/// Fetches USD reference rates, derives the cross-rate matrix and persists
/// what changed.
pub struct RateSyncEngine {
    client: Arc<dyn MarketDataClient>,
    calculator: CrossRateCalculator,
    store: Arc<dyn StoreFactory>,
    config: SyncConfig,
    /// Held for the duration of a sync so scheduled and manual runs never overlap.
    running: Mutex<()>,
}

impl RateSyncEngine {
    /// Create a new engine.
    pub fn new(
        client: Arc<dyn MarketDataClient>,
        store: Arc<dyn StoreFactory>,
        config: SyncConfig,
    ) -> Self {
        Self {
            client,
            calculator: CrossRateCalculator::new(config.currencies.clone()),
            store,
            config,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one synchronization immediately.
    ///
    /// Waits for a sync already in progress to finish first. Any error means
    /// nothing was written.
    #[instrument(skip(self), fields(client = self.client.name()))]
    pub async fn sync_now(&self) -> FxResult<SyncReport> {
        let _running = self.running.lock().await;

        let usd_rates = self
            .client
            .fetch_rates(Currency::usd(), &self.config.currencies)
            .await?;

        let matrix = self.calculator.calculate(&usd_rates);
        if matrix.is_empty() {
            return Err(FxError::MalformedPayload(format!(
                "no cross rates derivable from {} quoted currencies",
                usd_rates.len()
            )));
        }

        let session = self.store.open();
        let current: HashMap<CurrencyPair, RatePoint> = session
            .get_current_rates()
            .await?
            .into_iter()
            .map(|point| (point.pair, point))
            .collect();

        let timestamp = Utc::now();
        let mut report = SyncReport {
            timestamp,
            pairs_computed: matrix.len(),
            pairs_skipped: matrix.skipped.len(),
            inserted: 0,
            changed: 0,
            heartbeats: 0,
            history_rows: 0,
        };

        let mut upserts = Vec::with_capacity(matrix.len());
        let mut history = Vec::new();

        for (pair, rate) in matrix.rates {
            match current.get(&pair) {
                Some(existing) if (rate - existing.rate).abs() <= self.config.change_epsilon => {
                    let mut refreshed = existing.clone();
                    refreshed.heartbeat(timestamp);
                    upserts.push(refreshed);
                    report.heartbeats += 1;
                }
                previous => {
                    let point = RatePoint::new(pair, rate, timestamp, self.config.source.as_str());
                    match previous {
                        Some(existing) => {
                            debug!(pair = %pair, old = %existing.rate, new = %rate, "Rate changed");
                            report.changed += 1;
                        }
                        None => {
                            debug!(pair = %pair, rate = %rate, "New pair");
                            report.inserted += 1;
                        }
                    }
                    history.push(point.to_history());
                    upserts.push(point);
                }
            }
        }

        report.history_rows = history.len();

        session.upsert_current(upserts).await?;
        session.append_history(history).await?;
        if let Err(e) = session.commit().await {
            error!(error = %e, "Failed to commit rate sync");
            return Err(e.into());
        }

        info!(
            computed = report.pairs_computed,
            skipped = report.pairs_skipped,
            inserted = report.inserted,
            changed = report.changed,
            heartbeats = report.heartbeats,
            "Rate sync completed"
        );

        Ok(report)
    }
}

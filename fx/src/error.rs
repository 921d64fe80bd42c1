//! Rate synchronization error types.

use forexalert_common::CurrencyPair;
use forexalert_store::StoreError;
use thiserror::Error;

/// Errors that can occur while fetching, deriving or persisting rates.
#[derive(Debug, Error)]
pub enum FxError {
    /// The market data request could not be completed.
    #[error("Market data fetch failed: {0}")]
    Fetch(String),

    /// The market data provider answered with a non-success status.
    #[error("Market data provider returned status {status}")]
    UpstreamStatus { status: u16 },

    /// The payload could not be parsed or reported `success = false`.
    #[error("Malformed market data payload: {0}")]
    MalformedPayload(String),

    /// A USD reference rate needed for this pair is missing or unusable.
    #[error("Incomplete rate data for {0}")]
    IncompleteData(CurrencyPair),

    /// A query parameter is outside the accepted set.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Reading or committing the rate store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl FxError {
    /// Whether the next scheduled tick may succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FxError::Fetch(_) | FxError::UpstreamStatus { .. } | FxError::MalformedPayload(_)
        )
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

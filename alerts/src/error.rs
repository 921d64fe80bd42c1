//! Alert pipeline error types.

use std::time::Duration;

use forexalert_store::StoreError;
use thiserror::Error;

/// Errors raised while evaluating or logging alerts.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Reading or committing the store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

/// Why a notification was not delivered.
///
/// Never propagated past a single alert; the message ends up on the trigger
/// record instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notification timed out after {0:?}")]
    Timeout(Duration),

    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification endpoint rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Result type for alert operations.
pub type AlertResult<T> = Result<T, AlertError>;

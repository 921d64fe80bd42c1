//! Store error types.

use forexalert_common::AlertId;
use thiserror::Error;

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A trigger was recorded for an alert the store does not know.
    #[error("Alert not found: {0}")]
    AlertNotFound(AlertId),

    /// A staged write violates a data invariant.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// The backend rejected the commit; nothing was applied.
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// The backend cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot file could not be read or written.
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file is not valid JSON for this schema.
    #[error("Snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

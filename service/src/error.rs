//! Service error types.

use forexalert_alerts::{AlertError, NotifyError};
use forexalert_fx::FxError;
use forexalert_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while assembling or driving the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Rate sync error: {0}")]
    Fx(#[from] FxError),

    #[error("Alert evaluation error: {0}")]
    Alert(#[from] AlertError),

    #[error("Notifier setup failed: {0}")]
    Notifier(#[from] NotifyError),

    /// `start` was called on a service that is not in the `Starting` state.
    #[error("Service cannot start from state {0}")]
    InvalidState(crate::state::ServiceState),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

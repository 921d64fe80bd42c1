//! Error types shared across ForexAlert crates.

use crate::Currency;
use thiserror::Error;

/// Errors raised while validating currency input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    /// Not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCode(String),

    /// Not a `BASE/QUOTE` pair.
    #[error("Invalid currency pair: {0:?}")]
    InvalidPair(String),

    /// Well formed, but outside the configured supported set.
    #[error("Unsupported currency: {0}")]
    Unsupported(Currency),
}

//! ForexAlert Common Types
//!
//! Shared types used across the ForexAlert crates: validated currency codes,
//! current and historical rate points, user alerts and their trigger records,
//! and the `PeriodicTask` contract implemented by the background engines.

pub mod currency;
pub mod identifiers;
pub mod rates;
pub mod alert;
pub mod error;
pub mod time;
pub mod schedule;

pub use currency::*;
pub use identifiers::*;
pub use rates::*;
pub use alert::*;
pub use error::*;
pub use time::*;
pub use schedule::{PeriodicTask, TickOutcome};

//! ForexAlert Rate Store
//!
//! Persistence contract for current rates, rate history, alerts and alert
//! trigger records, plus an in-memory reference backend.
//!
//! Every interaction happens through a [`RateStore`] session obtained from a
//! [`StoreFactory`]. Reads go straight to the backend; writes are staged in
//! the session and applied together by [`RateStore::commit`], so a commit
//! either lands completely or not at all.

pub mod error;
pub mod batch;
pub mod session;
pub mod memory;
pub mod snapshot;

pub use error::{StoreError, StoreResult};
pub use batch::{CommitSummary, WriteBatch};
pub use session::{RateStore, StoreFactory};
pub use memory::{InMemoryRateStore, InMemorySession};
pub use snapshot::{StoreSnapshot, SNAPSHOT_VERSION};

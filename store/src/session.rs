//! Store session and factory traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forexalert_common::{Alert, AlertTriggerRecord, CurrencyPair, RateHistoryPoint, RatePoint};

use crate::batch::CommitSummary;
use crate::error::StoreResult;

/// One unit of work against the rate store.
///
/// Reads observe committed state. `upsert_current`, `append_history` and
/// `save_alert_trigger` only stage writes; nothing is visible to other
/// sessions until [`RateStore::commit`] applies the whole batch atomically.
/// A failed commit discards the staged writes.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// All current rate points.
    async fn get_current_rates(&self) -> StoreResult<Vec<RatePoint>>;

    /// Current rate for one pair.
    async fn get_latest_rate(&self, pair: &CurrencyPair) -> StoreResult<Option<RatePoint>>;

    /// History rows for one pair created at or after `since`, oldest first.
    async fn get_history(
        &self,
        pair: &CurrencyPair,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<RateHistoryPoint>>;

    /// History rows for every pair created at or after `since`, oldest first
    /// within each pair.
    async fn get_history_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<RateHistoryPoint>>;

    /// Every alert, active or not.
    async fn get_alerts(&self) -> StoreResult<Vec<Alert>>;

    /// Alerts with `active = true`.
    async fn get_active_alerts(&self) -> StoreResult<Vec<Alert>>;

    /// Trigger records newest first.
    async fn get_trigger_records(
        &self,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<AlertTriggerRecord>>;

    async fn count_trigger_records(&self) -> StoreResult<usize>;

    async fn count_triggers_since(&self, since: DateTime<Utc>) -> StoreResult<usize>;

    /// Stage current-rate upserts.
    async fn upsert_current(&self, rates: Vec<RatePoint>) -> StoreResult<()>;

    /// Stage history appends.
    async fn append_history(&self, points: Vec<RateHistoryPoint>) -> StoreResult<()>;

    /// Stage an alert's trigger bookkeeping together with its record.
    async fn save_alert_trigger(&self, alert: Alert, record: AlertTriggerRecord)
        -> StoreResult<()>;

    /// Apply every staged write as one unit.
    async fn commit(&self) -> StoreResult<CommitSummary>;

    /// Discard staged writes.
    fn rollback(&self);
}

/// Produces a fresh session per unit of work.
pub trait StoreFactory: Send + Sync {
    fn open(&self) -> Box<dyn RateStore>;
}

impl<F> StoreFactory for F
where
    F: Fn() -> Box<dyn RateStore> + Send + Sync,
{
    fn open(&self) -> Box<dyn RateStore> {
        self()
    }
}

//! In-memory reference backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use forexalert_common::{
    Alert, AlertId, AlertTriggerRecord, CurrencyPair, RateHistoryPoint, RatePoint,
};

use crate::batch::{CommitSummary, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::session::{RateStore, StoreFactory};
use crate::snapshot::StoreSnapshot;

/// Committed state shared by every session.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    /// Current rate per pair.
    pub(crate) current: HashMap<CurrencyPair, RatePoint>,
    /// Append-only history per pair, in insertion order.
    pub(crate) history: BTreeMap<CurrencyPair, Vec<RateHistoryPoint>>,
    pub(crate) alerts: BTreeMap<AlertId, Alert>,
    /// Trigger records in insertion order.
    pub(crate) triggers: Vec<AlertTriggerRecord>,
    /// Commits that should fail before applying anything.
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) failing_commits: usize,
}

impl StoreState {
    fn apply(&mut self, batch: WriteBatch) -> StoreResult<CommitSummary> {
        batch.validate()?;

        // Check everything that can fail before the first mutation.
        for (alert, _) in &batch.triggers {
            if !self.alerts.contains_key(&alert.id) {
                return Err(StoreError::AlertNotFound(alert.id));
            }
        }

        let summary = batch.summary();

        for point in batch.rates {
            self.current.insert(point.pair, point);
        }

        for point in batch.history {
            self.history.entry(point.pair).or_default().push(point);
        }

        for (alert, record) in batch.triggers {
            // Only the trigger bookkeeping is owned by the evaluator; the rest
            // of the alert may have been edited by its owner meanwhile.
            if let (Some(stored), Some(at)) =
                (self.alerts.get_mut(&alert.id), alert.last_triggered_at)
            {
                stored.mark_triggered(at);
            }
            self.triggers.push(record);
        }

        Ok(summary)
    }
}

/// Thread-safe in-memory store.
///
/// Cloning is cheap and every clone shares the same state. Locks are held
/// only for the duration of a single read or commit, never across an await.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRateStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryRateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session.
    pub fn session(&self) -> InMemorySession {
        InMemorySession {
            state: self.state.clone(),
            pending: Mutex::new(WriteBatch::new()),
        }
    }

    /// Insert or replace an alert. Alert management belongs to the API layer;
    /// this is its entry point into the store.
    pub fn upsert_alert(&self, alert: Alert) {
        debug!(alert_id = %alert.id, pair = %alert.pair, "Alert stored");
        self.state.write().alerts.insert(alert.id, alert);
    }

    /// Get an alert by ID.
    pub fn get_alert(&self, id: &AlertId) -> Option<Alert> {
        self.state.read().alerts.get(id).cloned()
    }

    /// Total history rows across all pairs.
    pub fn history_len(&self) -> usize {
        self.state.read().history.values().map(Vec::len).sum()
    }

    /// Capture the full committed state.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        let mut current: Vec<RatePoint> = state.current.values().cloned().collect();
        current.sort_by(|a, b| a.pair.cmp(&b.pair));

        StoreSnapshot::new(
            current,
            state.history.values().flatten().cloned().collect(),
            state.alerts.values().cloned().collect(),
            state.triggers.clone(),
        )
    }

    /// Build a store from a previously captured snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut state = StoreState::default();

        for point in snapshot.current {
            state.current.insert(point.pair, point);
        }
        for point in snapshot.history {
            state.history.entry(point.pair).or_default().push(point);
        }
        for alert in snapshot.alerts {
            state.alerts.insert(alert.id, alert);
        }
        state.triggers = snapshot.triggers;

        info!(
            rates = state.current.len(),
            alerts = state.alerts.len(),
            triggers = state.triggers.len(),
            "Store restored from snapshot"
        );

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Make the next `count` commits fail without applying anything.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fail_next_commits(&self, count: usize) {
        self.state.write().failing_commits = count;
    }
}

impl StoreFactory for InMemoryRateStore {
    fn open(&self) -> Box<dyn RateStore> {
        Box::new(self.session())
    }
}

/// A session against [`InMemoryRateStore`].
pub struct InMemorySession {
    state: Arc<RwLock<StoreState>>,
    pending: Mutex<WriteBatch>,
}

impl InMemorySession {
    /// Number of staged, uncommitted writes.
    pub fn pending_len(&self) -> usize {
        let pending = self.pending.lock();
        pending.rates.len() + pending.history.len() + pending.triggers.len()
    }
}

#[async_trait]
impl RateStore for InMemorySession {
    async fn get_current_rates(&self) -> StoreResult<Vec<RatePoint>> {
        Ok(self.state.read().current.values().cloned().collect())
    }

    async fn get_latest_rate(&self, pair: &CurrencyPair) -> StoreResult<Option<RatePoint>> {
        Ok(self.state.read().current.get(pair).cloned())
    }

    async fn get_history(
        &self,
        pair: &CurrencyPair,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<RateHistoryPoint>> {
        Ok(self
            .state
            .read()
            .history
            .get(pair)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.created_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_history_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<RateHistoryPoint>> {
        Ok(self
            .state
            .read()
            .history
            .values()
            .flatten()
            .filter(|row| row.created_at >= since)
            .cloned()
            .collect())
    }

    async fn get_alerts(&self) -> StoreResult<Vec<Alert>> {
        Ok(self.state.read().alerts.values().cloned().collect())
    }

    async fn get_active_alerts(&self) -> StoreResult<Vec<Alert>> {
        Ok(self
            .state
            .read()
            .alerts
            .values()
            .filter(|alert| alert.active)
            .cloned()
            .collect())
    }

    async fn get_trigger_records(
        &self,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<AlertTriggerRecord>> {
        let state = self.state.read();
        let mut records: Vec<&AlertTriggerRecord> = state.triggers.iter().rev().collect();
        // Stable: equal timestamps keep newest-inserted first.
        records.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

        Ok(records
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_trigger_records(&self) -> StoreResult<usize> {
        Ok(self.state.read().triggers.len())
    }

    async fn count_triggers_since(&self, since: DateTime<Utc>) -> StoreResult<usize> {
        Ok(self
            .state
            .read()
            .triggers
            .iter()
            .filter(|record| record.triggered_at >= since)
            .count())
    }

    async fn upsert_current(&self, rates: Vec<RatePoint>) -> StoreResult<()> {
        self.pending.lock().rates.extend(rates);
        Ok(())
    }

    async fn append_history(&self, points: Vec<RateHistoryPoint>) -> StoreResult<()> {
        self.pending.lock().history.extend(points);
        Ok(())
    }

    async fn save_alert_trigger(
        &self,
        alert: Alert,
        record: AlertTriggerRecord,
    ) -> StoreResult<()> {
        self.pending.lock().triggers.push((alert, record));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn commit(&self) -> StoreResult<CommitSummary> {
        let batch = self.pending.lock().take();
        if batch.is_empty() {
            return Ok(CommitSummary::default());
        }

        let mut state = self.state.write();

        #[cfg(any(test, feature = "test-utils"))]
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(StoreError::CommitFailed("injected failure".to_string()));
        }

        let summary = state.apply(batch)?;
        debug!(
            rates = summary.rates_upserted,
            history = summary.history_appended,
            triggers = summary.triggers_recorded,
            "Commit applied"
        );
        Ok(summary)
    }

    fn rollback(&self) {
        self.pending.lock().take();
    }
}

//! Metrics collection for the background engines.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use forexalert_alerts::EvaluationReport;
use forexalert_fx::SyncReport;
use serde::Serialize;

/// Engine metrics.
pub struct ServiceMetrics {
    /// Completed rate syncs.
    pub sync_ticks: AtomicU64,
    /// Rate syncs that wrote nothing because of an error.
    pub sync_failures: AtomicU64,
    /// Pairs inserted or changed.
    pub rates_changed: AtomicU64,
    /// Pairs refreshed without a change.
    pub rate_heartbeats: AtomicU64,
    /// History rows appended.
    pub history_rows: AtomicU64,
    /// Completed evaluation ticks.
    pub evaluation_ticks: AtomicU64,
    /// Evaluation ticks that could not load alerts.
    pub evaluation_failures: AtomicU64,
    /// Alerts whose condition was checked.
    pub alerts_evaluated: AtomicU64,
    /// Alerts that fired.
    pub alerts_triggered: AtomicU64,
    /// Notifications that failed or timed out.
    pub notification_failures: AtomicU64,
    /// Alerts abandoned on a store error.
    pub alerts_failed: AtomicU64,
}

impl ServiceMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            sync_ticks: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            rates_changed: AtomicU64::new(0),
            rate_heartbeats: AtomicU64::new(0),
            history_rows: AtomicU64::new(0),
            evaluation_ticks: AtomicU64::new(0),
            evaluation_failures: AtomicU64::new(0),
            alerts_evaluated: AtomicU64::new(0),
            alerts_triggered: AtomicU64::new(0),
            notification_failures: AtomicU64::new(0),
            alerts_failed: AtomicU64::new(0),
        }
    }

    /// Record a completed sync.
    pub fn record_sync(&self, report: &SyncReport) {
        self.sync_ticks.fetch_add(1, Ordering::Relaxed);
        self.rates_changed
            .fetch_add((report.inserted + report.changed) as u64, Ordering::Relaxed);
        self.rate_heartbeats
            .fetch_add(report.heartbeats as u64, Ordering::Relaxed);
        self.history_rows
            .fetch_add(report.history_rows as u64, Ordering::Relaxed);
    }

    /// Record a failed sync.
    pub fn sync_failed(&self) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed evaluation tick.
    pub fn record_evaluation(&self, report: &EvaluationReport) {
        self.evaluation_ticks.fetch_add(1, Ordering::Relaxed);
        self.alerts_evaluated
            .fetch_add(report.evaluated as u64, Ordering::Relaxed);
        self.alerts_triggered
            .fetch_add(report.triggered as u64, Ordering::Relaxed);
        self.notification_failures
            .fetch_add(report.notification_failures as u64, Ordering::Relaxed);
        self.alerts_failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    /// Record an evaluation tick that could not run.
    pub fn evaluation_failed(&self) {
        self.evaluation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sync_ticks: self.sync_ticks.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            rates_changed: self.rates_changed.load(Ordering::Relaxed),
            rate_heartbeats: self.rate_heartbeats.load(Ordering::Relaxed),
            history_rows: self.history_rows.load(Ordering::Relaxed),
            evaluation_ticks: self.evaluation_ticks.load(Ordering::Relaxed),
            evaluation_failures: self.evaluation_failures.load(Ordering::Relaxed),
            alerts_evaluated: self.alerts_evaluated.load(Ordering::Relaxed),
            alerts_triggered: self.alerts_triggered.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            alerts_failed: self.alerts_failed.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP forexalert_sync_ticks_total Completed rate syncs
# TYPE forexalert_sync_ticks_total counter
forexalert_sync_ticks_total {}

# HELP forexalert_sync_failures_total Failed rate syncs
# TYPE forexalert_sync_failures_total counter
forexalert_sync_failures_total {}

# HELP forexalert_rates_changed_total Pairs inserted or changed
# TYPE forexalert_rates_changed_total counter
forexalert_rates_changed_total {}

# HELP forexalert_rate_heartbeats_total Pairs refreshed without a change
# TYPE forexalert_rate_heartbeats_total counter
forexalert_rate_heartbeats_total {}

# HELP forexalert_history_rows_total Rate history rows appended
# TYPE forexalert_history_rows_total counter
forexalert_history_rows_total {}

# HELP forexalert_evaluation_ticks_total Completed alert evaluation ticks
# TYPE forexalert_evaluation_ticks_total counter
forexalert_evaluation_ticks_total {}

# HELP forexalert_evaluation_failures_total Failed alert evaluation ticks
# TYPE forexalert_evaluation_failures_total counter
forexalert_evaluation_failures_total {}

# HELP forexalert_alerts_evaluated_total Alerts checked against a rate
# TYPE forexalert_alerts_evaluated_total counter
forexalert_alerts_evaluated_total {}

# HELP forexalert_alerts_triggered_total Alerts triggered
# TYPE forexalert_alerts_triggered_total counter
forexalert_alerts_triggered_total {}

# HELP forexalert_notification_failures_total Notifications that failed or timed out
# TYPE forexalert_notification_failures_total counter
forexalert_notification_failures_total {}

# HELP forexalert_alerts_failed_total Alerts abandoned on a store error
# TYPE forexalert_alerts_failed_total counter
forexalert_alerts_failed_total {}
"#,
            snapshot.sync_ticks,
            snapshot.sync_failures,
            snapshot.rates_changed,
            snapshot.rate_heartbeats,
            snapshot.history_rows,
            snapshot.evaluation_ticks,
            snapshot.evaluation_failures,
            snapshot.alerts_evaluated,
            snapshot.alerts_triggered,
            snapshot.notification_failures,
            snapshot.alerts_failed,
        )
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub sync_ticks: u64,
    pub sync_failures: u64,
    pub rates_changed: u64,
    pub rate_heartbeats: u64,
    pub history_rows: u64,
    pub evaluation_ticks: u64,
    pub evaluation_failures: u64,
    pub alerts_evaluated: u64,
    pub alerts_triggered: u64,
    pub notification_failures: u64,
    pub alerts_failed: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<ServiceMetrics>;

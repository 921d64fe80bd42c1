//! Scheduled wrappers around the sync engine and the alert evaluator.
//!
//! The engines return full reports and typed errors. These adapters record
//! the reports as metrics and reduce each tick to a [`TickOutcome`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forexalert_alerts::AlertEvaluator;
use forexalert_common::{PeriodicTask, TickOutcome};
use forexalert_fx::RateSyncEngine;
use tracing::{debug, error, warn};

use crate::metrics::SharedMetrics;

/// Hourly rate synchronization.
pub struct SyncTask {
    engine: Arc<RateSyncEngine>,
    metrics: SharedMetrics,
}

impl SyncTask {
    pub fn new(engine: Arc<RateSyncEngine>, metrics: SharedMetrics) -> Self {
        Self { engine, metrics }
    }
}

#[async_trait]
impl PeriodicTask for SyncTask {
    fn name(&self) -> &str {
        "rate-sync"
    }

    fn interval(&self) -> Duration {
        self.engine.config().interval
    }

    async fn tick(&self) -> TickOutcome {
        match self.engine.sync_now().await {
            Ok(report) => {
                self.metrics.record_sync(&report);
                debug!(timestamp = %report.timestamp, "Sync metrics recorded");
                TickOutcome::Completed {
                    items: report.pairs_computed,
                }
            }
            Err(e) => {
                self.metrics.sync_failed();
                if e.is_transient() {
                    warn!(error = %e, "Rate sync failed, will retry next cycle");
                } else {
                    error!(error = %e, "Rate sync failed");
                }
                TickOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Hourly alert evaluation.
pub struct EvaluationTask {
    evaluator: Arc<AlertEvaluator>,
    metrics: SharedMetrics,
}

impl EvaluationTask {
    pub fn new(evaluator: Arc<AlertEvaluator>, metrics: SharedMetrics) -> Self {
        Self { evaluator, metrics }
    }
}

#[async_trait]
impl PeriodicTask for EvaluationTask {
    fn name(&self) -> &str {
        "alert-evaluator"
    }

    fn interval(&self) -> Duration {
        self.evaluator.config().interval
    }

    fn initial_delay(&self) -> Duration {
        self.evaluator.config().initial_delay
    }

    async fn tick(&self) -> TickOutcome {
        match self.evaluator.evaluate_now().await {
            Ok(report) => {
                self.metrics.record_evaluation(&report);
                debug!(evaluated_at = %report.evaluated_at, "Evaluation metrics recorded");
                TickOutcome::Completed {
                    items: report.evaluated,
                }
            }
            Err(e) => {
                self.metrics.evaluation_failed();
                error!(error = %e, "Alert evaluation failed");
                TickOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forexalert_alerts::{EvaluatorConfig, RecordingNotifier};
    use forexalert_common::{Alert, AlertCondition, Currency, CurrencyPair, CurrencySet, OwnerId};
    use forexalert_fx::{FxError, StaticMarketDataClient, SyncConfig};
    use forexalert_store::InMemoryRateStore;
    use rust_decimal_macros::dec;

    use crate::metrics::ServiceMetrics;

    fn sync_task(store: &InMemoryRateStore) -> (SyncTask, Arc<StaticMarketDataClient>, SharedMetrics) {
        let client = Arc::new(StaticMarketDataClient::new([
            (Currency::usd(), dec!(1)),
            (Currency::mwk(), dec!(1735)),
        ]));
        let config = SyncConfig {
            currencies: CurrencySet::parse_list("USD,MWK").unwrap(),
            ..SyncConfig::default()
        };
        let engine = Arc::new(RateSyncEngine::new(
            client.clone(),
            Arc::new(store.clone()),
            config,
        ));
        let metrics = Arc::new(ServiceMetrics::new());
        (SyncTask::new(engine, metrics.clone()), client, metrics)
    }

    #[tokio::test]
    async fn test_sync_task_records_metrics() {
        let store = InMemoryRateStore::new();
        let (task, client, metrics) = sync_task(&store);

        assert_eq!(task.tick().await, TickOutcome::Completed { items: 2 });

        client.fail_next(FxError::Fetch("connection reset".into()));
        assert!(task.tick().await.is_failed());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sync_ticks, 1);
        assert_eq!(snapshot.sync_failures, 1);
        assert_eq!(snapshot.rates_changed, 2);
        assert_eq!(task.name(), "rate-sync");
        assert_eq!(task.interval(), Duration::from_secs(3600));
        assert_eq!(task.initial_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_evaluation_task_records_metrics() {
        let store = InMemoryRateStore::new();
        let (sync, _, _) = sync_task(&store);
        sync.tick().await;

        store.upsert_alert(Alert::new(
            OwnerId::new("user-1"),
            "user1@example.com",
            CurrencyPair::new(Currency::usd(), Currency::mwk()),
            AlertCondition::GreaterThan,
            dec!(1700),
        ));

        let notifier = Arc::new(RecordingNotifier::new());
        let evaluator = Arc::new(AlertEvaluator::new(
            Arc::new(store.clone()),
            notifier.clone(),
            EvaluatorConfig::default(),
        ));
        let metrics = Arc::new(ServiceMetrics::new());
        let task = EvaluationTask::new(evaluator, metrics.clone());

        assert_eq!(task.tick().await, TickOutcome::Completed { items: 1 });
        assert_eq!(notifier.count(), 1);
        assert_eq!(task.initial_delay(), Duration::from_secs(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.evaluation_ticks, 1);
        assert_eq!(snapshot.alerts_triggered, 1);
    }
}

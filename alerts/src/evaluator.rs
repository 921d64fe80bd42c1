//! Periodic alert evaluation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use forexalert_common::{constants, Alert, AlertTriggerRecord, DurationExt};
use forexalert_store::{RateStore, StoreFactory};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::condition::ConditionMatcher;
use crate::error::{AlertResult, NotifyError};
use crate::logger::AlertLogger;
use crate::notifier::{AlertNotification, Notifier};

/// Configuration for the alert evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Delay before the first tick after start.
    pub initial_delay: Duration,
    /// Alerts processed at the same time.
    pub concurrency: usize,
    /// Upper bound on one notification attempt.
    pub notification_timeout: Duration,
    /// Skip alerts that fired more recently than this. `None` re-notifies on
    /// every tick while the condition holds.
    pub trigger_cooldown: Option<chrono::Duration>,
    /// Tolerance for `EqualTo` alerts.
    pub alert_epsilon: Decimal,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            interval: constants::evaluation_interval().as_std(),
            initial_delay: constants::evaluation_initial_delay().as_std(),
            concurrency: 8,
            notification_timeout: constants::notification_timeout().as_std(),
            trigger_cooldown: None,
            alert_epsilon: constants::alert_epsilon(),
        }
    }
}

/// What one evaluation tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Evaluation time, written as `last_triggered_at` on every trigger.
    pub evaluated_at: DateTime<Utc>,
    /// Distinct active alerts loaded.
    pub alerts_loaded: usize,
    /// Alerts checked against a rate.
    pub evaluated: usize,
    /// Alerts whose pair has no rate yet.
    pub skipped_no_rate: usize,
    /// Alerts skipped by the trigger cooldown.
    pub cooling_down: usize,
    /// Alerts whose condition held.
    pub triggered: usize,
    pub notification_failures: usize,
    /// Alerts abandoned on a store error.
    pub failed: usize,
}

enum AlertOutcome {
    NoRate,
    CoolingDown,
    NotTriggered,
    Triggered { notified: bool, persisted: bool },
    Failed,
}

/// Matches active alerts against the latest rates and notifies owners.
pub struct AlertEvaluator {
    store: Arc<dyn StoreFactory>,
    notifier: Arc<dyn Notifier>,
    logger: AlertLogger,
    matcher: ConditionMatcher,
    config: EvaluatorConfig,
}

impl AlertEvaluator {
    pub fn new(
        store: Arc<dyn StoreFactory>,
        notifier: Arc<dyn Notifier>,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            logger: AlertLogger::new(store.clone()),
            matcher: ConditionMatcher::new(config.alert_epsilon),
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate every active alert once.
    ///
    /// Only a failure to load the alert list fails the tick; per-alert
    /// failures are counted in the report.
    #[instrument(skip(self), fields(notifier = self.notifier.name()))]
    pub async fn evaluate_now(&self) -> AlertResult<EvaluationReport> {
        let evaluated_at = Utc::now();

        let mut alerts = self.store.open().get_active_alerts().await?;
        let mut seen = HashSet::new();
        alerts.retain(|alert| seen.insert(alert.id));

        let mut report = EvaluationReport {
            evaluated_at,
            alerts_loaded: alerts.len(),
            ..Default::default()
        };

        let outcomes: Vec<AlertOutcome> = stream::iter(alerts)
            .map(|alert| self.process(alert, evaluated_at))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                AlertOutcome::NoRate => report.skipped_no_rate += 1,
                AlertOutcome::CoolingDown => report.cooling_down += 1,
                AlertOutcome::NotTriggered => report.evaluated += 1,
                AlertOutcome::Triggered {
                    notified,
                    persisted,
                } => {
                    report.evaluated += 1;
                    report.triggered += 1;
                    if !notified {
                        report.notification_failures += 1;
                    }
                    if !persisted {
                        report.failed += 1;
                    }
                }
                AlertOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            loaded = report.alerts_loaded,
            evaluated = report.evaluated,
            triggered = report.triggered,
            notification_failures = report.notification_failures,
            failed = report.failed,
            "Alert evaluation completed"
        );

        Ok(report)
    }

    async fn process(&self, alert: Alert, now: DateTime<Utc>) -> AlertOutcome {
        if let Some(cooldown) = self.config.trigger_cooldown {
            if alert.is_cooling_down(now, cooldown) {
                debug!(alert_id = %alert.id, "Alert cooling down");
                return AlertOutcome::CoolingDown;
            }
        }

        let rate = match self.store.open().get_latest_rate(&alert.pair).await {
            Ok(Some(point)) => point.rate,
            Ok(None) => {
                debug!(alert_id = %alert.id, pair = %alert.pair, "No rate for alert pair");
                return AlertOutcome::NoRate;
            }
            Err(e) => {
                warn!(alert_id = %alert.id, pair = %alert.pair, error = %e, "Failed to read rate");
                return AlertOutcome::Failed;
            }
        };

        if !self.matcher.matches(alert.condition, rate, alert.target_rate) {
            return AlertOutcome::NotTriggered;
        }

        info!(
            alert_id = %alert.id,
            pair = %alert.pair,
            condition = %alert.condition,
            rate = %rate,
            target = %alert.target_rate,
            "Alert triggered"
        );

        let notification = AlertNotification::new(&alert, rate, now);
        let delivery = match tokio::time::timeout(
            self.config.notification_timeout,
            self.notifier.send_alert_triggered(&notification),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.config.notification_timeout)),
        };

        if let Err(e) = &delivery {
            warn!(alert_id = %alert.id, error = %e, "Notification failed");
        }
        let notified = delivery.is_ok();

        let mut fired = alert;
        fired.mark_triggered(now);
        let record = AlertTriggerRecord::new(&fired, rate, now)
            .with_notification(delivery.map_err(|e| e.to_string()));

        let persisted = match self.logger.record(fired, record).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Trigger not persisted");
                false
            }
        };

        AlertOutcome::Triggered {
            notified,
            persisted,
        }
    }
}

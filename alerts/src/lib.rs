//! ForexAlert Alerts
//!
//! Evaluates user alerts against the latest stored rates, notifies owners,
//! and keeps an audit log of every trigger.
//!
//! Each evaluation tick loads the active alerts once and processes them
//! through a bounded worker pool. A failure on one alert (missing rate,
//! notifier error or timeout, store error) is recorded and logged without
//! affecting the others.

pub mod condition;
pub mod notifier;
pub mod logger;
pub mod evaluator;
pub mod error;

pub use condition::ConditionMatcher;
pub use notifier::{AlertNotification, Notifier, TracingNotifier, WebhookNotifier};
#[cfg(any(test, feature = "test-utils"))]
pub use notifier::RecordingNotifier;
pub use logger::{AlertLogger, TriggerLogPage, TriggerStatistics, WatchedPair, MAX_PAGE_SIZE};
pub use evaluator::{AlertEvaluator, EvaluationReport, EvaluatorConfig};
pub use error::{AlertError, AlertResult, NotifyError};

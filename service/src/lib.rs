//! ForexAlert Service
//!
//! Wires the rate sync engine and the alert evaluator to a shared store and
//! drives both on independent schedules until shutdown.

pub mod config;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod service;
pub mod state;
pub mod tasks;

pub use config::{ConfigError, MarketConfig, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use metrics::{MetricsSnapshot, ServiceMetrics, SharedMetrics};
pub use runner::{EngineHandle, EngineRunner};
pub use service::ForexAlertService;
pub use state::ServiceState;
pub use tasks::{EvaluationTask, SyncTask};

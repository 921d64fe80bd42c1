//! Service configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use forexalert_alerts::EvaluatorConfig;
use forexalert_common::{constants, Currency, CurrencyError, CurrencySet, DurationExt, SYNTHETIC_SOURCE};
use forexalert_fx::{SyncConfig, FXRATES_BASE_URL};
use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration errors. Raised at startup only.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid currency configuration: {0}")]
    Currency(#[from] CurrencyError),

    /// The parsed configuration is inconsistent.
    #[error("{0}")]
    Invalid(String),
}

/// Market data configuration.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// FxRatesAPI base URL.
    pub base_url: String,
    /// FxRatesAPI key.
    pub api_key: String,
    /// Use the seeded random-walk market instead of the HTTP API.
    pub simulated: bool,
    /// Seed for the simulated market.
    pub seed: Option<u64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: FXRATES_BASE_URL.to_string(),
            api_key: String::new(),
            simulated: false,
            seed: None,
        }
    }
}

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Currencies the service syncs and accepts alerts for.
    pub currencies: CurrencySet,
    /// Rate sync cycle.
    pub sync_interval: Duration,
    /// Alert evaluation cycle.
    pub evaluation_interval: Duration,
    /// Delay before the first evaluation.
    pub evaluation_delay: Duration,
    /// Moves at or below this are heartbeats.
    pub change_epsilon: Decimal,
    /// Tolerance for `EqualTo` alerts.
    pub alert_epsilon: Decimal,
    /// Alerts evaluated concurrently.
    pub evaluation_concurrency: usize,
    /// Upper bound on one notification attempt.
    pub notification_timeout: Duration,
    /// Minimum time between two triggers of one alert.
    pub trigger_cooldown: Option<chrono::Duration>,
    /// Market data configuration.
    pub market: MarketConfig,
    /// Webhook that receives alert notifications. Logged only when unset.
    pub webhook_url: Option<String>,
    /// JSON file the store is loaded from and saved to.
    pub state_file: Option<PathBuf>,
    /// Log level.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            currencies: CurrencySet::default(),
            sync_interval: constants::sync_interval().as_std(),
            evaluation_interval: constants::evaluation_interval().as_std(),
            evaluation_delay: constants::evaluation_initial_delay().as_std(),
            change_epsilon: constants::change_epsilon(),
            alert_epsilon: constants::alert_epsilon(),
            evaluation_concurrency: 8,
            notification_timeout: constants::notification_timeout().as_std(),
            trigger_cooldown: None,
            market: MarketConfig::default(),
            webhook_url: None,
            state_file: None,
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        reason: e.to_string(),
        value,
    })
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source. Unset keys keep their
    /// defaults; set but unparseable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(list) = get("FOREXALERT_SUPPORTED_CURRENCIES") {
            config.currencies = CurrencySet::parse_list(&list)?;
        }

        if let Some(minutes) = get("FOREXALERT_SYNC_INTERVAL_MINUTES") {
            let minutes: u64 = parse_var("FOREXALERT_SYNC_INTERVAL_MINUTES", minutes)?;
            config.sync_interval = Duration::from_secs(minutes * 60);
        }

        if let Some(minutes) = get("FOREXALERT_EVALUATION_INTERVAL_MINUTES") {
            let minutes: u64 = parse_var("FOREXALERT_EVALUATION_INTERVAL_MINUTES", minutes)?;
            config.evaluation_interval = Duration::from_secs(minutes * 60);
        }

        if let Some(secs) = get("FOREXALERT_EVALUATION_DELAY_SECS") {
            config.evaluation_delay =
                Duration::from_secs(parse_var("FOREXALERT_EVALUATION_DELAY_SECS", secs)?);
        }

        if let Some(epsilon) = get("FOREXALERT_CHANGE_EPSILON") {
            config.change_epsilon = parse_var("FOREXALERT_CHANGE_EPSILON", epsilon)?;
        }

        if let Some(epsilon) = get("FOREXALERT_ALERT_EPSILON") {
            config.alert_epsilon = parse_var("FOREXALERT_ALERT_EPSILON", epsilon)?;
        }

        if let Some(concurrency) = get("FOREXALERT_EVALUATION_CONCURRENCY") {
            config.evaluation_concurrency =
                parse_var("FOREXALERT_EVALUATION_CONCURRENCY", concurrency)?;
        }

        if let Some(secs) = get("FOREXALERT_NOTIFICATION_TIMEOUT_SECS") {
            config.notification_timeout =
                Duration::from_secs(parse_var("FOREXALERT_NOTIFICATION_TIMEOUT_SECS", secs)?);
        }

        if let Some(minutes) = get("FOREXALERT_TRIGGER_COOLDOWN_MINUTES") {
            let minutes: i64 = parse_var("FOREXALERT_TRIGGER_COOLDOWN_MINUTES", minutes)?;
            config.trigger_cooldown = Some(chrono::Duration::minutes(minutes));
        }

        if let Some(url) = get("FXRATES_BASE_URL") {
            config.market.base_url = url;
        }

        if let Some(key) = get("FXRATES_API_KEY") {
            config.market.api_key = key;
        }

        config.webhook_url = get("FOREXALERT_WEBHOOK_URL");
        config.state_file = get("FOREXALERT_STATE_FILE").map(PathBuf::from);

        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currencies.len() < 2 {
            return Err(ConfigError::Invalid(
                "At least two supported currencies are required".to_string(),
            ));
        }

        if !self.currencies.contains(&Currency::usd()) {
            return Err(ConfigError::Invalid(
                "USD must be a supported currency; it is the reference for cross rates".to_string(),
            ));
        }

        if self.sync_interval.is_zero() || self.evaluation_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "Sync and evaluation intervals must be positive".to_string(),
            ));
        }

        if self.change_epsilon <= Decimal::ZERO || self.alert_epsilon <= Decimal::ZERO {
            return Err(ConfigError::Invalid("Epsilons must be positive".to_string()));
        }

        if self.evaluation_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "Evaluation concurrency cannot be 0".to_string(),
            ));
        }

        if self.notification_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "Notification timeout must be positive".to_string(),
            ));
        }

        if matches!(self.trigger_cooldown, Some(cooldown) if cooldown <= chrono::Duration::zero()) {
            return Err(ConfigError::Invalid(
                "Trigger cooldown must be positive when set".to_string(),
            ));
        }

        if !self.market.simulated && self.market.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "FXRATES_API_KEY is required unless running with the simulated market".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings for the rate sync engine.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            currencies: self.currencies.clone(),
            interval: self.sync_interval,
            change_epsilon: self.change_epsilon,
            source: SYNTHETIC_SOURCE.to_string(),
        }
    }

    /// Settings for the alert evaluator.
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            interval: self.evaluation_interval,
            initial_delay: self.evaluation_delay,
            concurrency: self.evaluation_concurrency,
            notification_timeout: self.notification_timeout,
            trigger_cooldown: self.trigger_cooldown,
            alert_epsilon: self.alert_epsilon,
        }
    }
}

//! Time utilities and default tunables for ForexAlert.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;

/// Default schedule and tolerance values.
pub mod constants {
    use super::{Decimal, Duration};

    /// Rate synchronization cycle (60 minutes).
    pub fn sync_interval() -> Duration {
        Duration::minutes(60)
    }

    /// Alert evaluation cycle (60 minutes).
    pub fn evaluation_interval() -> Duration {
        Duration::minutes(60)
    }

    /// Delay before the first alert evaluation (30 seconds).
    pub fn evaluation_initial_delay() -> Duration {
        Duration::seconds(30)
    }

    /// Movement below this is a heartbeat, not a change (1e-6).
    pub fn change_epsilon() -> Decimal {
        Decimal::new(1, 6)
    }

    /// Tolerance for `EqualTo` alerts (1e-3).
    pub fn alert_epsilon() -> Decimal {
        Decimal::new(1, 3)
    }

    /// Upper bound on a single notification attempt (10 seconds).
    pub fn notification_timeout() -> Duration {
        Duration::seconds(10)
    }
}

/// A timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Midnight UTC of the day containing `at`.
pub fn start_of_utc_day(at: Timestamp) -> Timestamp {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Duration extensions for convenient conversion.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

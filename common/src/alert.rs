//! User alerts and the records produced when they trigger.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AlertId, CurrencyPair, OwnerId, TriggerId};

/// Threshold condition of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertCondition {
    /// Trigger when the rate is strictly above the target.
    GreaterThan,
    /// Trigger when the rate is strictly below the target.
    LessThan,
    /// Trigger when the rate is within tolerance of the target.
    EqualTo,
    /// Any value this build does not understand. Never triggers.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertCondition::GreaterThan => "GreaterThan",
            AlertCondition::LessThan => "LessThan",
            AlertCondition::EqualTo => "EqualTo",
            AlertCondition::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A user-defined threshold alert on a currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert ID.
    pub id: AlertId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Where notifications for this alert are delivered.
    pub owner_email: String,
    /// Watched pair.
    pub pair: CurrencyPair,
    /// Threshold condition.
    pub condition: AlertCondition,
    /// Threshold rate.
    pub target_rate: Decimal,
    /// Inactive alerts are never evaluated.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set by the evaluator each time the alert fires.
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Create a new active alert.
    pub fn new(
        owner_id: OwnerId,
        owner_email: impl Into<String>,
        pair: CurrencyPair,
        condition: AlertCondition,
        target_rate: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AlertId::new(),
            owner_id,
            owner_email: owner_email.into(),
            pair,
            condition,
            target_rate,
            active: true,
            created_at: now,
            updated_at: now,
            last_triggered_at: None,
        }
    }

    /// Deactivate the alert.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }

    /// Record a trigger. Never moves the trigger time backwards.
    pub fn mark_triggered(&mut self, at: DateTime<Utc>) {
        self.last_triggered_at = Some(match self.last_triggered_at {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }

    /// Whether the alert fired less than `cooldown` before `now`.
    pub fn is_cooling_down(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_triggered_at
            .map(|last| now.signed_duration_since(last) < cooldown)
            .unwrap_or(false)
    }
}

/// Immutable audit record of one alert trigger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTriggerRecord {
    /// Unique record ID.
    pub id: TriggerId,
    /// The alert that fired.
    pub alert_id: AlertId,
    /// Pair the alert watches.
    pub pair: CurrencyPair,
    /// Rate observed when the alert fired.
    pub triggered_rate: Decimal,
    /// Alert threshold at the time.
    pub target_rate: Decimal,
    /// Alert condition at the time.
    pub condition: AlertCondition,
    pub triggered_at: DateTime<Utc>,
    /// Whether the notifier reported delivery.
    pub notification_sent: bool,
    /// Notifier failure, if any.
    pub notification_error: Option<String>,
}

impl AlertTriggerRecord {
    /// Create a record for an alert firing at `rate`.
    ///
    /// The record starts out undelivered; attach the notification outcome
    /// with [`AlertTriggerRecord::with_notification`] before persisting.
    pub fn new(alert: &Alert, rate: Decimal, triggered_at: DateTime<Utc>) -> Self {
        Self {
            id: TriggerId::new(),
            alert_id: alert.id,
            pair: alert.pair,
            triggered_rate: rate,
            target_rate: alert.target_rate,
            condition: alert.condition,
            triggered_at,
            notification_sent: false,
            notification_error: None,
        }
    }

    /// Attach the notification outcome.
    pub fn with_notification(mut self, outcome: Result<(), String>) -> Self {
        match outcome {
            Ok(()) => {
                self.notification_sent = true;
                self.notification_error = None;
            }
            Err(error) => {
                self.notification_sent = false;
                self.notification_error = Some(error);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Currency;
    use rust_decimal_macros::dec;

    fn usd_mwk_alert() -> Alert {
        Alert::new(
            OwnerId::new("user-1"),
            "user1@example.com",
            CurrencyPair::new(Currency::usd(), Currency::mwk()),
            AlertCondition::GreaterThan,
            dec!(1700),
        )
    }

    #[test]
    fn test_condition_serde() {
        let json = serde_json::to_string(&AlertCondition::EqualTo).unwrap();
        assert_eq!(json, "\"EqualTo\"");

        let unknown: AlertCondition = serde_json::from_str("\"Between\"").unwrap();
        assert_eq!(unknown, AlertCondition::Unknown);
    }

    #[test]
    fn test_mark_triggered_is_monotonic() {
        let mut alert = usd_mwk_alert();
        let later = Utc::now();
        let earlier = later - Duration::minutes(5);

        alert.mark_triggered(later);
        alert.mark_triggered(earlier);

        assert_eq!(alert.last_triggered_at, Some(later));
    }

    #[test]
    fn test_cooldown() {
        let mut alert = usd_mwk_alert();
        let now = Utc::now();
        assert!(!alert.is_cooling_down(now, Duration::hours(1)));

        alert.mark_triggered(now - Duration::minutes(30));
        assert!(alert.is_cooling_down(now, Duration::hours(1)));
        assert!(!alert.is_cooling_down(now, Duration::minutes(10)));
    }

    #[test]
    fn test_trigger_record_outcomes() {
        let alert = usd_mwk_alert();
        let now = Utc::now();

        let delivered = AlertTriggerRecord::new(&alert, dec!(1750), now).with_notification(Ok(()));
        assert!(delivered.notification_sent);
        assert!(delivered.notification_error.is_none());
        assert_eq!(delivered.alert_id, alert.id);
        assert_eq!(delivered.target_rate, dec!(1700));

        let failed = AlertTriggerRecord::new(&alert, dec!(1750), now)
            .with_notification(Err("smtp unreachable".to_string()));
        assert!(!failed.notification_sent);
        assert_eq!(failed.notification_error.as_deref(), Some("smtp unreachable"));
    }
}

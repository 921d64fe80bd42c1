//! Outbound alert notifications.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forexalert_common::{Alert, AlertCondition, AlertId, CurrencyPair};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::NotifyError;

const DISPLAY_DECIMAL_PLACES: u32 = 4;

/// Everything a notifier needs to tell a user their alert fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub alert_id: AlertId,
    pub recipient: String,
    pub pair: CurrencyPair,
    pub current_rate: Decimal,
    pub target_rate: Decimal,
    pub condition: AlertCondition,
    pub triggered_at: DateTime<Utc>,
}

impl AlertNotification {
    pub fn new(alert: &Alert, current_rate: Decimal, triggered_at: DateTime<Utc>) -> Self {
        Self {
            alert_id: alert.id,
            recipient: alert.owner_email.clone(),
            pair: alert.pair,
            current_rate,
            target_rate: alert.target_rate,
            condition: alert.condition,
            triggered_at,
        }
    }

    pub fn subject(&self) -> String {
        format!("Forex Alert Triggered: {}", self.pair)
    }

    /// Plain-text body with rates at four decimal places.
    pub fn body(&self) -> String {
        format!(
            "Your forex rate alert has been triggered.\n\n\
             Currency Pair: {}\n\
             Current Rate: {:.4}\n\
             Target Rate: {:.4}\n\
             Condition: {}\n\
             Triggered At: {} UTC\n",
            self.pair,
            self.current_rate.round_dp(DISPLAY_DECIMAL_PLACES),
            self.target_rate.round_dp(DISPLAY_DECIMAL_PLACES),
            self.condition,
            self.triggered_at.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

/// Delivers alert notifications. `Ok(())` means delivered.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier name used in logs.
    fn name(&self) -> &str;

    async fn send_alert_triggered(&self, notification: &AlertNotification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn send_alert_triggered(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        if notification.recipient.trim().is_empty() {
            return Err(NotifyError::InvalidRecipient(
                "alert owner has no email address".to_string(),
            ));
        }

        info!(
            alert_id = %notification.alert_id,
            recipient = %notification.recipient,
            subject = %notification.subject(),
            rate = %notification.current_rate,
            "Alert notification"
        );
        Ok(())
    }
}

/// Webhook request body.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: String,
    body: String,
    #[serde(flatten)]
    notification: &'a AlertNotification,
}

/// POSTs notifications as JSON to a webhook (mail relay, chat bridge, ...).
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip(self, notification), fields(alert_id = %notification.alert_id))]
    async fn send_alert_triggered(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            subject: notification.subject(),
            body: notification.body(),
            notification,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

/// Test notifier that records every notification and can be told to fail.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: parking_lot::Mutex<Vec<AlertNotification>>,
    failure: Option<NotifyError>,
    delay: Option<Duration>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every attempt fails with `error`.
    pub fn failing(error: NotifyError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every notification attempted so far, including failed ones.
    pub fn sent(&self) -> Vec<AlertNotification> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_alert_triggered(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        self.sent.lock().push(notification.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forexalert_common::{Currency, OwnerId};
    use rust_decimal_macros::dec;

    fn notification() -> AlertNotification {
        let alert = Alert::new(
            OwnerId::new("user-1"),
            "user1@example.com",
            CurrencyPair::new(Currency::usd(), Currency::mwk()),
            AlertCondition::GreaterThan,
            dec!(1700),
        );
        let at = Utc.with_ymd_and_hms(2025, 8, 20, 13, 0, 0).unwrap();
        AlertNotification::new(&alert, dec!(1750.123456), at)
    }

    #[test]
    fn test_subject_and_body() {
        let n = notification();

        assert_eq!(n.subject(), "Forex Alert Triggered: USD/MWK");
        let body = n.body();
        assert!(body.contains("Currency Pair: USD/MWK"));
        assert!(body.contains("Current Rate: 1750.1235"));
        assert!(body.contains("Target Rate: 1700.0000"));
        assert!(body.contains("Condition: GreaterThan"));
        assert!(body.contains("Triggered At: 2025-08-20 13:00:00 UTC"));
    }

    #[tokio::test]
    async fn test_tracing_notifier_requires_recipient() {
        let mut n = notification();
        assert!(TracingNotifier.send_alert_triggered(&n).await.is_ok());

        n.recipient = String::new();
        assert!(matches!(
            TracingNotifier.send_alert_triggered(&n).await,
            Err(NotifyError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn test_webhook_payload_shape() {
        let n = notification();
        let payload = WebhookPayload {
            subject: n.subject(),
            body: n.body(),
            notification: &n,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["subject"], "Forex Alert Triggered: USD/MWK");
        assert_eq!(json["recipient"], "user1@example.com");
        assert_eq!(json["condition"], "GreaterThan");
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let ok = RecordingNotifier::new();
        let failing = RecordingNotifier::failing(NotifyError::Transport("smtp down".into()));
        let n = notification();

        assert!(ok.send_alert_triggered(&n).await.is_ok());
        assert!(failing.send_alert_triggered(&n).await.is_err());
        assert_eq!(ok.count(), 1);
        assert_eq!(failing.sent()[0], n);
    }
}

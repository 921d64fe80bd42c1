//! Persistence and reporting of alert trigger records.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use forexalert_common::{start_of_utc_day, Alert, AlertTriggerRecord, CurrencyPair};
use forexalert_store::{RateStore, StoreFactory};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::AlertResult;

/// Largest page the log will return.
pub const MAX_PAGE_SIZE: usize = 200;

const MOST_WATCHED_LIMIT: usize = 5;

/// One page of trigger records, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerLogPage {
    pub records: Vec<AlertTriggerRecord>,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub total_pages: usize,
}

/// Number of active alerts watching a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedPair {
    pub pair: CurrencyPair,
    pub alert_count: usize,
}

/// Trigger activity summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerStatistics {
    /// Triggers since midnight UTC.
    pub triggered_today: usize,
    /// Triggers in the last seven days.
    pub triggered_this_week: usize,
    pub active_alerts: usize,
    /// Pairs with the most active alerts, most watched first.
    pub most_watched_pairs: Vec<WatchedPair>,
}

/// Writes trigger outcomes and serves the trigger log.
pub struct AlertLogger {
    store: Arc<dyn StoreFactory>,
}

impl AlertLogger {
    pub fn new(store: Arc<dyn StoreFactory>) -> Self {
        Self { store }
    }

    /// Persist an alert's trigger bookkeeping and its record as one unit.
    pub async fn record(&self, alert: Alert, record: AlertTriggerRecord) -> AlertResult<()> {
        let alert_id = alert.id;
        let session = self.store.open();

        session.save_alert_trigger(alert, record).await?;
        match session.commit().await {
            Ok(_) => {
                debug!(alert_id = %alert_id, "Trigger recorded");
                Ok(())
            }
            Err(e) => {
                error!(alert_id = %alert_id, error = %e, "Failed to record trigger");
                Err(e.into())
            }
        }
    }

    /// A page of the trigger log. `page` starts at 1; `page_size` is clamped
    /// to 1..=200.
    pub async fn page(&self, page: usize, page_size: usize) -> AlertResult<TriggerLogPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let session = self.store.open();

        let total_count = session.count_trigger_records().await?;
        let records = session
            .get_trigger_records((page - 1).saturating_mul(page_size), page_size)
            .await?;

        Ok(TriggerLogPage {
            records,
            page,
            page_size,
            total_count,
            total_pages: total_count.div_ceil(page_size),
        })
    }

    /// Trigger counts and the most watched pairs as of `now`.
    pub async fn statistics(&self, now: DateTime<Utc>) -> AlertResult<TriggerStatistics> {
        let session = self.store.open();

        let triggered_today = session.count_triggers_since(start_of_utc_day(now)).await?;
        let triggered_this_week = session
            .count_triggers_since(now - Duration::days(7))
            .await?;
        let active = session.get_active_alerts().await?;

        let mut counts: HashMap<CurrencyPair, usize> = HashMap::new();
        for alert in &active {
            *counts.entry(alert.pair).or_default() += 1;
        }
        let mut most_watched_pairs: Vec<WatchedPair> = counts
            .into_iter()
            .map(|(pair, alert_count)| WatchedPair { pair, alert_count })
            .collect();
        most_watched_pairs.sort_by(|a, b| {
            b.alert_count
                .cmp(&a.alert_count)
                .then_with(|| a.pair.cmp(&b.pair))
        });
        most_watched_pairs.truncate(MOST_WATCHED_LIMIT);

        Ok(TriggerStatistics {
            triggered_today,
            triggered_this_week,
            active_alerts: active.len(),
            most_watched_pairs,
        })
    }
}

//! Staged writes that must be committed together.

use forexalert_common::{Alert, AlertTriggerRecord, RateHistoryPoint, RatePoint};
use rust_decimal::Decimal;

use crate::error::{StoreError, StoreResult};

/// Writes staged by a session and applied as one unit on commit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Current-rate upserts, keyed by pair on apply.
    pub rates: Vec<RatePoint>,
    /// History rows to append.
    pub history: Vec<RateHistoryPoint>,
    /// Alert mutations paired with their trigger records.
    pub triggers: Vec<(Alert, AlertTriggerRecord)>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty() && self.history.is_empty() && self.triggers.is_empty()
    }

    /// Take the staged writes, leaving the batch empty.
    pub fn take(&mut self) -> WriteBatch {
        std::mem::take(self)
    }

    /// Check the data invariants every backend enforces before applying.
    pub fn validate(&self) -> StoreResult<()> {
        for point in &self.rates {
            if point.pair.is_identity() {
                return Err(StoreError::Constraint(format!(
                    "rate for identity pair {}",
                    point.pair
                )));
            }
            if point.rate <= Decimal::ZERO {
                return Err(StoreError::Constraint(format!(
                    "non-positive rate {} for {}",
                    point.rate, point.pair
                )));
            }
        }

        for point in &self.history {
            if point.pair.is_identity() || point.rate <= Decimal::ZERO {
                return Err(StoreError::Constraint(format!(
                    "invalid history row {} = {}",
                    point.pair, point.rate
                )));
            }
        }

        for (alert, record) in &self.triggers {
            if record.alert_id != alert.id {
                return Err(StoreError::Constraint(format!(
                    "trigger record {} does not belong to alert {}",
                    record.id, alert.id
                )));
            }
        }

        Ok(())
    }

    /// Summary of what applying this batch writes.
    pub fn summary(&self) -> CommitSummary {
        CommitSummary {
            rates_upserted: self.rates.len(),
            history_appended: self.history.len(),
            triggers_recorded: self.triggers.len(),
        }
    }
}

/// What a commit applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub rates_upserted: usize,
    pub history_appended: usize,
    pub triggers_recorded: usize,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.rates_upserted == 0 && self.history_appended == 0 && self.triggers_recorded == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use forexalert_common::{AlertCondition, Currency, CurrencyPair, OwnerId, SYNTHETIC_SOURCE};
    use rust_decimal_macros::dec;

    fn usd_eur() -> CurrencyPair {
        CurrencyPair::new(Currency::usd(), Currency::eur())
    }

    #[test]
    fn test_valid_batch() {
        let mut batch = WriteBatch::new();
        let point = RatePoint::new(usd_eur(), dec!(0.9), Utc::now(), SYNTHETIC_SOURCE);
        batch.history.push(point.to_history());
        batch.rates.push(point);

        assert!(batch.validate().is_ok());
        assert_eq!(
            batch.summary(),
            CommitSummary {
                rates_upserted: 1,
                history_appended: 1,
                triggers_recorded: 0,
            }
        );
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let mut batch = WriteBatch::new();
        batch
            .rates
            .push(RatePoint::new(usd_eur(), Decimal::ZERO, Utc::now(), SYNTHETIC_SOURCE));

        assert!(matches!(batch.validate(), Err(StoreError::Constraint(_))));
    }

    #[test]
    fn test_rejects_mismatched_trigger() {
        let alert = Alert::new(
            OwnerId::new("u"),
            "u@example.com",
            usd_eur(),
            AlertCondition::LessThan,
            dec!(0.8),
        );
        let other = Alert::new(
            OwnerId::new("v"),
            "v@example.com",
            usd_eur(),
            AlertCondition::LessThan,
            dec!(0.8),
        );
        let record = AlertTriggerRecord::new(&other, dec!(0.7), Utc::now());

        let mut batch = WriteBatch::new();
        batch.triggers.push((alert, record));

        assert!(batch.validate().is_err());
    }

    #[test]
    fn test_take_empties_batch() {
        let mut batch = WriteBatch::new();
        batch
            .rates
            .push(RatePoint::new(usd_eur(), dec!(0.9), Utc::now(), SYNTHETIC_SOURCE));

        let taken = batch.take();
        assert!(batch.is_empty());
        assert_eq!(taken.rates.len(), 1);
    }
}

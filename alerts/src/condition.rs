//! Alert condition matching.

use forexalert_common::{constants, AlertCondition};
use rust_decimal::Decimal;

/// Decides whether a rate satisfies an alert condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionMatcher {
    /// Tolerance for `EqualTo`. Stored rates are derived through division,
    /// so exact equality would almost never hold.
    pub epsilon: Decimal,
}

impl ConditionMatcher {
    pub fn new(epsilon: Decimal) -> Self {
        Self { epsilon }
    }

    pub fn matches(&self, condition: AlertCondition, rate: Decimal, target: Decimal) -> bool {
        match condition {
            AlertCondition::GreaterThan => rate > target,
            AlertCondition::LessThan => rate < target,
            AlertCondition::EqualTo => (rate - target).abs() < self.epsilon,
            AlertCondition::Unknown => false,
        }
    }
}

impl Default for ConditionMatcher {
    fn default() -> Self {
        Self::new(constants::alert_epsilon())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_greater_than() {
        let matcher = ConditionMatcher::default();
        assert!(matcher.matches(AlertCondition::GreaterThan, dec!(1701), dec!(1700)));
        assert!(!matcher.matches(AlertCondition::GreaterThan, dec!(1699), dec!(1700)));
        assert!(!matcher.matches(AlertCondition::GreaterThan, dec!(1700), dec!(1700)));
    }

    #[test]
    fn test_less_than() {
        let matcher = ConditionMatcher::default();
        assert!(matcher.matches(AlertCondition::LessThan, dec!(0.79), dec!(0.8)));
        assert!(!matcher.matches(AlertCondition::LessThan, dec!(0.8), dec!(0.8)));
    }

    #[test]
    fn test_equal_to_uses_tolerance() {
        let matcher = ConditionMatcher::default();
        assert!(matcher.matches(AlertCondition::EqualTo, dec!(110.0009), dec!(110.0005)));
        assert!(!matcher.matches(AlertCondition::EqualTo, dec!(110.003), dec!(110.0005)));
        // The bound itself is exclusive.
        assert!(!matcher.matches(AlertCondition::EqualTo, dec!(110.001), dec!(110.000)));
    }

    #[test]
    fn test_unknown_never_matches() {
        let matcher = ConditionMatcher::default();
        assert!(!matcher.matches(AlertCondition::Unknown, dec!(1), dec!(1)));
    }
}

//! Triangulation of the full cross-rate matrix from USD reference rates.

use std::collections::HashMap;

use forexalert_common::{Currency, CurrencyPair, CurrencySet, RATE_DECIMAL_PLACES};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::error::{FxError, FxResult};

/// Every derivable ordered pair of one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossRateMatrix {
    /// Derived rates in supported-set order.
    pub rates: Vec<(CurrencyPair, Decimal)>,
    /// Pairs that could not be derived from the fetched data.
    pub skipped: Vec<CurrencyPair>,
}

impl CrossRateMatrix {
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rate for one pair, if derived.
    pub fn get(&self, pair: &CurrencyPair) -> Option<Decimal> {
        self.rates
            .iter()
            .find(|(candidate, _)| candidate == pair)
            .map(|(_, rate)| *rate)
    }
}

/// Derives `rate(A→B) = usd[B] / usd[A]` for every supported pair.
///
/// Results keep six fractional digits, rounded half-to-even.
#[derive(Debug, Clone)]
pub struct CrossRateCalculator {
    currencies: CurrencySet,
}

impl CrossRateCalculator {
    pub fn new(currencies: CurrencySet) -> Self {
        Self { currencies }
    }

    pub fn currencies(&self) -> &CurrencySet {
        &self.currencies
    }

    /// Cross rate for one ordered pair.
    pub fn cross_rate(
        &self,
        usd_rates: &HashMap<Currency, Decimal>,
        base: Currency,
        target: Currency,
    ) -> FxResult<Decimal> {
        let pair = CurrencyPair::new(base, target);
        let incomplete = || FxError::IncompleteData(pair);

        let usd_base = usd_rates.get(&base).copied().ok_or_else(incomplete)?;
        let usd_target = usd_rates.get(&target).copied().ok_or_else(incomplete)?;

        if usd_base <= Decimal::ZERO || usd_target.is_sign_negative() {
            return Err(incomplete());
        }

        let rate = usd_target
            .checked_div(usd_base)
            .ok_or_else(incomplete)?
            .round_dp_with_strategy(RATE_DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven);

        if rate <= Decimal::ZERO {
            return Err(incomplete());
        }

        Ok(rate)
    }

    /// Derive the full matrix. Pairs with incomplete data are skipped, never fatal.
    pub fn calculate(&self, usd_rates: &HashMap<Currency, Decimal>) -> CrossRateMatrix {
        let mut matrix = CrossRateMatrix::default();

        for pair in self.currencies.ordered_pairs() {
            match self.cross_rate(usd_rates, pair.base, pair.quote) {
                Ok(rate) => matrix.rates.push((pair, rate)),
                Err(e) => {
                    debug!(pair = %pair, error = %e, "Skipping pair");
                    matrix.skipped.push(pair);
                }
            }
        }

        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn calculator(codes: &str) -> CrossRateCalculator {
        CrossRateCalculator::new(CurrencySet::parse_list(codes).unwrap())
    }

    fn usd_rates(entries: &[(Currency, Decimal)]) -> HashMap<Currency, Decimal> {
        entries.iter().copied().collect()
    }

    fn pair(base: Currency, quote: Currency) -> CurrencyPair {
        CurrencyPair::new(base, quote)
    }

    #[test]
    fn test_usd_eur_gbp_matrix() {
        let calc = calculator("USD,EUR,GBP");
        let rates = usd_rates(&[
            (Currency::usd(), dec!(1)),
            (Currency::eur(), dec!(0.9)),
            (Currency::gbp(), dec!(0.8)),
        ]);

        let matrix = calc.calculate(&rates);
        let (usd, eur, gbp) = (Currency::usd(), Currency::eur(), Currency::gbp());

        assert_eq!(matrix.len(), 6);
        assert!(matrix.skipped.is_empty());
        assert_eq!(matrix.get(&pair(usd, eur)), Some(dec!(0.9)));
        assert_eq!(matrix.get(&pair(usd, gbp)), Some(dec!(0.8)));
        assert_eq!(matrix.get(&pair(eur, usd)), Some(dec!(1.111111)));
        assert_eq!(matrix.get(&pair(eur, gbp)), Some(dec!(0.888889)));
        assert_eq!(matrix.get(&pair(gbp, usd)), Some(dec!(1.25)));
        assert_eq!(matrix.get(&pair(gbp, eur)), Some(dec!(1.125)));
    }

    #[test]
    fn test_matrix_order_follows_currency_set() {
        let calc = calculator("USD,EUR,GBP");
        let rates = usd_rates(&[
            (Currency::usd(), dec!(1)),
            (Currency::eur(), dec!(0.9)),
            (Currency::gbp(), dec!(0.8)),
        ]);

        let pairs: Vec<String> = calc
            .calculate(&rates)
            .rates
            .iter()
            .map(|(pair, _)| pair.to_string())
            .collect();

        assert_eq!(
            pairs,
            vec!["USD/EUR", "USD/GBP", "EUR/USD", "EUR/GBP", "GBP/USD", "GBP/EUR"]
        );
    }

    #[test]
    fn test_rounds_half_to_even() {
        let calc = calculator("USD,EUR,GBP");
        let rates = usd_rates(&[
            (Currency::usd(), dec!(1)),
            (Currency::eur(), dec!(1.0000025)),
            (Currency::gbp(), dec!(1.0000035)),
        ]);

        assert_eq!(
            calc.cross_rate(&rates, Currency::usd(), Currency::eur()).unwrap(),
            dec!(1.000002)
        );
        assert_eq!(
            calc.cross_rate(&rates, Currency::usd(), Currency::gbp()).unwrap(),
            dec!(1.000004)
        );
    }

    #[test]
    fn test_missing_currency_skips_only_its_pairs() {
        let calc = calculator("USD,EUR,GBP,MWK");
        let rates = usd_rates(&[
            (Currency::usd(), dec!(1)),
            (Currency::eur(), dec!(0.9)),
            (Currency::gbp(), dec!(0.8)),
        ]);

        let matrix = calc.calculate(&rates);

        assert_eq!(matrix.len(), 6);
        assert_eq!(matrix.skipped.len(), 6);
        assert!(matrix
            .skipped
            .iter()
            .all(|p| p.base == Currency::mwk() || p.quote == Currency::mwk()));
    }

    #[test]
    fn test_zero_base_rate_is_incomplete() {
        let calc = calculator("USD,EUR");
        let rates = usd_rates(&[(Currency::usd(), dec!(1)), (Currency::eur(), dec!(0))]);

        let result = calc.cross_rate(&rates, Currency::eur(), Currency::usd());
        assert!(matches!(result, Err(FxError::IncompleteData(p)) if p == pair(Currency::eur(), Currency::usd())));

        // A zero target rate divides fine but is not a usable rate.
        assert!(calc.cross_rate(&rates, Currency::usd(), Currency::eur()).is_err());
    }

    #[test]
    fn test_negative_rate_is_incomplete() {
        let calc = calculator("USD,EUR");
        let rates = usd_rates(&[(Currency::usd(), dec!(1)), (Currency::eur(), dec!(-0.9))]);

        let matrix = calc.calculate(&rates);
        assert!(matrix.is_empty());
        assert_eq!(matrix.skipped.len(), 2);
    }

    #[test]
    fn test_rate_rounding_to_zero_is_incomplete() {
        let calc = calculator("USD,JPY");
        let rates = usd_rates(&[
            (Currency::usd(), dec!(1)),
            (Currency::jpy(), dec!(10000000)),
        ]);

        assert!(calc.cross_rate(&rates, Currency::jpy(), Currency::usd()).is_err());
        assert_eq!(
            calc.cross_rate(&rates, Currency::usd(), Currency::jpy()).unwrap(),
            dec!(10000000)
        );
    }

    fn currency_rates() -> impl Strategy<Value = Vec<i64>> {
        // USD rates between 0.10 and 2000.00 for the seven non-USD currencies.
        prop::collection::vec(10i64..200_000, 7)
    }

    proptest! {
        #[test]
        fn prop_full_matrix_positive(raw in currency_rates()) {
            let set = CurrencySet::default();
            let calc = CrossRateCalculator::new(set.clone());
            let mut rates = HashMap::new();
            let others: Vec<Currency> = set.iter().copied().filter(|c| *c != Currency::usd()).collect();
            rates.insert(Currency::usd(), Decimal::ONE);
            for (currency, value) in others.iter().zip(raw.iter()) {
                rates.insert(*currency, Decimal::new(*value, 2));
            }

            let matrix = calc.calculate(&rates);
            let n = set.len();

            prop_assert_eq!(matrix.len(), n * (n - 1));
            prop_assert!(matrix.skipped.is_empty());
            prop_assert!(matrix.rates.iter().all(|(_, rate)| *rate > Decimal::ZERO));
        }

        #[test]
        fn prop_inverse_rates_multiply_to_one(a in 10i64..200_000, b in 10i64..200_000) {
            let calc = calculator("USD,EUR,GBP");
            let rates = usd_rates(&[
                (Currency::usd(), Decimal::ONE),
                (Currency::eur(), Decimal::new(a, 2)),
                (Currency::gbp(), Decimal::new(b, 2)),
            ]);

            let forward = calc.cross_rate(&rates, Currency::eur(), Currency::gbp()).unwrap();
            let backward = calc.cross_rate(&rates, Currency::gbp(), Currency::eur()).unwrap();

            // Each side carries at most half a unit in the sixth place.
            let tolerance = Decimal::new(6, 7) * (forward + backward) + Decimal::new(1, 10);
            prop_assert!((forward * backward - Decimal::ONE).abs() <= tolerance);
        }
    }
}

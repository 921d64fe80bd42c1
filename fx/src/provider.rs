//! Market data clients.
//!
//! Every client returns raw rates quoted against a single base currency
//! (USD in practice). Cross rates are derived later by
//! [`CrossRateCalculator`](crate::CrossRateCalculator).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use forexalert_common::{Currency, CurrencySet, RATE_DECIMAL_PLACES};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{FxError, FxResult};

/// Default FxRatesAPI endpoint.
pub const FXRATES_BASE_URL: &str = "https://api.fxratesapi.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of raw reference rates.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Client name used in logs.
    fn name(&self) -> &str;

    /// Fetch the rate of every currency in `currencies` against `base`.
    ///
    /// The map always contains `base` itself at 1. Currencies the provider
    /// does not quote are simply absent.
    async fn fetch_rates(
        &self,
        base: Currency,
        currencies: &CurrencySet,
    ) -> FxResult<HashMap<Currency, Decimal>>;
}

/// `GET /latest` response body.
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    success: bool,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    base: Option<String>,
    rates: HashMap<String, Decimal>,
}

/// HTTP client for FxRatesAPI.
pub struct FxRatesApiClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl FxRatesApiClient {
    /// Create a client for the given endpoint and API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FxError::Fetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Decode a `/latest` payload, keeping only the requested currencies.
    fn parse_latest(
        body: &[u8],
        base: Currency,
        currencies: &CurrencySet,
    ) -> FxResult<HashMap<Currency, Decimal>> {
        let payload: LatestRatesResponse = serde_json::from_slice(body)
            .map_err(|e| FxError::MalformedPayload(e.to_string()))?;

        if !payload.success {
            return Err(FxError::MalformedPayload(
                "provider reported success = false".to_string(),
            ));
        }

        if let Some(reported) = payload.base.as_deref() {
            if !reported.eq_ignore_ascii_case(base.code()) {
                return Err(FxError::MalformedPayload(format!(
                    "expected base {}, got {}",
                    base, reported
                )));
            }
        }

        let mut rates: HashMap<Currency, Decimal> = payload
            .rates
            .into_iter()
            .filter_map(|(code, rate)| {
                Currency::parse(&code)
                    .ok()
                    .filter(|currency| currencies.contains(currency))
                    .map(|currency| (currency, rate))
            })
            .collect();

        if !rates.keys().any(|currency| *currency != base) {
            return Err(FxError::MalformedPayload(format!(
                "no rates quoted for {}",
                currencies.to_code_list()
            )));
        }
        rates.entry(base).or_insert(Decimal::ONE);

        debug!(
            base = %base,
            quoted = rates.len(),
            provider_timestamp = ?payload.timestamp,
            "Decoded latest rates"
        );

        Ok(rates)
    }
}

#[async_trait]
impl MarketDataClient for FxRatesApiClient {
    fn name(&self) -> &str {
        "fxratesapi"
    }

    #[instrument(skip(self, currencies), fields(base = %base))]
    async fn fetch_rates(
        &self,
        base: Currency,
        currencies: &CurrencySet,
    ) -> FxResult<HashMap<Currency, Decimal>> {
        let symbols = currencies
            .iter()
            .filter(|currency| **currency != base)
            .map(Currency::code)
            .collect::<Vec<_>>()
            .join(",");
        let places = RATE_DECIMAL_PLACES.to_string();

        let response = self
            .client
            .get(format!("{}/latest", self.base_url))
            .query(&[
                ("base", base.code()),
                ("currencies", symbols.as_str()),
                ("resolution", "1h"),
                ("places", places.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FxError::Fetch(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FxError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FxError::Fetch(format!("Failed to read response body: {}", e)))?;

        Self::parse_latest(&body, base, currencies)
    }
}

/// Starting points for the simulated market, in units per USD.
fn reference_usd_rate(currency: &Currency) -> Decimal {
    match currency.code() {
        "USD" => Decimal::ONE,
        "EUR" => Decimal::new(92, 2),
        "GBP" => Decimal::new(79, 2),
        "MWK" => Decimal::new(1735, 0),
        "ZAR" => Decimal::new(185, 1),
        "JPY" => Decimal::new(1495, 1),
        "CAD" => Decimal::new(136, 2),
        "AUD" => Decimal::new(152, 2),
        _ => Decimal::ONE,
    }
}

struct SimulatedMarket {
    rng: StdRng,
    usd_rates: HashMap<Currency, Decimal>,
}

/// Seeded random-walk market for demo runs without an API key.
///
/// Each fetch moves every rate by up to `volatility_bps` basis points.
pub struct SimulatedMarketDataClient {
    market: Mutex<SimulatedMarket>,
    volatility_bps: u32,
}

impl SimulatedMarketDataClient {
    /// Create a simulated market. The same seed replays the same walk.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            market: Mutex::new(SimulatedMarket {
                rng,
                usd_rates: HashMap::new(),
            }),
            volatility_bps: 20,
        }
    }

    /// Set the maximum move per fetch.
    pub fn with_volatility_bps(mut self, bps: u32) -> Self {
        self.volatility_bps = bps;
        self
    }
}

#[async_trait]
impl MarketDataClient for SimulatedMarketDataClient {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn fetch_rates(
        &self,
        base: Currency,
        currencies: &CurrencySet,
    ) -> FxResult<HashMap<Currency, Decimal>> {
        let bps = i64::from(self.volatility_bps);
        let mut market = self.market.lock();
        let SimulatedMarket { rng, usd_rates } = &mut *market;

        for currency in currencies.iter().filter(|c| **c != Currency::usd()) {
            let step = Decimal::new(rng.gen_range(-bps..=bps), 4);
            let rate = usd_rates
                .entry(*currency)
                .or_insert_with(|| reference_usd_rate(currency));
            let moved = (*rate * (Decimal::ONE + step)).round_dp(RATE_DECIMAL_PLACES);
            if moved > Decimal::ZERO {
                *rate = moved;
            }
        }
        usd_rates.insert(Currency::usd(), Decimal::ONE);

        let base_rate = usd_rates
            .get(&base)
            .copied()
            .ok_or_else(|| FxError::Fetch(format!("simulated market does not quote {}", base)))?;

        currencies
            .iter()
            .filter_map(|currency| usd_rates.get(currency).map(|rate| (*currency, *rate)))
            .map(|(currency, rate)| {
                rate.checked_div(base_rate)
                    .map(|rebased| (currency, rebased.round_dp(RATE_DECIMAL_PLACES)))
                    .ok_or_else(|| FxError::Fetch(format!("cannot rebase on {}", base)))
            })
            .collect()
    }
}

/// Scripted client for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct StaticMarketDataClient {
    rates: Mutex<HashMap<Currency, Decimal>>,
    failures: Mutex<std::collections::VecDeque<FxError>>,
    fetches: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticMarketDataClient {
    /// Create a client that always answers with `rates`.
    pub fn new(rates: impl IntoIterator<Item = (Currency, Decimal)>) -> Self {
        Self {
            rates: Mutex::new(rates.into_iter().collect()),
            failures: Mutex::new(std::collections::VecDeque::new()),
            fetches: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set or replace one quoted rate.
    pub fn set_rate(&self, currency: Currency, rate: Decimal) {
        self.rates.lock().insert(currency, rate);
    }

    /// Stop quoting a currency.
    pub fn remove_rate(&self, currency: &Currency) {
        self.rates.lock().remove(currency);
    }

    /// Make the next fetch fail with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: FxError) {
        self.failures.lock().push_back(error);
    }

    /// Number of fetches attempted so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl MarketDataClient for StaticMarketDataClient {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_rates(
        &self,
        base: Currency,
        currencies: &CurrencySet,
    ) -> FxResult<HashMap<Currency, Decimal>> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        let mut rates: HashMap<Currency, Decimal> = self
            .rates
            .lock()
            .iter()
            .filter(|(currency, _)| currencies.contains(currency))
            .map(|(currency, rate)| (*currency, *rate))
            .collect();
        rates.entry(base).or_insert(Decimal::ONE);
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn currencies() -> CurrencySet {
        CurrencySet::parse_list("USD,EUR,GBP,MWK").unwrap()
    }

    #[test]
    fn test_parse_latest_filters_and_fills_base() {
        let body = br#"{
            "success": true,
            "timestamp": 1724155200,
            "base": "USD",
            "rates": { "EUR": 0.9, "GBP": 0.8, "XAU": 0.0004, "bad": 1 }
        }"#;

        let rates = FxRatesApiClient::parse_latest(body, Currency::usd(), &currencies()).unwrap();

        assert_eq!(rates.len(), 3);
        assert_eq!(rates[&Currency::usd()], Decimal::ONE);
        assert_eq!(rates[&Currency::eur()], dec!(0.9));
        assert_eq!(rates[&Currency::gbp()], dec!(0.8));
        assert!(!rates.contains_key(&Currency::mwk()));
    }

    #[test]
    fn test_parse_latest_rejects_unsuccessful_payload() {
        let body = br#"{ "success": false, "rates": {} }"#;
        let result = FxRatesApiClient::parse_latest(body, Currency::usd(), &currencies());

        assert!(matches!(result, Err(FxError::MalformedPayload(_))));
    }

    #[test]
    fn test_parse_latest_rejects_garbage() {
        let result = FxRatesApiClient::parse_latest(b"<html>", Currency::usd(), &currencies());
        let error = result.unwrap_err();

        assert!(matches!(error, FxError::MalformedPayload(_)));
        assert!(error.is_transient());
    }

    #[test]
    fn test_parse_latest_rejects_missing_or_empty_rates() {
        for body in [
            &br#"{ "success": true }"#[..],
            &br#"{ "success": true, "base": "USD", "rates": {} }"#[..],
            &br#"{ "success": true, "rates": { "USD": 1, "XAU": 0.0004 } }"#[..],
        ] {
            let result = FxRatesApiClient::parse_latest(body, Currency::usd(), &currencies());
            assert!(matches!(result, Err(FxError::MalformedPayload(_))));
        }
    }

    #[test]
    fn test_parse_latest_rejects_wrong_base() {
        let body = br#"{ "success": true, "base": "EUR", "rates": { "USD": 1.08 } }"#;
        let result = FxRatesApiClient::parse_latest(body, Currency::usd(), &currencies());

        assert!(matches!(result, Err(FxError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_simulated_market_is_reproducible() {
        let first = SimulatedMarketDataClient::new(Some(7));
        let second = SimulatedMarketDataClient::new(Some(7));

        for _ in 0..3 {
            let a = first.fetch_rates(Currency::usd(), &currencies()).await.unwrap();
            let b = second.fetch_rates(Currency::usd(), &currencies()).await.unwrap();
            assert_eq!(a, b);
            assert_eq!(a[&Currency::usd()], Decimal::ONE);
            assert!(a.values().all(|rate| *rate > Decimal::ZERO));
        }
    }

    #[tokio::test]
    async fn test_simulated_market_stays_near_reference() {
        let client = SimulatedMarketDataClient::new(Some(42)).with_volatility_bps(10);
        let rates = client.fetch_rates(Currency::usd(), &currencies()).await.unwrap();

        // One step of at most 10 bps from 1735.
        let mwk = rates[&Currency::mwk()];
        assert!(mwk > dec!(1733) && mwk < dec!(1737));
    }

    #[tokio::test]
    async fn test_static_client_scripted_failure() {
        let client = StaticMarketDataClient::new([(Currency::eur(), dec!(0.9))]);
        client.fail_next(FxError::UpstreamStatus { status: 503 });

        assert!(client.fetch_rates(Currency::usd(), &currencies()).await.is_err());
        let rates = client.fetch_rates(Currency::usd(), &currencies()).await.unwrap();

        assert_eq!(rates[&Currency::eur()], dec!(0.9));
        assert_eq!(rates[&Currency::usd()], Decimal::ONE);
        assert_eq!(client.fetch_count(), 2);
    }
}

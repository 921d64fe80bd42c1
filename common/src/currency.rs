//! Currency codes, currency pairs and the configured supported set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CurrencyError;

/// ISO 4217 style currency code: exactly three uppercase ASCII letters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Parse a currency code, normalizing to uppercase.
    pub fn parse(code: &str) -> Result<Self, CurrencyError> {
        let trimmed = code.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(CurrencyError::InvalidCode(code.to_string()));
        }

        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        // Only ever constructed from ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// The reference currency every upstream quote is expressed in.
    pub fn usd() -> Self {
        Self(*b"USD")
    }

    pub fn eur() -> Self {
        Self(*b"EUR")
    }

    pub fn gbp() -> Self {
        Self(*b"GBP")
    }

    pub fn jpy() -> Self {
        Self(*b"JPY")
    }

    pub fn mwk() -> Self {
        Self(*b"MWK")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

/// An ordered currency pair: one unit of `base` buys `rate` units of `quote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency.
    pub base: Currency,
    /// Quote (target) currency.
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Parse a pair written as `BASE/QUOTE` or `BASE-QUOTE`.
    pub fn parse(s: &str) -> Result<Self, CurrencyError> {
        let (base, quote) = s
            .split_once(['/', '-'])
            .ok_or_else(|| CurrencyError::InvalidPair(s.to_string()))?;
        Ok(Self::new(Currency::parse(base)?, Currency::parse(quote)?))
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote,
            quote: self.base,
        }
    }

    /// A pair quoting a currency against itself carries no information.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// The fixed, configured set of currencies the service works with.
///
/// Iteration order is the order currencies were first configured in, which
/// keeps the derived rate matrix deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySet(Vec<Currency>);

impl CurrencySet {
    /// Build a set, dropping duplicates.
    pub fn new(currencies: impl IntoIterator<Item = Currency>) -> Self {
        let mut unique: Vec<Currency> = Vec::new();
        for currency in currencies {
            if !unique.contains(&currency) {
                unique.push(currency);
            }
        }
        Self(unique)
    }

    /// Parse a comma separated list such as `USD,EUR,GBP`.
    pub fn parse_list(list: &str) -> Result<Self, CurrencyError> {
        let currencies = list
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(Currency::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(currencies))
    }

    /// Check whether a currency is supported.
    pub fn contains(&self, currency: &Currency) -> bool {
        self.0.contains(currency)
    }

    /// Parse a code and require it to be in the set.
    pub fn require(&self, code: &str) -> Result<Currency, CurrencyError> {
        let currency = Currency::parse(code)?;
        if self.contains(&currency) {
            Ok(currency)
        } else {
            Err(CurrencyError::Unsupported(currency))
        }
    }

    /// Check that both sides of a pair are supported.
    pub fn supports_pair(&self, pair: &CurrencyPair) -> bool {
        self.contains(&pair.base) && self.contains(&pair.quote)
    }

    /// Every ordered pair (A, B) with A != B.
    pub fn ordered_pairs(&self) -> impl Iterator<Item = CurrencyPair> + '_ {
        self.0.iter().flat_map(move |base| {
            self.0
                .iter()
                .filter(move |quote| *quote != base)
                .map(move |quote| CurrencyPair::new(*base, *quote))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma separated codes, as sent to upstream market data APIs.
    pub fn to_code_list(&self) -> String {
        self.0
            .iter()
            .map(Currency::code)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for CurrencySet {
    /// The currencies the service has historically been deployed with.
    fn default() -> Self {
        Self::parse_list("USD,EUR,GBP,MWK,ZAR,JPY,CAD,AUD").unwrap_or_else(|_| Self(Vec::new()))
    }
}

impl FromIterator<Currency> for CurrencySet {
    fn from_iter<T: IntoIterator<Item = Currency>>(iter: T) -> Self {
        Self::new(iter)
    }
}

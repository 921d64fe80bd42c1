//! Read-side rate analytics: 24h statistics, top movers and OHLC candles.
//!
//! Everything here is a pure function over rows already read from the store.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use forexalert_common::{CurrencyPair, RateHistoryPoint, RatePoint};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

const PERCENT_DECIMAL_PLACES: u32 = 4;
const MAX_TOP_MOVERS: usize = 20;
pub const MAX_CANDLES: usize = 1000;

/// Percentage move from `from` to `to`; zero when `from` is zero.
fn percent_change(from: Decimal, to: Decimal) -> Decimal {
    if from.is_zero() {
        return Decimal::ZERO;
    }
    ((to - from) / from * Decimal::ONE_HUNDRED).round_dp(PERCENT_DECIMAL_PLACES)
}

/// Group history rows by pair, keeping insertion order within each pair.
fn group_by_pair<'a>(
    history: impl IntoIterator<Item = &'a RateHistoryPoint>,
) -> HashMap<CurrencyPair, Vec<&'a RateHistoryPoint>> {
    let mut groups: HashMap<CurrencyPair, Vec<&RateHistoryPoint>> = HashMap::new();
    for row in history {
        groups.entry(row.pair).or_default().push(row);
    }
    groups
}

/// A current rate with its trailing 24 hour statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRate {
    pub pair: CurrencyPair,
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub open_24h: Decimal,
    /// Percent change from the 24h open to the current rate.
    pub change_24h: Decimal,
}

/// Attach 24 hour high, low, open and change to every current rate.
///
/// A pair with no history inside the window reports its current rate for
/// all three statistics and a change of zero. When several rows share the
/// earliest timestamp, the first inserted is the open.
pub fn enriched_rates(
    current: &[RatePoint],
    history: &[RateHistoryPoint],
    now: DateTime<Utc>,
) -> Vec<EnrichedRate> {
    let window_start = now - Duration::hours(24);
    let groups = group_by_pair(history.iter().filter(|row| row.created_at >= window_start));

    let mut enriched: Vec<EnrichedRate> = current
        .iter()
        .map(|point| {
            let rows = groups.get(&point.pair).map(Vec::as_slice).unwrap_or(&[]);

            let open = rows
                .iter()
                .min_by_key(|row| row.created_at)
                .map(|row| row.rate)
                .unwrap_or(point.rate);
            let (high, low) = rows.iter().fold((point.rate, point.rate), |(high, low), row| {
                (high.max(row.rate), low.min(row.rate))
            });

            EnrichedRate {
                pair: point.pair,
                rate: point.rate,
                timestamp: point.timestamp,
                source: point.source.clone(),
                high_24h: high,
                low_24h: low,
                open_24h: open,
                change_24h: percent_change(open, point.rate),
            }
        })
        .collect();

    enriched.sort_by(|a, b| a.pair.cmp(&b.pair));
    enriched
}

/// Lookback window for top movers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl Timeframe {
    pub fn lookback(&self) -> Duration {
        match self {
            Timeframe::Day => Duration::hours(24),
            Timeframe::Week => Duration::days(7),
            Timeframe::Month => Duration::days(30),
        }
    }
}

impl FromStr for Timeframe {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "24h" => Ok(Timeframe::Day),
            "7d" => Ok(Timeframe::Week),
            "30d" => Ok(Timeframe::Month),
            other => Err(FxError::InvalidParameter(format!(
                "timeframe {} (expected 24h, 7d or 30d)",
                other
            ))),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Timeframe::Day => "24h",
            Timeframe::Week => "7d",
            Timeframe::Month => "30d",
        })
    }
}

/// Direction of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Unchanged,
}

/// A pair ranked by how far it moved inside a timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopMover {
    pub pair: CurrencyPair,
    pub latest_rate: Decimal,
    pub oldest_rate: Decimal,
    pub change_percent: Decimal,
    pub direction: Direction,
    pub data_points: usize,
}

/// Pairs with the largest absolute percentage move over `timeframe`.
///
/// Pairs need at least two rows inside the window. `limit` is clamped to
/// 1..=20.
pub fn top_movers(
    history: &[RateHistoryPoint],
    timeframe: Timeframe,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<TopMover> {
    let since = now - timeframe.lookback();
    let groups = group_by_pair(history.iter().filter(|row| row.created_at >= since));

    let mut movers: Vec<TopMover> = groups
        .into_iter()
        .filter(|(_, rows)| rows.len() >= 2)
        .filter_map(|(pair, rows)| {
            let oldest = rows.iter().min_by_key(|row| row.created_at)?;
            let latest = rows.iter().max_by_key(|row| row.created_at)?;

            let direction = match latest.rate.cmp(&oldest.rate) {
                std::cmp::Ordering::Greater => Direction::Up,
                std::cmp::Ordering::Less => Direction::Down,
                std::cmp::Ordering::Equal => Direction::Unchanged,
            };

            Some(TopMover {
                pair,
                latest_rate: latest.rate,
                oldest_rate: oldest.rate,
                change_percent: percent_change(oldest.rate, latest.rate),
                direction,
                data_points: rows.len(),
            })
        })
        .collect();

    movers.sort_by(|a, b| {
        b.change_percent
            .abs()
            .cmp(&a.change_percent.abs())
            .then_with(|| a.pair.cmp(&b.pair))
    });
    movers.truncate(limit.clamp(1, MAX_TOP_MOVERS));
    movers
}

/// Candle width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1D")]
    OneDay,
}

impl CandleInterval {
    pub fn seconds(&self) -> i64 {
        match self {
            CandleInterval::OneMinute => 60,
            CandleInterval::FiveMinutes => 300,
            CandleInterval::FifteenMinutes => 900,
            CandleInterval::OneHour => 3_600,
            CandleInterval::OneDay => 86_400,
        }
    }

    /// Start of the bucket containing `at`, aligned on the UTC epoch.
    fn bucket_start(&self, at: DateTime<Utc>) -> i64 {
        let width = self.seconds();
        at.timestamp().div_euclid(width) * width
    }
}

impl FromStr for CandleInterval {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(CandleInterval::OneMinute),
            "5m" => Ok(CandleInterval::FiveMinutes),
            "15m" => Ok(CandleInterval::FifteenMinutes),
            "1h" => Ok(CandleInterval::OneHour),
            "1D" | "1d" => Ok(CandleInterval::OneDay),
            other => Err(FxError::InvalidParameter(format!(
                "interval {} (expected 1m, 5m, 15m, 1h or 1D)",
                other
            ))),
        }
    }
}

fn check_candle_limit(limit: usize) -> FxResult<()> {
    if !(1..=MAX_CANDLES).contains(&limit) {
        return Err(FxError::InvalidParameter(format!(
            "limit {} (expected 1..={})",
            limit, MAX_CANDLES
        )));
    }
    Ok(())
}

/// How far back `limit` candles of `interval` reach. Rejects limits outside
/// 1..=1000.
pub fn candle_lookback(interval: CandleInterval, limit: usize) -> FxResult<Duration> {
    check_candle_limit(limit)?;
    Ok(Duration::seconds(interval.seconds() * limit as i64))
}

/// One OHLC bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start.
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Bucket the history of `pair` into OHLC candles.
///
/// Returns the newest `limit` candles, oldest first. `limit` must be within
/// 1..=1000.
pub fn ohlc_candles(
    pair: &CurrencyPair,
    history: &[RateHistoryPoint],
    interval: CandleInterval,
    limit: usize,
) -> FxResult<Vec<Candle>> {
    check_candle_limit(limit)?;

    let mut rows: Vec<&RateHistoryPoint> =
        history.iter().filter(|row| row.pair == *pair).collect();
    // Stable, so rows with equal timestamps keep insertion order.
    rows.sort_by_key(|row| row.created_at);

    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
    for row in rows {
        let start = interval.bucket_start(row.created_at);
        let Some(time) = Utc.timestamp_opt(start, 0).single() else {
            continue;
        };

        buckets
            .entry(start)
            .and_modify(|candle| {
                candle.high = candle.high.max(row.rate);
                candle.low = candle.low.min(row.rate);
                candle.close = row.rate;
            })
            .or_insert(Candle {
                time,
                open: row.rate,
                high: row.rate,
                low: row.rate,
                close: row.rate,
            });
    }

    let skip = buckets.len().saturating_sub(limit);
    Ok(buckets.into_values().skip(skip).collect())
}

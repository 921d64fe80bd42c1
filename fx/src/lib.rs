//! ForexAlert FX Engine
//!
//! Periodic rate synchronization: fetch USD reference rates, derive the full
//! cross-rate matrix, and persist what changed.
//!
//! # Features
//!
//! - Pluggable market data clients (FxRatesAPI over HTTP, seeded simulation)
//! - Cross-rate triangulation with half-to-even rounding to six places
//! - Change detection with heartbeat refreshes for unchanged pairs
//! - Atomic per-tick commits through a store session
//! - 24h statistics, top movers and OHLC candles over rate history
//!
//! # Example
//!
//! ```rust,ignore
//! use forexalert_fx::{FxRatesApiClient, RateSyncEngine, SyncConfig};
//! use forexalert_store::InMemoryRateStore;
//!
//! let client = Arc::new(FxRatesApiClient::new(FXRATES_BASE_URL, api_key)?);
//! let store = Arc::new(InMemoryRateStore::new());
//! let engine = RateSyncEngine::new(client, store, SyncConfig::default());
//!
//! let report = engine.sync_now().await?;
//! ```

pub mod engine;
pub mod provider;
pub mod cross_rate;
pub mod analytics;
pub mod error;

pub use engine::{RateSyncEngine, SyncConfig, SyncReport};
pub use provider::{FxRatesApiClient, MarketDataClient, SimulatedMarketDataClient, FXRATES_BASE_URL};
#[cfg(any(test, feature = "test-utils"))]
pub use provider::StaticMarketDataClient;
pub use cross_rate::{CrossRateCalculator, CrossRateMatrix};
pub use analytics::{
    candle_lookback, enriched_rates, ohlc_candles, top_movers, Candle, CandleInterval, Direction, EnrichedRate,
    Timeframe, TopMover, MAX_CANDLES,
};
pub use error::{FxError, FxResult};

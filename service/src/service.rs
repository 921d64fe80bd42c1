//! Service assembly and lifecycle.

use std::sync::Arc;

use chrono::{Duration, Utc};
use forexalert_alerts::{
    AlertEvaluator, AlertLogger, EvaluationReport, Notifier, TracingNotifier, TriggerLogPage,
    TriggerStatistics, WebhookNotifier,
};
use forexalert_common::CurrencyPair;
use forexalert_fx::{
    candle_lookback, enriched_rates, ohlc_candles, top_movers, Candle, CandleInterval, EnrichedRate,
    FxRatesApiClient, MarketDataClient, RateSyncEngine, SimulatedMarketDataClient, SyncReport,
    Timeframe, TopMover,
};
use forexalert_store::{InMemoryRateStore, RateStore, StoreFactory, StoreSnapshot};
use parking_lot::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::{ServiceMetrics, SharedMetrics};
use crate::runner::{EngineHandle, EngineRunner};
use crate::state::ServiceState;
use crate::tasks::{EvaluationTask, SyncTask};

/// The assembled rate sync and alert evaluation service.
pub struct ForexAlertService {
    config: ServiceConfig,
    store: InMemoryRateStore,
    sync_engine: Arc<RateSyncEngine>,
    evaluator: Arc<AlertEvaluator>,
    logger: AlertLogger,
    metrics: SharedMetrics,
    state: RwLock<ServiceState>,
    handles: Mutex<Vec<EngineHandle>>,
}

impl ForexAlertService {
    /// Build the service from configuration.
    ///
    /// Loads the state file when one is configured and exists, and picks the
    /// market data client and notifier the configuration asks for.
    pub fn new(config: ServiceConfig) -> ServiceResult<Self> {
        config.validate()?;

        let store = match &config.state_file {
            Some(path) if path.exists() => {
                let snapshot = StoreSnapshot::load_from_file(path)?;
                info!(
                    path = %path.display(),
                    rates = snapshot.current.len(),
                    alerts = snapshot.alerts.len(),
                    "Loaded state file"
                );
                InMemoryRateStore::from_snapshot(snapshot)
            }
            _ => InMemoryRateStore::new(),
        };

        let client: Arc<dyn MarketDataClient> = if config.market.simulated {
            Arc::new(SimulatedMarketDataClient::new(config.market.seed))
        } else {
            Arc::new(FxRatesApiClient::new(
                config.market.base_url.clone(),
                config.market.api_key.clone(),
            )?)
        };

        let notifier: Arc<dyn Notifier> = match &config.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.notification_timeout)?),
            None => Arc::new(TracingNotifier),
        };

        Ok(Self::with_components(config, store, client, notifier))
    }

    /// Build the service around explicit collaborators.
    pub fn with_components(
        config: ServiceConfig,
        store: InMemoryRateStore,
        client: Arc<dyn MarketDataClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let factory: Arc<dyn StoreFactory> = Arc::new(store.clone());

        let sync_engine = Arc::new(RateSyncEngine::new(
            client,
            factory.clone(),
            config.sync_config(),
        ));
        let evaluator = Arc::new(AlertEvaluator::new(
            factory.clone(),
            notifier,
            config.evaluator_config(),
        ));

        Self {
            config,
            logger: AlertLogger::new(factory),
            store,
            sync_engine,
            evaluator,
            metrics: Arc::new(ServiceMetrics::new()),
            state: RwLock::new(ServiceState::Starting),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Schedule both engines.
    #[instrument(skip(self))]
    pub fn start(&self) -> ServiceResult<()> {
        {
            let mut state = self.state.write();
            if *state != ServiceState::Starting {
                return Err(ServiceError::InvalidState(*state));
            }
            *state = ServiceState::Running;
        }

        info!(
            currencies = %self.config.currencies.to_code_list(),
            sync_interval_secs = self.config.sync_interval.as_secs(),
            evaluation_interval_secs = self.config.evaluation_interval.as_secs(),
            "Starting ForexAlert service"
        );

        let sync = SyncTask::new(self.sync_engine.clone(), self.metrics.clone());
        let evaluation = EvaluationTask::new(self.evaluator.clone(), self.metrics.clone());

        let mut handles = self.handles.lock();
        handles.push(EngineRunner::start(Arc::new(sync)));
        handles.push(EngineRunner::start(Arc::new(evaluation)));

        info!("ForexAlert service started");
        Ok(())
    }

    /// Stop both engines, waiting for ticks in progress, then flush state.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> ServiceResult<()> {
        {
            let mut state = self.state.write();
            if state.is_terminal() {
                return Ok(());
            }
            *state = ServiceState::ShuttingDown;
        }
        info!("Stopping ForexAlert service");

        let handles: Vec<EngineHandle> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let name = handle.name().to_string();
            handle.stop().await;
            info!(task = %name, "Engine stopped");
        }

        let result = self.save_state();

        let metrics = self.metrics.snapshot();
        info!(
            sync_ticks = metrics.sync_ticks,
            sync_failures = metrics.sync_failures,
            rates_changed = metrics.rates_changed,
            history_rows = metrics.history_rows,
            alerts_evaluated = metrics.alerts_evaluated,
            alerts_triggered = metrics.alerts_triggered,
            notification_failures = metrics.notification_failures,
            "Final metrics"
        );

        *self.state.write() = ServiceState::Stopped;
        info!("ForexAlert service stopped");
        result
    }

    /// Run one sync followed by one evaluation, outside the schedule.
    pub async fn run_once(&self) -> ServiceResult<(SyncReport, EvaluationReport)> {
        let sync = match self.sync_engine.sync_now().await {
            Ok(report) => {
                self.metrics.record_sync(&report);
                report
            }
            Err(e) => {
                self.metrics.sync_failed();
                return Err(e.into());
            }
        };

        let evaluation = match self.evaluator.evaluate_now().await {
            Ok(report) => {
                self.metrics.record_evaluation(&report);
                report
            }
            Err(e) => {
                self.metrics.evaluation_failed();
                return Err(e.into());
            }
        };

        Ok((sync, evaluation))
    }

    /// Write the store to the state file, if one is configured.
    pub fn save_state(&self) -> ServiceResult<()> {
        let Some(path) = &self.config.state_file else {
            return Ok(());
        };

        match self.store.snapshot().save_to_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "State saved");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to save state");
                Err(e.into())
            }
        }
    }

    /// Current rates with their 24 hour statistics.
    pub async fn enriched_rates(&self) -> ServiceResult<Vec<EnrichedRate>> {
        let now = Utc::now();
        let session = self.store.open();
        let current = session.get_current_rates().await?;
        let history = session.get_history_since(now - Duration::hours(24)).await?;
        Ok(enriched_rates(&current, &history, now))
    }

    /// Pairs that moved the most over `timeframe`.
    pub async fn top_movers(&self, timeframe: Timeframe, limit: usize) -> ServiceResult<Vec<TopMover>> {
        let now = Utc::now();
        let history = self
            .store
            .open()
            .get_history_since(now - timeframe.lookback())
            .await?;
        Ok(top_movers(&history, timeframe, limit, now))
    }

    /// The newest `limit` candles for one supported pair.
    pub async fn candles(
        &self,
        pair: &CurrencyPair,
        interval: CandleInterval,
        limit: usize,
    ) -> ServiceResult<Vec<Candle>> {
        if !self.config.currencies.supports_pair(pair) {
            return Err(forexalert_fx::FxError::InvalidParameter(format!(
                "unsupported pair {}",
                pair
            ))
            .into());
        }

        let since = Utc::now() - candle_lookback(interval, limit)?;
        let history = self.store.open().get_history(pair, since).await?;
        Ok(ohlc_candles(pair, &history, interval, limit)?)
    }

    /// A page of the trigger log, newest first.
    pub async fn trigger_log(&self, page: usize, page_size: usize) -> ServiceResult<TriggerLogPage> {
        Ok(self.logger.page(page, page_size).await?)
    }

    /// Trigger counts and most watched pairs.
    pub async fn trigger_statistics(&self) -> ServiceResult<TriggerStatistics> {
        Ok(self.logger.statistics(Utc::now()).await?)
    }

    pub fn store(&self) -> &InMemoryRateStore {
        &self.store
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

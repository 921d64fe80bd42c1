//! Both engines against one in-memory store, driven through the service.

use std::sync::Arc;
use std::time::Duration;

use forexalert_alerts::{NotifyError, RecordingNotifier};
use forexalert_common::{Alert, AlertCondition, Currency, CurrencyPair, CurrencySet, OwnerId};
use forexalert_fx::StaticMarketDataClient;
use forexalert_service::{ForexAlertService, ServiceConfig, ServiceState};
use forexalert_store::{InMemoryRateStore, RateStore, StoreFactory};
use rust_decimal_macros::dec;

fn config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.currencies = CurrencySet::parse_list("USD,EUR,GBP,MWK").unwrap();
    config.market.simulated = true;
    config
}

fn market() -> Arc<StaticMarketDataClient> {
    Arc::new(StaticMarketDataClient::new([
        (Currency::eur(), dec!(0.9)),
        (Currency::gbp(), dec!(0.8)),
        (Currency::mwk(), dec!(1750)),
    ]))
}

fn usd_mwk_alert(condition: AlertCondition, target: rust_decimal::Decimal) -> Alert {
    Alert::new(
        OwnerId::new("user-1"),
        "user1@example.com",
        CurrencyPair::new(Currency::usd(), Currency::mwk()),
        condition,
        target,
    )
}

#[tokio::test]
async fn test_sync_then_evaluate_triggers_alert() {
    let store = InMemoryRateStore::new();
    let alert = usd_mwk_alert(AlertCondition::GreaterThan, dec!(1700));
    store.upsert_alert(alert.clone());
    let notifier = Arc::new(RecordingNotifier::new());

    let service =
        ForexAlertService::with_components(config(), store.clone(), market(), notifier.clone());
    let (sync, evaluation) = service.run_once().await.unwrap();

    assert_eq!(sync.pairs_computed, 12);
    assert_eq!(sync.history_rows, 12);
    assert_eq!(evaluation.triggered, 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].current_rate, dec!(1750));

    let stored = store.get_alert(&alert.id).unwrap();
    assert_eq!(stored.last_triggered_at, Some(evaluation.evaluated_at));

    let eur_gbp = store
        .open()
        .get_latest_rate(&CurrencyPair::new(Currency::eur(), Currency::gbp()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(eur_gbp.rate, dec!(0.888889));
}

#[tokio::test]
async fn test_unchanged_market_adds_no_history() {
    let store = InMemoryRateStore::new();
    let service = ForexAlertService::with_components(
        config(),
        store.clone(),
        market(),
        Arc::new(RecordingNotifier::new()),
    );

    service.run_once().await.unwrap();
    let (second, _) = service.run_once().await.unwrap();

    assert_eq!(second.history_rows, 0);
    assert_eq!(second.heartbeats, 12);
    assert_eq!(store.history_len(), 12);
}

#[tokio::test]
async fn test_failing_notifier_still_records_triggers() {
    let store = InMemoryRateStore::new();
    for target in [dec!(1000), dec!(1200), dec!(1400)] {
        store.upsert_alert(usd_mwk_alert(AlertCondition::GreaterThan, target));
    }
    let notifier = Arc::new(RecordingNotifier::failing(NotifyError::Transport(
        "smtp unavailable".to_string(),
    )));

    let service = ForexAlertService::with_components(config(), store, market(), notifier);
    let (_, evaluation) = service.run_once().await.unwrap();

    assert_eq!(evaluation.triggered, 3);
    assert_eq!(evaluation.notification_failures, 3);

    let log = service.trigger_log(1, 50).await.unwrap();
    assert_eq!(log.total_count, 3);
    assert!(log.records.iter().all(|r| !r.notification_sent));
    assert!(log
        .records
        .iter()
        .all(|r| r.notification_error.as_deref().is_some_and(|e| e.contains("smtp"))));
}

#[tokio::test]
async fn test_scheduled_engines_run_and_stop() {
    let mut config = config();
    config.sync_interval = Duration::from_millis(20);
    config.evaluation_interval = Duration::from_millis(20);
    config.evaluation_delay = Duration::from_millis(30);

    let store = InMemoryRateStore::new();
    store.upsert_alert(usd_mwk_alert(AlertCondition::GreaterThan, dec!(1700)));
    let notifier = Arc::new(RecordingNotifier::new());

    let service = ForexAlertService::with_components(config, store, market(), notifier.clone());
    service.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    service.stop().await.unwrap();

    assert_eq!(service.state(), ServiceState::Stopped);
    let metrics = service.metrics().snapshot();
    assert!(metrics.sync_ticks >= 2);
    assert!(metrics.evaluation_ticks >= 1);
    assert!(notifier.count() >= 1);

    // Nothing runs after stop.
    let ticks = service.metrics().snapshot().sync_ticks;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(service.metrics().snapshot().sync_ticks, ticks);
}

#[tokio::test]
async fn test_state_file_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut config = config();
    config.state_file = Some(path.clone());

    let store = InMemoryRateStore::new();
    store.upsert_alert(usd_mwk_alert(AlertCondition::LessThan, dec!(1800)));
    let first = ForexAlertService::with_components(
        config.clone(),
        store,
        market(),
        Arc::new(RecordingNotifier::new()),
    );
    first.run_once().await.unwrap();
    first.stop().await.unwrap();
    assert!(path.exists());

    let restarted = ForexAlertService::new(config).unwrap();
    assert_eq!(restarted.enriched_rates().await.unwrap().len(), 12);
    assert_eq!(restarted.trigger_log(1, 10).await.unwrap().total_count, 1);
}

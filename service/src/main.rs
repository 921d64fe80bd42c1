//! ForexAlert Binary
//!
//! Runs hourly rate synchronization and alert evaluation against an
//! in-memory store, optionally persisted to a JSON state file.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forexalert_service::{ForexAlertService, ServiceConfig};

/// ForexAlert CLI
#[derive(Parser, Debug)]
#[command(name = "forexalert")]
#[command(about = "FX rate synchronization and alert evaluation service")]
struct Args {
    /// Use a simulated market instead of FxRatesAPI
    #[arg(long)]
    simulated: bool,

    /// Random seed for the simulated market
    #[arg(long)]
    seed: Option<u64>,

    /// Run one sync and one evaluation, then exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ServiceConfig::from_env()?;
    config.market.simulated |= args.simulated;
    config.market.seed = args.seed.or(config.market.seed);

    // Initialize logging
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(args.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting ForexAlert");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let service = ForexAlertService::new(config)?;

    if args.once {
        let (sync, evaluation) = service.run_once().await?;
        info!(
            pairs = sync.pairs_computed,
            changed = sync.inserted + sync.changed,
            heartbeats = sync.heartbeats,
            alerts_evaluated = evaluation.evaluated,
            alerts_triggered = evaluation.triggered,
            "Single run complete"
        );
        for rate in service.enriched_rates().await? {
            info!(
                pair = %rate.pair,
                rate = %rate.rate,
                high_24h = %rate.high_24h,
                low_24h = %rate.low_24h,
                change_24h = %rate.change_24h,
                "Rate"
            );
        }
        service.save_state()?;
        return Ok(());
    }

    service.start()?;
    info!("ForexAlert running, press Ctrl+C to stop");

    // Keep running until shutdown
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Err(e) = service.stop().await {
        error!(error = %e, "Error during shutdown");
        return Err(e.into());
    }

    info!("ForexAlert shutdown complete");
    Ok(())
}

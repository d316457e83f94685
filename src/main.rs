//! Prediction Market Trader - Entry Point
//!
//! Wiring sequence:
//! 1. Load .env + config.toml and validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create Prometheus metrics (fan-out telemetry)
//! 4. Bootstrap: connect chains, build venues, register platforms
//! 5. Log the platform list and a market sample per platform
//! 6. Log positions for TRADER_ADDRESS when set
//! 7. With metrics enabled, serve /metrics + /live + /ready until SIGINT

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use prediction_market_trader::adapters::metrics::{HealthServer, HealthState, OrchestratorMetrics};
use prediction_market_trader::bootstrap::bootstrap;
use prediction_market_trader::config::loader::load_config;
use prediction_market_trader::domain::{MarketFilter, MarketStatus};
use prediction_market_trader::usecases::Orchestrator;

/// Markets sampled per platform at startup.
const SAMPLE_MARKETS: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load secrets and configuration ───────────────────
    if let Err(e) = dotenvy::dotenv() {
        // Missing .env is normal outside development.
        eprintln!("No .env loaded: {e}");
    }
    let config = load_config("config.toml").context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.trader.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.trader.name,
        version = env!("CARGO_PKG_VERSION"),
        blockchains = config.blockchains.len(),
        platforms = config.platforms.len(),
        "Starting prediction market trader"
    );

    // ── 3. Metrics ──────────────────────────────────────────
    let metrics = Arc::new(OrchestratorMetrics::new().context("Failed to create metrics")?);

    // ── 4. Bootstrap connectors ─────────────────────────────
    let boot = bootstrap(&config, metrics.clone())
        .await
        .context("Failed to bootstrap orchestrator")?;
    for (name, chain) in &boot.chains {
        info!(chain = %name, healthy = chain.is_healthy().await, "Blockchain status");
    }
    for (platform, reason) in &boot.skipped {
        warn!(platform = %platform, reason = %reason, "Platform unavailable");
    }
    let orchestrator = boot.orchestrator;

    // ── 5. Platform and market sample ───────────────────────
    info!(platforms = ?orchestrator.list_platforms(), "Registered platforms");
    log_market_sample(&orchestrator).await;

    // ── 6. Positions for the configured trader ──────────────
    if let Ok(address) = std::env::var("TRADER_ADDRESS") {
        match orchestrator.get_all_positions(&address).await {
            Ok(positions) => {
                for p in &positions {
                    info!(
                        platform = %p.platform,
                        market_id = %p.market_id,
                        side = %p.side,
                        shares = %p.shares,
                        avg_entry = ?p.average_entry_price(),
                        pnl = %p.unrealized_pnl(),
                        "Position"
                    );
                }
                info!(count = positions.len(), "Positions loaded");
            }
            Err(e) => error!(error = %e, "Failed to load positions"),
        }
    }

    if !config.metrics.enabled {
        info!("Metrics disabled, exiting");
        return Ok(());
    }

    // ── 7. Serve metrics + health until SIGINT ──────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let health = Arc::new(HealthState::default());
    health.set_platforms(orchestrator.platform_count());

    let metrics_handle = tokio::spawn({
        let metrics = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        async move {
            if let Err(e) = metrics.serve(bind, shutdown_rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }
    });
    let health_handle = tokio::spawn({
        let server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
        let shutdown_rx = shutdown_tx.subscribe();
        async move {
            if let Err(e) = server.run(shutdown_rx).await {
                error!(error = %e, "Health server failed");
            }
        }
    });

    info!("Serving metrics, press Ctrl-C to stop");
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, shutting down");

    health.begin_shutdown();
    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = metrics_handle.await;
        let _ = health_handle.await;
    })
    .await;

    info!("Shutdown complete");
    Ok(())
}

/// Log up to `SAMPLE_MARKETS` open markets from every platform.
async fn log_market_sample(orchestrator: &Orchestrator) {
    let open = MarketFilter::default().with_status(MarketStatus::Open);
    for platform in orchestrator.list_platforms() {
        match orchestrator.get_markets(platform, &open, SAMPLE_MARKETS).await {
            Ok(markets) => {
                for m in &markets {
                    info!(
                        platform,
                        market_id = %m.market_id,
                        status = %m.status,
                        question = %m.question,
                        "Market"
                    );
                }
            }
            Err(e) => warn!(platform, error = %e, "Market sample failed"),
        }
    }
}

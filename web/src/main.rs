//! Reservation server binary.
//!
//! Wires the engine (in-process ledger, catalog, index, coordinator,
//! query service), starts the hold sweeper and the Prometheus exporter,
//! and serves the HTTP API until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use innkeep_core::environment::{Clock, SystemClock};
use innkeep_core::ledger::LedgerStore;
use innkeep_engine::{
    metrics::register_engine_metrics, spawn_hold_sweeper, AvailabilityIndex,
    AvailabilityQueryService, CoordinatorConfig, MemoryLedger, ReservationCoordinator,
    ResourceCatalog,
};
use innkeep_web::notify::TracingNotifier;
use innkeep_web::{app, AppState, Config};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    let metrics_addr: SocketAddr = format!(
        "{}:{}",
        config.server.metrics_host, config.server.metrics_port
    )
    .parse()
    .context("invalid metrics address")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    register_engine_metrics();

    // Engine wiring: one in-process ledger, one derived index
    let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let index = Arc::new(AvailabilityIndex::new());
    let catalog = Arc::new(ResourceCatalog::new(
        Arc::clone(&ledger),
        Arc::clone(&clock),
    ));
    let coordinator = Arc::new(ReservationCoordinator::with_config(
        Arc::clone(&catalog),
        ledger,
        Arc::clone(&index),
        clock,
        Arc::new(TracingNotifier),
        CoordinatorConfig {
            lock_wait: Duration::from_millis(config.engine.lock_wait_ms),
            lock_attempts: config.engine.lock_attempts,
        },
    ));
    let query = Arc::new(AvailabilityQueryService::new(
        Arc::clone(&catalog),
        index,
    ));

    let sweeper = spawn_hold_sweeper(
        Arc::clone(&coordinator),
        Duration::from_secs(config.engine.sweep_interval),
    );

    let state = AppState::new(catalog, coordinator, query);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, metrics = %metrics_addr, "reservation server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    tracing::info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
    }
}

//! TaskMarket server process.
//!
//! Connects to `PostgreSQL`, applies migrations, wires the marketplace and
//! runs the subscription billing scheduler until SIGINT or SIGTERM.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use taskmarket::ledger::SimulatedGateway;
use taskmarket::{Config, Marketplace};
use taskmarket_core::SystemClock;
use taskmarket_postgres::PostgresMarketStore;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taskmarket=debug,sqlx=warn".into()),
        )
        .with(fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting TaskMarket");

    if let Some(addr) = &config.server.metrics_addr {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid METRICS_ADDR: {addr}"))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        taskmarket::metrics::register_metrics();
        info!(%addr, "Prometheus exporter listening");
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let store = PostgresMarketStore::new(pool);
    store.migrate().await?;
    info!("Database ready");

    let market = Marketplace::new(
        Arc::new(store),
        SimulatedGateway::shared(),
        Arc::new(SystemClock),
        &config,
    );
    info!(
        sinks = ?market.fanout.sink_names(),
        standard_price = %market.pricing.standard(),
        "Marketplace wired"
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = if config.billing.enabled {
        let scheduler = Arc::clone(&market.scheduler);
        Some(tokio::spawn(async move { scheduler.run(shutdown_rx).await }))
    } else {
        info!("Subscription billing disabled");
        None
    };

    shutdown_signal().await;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());

    if let Some(handle) = scheduler {
        let grace = Duration::from_secs(config.server.shutdown_timeout);
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => info!("Scheduler stopped"),
            Ok(Err(e)) => error!(error = %e, "Scheduler task failed"),
            Err(_) => warn!(?grace, "Scheduler did not stop in time"),
        }
    }

    info!("TaskMarket stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

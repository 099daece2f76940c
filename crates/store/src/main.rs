//! Metrics Store - latest resource usage snapshot for nodes and pods
//!
//! Scrapes a batch of node and container metrics on every resolution tick,
//! keeps the latest one in memory and serves health and Prometheus
//! endpoints.

use anyhow::Result;
use metrics_store::{api, config::StoreConfig};
use std::sync::Arc;
use store_lib::{
    health::{components, HealthRegistry},
    manager::{JsonFileSource, ManagerBuilder},
    observability::{StoreMetrics, StructuredLogger},
    storage::SnapshotStore,
};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const STORE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = StoreConfig::load()?;
    info!(
        instance = %config.instance,
        batch_path = %config.batch_path.display(),
        "Store configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SCRAPER).await;
    health_registry.register(components::STORAGE).await;

    // Histogram buckets are derived from the scrape timeout at registration
    let metrics = StoreMetrics::new(config.scrape_timeout());
    let store = Arc::new(SnapshotStore::with_sink(Arc::new(metrics.clone())));

    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(STORE_VERSION, config.resolution(), config.scrape_timeout());

    let manager = ManagerBuilder::new()
        .source(Arc::new(JsonFileSource::new(&config.batch_path)))
        .storage(store)
        .health(health_registry.clone())
        .metrics(metrics)
        .logger(logger.clone())
        .resolution(config.resolution())
        .scrape_timeout(config.scrape_timeout())
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let manager_handle = tokio::spawn(manager.run(shutdown_rx));

    let app_state = Arc::new(api::AppState::new(health_registry));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
                Ok(Ok(())) => {}
            }
            logger.log_shutdown("API server stopped");
        }
    }

    let _ = shutdown_tx.send(());
    manager_handle.await?;
    info!("Shutdown complete");

    Ok(())
}

//! Scrape loop
//!
//! Every resolution tick the manager scrapes one batch, bounded by the
//! scrape timeout, and replaces the stored snapshot with it. A failed tick
//! leaves the previous snapshot in place.

use super::BatchSource;
use crate::health::{components, HealthRegistry};
use crate::observability::{StoreMetrics, StructuredLogger};
use crate::storage::{IngestSummary, Storage};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::info;

/// Configuration for the scrape loop
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Interval between scrapes (default: 60 seconds)
    pub resolution: Duration,
    /// Upper bound for a single scrape (default: 90% of the resolution)
    pub scrape_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::with_resolution(Duration::from_secs(60))
    }
}

impl ManagerConfig {
    /// Config for `resolution` with the scrape timeout at 90% of it
    pub fn with_resolution(resolution: Duration) -> Self {
        Self {
            resolution,
            scrape_timeout: resolution.mul_f64(0.9),
        }
    }
}

/// Drives a [`BatchSource`] into a [`Storage`]
pub struct Manager {
    source: Arc<dyn BatchSource>,
    storage: Arc<dyn Storage>,
    health: HealthRegistry,
    metrics: Option<StoreMetrics>,
    logger: StructuredLogger,
    config: ManagerConfig,
}

impl Manager {
    /// Run until a shutdown signal arrives; the first tick fires immediately
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            resolution_secs = self.config.resolution.as_secs_f64(),
            scrape_timeout_secs = self.config.scrape_timeout.as_secs_f64(),
            "Starting scrape loop"
        );

        let mut ticker = interval(self.config.resolution);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are logged and reported inside tick
                    let _ = self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down scrape loop");
                    break;
                }
            }
        }
    }

    /// Scrape and store one batch
    pub async fn tick(&self) -> Result<IngestSummary> {
        let start = Instant::now();

        let scraped = match timeout(self.config.scrape_timeout, self.source.scrape()).await {
            Ok(result) => result.context("Scrape failed"),
            Err(_) => Err(anyhow!(
                "Scrape timed out after {:?}",
                self.config.scrape_timeout
            )),
        };

        match scraped {
            Ok(batch) => {
                let summary = self.storage.store(batch);
                let elapsed = start.elapsed();
                let now = Utc::now();

                if let Some(metrics) = &self.metrics {
                    metrics.observe_scrape_duration(elapsed);
                    metrics.set_last_scrape(now.timestamp_millis() as f64 / 1000.0);
                }
                self.health.set_healthy(components::SCRAPER).await;
                self.health.mark_batch_stored(now).await;
                self.logger.log_batch_stored(&summary, elapsed);

                Ok(summary)
            }
            Err(e) => {
                let elapsed = start.elapsed();

                if let Some(metrics) = &self.metrics {
                    metrics.observe_scrape_duration(elapsed);
                    metrics.inc_scrape_errors();
                }
                self.health
                    .set_degraded(components::SCRAPER, format!("{:#}", e))
                    .await;
                self.logger.log_scrape_failed(&e, elapsed);

                Err(e)
            }
        }
    }
}

/// Builder for creating the scrape loop
pub struct ManagerBuilder {
    source: Option<Arc<dyn BatchSource>>,
    storage: Option<Arc<dyn Storage>>,
    health: Option<HealthRegistry>,
    metrics: Option<StoreMetrics>,
    logger: Option<StructuredLogger>,
    config: ManagerConfig,
}

impl ManagerBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            storage: None,
            health: None,
            metrics: None,
            logger: None,
            config: ManagerConfig::default(),
        }
    }

    /// Set the batch source
    pub fn source(mut self, source: Arc<dyn BatchSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the storage that receives batches
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the health registry to report scraper status to
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the Prometheus metrics handle
    pub fn metrics(mut self, metrics: StoreMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the structured logger
    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the resolution, resetting the scrape timeout to 90% of it
    pub fn resolution(mut self, resolution: Duration) -> Self {
        self.config = ManagerConfig::with_resolution(resolution);
        self
    }

    /// Set the scrape timeout
    pub fn scrape_timeout(mut self, scrape_timeout: Duration) -> Self {
        self.config.scrape_timeout = scrape_timeout;
        self
    }

    /// Build the manager
    pub fn build(self) -> Result<Manager> {
        let source = self
            .source
            .ok_or_else(|| anyhow!("Batch source is required"))?;
        let storage = self
            .storage
            .ok_or_else(|| anyhow!("Storage is required"))?;

        if self.config.resolution.is_zero() {
            return Err(anyhow!("Resolution must be greater than zero"));
        }
        if self.config.scrape_timeout.is_zero() || self.config.scrape_timeout > self.config.resolution
        {
            return Err(anyhow!(
                "Scrape timeout {:?} must be positive and no longer than the resolution {:?}",
                self.config.scrape_timeout,
                self.config.resolution
            ));
        }

        Ok(Manager {
            source,
            storage,
            health: self.health.unwrap_or_default(),
            metrics: self.metrics,
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("metrics-store")),
            config: self.config,
        })
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NodeMetricsGetter;
    use crate::health::ComponentStatus;
    use crate::models::{MetricsBatch, MetricsPoint, NodeMetricsPoint};
    use crate::storage::SnapshotStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that hands out a one-node batch and counts calls
    struct MockSource {
        calls: AtomicUsize,
    }

    impl MockSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BatchSource for MockSource {
        async fn scrape(&self) -> Result<MetricsBatch> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(MetricsBatch::new(
                vec![NodeMetricsPoint::new(
                    "node-1",
                    MetricsPoint::new(Utc::now(), 0.5, 1_000 + call),
                )],
                vec![],
            ))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl BatchSource for FailingSource {
        async fn scrape(&self) -> Result<MetricsBatch> {
            Err(anyhow!("connection refused"))
        }
    }

    struct SlowSource;

    #[async_trait]
    impl BatchSource for SlowSource {
        async fn scrape(&self) -> Result<MetricsBatch> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(MetricsBatch::default())
        }
    }

    fn manager_with(source: Arc<dyn BatchSource>) -> (Manager, Arc<SnapshotStore>, HealthRegistry) {
        let store = Arc::new(SnapshotStore::new());
        let health = HealthRegistry::new();
        let manager = ManagerBuilder::new()
            .source(source)
            .storage(store.clone())
            .health(health.clone())
            .resolution(Duration::from_millis(100))
            .scrape_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        (manager, store, health)
    }

    #[test]
    fn test_manager_config_default() {
        let config = ManagerConfig::default();
        assert_eq!(config.resolution, Duration::from_secs(60));
        assert_eq!(config.scrape_timeout, Duration::from_secs(54));
    }

    #[test]
    fn test_builder_missing_source() {
        let result = ManagerBuilder::new()
            .storage(Arc::new(SnapshotStore::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_timeout_above_resolution() {
        let result = ManagerBuilder::new()
            .source(Arc::new(MockSource::new()))
            .storage(Arc::new(SnapshotStore::new()))
            .resolution(Duration::from_secs(10))
            .scrape_timeout(Duration::from_secs(11))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tick_stores_batch_and_marks_ready() {
        let (manager, store, health) = manager_with(Arc::new(MockSource::new()));

        let summary = manager.tick().await.unwrap();

        assert_eq!(summary.nodes, 1);
        assert_eq!(store.len_nodes(), 1);
        assert!(health.readiness().await.ready);
        assert_eq!(
            health.health().await.components[components::SCRAPER].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_failed_tick_keeps_previous_snapshot() {
        let (manager, store, health) = manager_with(Arc::new(MockSource::new()));
        manager.tick().await.unwrap();

        let failing = Manager {
            source: Arc::new(FailingSource),
            ..manager
        };
        let err = failing.tick().await.unwrap_err();

        assert!(format!("{:#}", err).contains("connection refused"));
        assert_eq!(store.len_nodes(), 1);

        let status = health.health().await;
        assert_eq!(status.status, ComponentStatus::Degraded);
        // Still serving the previous snapshot
        assert!(health.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_tick_times_out() {
        let (manager, store, health) = manager_with(Arc::new(SlowSource));

        let err = manager.tick().await.unwrap_err();

        assert!(err.to_string().contains("timed out"));
        assert!(store.is_empty());
        assert!(!health.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_run_scrapes_until_shutdown() {
        let source = Arc::new(MockSource::new());
        let (manager, store, _health) = manager_with(source.clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(manager.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(250)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let calls = source.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "expected at least two scrapes, got {}", calls);

        let (_, usage) = store.get_node_metrics(&["node-1".to_string()]);
        assert_eq!(usage[0].map(|u| u.memory), Some(1_000 + calls as u64 - 1));
    }
}

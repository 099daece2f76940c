//! Observability infrastructure for the metrics store
//!
//! Provides:
//! - Prometheus metrics (stored points, scrape duration, scrape errors)
//! - Structured JSON logging with tracing

use crate::buckets::buckets_for;
use crate::storage::{IngestSummary, PointKind, PointsSink};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge_vec, Gauge,
    Histogram, IntCounter, IntGaugeVec,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<StoreMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct StoreMetricsInner {
    points_stored: IntGaugeVec,
    scrape_duration_seconds: Histogram,
    scrape_errors: IntCounter,
    last_scrape_timestamp_seconds: Gauge,
}

impl StoreMetricsInner {
    fn new(scrape_timeout: Duration) -> Self {
        Self {
            points_stored: register_int_gauge_vec!(
                "metrics_store_storage_points",
                "Number of metrics points stored",
                &["type"]
            )
            .expect("Failed to register storage_points"),

            scrape_duration_seconds: register_histogram!(
                "metrics_store_scrape_duration_seconds",
                "Time spent scraping and storing one batch",
                buckets_for(scrape_timeout)
            )
            .expect("Failed to register scrape_duration_seconds"),

            scrape_errors: register_int_counter!(
                "metrics_store_scrape_errors_total",
                "Total number of failed or timed out scrapes"
            )
            .expect("Failed to register scrape_errors"),

            last_scrape_timestamp_seconds: register_gauge!(
                "metrics_store_last_scrape_timestamp_seconds",
                "Unix time of the last successfully stored batch"
            )
            .expect("Failed to register last_scrape_timestamp_seconds"),
        }
    }
}

/// Store metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics. The scrape duration
/// buckets are fixed by the first handle created in the process.
#[derive(Clone)]
pub struct StoreMetrics {
    _private: (),
}

impl StoreMetrics {
    /// Create a metrics handle, registering the metrics on first call
    pub fn new(scrape_timeout: Duration) -> Self {
        GLOBAL_METRICS.get_or_init(|| StoreMetricsInner::new(scrape_timeout));
        Self { _private: () }
    }

    fn inner(&self) -> &StoreMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record how long one scrape-and-store cycle took
    pub fn observe_scrape_duration(&self, duration: Duration) {
        self.inner()
            .scrape_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Increment scrape errors counter
    pub fn inc_scrape_errors(&self) {
        self.inner().scrape_errors.inc();
    }

    /// Record the time of the last stored batch
    pub fn set_last_scrape(&self, unix_secs: f64) {
        self.inner().last_scrape_timestamp_seconds.set(unix_secs);
    }

    /// Current value of the stored points gauge
    pub fn points(&self, kind: PointKind) -> i64 {
        self.inner()
            .points_stored
            .with_label_values(&[kind.as_str()])
            .get()
    }
}

impl PointsSink for StoreMetrics {
    fn set_points(&self, kind: PointKind, count: usize) {
        self.inner()
            .points_stored
            .with_label_values(&[kind.as_str()])
            .set(count as i64);
    }
}

/// Structured logger for store events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a stored batch
    pub fn log_batch_stored(&self, summary: &IngestSummary, elapsed: Duration) {
        if summary.rejected.is_empty() {
            info!(
                event = "batch_stored",
                instance = %self.instance,
                nodes = summary.nodes,
                pods = summary.pods,
                containers = summary.containers,
                elapsed_ms = elapsed.as_millis() as u64,
                "Stored metrics batch"
            );
        } else {
            warn!(
                event = "batch_stored",
                instance = %self.instance,
                nodes = summary.nodes,
                pods = summary.pods,
                containers = summary.containers,
                rejected = summary.rejected.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Stored metrics batch with rejected entries"
            );
        }
    }

    /// Log a failed or timed out scrape
    pub fn log_scrape_failed(&self, error: &anyhow::Error, elapsed: Duration) {
        warn!(
            event = "scrape_failed",
            instance = %self.instance,
            error = %format!("{:#}", error),
            elapsed_ms = elapsed.as_millis() as u64,
            "Scrape failed, keeping previous snapshot"
        );
    }

    /// Log store startup
    pub fn log_startup(&self, version: &str, resolution: Duration, scrape_timeout: Duration) {
        info!(
            event = "store_started",
            instance = %self.instance,
            version = %version,
            resolution_secs = resolution.as_secs_f64(),
            scrape_timeout_secs = scrape_timeout.as_secs_f64(),
            "Metrics store started"
        );
    }

    /// Log store shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "store_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Metrics store shutting down"
        );
    }
}

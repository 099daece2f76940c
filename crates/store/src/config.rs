//! Store configuration

use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Metrics store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Interval between scrapes, in seconds
    #[serde(default = "default_metric_resolution")]
    pub metric_resolution_secs: u64,

    /// Scrape timeout in seconds, 90% of the resolution when unset
    #[serde(default)]
    pub scrape_timeout_secs: Option<f64>,

    /// File the external scraper writes each batch to
    #[serde(default = "default_batch_path")]
    pub batch_path: PathBuf,
}

fn default_instance() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "metrics-store".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_metric_resolution() -> u64 {
    60
}

fn default_batch_path() -> PathBuf {
    PathBuf::from("/var/run/metrics-store/batch.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            api_port: default_api_port(),
            metric_resolution_secs: default_metric_resolution(),
            scrape_timeout_secs: None,
            batch_path: default_batch_path(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from `METRICS_STORE_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("METRICS_STORE").try_parsing(true))
            .build()?;

        let config: StoreConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that resolution and timeout fit together
    pub fn validate(&self) -> Result<()> {
        if self.metric_resolution_secs == 0 {
            bail!("metric_resolution_secs must be greater than zero");
        }
        if let Some(timeout) = self.scrape_timeout_secs {
            if !timeout.is_finite() || timeout <= 0.0 {
                bail!("scrape_timeout_secs must be a positive number, got {}", timeout);
            }
            if timeout > self.metric_resolution_secs as f64 {
                bail!(
                    "scrape_timeout_secs ({}) must not exceed metric_resolution_secs ({})",
                    timeout,
                    self.metric_resolution_secs
                );
            }
        }
        Ok(())
    }

    pub fn resolution(&self) -> Duration {
        Duration::from_secs(self.metric_resolution_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        match self.scrape_timeout_secs {
            Some(secs) => Duration::from_secs_f64(secs),
            None => self.resolution().mul_f64(0.9),
        }
    }
}

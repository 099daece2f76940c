//! Sources of metrics batches

use crate::models::{MetricsBatch, NodeMetricsPoint, PodMetricsPoint};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Produces the full set of current node and pod metrics on demand
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Fetch one complete batch
    async fn scrape(&self) -> Result<MetricsBatch>;
}

/// Batch file with entries left undecoded, so one bad entry cannot sink the rest
#[derive(Debug, Default, Deserialize)]
struct RawBatch {
    #[serde(default)]
    nodes: Vec<Value>,
    #[serde(default)]
    pods: Vec<Value>,
}

/// Decode every entry on its own, logging and skipping the ones that fail
fn decode_entries<T: DeserializeOwned>(kind: &str, path: &Path, entries: Vec<Value>) -> Vec<T> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    kind = kind,
                    index = index,
                    error = %e,
                    "Skipping malformed batch entry"
                );
                None
            }
        })
        .collect()
}

/// Reads a JSON-encoded batch that an external scraper drops on disk
///
/// The file must be a JSON object; individual node or pod entries that fail
/// to decode are skipped. A pod with a malformed container is skipped whole.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BatchSource for JsonFileSource {
    async fn scrape(&self) -> Result<MetricsBatch> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read batch file {}", self.path.display()))?;

        let raw: RawBatch = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse batch file {}", self.path.display()))?;

        let nodes: Vec<NodeMetricsPoint> = decode_entries("node", &self.path, raw.nodes);
        let pods: Vec<PodMetricsPoint> = decode_entries("pod", &self.path, raw.pods);
        let batch = MetricsBatch::new(nodes, pods);

        debug!(
            path = %self.path.display(),
            nodes = batch.nodes.len(),
            pods = batch.pods.len(),
            "Read metrics batch"
        );

        Ok(batch)
    }
}

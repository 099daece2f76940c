//! Read-side contract consumed by serving layers
//!
//! Results are parallel to the request: entry `i` of every returned vector
//! describes identifier `i`. Missing entities are reported as `None` with a
//! zero [`TimeInfo`], never as an error.

use crate::models::PodRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing information for a metric that was potentially calculated over a window
///
/// When a value covers several points (e.g. all containers of a pod), the
/// timestamp is the earliest of those points, so that consumers can tell
/// whether the value is tainted by something like pod startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeInfo {
    /// Time at which the metrics were collected
    pub timestamp: DateTime<Utc>,
    /// Window used to calculate rate metrics for this timestamp
    pub window: Duration,
}

impl TimeInfo {
    pub fn new(timestamp: DateTime<Utc>, window: Duration) -> Self {
        Self { timestamp, window }
    }

    /// True for the placeholder returned for unknown entities
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// CPU and memory usage of a node or container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Cores
    pub cpu: f64,
    /// Bytes
    pub memory: u64,
}

/// Usage of one named container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    pub usage: ResourceUsage,
}

/// Knows how to fetch the latest metrics for nodes
pub trait NodeMetricsGetter {
    /// Latest usage per node, `None` where the node is unknown
    fn get_node_metrics(&self, nodes: &[String]) -> (Vec<TimeInfo>, Vec<Option<ResourceUsage>>);
}

/// Knows how to fetch the latest metrics for the containers of pods
pub trait PodMetricsGetter {
    /// Latest usage for every container of each pod, `None` where the pod is unknown
    fn get_container_metrics(
        &self,
        pods: &[PodRef],
    ) -> (Vec<TimeInfo>, Vec<Option<Vec<ContainerUsage>>>);
}

/// Both a [`NodeMetricsGetter`] and a [`PodMetricsGetter`]
pub trait MetricsGetter: NodeMetricsGetter + PodMetricsGetter {}

impl<T: NodeMetricsGetter + PodMetricsGetter + ?Sized> MetricsGetter for T {}

//! Core data models for the metrics store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A set of resource usage figures sampled at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsPoint {
    pub timestamp: DateTime<Utc>,
    /// CPU usage rate, in cores
    pub cpu_usage: f64,
    /// Working set size, in bytes
    pub memory_usage: u64,
}

impl MetricsPoint {
    pub fn new(timestamp: DateTime<Utc>, cpu_usage: f64, memory_usage: u64) -> Self {
        Self {
            timestamp,
            cpu_usage,
            memory_usage,
        }
    }

    /// CPU usage must be a finite, non-negative number of cores
    pub fn is_valid(&self) -> bool {
        self.cpu_usage.is_finite() && self.cpu_usage >= 0.0
    }
}

/// Latest sample for a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetricsPoint {
    pub name: String,
    #[serde(flatten)]
    pub point: MetricsPoint,
}

impl NodeMetricsPoint {
    pub fn new(name: impl Into<String>, point: MetricsPoint) -> Self {
        Self {
            name: name.into(),
            point,
        }
    }
}

/// Latest sample for one container of a pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetricsPoint {
    pub name: String,
    #[serde(flatten)]
    pub point: MetricsPoint,
}

impl ContainerMetricsPoint {
    pub fn new(name: impl Into<String>, point: MetricsPoint) -> Self {
        Self {
            name: name.into(),
            point,
        }
    }
}

/// Latest samples for every container of a pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodMetricsPoint {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub containers: Vec<ContainerMetricsPoint>,
}

impl PodMetricsPoint {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        containers: Vec<ContainerMetricsPoint>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            containers,
        }
    }

    pub fn pod_ref(&self) -> PodRef {
        PodRef::new(&self.namespace, &self.name)
    }
}

/// Namespaced identity of a pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A single batch of node and pod metrics from some source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsBatch {
    #[serde(default)]
    pub nodes: Vec<NodeMetricsPoint>,
    #[serde(default)]
    pub pods: Vec<PodMetricsPoint>,
}

impl MetricsBatch {
    pub fn new(nodes: Vec<NodeMetricsPoint>, pods: Vec<PodMetricsPoint>) -> Self {
        Self { nodes, pods }
    }
}

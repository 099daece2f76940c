//! Snapshot store implementation

use super::{NoopSink, PointKind, PointsSink, Storage};
use crate::api::{ContainerUsage, NodeMetricsGetter, PodMetricsGetter, ResourceUsage, TimeInfo};
use crate::models::{MetricsBatch, NodeMetricsPoint, PodMetricsPoint, PodRef};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum window cAdvisor uses when calculating the CPU usage rate.
///
/// The real window varies and may be as low as half this value, but the
/// kubelet does not report it, so every answer carries this upper bound.
pub const CADVISOR_WINDOW: Duration = Duration::from_secs(30);

/// Reason a batch entry was left out of the stored state
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectedEntry {
    #[error("duplicate node {0} received")]
    DuplicateNode(String),

    #[error("duplicate pod {0} received")]
    DuplicatePod(PodRef),

    #[error("node {name} reported invalid cpu usage {cpu_usage}")]
    InvalidNode { name: String, cpu_usage: f64 },

    #[error("pod {pod} container {container} reported invalid cpu usage {cpu_usage}")]
    InvalidContainer {
        pod: PodRef,
        container: String,
        cpu_usage: f64,
    },
}

/// Outcome of storing one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    /// Unique nodes stored
    pub nodes: usize,
    /// Unique pods stored
    pub pods: usize,
    /// Containers across all stored pods
    pub containers: usize,
    /// Entries dropped, in batch order
    pub rejected: Vec<RejectedEntry>,
}

/// One complete, immutable generation of stored state
#[derive(Debug, Default)]
pub(super) struct Snapshot {
    pub(super) nodes: HashMap<String, NodeMetricsPoint>,
    pub(super) pods: HashMap<PodRef, PodMetricsPoint>,
}

impl Snapshot {
    /// Build a snapshot from a batch, first valid occurrence of each key wins
    fn build(batch: MetricsBatch) -> (Self, IngestSummary) {
        let mut summary = IngestSummary::default();

        let mut nodes = HashMap::with_capacity(batch.nodes.len());
        for node in batch.nodes {
            if nodes.contains_key(&node.name) {
                summary.rejected.push(RejectedEntry::DuplicateNode(node.name));
                continue;
            }
            if !node.point.is_valid() {
                summary.rejected.push(RejectedEntry::InvalidNode {
                    cpu_usage: node.point.cpu_usage,
                    name: node.name,
                });
                continue;
            }
            nodes.insert(node.name.clone(), node);
        }

        let mut pods = HashMap::with_capacity(batch.pods.len());
        for pod in batch.pods {
            let pod_ref = pod.pod_ref();
            if pods.contains_key(&pod_ref) {
                summary.rejected.push(RejectedEntry::DuplicatePod(pod_ref));
                continue;
            }
            // A pod is stored whole or not at all
            if let Some(bad) = pod.containers.iter().find(|c| !c.point.is_valid()) {
                summary.rejected.push(RejectedEntry::InvalidContainer {
                    container: bad.name.clone(),
                    cpu_usage: bad.point.cpu_usage,
                    pod: pod_ref,
                });
                continue;
            }
            summary.containers += pod.containers.len();
            pods.insert(pod_ref, pod);
        }

        summary.nodes = nodes.len();
        summary.pods = pods.len();

        (Self { nodes, pods }, summary)
    }
}

/// Thread-safe store for the latest node and pod metrics
///
/// Readers take a reference to the current snapshot and release the lock
/// before doing any work. Writers build the next snapshot without holding
/// the lock and only take it to swap the pointer. Concurrent writers are
/// serialized so the sink always reports the counts of the stored snapshot.
pub struct SnapshotStore {
    state: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    sink: Arc<dyn PointsSink>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.current();
        f.debug_struct("SnapshotStore")
            .field("nodes", &snapshot.nodes.len())
            .field("pods", &snapshot.pods.len())
            .finish()
    }
}

impl SnapshotStore {
    /// Create an empty store that reports to nowhere
    pub fn new() -> Self {
        Self::with_sink(Arc::new(NoopSink))
    }

    /// Create an empty store that reports point counts to `sink`
    pub fn with_sink(sink: Arc<dyn PointsSink>) -> Self {
        Self {
            state: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
            sink,
        }
    }

    /// Number of nodes currently stored
    pub fn len_nodes(&self) -> usize {
        self.current().nodes.len()
    }

    /// Number of pods currently stored
    pub fn len_pods(&self) -> usize {
        self.current().pods.len()
    }

    /// True when neither nodes nor pods are stored
    pub fn is_empty(&self) -> bool {
        let snapshot = self.current();
        snapshot.nodes.is_empty() && snapshot.pods.is_empty()
    }

    pub(super) fn current(&self) -> Arc<Snapshot> {
        // The lock only guards a pointer to a complete snapshot, so a
        // poisoned lock still holds a consistent value.
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, next: Snapshot) {
        let next = Arc::new(next);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = next;
    }
}

impl Storage for SnapshotStore {
    fn store(&self, batch: MetricsBatch) -> IngestSummary {
        let (snapshot, summary) = Snapshot::build(batch);

        for rejected in &summary.rejected {
            warn!(reason = %rejected, "Dropping batch entry");
        }

        {
            // Gauges and snapshot change together, last writer wins both
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            self.sink.set_points(PointKind::Node, summary.nodes);
            self.sink.set_points(PointKind::Container, summary.containers);
            self.replace(snapshot);
        }

        debug!(
            nodes = summary.nodes,
            pods = summary.pods,
            containers = summary.containers,
            rejected = summary.rejected.len(),
            "Stored metrics batch"
        );

        summary
    }
}

impl NodeMetricsGetter for SnapshotStore {
    fn get_node_metrics(&self, nodes: &[String]) -> (Vec<TimeInfo>, Vec<Option<ResourceUsage>>) {
        let snapshot = self.current();

        nodes
            .iter()
            .map(|name| match snapshot.nodes.get(name) {
                Some(node) => (
                    TimeInfo::new(node.point.timestamp, CADVISOR_WINDOW),
                    Some(ResourceUsage {
                        cpu: node.point.cpu_usage,
                        memory: node.point.memory_usage,
                    }),
                ),
                None => (TimeInfo::default(), None),
            })
            .unzip()
    }
}

impl PodMetricsGetter for SnapshotStore {
    fn get_container_metrics(
        &self,
        pods: &[PodRef],
    ) -> (Vec<TimeInfo>, Vec<Option<Vec<ContainerUsage>>>) {
        let snapshot = self.current();

        pods.iter()
            .map(|pod_ref| match snapshot.pods.get(pod_ref) {
                Some(pod) => {
                    let (timestamp, containers) = container_usage(pod);
                    (TimeInfo::new(timestamp, CADVISOR_WINDOW), Some(containers))
                }
                None => (TimeInfo::default(), None),
            })
            .unzip()
    }
}

/// Usage of each container plus the earliest container timestamp
///
/// A pod without containers reports the zero timestamp.
fn container_usage(pod: &PodMetricsPoint) -> (DateTime<Utc>, Vec<ContainerUsage>) {
    let earliest = pod
        .containers
        .iter()
        .map(|c| c.point.timestamp)
        .min()
        .unwrap_or_default();

    let containers = pod
        .containers
        .iter()
        .map(|c| ContainerUsage {
            name: c.name.clone(),
            usage: ResourceUsage {
                cpu: c.point.cpu_usage,
                memory: c.point.memory_usage,
            },
        })
        .collect();

    (earliest, containers)
}

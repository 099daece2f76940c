//! In-memory snapshot storage for node and pod metrics
//!
//! The store keeps exactly one sample per node and per pod container: the
//! one from the most recent batch. Every batch replaces the whole state in a
//! single pointer swap, so readers never see nodes from one batch next to
//! pods from another.

mod sink;
mod store;


pub use sink::{NoopSink, PointKind, PointsSink};
pub use store::{IngestSummary, RejectedEntry, SnapshotStore, CADVISOR_WINDOW};

use crate::api::MetricsGetter;
use crate::models::MetricsBatch;

/// A metrics getter that can also be fed new batches
pub trait Storage: MetricsGetter + Send + Sync {
    /// Replace the stored state with the contents of `batch`
    fn store(&self, batch: MetricsBatch) -> IngestSummary;
}

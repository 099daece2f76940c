//! Library for the resource metrics store
//!
//! This crate provides the core functionality for:
//! - Holding the latest node and pod metrics snapshot
//! - Answering point queries for node and container usage
//! - Scraping batches on a fixed resolution
//! - Histogram buckets sized around the scrape timeout
//! - Health checks and observability

pub mod api;
pub mod buckets;
pub mod health;
pub mod manager;
pub mod models;
pub mod observability;
pub mod storage;

pub use api::{
    ContainerUsage, MetricsGetter, NodeMetricsGetter, PodMetricsGetter, ResourceUsage, TimeInfo,
};
pub use buckets::buckets_for;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{StoreMetrics, StructuredLogger};
pub use storage::{SnapshotStore, Storage, CADVISOR_WINDOW};

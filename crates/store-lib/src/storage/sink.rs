//! Reporting seam between the store and whatever exports its counters

use std::fmt;

/// Kind of point counted after an ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    Node,
    Container,
}

impl PointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::Node => "node",
            PointKind::Container => "container",
        }
    }
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives the number of points held after every ingestion
pub trait PointsSink: Send + Sync {
    fn set_points(&self, kind: PointKind, count: usize);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl PointsSink for NoopSink {
    fn set_points(&self, _kind: PointKind, _count: usize) {}
}

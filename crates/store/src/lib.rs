//! Process wiring for the metrics store binary

pub mod api;
pub mod config;

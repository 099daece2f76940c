//! Periodic scraping of metrics batches into storage
//!
//! The scraper that talks to the kubelets lives outside this crate. It is
//! plugged in through [`BatchSource`]; the manager drives it on a fixed
//! resolution, bounds each scrape with a timeout and stores what comes back.

mod r#loop;
mod source;

pub use r#loop::{Manager, ManagerBuilder, ManagerConfig};
pub use source::{BatchSource, JsonFileSource};

pub use async_trait::async_trait;

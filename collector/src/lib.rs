//! # Alibaba Cloud collectors
//!
//! - **`collectors`**: per-service collectors turning CloudMonitor datapoints into samples
//! - **`metrics`**: descriptors and samples, independent of any exposition format
//! - **`orchestrator`**: concurrent scrapes under one deadline, plus the exporter's own series

#[macro_use]
extern crate tracing;

pub mod collectors;
pub mod error;
pub mod metrics;
pub mod orchestrator;

pub use collectors::{
    build_collectors,
    catalog,
    CollectorStats,
    ServiceCollector,
    SlbCollector,
    StandardCollector,
};
pub use error::CollectError;
pub use metrics::{
    Descriptor,
    MetricType,
    Sample,
};
pub use orchestrator::{
    CollectorFailure,
    Orchestrator,
    Scrape,
    ScrapeOutcome,
    ScrapeStats,
};

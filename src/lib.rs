//! # Alibaba Cloud Exporter
//!
//! - **`args`**: command line, layered over the configuration file
//! - **`logging`**: `tracing` subscriber and error report setup
//! - **`server`**: HTTP surface serving scrapes
//! - **`exposition`**: Prometheus text rendering

#[macro_use]
extern crate tracing;

pub mod args;
pub mod exposition;
pub mod logging;
pub mod server;

pub use args::{
    Args,
    Command,
};
pub use logging::{
    init_errors,
    init_logging,
};
pub use server::{
    create_router,
    start_server,
    AppState,
};

use alicloud_exporter_config::{
    LogFormat,
    ServerConfig,
};
use eyre::Result;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub fn init_errors() -> Result<()> {
    color_eyre::install()
}

/// `RUST_LOG` wins over `server.log_level` when set.
pub fn init_logging(server: &ServerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(server.log_level.as_filter()));
    let (json, text) = match server.log_format {
        LogFormat::Json => (Some(fmt::layer().json().flatten_event(true)), None),
        LogFormat::Text => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;
    Ok(())
}

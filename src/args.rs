use alicloud_exporter_config::{
    Config,
    LogFormat,
    LogLevel,
    Overrides,
};
use clap::{
    Parser,
    Subcommand,
};
use eyre::{
    Result,
    WrapErr,
};
use std::path::PathBuf;

/// Prometheus exporter for Alibaba Cloud CloudMonitor metrics
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to a YAML configuration file, layered over the built-in defaults.
    #[arg(long, short, global = true, env = "ALICLOUD_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides `server.log_level` (debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Overrides `server.log_format` (json, text).
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Overrides `server.listen_address`, e.g. `0.0.0.0:9100`.
    #[arg(long, global = true)]
    pub listen_address: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Command {
    /// Serve metrics over HTTP (default).
    #[default]
    Run,
    /// Print the version and exit.
    Version,
    /// Load and validate the configuration, then exit.
    Validate,
    /// Print the built-in metric catalog of every service.
    Metrics,
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }

    /// Defaults, then the config file, then the environment, then these flags.
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config.as_deref(), Overrides::from(self)).wrap_err_with(|| match &self.config {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })
    }
}

impl From<&Args> for Overrides {
    fn from(args: &Args) -> Self {
        Overrides {
            log_level: args.log_level,
            log_format: args.log_format,
            listen_address: args.listen_address.clone(),
        }
    }
}

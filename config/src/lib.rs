#[macro_use]
extern crate tracing;

mod alicloud_config;
mod overrides;
mod server_config;
mod service_config;

pub use alicloud_config::{
    AlicloudConfig,
    RateLimitConfig,
};
use eyre::{
    bail,
    Result,
};
pub use overrides::Overrides;
use serde::{
    Deserialize,
    Serialize,
};
pub use server_config::{
    LogFormat,
    LogLevel,
    ServerConfig,
};
pub use service_config::{
    ServiceConfig,
    ServiceKind,
    ServicesConfig,
};
use std::{
    collections::BTreeMap,
    net::SocketAddr,
    path::Path,
    time::Duration,
};

/// Prefix of the environment variables read by [`Config::load`], e.g.
/// `ALICLOUD_EXPORTER__ALICLOUD__ACCESS_KEY_ID`.
pub const ENV_PREFIX: &str = "ALICLOUD_EXPORTER";

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

/// Per-sample label names used by the collectors. Global labels may not reuse
/// them, or exported series would carry the same label twice.
pub const COLLECTOR_LABELS: &[&str] = &["instance_id", "protocol", "port", "vip", "region", "team", "group", "name"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub alicloud: AlicloudConfig,
    pub services: ServicesConfig,
    pub prometheus: PrometheusConfig,
    pub scrape: ScrapeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrometheusConfig {
    pub metric_prefix: String,
    /// Constant labels attached to every exported series.
    #[serde(default)]
    pub global_labels: BTreeMap<String, String>,
    /// Export the CloudMonitor data point timestamp with each sample.
    #[serde(default)]
    pub emit_timestamps: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeConfig {
    /// Upper bound for one scrape, including the health check.
    pub timeout_seconds: u64,
    /// Call the CloudMonitor API before collecting and report it as `up`.
    #[serde(default)]
    pub health_check: bool,
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    /// Layers the built-in defaults, the optional YAML file, the environment
    /// and finally the command-line overrides.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        if let Some(path) = path {
            debug!(?path, "Loading configuration file");
            let source = config::File::from(path)
                .format(config::FileFormat::Yaml)
                .required(true);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("alicloud.regions"),
        );
        builder = builder.add_source(overrides);

        builder.build()?.try_deserialize()
    }

    /// Defaults overlaid with the given YAML document only.
    pub fn from_yaml(content: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml))
            .add_source(config::File::from_str(content, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.alicloud.access_key_id.is_empty() {
            bail!("alicloud.access_key_id is required");
        }
        if self.alicloud.access_key_secret.is_empty() {
            bail!("alicloud.access_key_secret is required");
        }
        if self.alicloud.region.is_empty() {
            bail!("alicloud.region is required");
        }
        if self.alicloud.rate_limit.requests_per_second == 0 {
            bail!("alicloud.rate_limit.requests_per_second must be greater than zero");
        }
        if self.alicloud.rate_limit.burst == 0 {
            bail!("alicloud.rate_limit.burst must be greater than zero");
        }
        if let Some(endpoint) = &self.alicloud.cms_endpoint {
            check_endpoint("alicloud.cms_endpoint", endpoint)?;
        }
        if let Some(template) = &self.alicloud.slb_endpoint {
            check_endpoint("alicloud.slb_endpoint", &template.replace("{region}", &self.alicloud.region))?;
        }
        if self.scrape.timeout_seconds == 0 {
            bail!("scrape.timeout_seconds must be greater than zero");
        }
        if self.server.listen_address.parse::<SocketAddr>().is_err() {
            bail!(
                "invalid server.listen_address: {}, expected host:port",
                self.server.listen_address
            );
        }
        if !self.server.metrics_path.starts_with('/') {
            bail!("server.metrics_path must start with '/': {}", self.server.metrics_path);
        }
        if !self.prometheus.metric_prefix.is_empty() && !is_valid_name(&self.prometheus.metric_prefix) {
            bail!("invalid prometheus.metric_prefix: {}", self.prometheus.metric_prefix);
        }
        for name in self.prometheus.global_labels.keys() {
            if !is_valid_name(name) || name.starts_with("__") {
                bail!("invalid label name in prometheus.global_labels: {name}");
            }
            if COLLECTOR_LABELS.contains(&name.as_str()) {
                bail!("prometheus.global_labels.{name} collides with a collector label");
            }
        }
        for (kind, service) in self.services.enabled() {
            if service.namespace.is_empty() {
                bail!("services.{kind}.namespace is required when the service is enabled");
            }
            if service.max_concurrency == 0 {
                bail!("services.{kind}.max_concurrency must be greater than zero");
            }
        }
        Ok(())
    }
}

fn check_endpoint(key: &str, endpoint: &str) -> Result<()> {
    let url = url::Url::parse(endpoint).map_err(|e| eyre::eyre!("invalid {key} '{endpoint}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("invalid {key} '{endpoint}': scheme must be http or https");
    }
    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

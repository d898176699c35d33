use serde::{
    Deserialize,
    Serialize,
};
use strum::{
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
};

/// The monitored Alibaba Cloud products.
#[derive(Debug, Clone, Copy, Display, AsRefStr, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceKind {
    Slb,
    Redis,
    Rds,
}

impl ServiceKind {
    pub fn description(&self) -> &'static str {
        match self {
            ServiceKind::Slb => "SLB (Server Load Balancer)",
            ServiceKind::Redis => "Redis (KVStore)",
            ServiceKind::Rds => "RDS (Relational Database Service)",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub namespace: String,
    /// Metric names to query. Empty selects the built-in catalog.
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Add the per-instance region label. Only read by collectors that enrich
    /// samples with resource metadata.
    #[serde(default = "default_enrich_region")]
    pub enrich_region: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicesConfig {
    pub slb: ServiceConfig,
    pub redis: ServiceConfig,
    pub rds: ServiceConfig,
}

fn default_max_concurrency() -> usize {
    10
}

fn default_enrich_region() -> bool {
    true
}

impl ServicesConfig {
    pub fn get(&self, kind: ServiceKind) -> &ServiceConfig {
        match kind {
            ServiceKind::Slb => &self.slb,
            ServiceKind::Redis => &self.redis,
            ServiceKind::Rds => &self.rds,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ServiceKind, &ServiceConfig)> {
        [
            (ServiceKind::Slb, &self.slb),
            (ServiceKind::Redis, &self.redis),
            (ServiceKind::Rds, &self.rds),
        ]
        .into_iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = (ServiceKind, &ServiceConfig)> {
        self.iter().filter(|(_, service)| service.enabled)
    }
}

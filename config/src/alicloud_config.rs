use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    time::Duration,
};

/// Credentials, regions and admission control for every call made to the
/// Alibaba Cloud APIs.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlicloudConfig {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub access_key_secret: String,
    /// Primary region. CloudMonitor is queried here and it is the region label
    /// of last resort for enriched samples.
    pub region: String,
    /// Regions searched for resource tags. Empty means `[region]`.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Overrides the CloudMonitor endpoint, e.g. `https://metrics.cn-hangzhou.aliyuncs.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_endpoint: Option<String>,
    /// Overrides the SLB endpoint. `{region}` is replaced by each region id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slb_endpoint: Option<String>,
    pub request_timeout_seconds: u64,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst: u32,
    /// Longest time a call waits for a token before giving up.
    pub max_wait_seconds: u64,
}

impl AlicloudConfig {
    pub fn regions(&self) -> Vec<String> {
        if self.regions.is_empty() {
            vec![self.region.clone()]
        } else {
            self.regions.clone()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl RateLimitConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }
}

impl fmt::Debug for AlicloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlicloudConfig")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("region", &self.region)
            .field("regions", &self.regions)
            .field("cms_endpoint", &self.cms_endpoint)
            .field("slb_endpoint", &self.slb_endpoint)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

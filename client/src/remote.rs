//! The two remote operations the exporter depends on, and their payloads.

use crate::error::Result;
use futures::future::BoxFuture;
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};
use std::collections::BTreeMap;

/// Latest data points of CloudMonitor metrics. Each call is one remote
/// request; the caller pages through `next_token`.
pub trait MetricSource: Send + Sync {
    fn describe_metric_last<'a>(
        &'a self,
        namespace: &'a str,
        metric: &'a str,
        next_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<MetricPage>>;

    /// Cheap call used to tell whether the API is reachable with the
    /// configured credentials.
    fn ping(&self) -> BoxFuture<'_, Result<()>>;
}

/// Listing of the resources of one region, with their tags. The remote side
/// offers no filter by resource id. Each call is one remote request for a
/// 1-based page.
pub trait ResourceLister: Send + Sync {
    fn region(&self) -> &str;

    fn list_resources(&self, page_number: usize) -> BoxFuture<'_, Result<ResourcePage>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricPage {
    pub datapoints: Vec<Datapoint>,
    /// Present when more pages follow.
    pub next_token: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePage {
    pub resources: Vec<TaggedResource>,
    /// Resources in the region across all pages.
    pub total_count: usize,
}

/// All pages of one metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricResponse {
    pub namespace: String,
    pub metric: String,
    pub datapoints: Vec<Datapoint>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResource {
    pub id: String,
    pub region: String,
    pub tags: BTreeMap<String, String>,
}

/// One CloudMonitor data point. Dimension fields are only present for the
/// namespaces that report them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datapoint {
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diskname: Option<String>,
    #[serde(rename = "Sum", alias = "sum", default)]
    pub sum: Option<f64>,
    #[serde(rename = "Maximum", alias = "maximum", default)]
    pub maximum: Option<f64>,
    #[serde(rename = "Average", alias = "average", default)]
    pub average: Option<f64>,
    #[serde(rename = "Minimum", alias = "minimum", default)]
    pub minimum: Option<f64>,
}

impl Datapoint {
    /// Average, or maximum when the average is zero, or else the sum.
    pub fn value(&self) -> f64 {
        [self.average, self.maximum]
            .into_iter()
            .flatten()
            .find(|value| *value != 0.0)
            .unwrap_or_else(|| self.sum.unwrap_or_default())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

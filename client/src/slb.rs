use crate::{
    error::Result,
    remote::{
        ResourceLister,
        ResourcePage,
        TaggedResource,
    },
    rpc::RpcClient,
};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const SLB_VERSION: &str = "2014-05-15";

const PAGE_SIZE: usize = 100;

/// `{region}` in a configured endpoint template is replaced by the region id.
pub fn slb_endpoint(template: Option<&str>, region: &str) -> String {
    match template {
        Some(template) => template.replace("{region}", region),
        None => format!("https://slb.{region}.aliyuncs.com"),
    }
}

/// Lists the load balancers of one region.
#[derive(Debug, Clone)]
pub struct SlbClient {
    rpc: RpcClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancersPage {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    load_balancers: LoadBalancerList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancerList {
    #[serde(default)]
    load_balancer: Vec<LoadBalancer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadBalancer {
    load_balancer_id: String,
    #[serde(default)]
    region_id: Option<String>,
    #[serde(default)]
    tags: TagList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TagList {
    #[serde(default)]
    tag: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    tag_key: String,
    #[serde(default)]
    tag_value: String,
}

impl LoadBalancersPage {
    fn into_resource_page(self, fallback_region: &str) -> ResourcePage {
        ResourcePage {
            resources: self
                .load_balancers
                .load_balancer
                .into_iter()
                .map(|lb| lb.into_resource(fallback_region))
                .collect(),
            total_count: self.total_count,
        }
    }
}

impl LoadBalancer {
    fn into_resource(self, fallback_region: &str) -> TaggedResource {
        TaggedResource {
            id: self.load_balancer_id,
            region: self
                .region_id
                .filter(|region| !region.is_empty())
                .unwrap_or_else(|| fallback_region.to_string()),
            tags: self
                .tags
                .tag
                .into_iter()
                .map(|tag| (tag.tag_key, tag.tag_value))
                .collect::<BTreeMap<_, _>>(),
        }
    }
}

impl SlbClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    async fn load_balancer_page(&self, page_number: usize) -> Result<ResourcePage> {
        let page: LoadBalancersPage = self
            .rpc
            .call(
                "DescribeLoadBalancers",
                &[
                    ("PageNumber", page_number.to_string()),
                    ("PageSize", PAGE_SIZE.to_string()),
                ],
            )
            .await?;
        let page = page.into_resource_page(self.rpc.region());
        trace!(region = self.rpc.region(), page_number, listed = page.resources.len(), "Listed load balancers");
        Ok(page)
    }
}

impl ResourceLister for SlbClient {
    fn region(&self) -> &str {
        self.rpc.region()
    }

    fn list_resources(&self, page_number: usize) -> BoxFuture<'_, Result<ResourcePage>> {
        Box::pin(self.load_balancer_page(page_number))
    }
}

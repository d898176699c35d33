use crate::{
    cache::{
        MetricKey,
        ResourceTags,
        ResponseCache,
        TagCache,
        RESPONSE_TTL,
        TAG_TTL,
    },
    cms::{
        default_cms_endpoint,
        CmsClient,
        CMS_VERSION,
    },
    error::{
        ClientError,
        Result,
    },
    rate_limiter::RateLimiter,
    remote::{
        MetricResponse,
        MetricSource,
        ResourceLister,
        TaggedResource,
    },
    rpc::{
        Credentials,
        RpcClient,
    },
    slb::{
        slb_endpoint,
        SlbClient,
        SLB_VERSION,
    },
};
use alicloud_exporter_config::AlicloudConfig;
use derive_more::Deref;
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// Upper bound on `NextToken` pages followed for one metric.
pub const MAX_METRIC_PAGES: usize = 100;
/// Upper bound on listing pages requested from one region.
pub const MAX_RESOURCE_PAGES: usize = 100;

/// Tags and region per requested resource id. Every requested id is present;
/// ids that exist in no region map to an empty [`ResourceTags`].
#[derive(Debug, Default, Clone, PartialEq, Deref)]
pub struct TagLookup(HashMap<String, ResourceTags>);

impl TagLookup {
    pub fn region(&self, id: &str) -> Option<&str> {
        self.0.get(id).and_then(|resource| resource.region.as_deref())
    }

    pub fn tag(&self, id: &str, key: &str) -> Option<&str> {
        self.0
            .get(id)
            .and_then(|resource| resource.tags.get(key))
            .map(String::as_str)
    }
}

/// Entry point for every remote call. Owns the shared rate limiter and both
/// caches, and one resource lister per configured region.
pub struct ApiClient {
    metrics: Arc<dyn MetricSource>,
    regions: Vec<Arc<dyn ResourceLister>>,
    primary_region: String,
    rate_limiter: RateLimiter,
    responses: ResponseCache,
    tags: TagCache,
    max_wait: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("primary_region", &self.primary_region)
            .field(
                "regions",
                &self.regions.iter().map(|lister| lister.region()).collect::<Vec<_>>(),
            )
            .field("rate_limiter", &self.rate_limiter)
            .field("cached_responses", &self.responses.len())
            .field("cached_tags", &self.tags.len())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        metrics: Arc<dyn MetricSource>,
        regions: Vec<Arc<dyn ResourceLister>>,
        primary_region: impl Into<String>,
        rate_limiter: RateLimiter,
        max_wait: Duration,
    ) -> Self {
        Self {
            metrics,
            regions,
            primary_region: primary_region.into(),
            rate_limiter,
            responses: ResponseCache::new(RESPONSE_TTL),
            tags: TagCache::new(TAG_TTL),
            max_wait,
        }
    }

    /// Builds the HTTPS backends for the configured account. Starts the rate
    /// limiter, so this must be called inside a tokio runtime.
    pub fn from_config(config: &AlicloudConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("alicloud-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let credentials = Credentials::new(&config.access_key_id, &config.access_key_secret);

        let cms_endpoint = config
            .cms_endpoint
            .clone()
            .unwrap_or_else(|| default_cms_endpoint(&config.region));
        let metrics = CmsClient::new(RpcClient::new(
            http.clone(),
            cms_endpoint,
            CMS_VERSION,
            &config.region,
            credentials.clone(),
        ));

        let regions = config
            .regions()
            .into_iter()
            .map(|region| {
                let rpc = RpcClient::new(
                    http.clone(),
                    slb_endpoint(config.slb_endpoint.as_deref(), &region),
                    SLB_VERSION,
                    region,
                    credentials.clone(),
                );
                Arc::new(SlbClient::new(rpc)) as Arc<dyn ResourceLister>
            })
            .collect::<Vec<_>>();

        let limiter = RateLimiter::new(config.rate_limit.requests_per_second, config.rate_limit.burst);
        info!(
            region = %config.region,
            regions = regions.len(),
            requests_per_second = config.rate_limit.requests_per_second,
            burst = config.rate_limit.burst,
            "Alibaba Cloud client ready"
        );

        Ok(Self::new(
            Arc::new(metrics),
            regions,
            &config.region,
            limiter,
            config.rate_limit.max_wait(),
        ))
    }

    pub fn primary_region(&self) -> &str {
        &self.primary_region
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Latest data points of one metric. Served from the response cache when
    /// possible; failures are returned as is and never cached.
    pub async fn fetch_metric(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        metric: &str,
    ) -> Result<Arc<MetricResponse>> {
        let key = MetricKey::new(namespace, metric);
        if let Some(cached) = self.responses.get(&key) {
            trace!(%key, "Metric response served from cache");
            return Ok(cached);
        }

        let mut datapoints = Vec::new();
        let mut request_id = None;
        let mut next_token: Option<String> = None;
        for page_index in 0..MAX_METRIC_PAGES {
            self.rate_limiter.acquire(cancel, self.max_wait).await?;
            let page = cancellable(
                cancel,
                self.metrics
                    .describe_metric_last(namespace, metric, next_token.as_deref()),
            )
            .await?;
            datapoints.extend(page.datapoints);
            request_id = request_id.or(page.request_id);
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
            if page_index + 1 == MAX_METRIC_PAGES {
                warn!(%key, pages = MAX_METRIC_PAGES, "Page limit reached, remaining data points dropped");
            }
        }

        let response = Arc::new(MetricResponse {
            namespace: namespace.to_string(),
            metric: metric.to_string(),
            datapoints,
            request_id,
        });
        debug!(%key, datapoints = response.datapoints.len(), "Fetched metric");

        self.responses.set(key, response.clone());
        Ok(response)
    }

    /// Resolves tags and region for `ids`. Cached ids cost nothing; the rest
    /// are looked up region by region until all are found. A region whose
    /// listing fails is skipped. Ids found nowhere are cached as empty.
    #[instrument(level = "debug", skip_all, fields(requested = ids.len()))]
    pub async fn fetch_tags_with_region(&self, cancel: &CancellationToken, ids: &[String]) -> Result<TagLookup> {
        let mut resolved = HashMap::with_capacity(ids.len());
        let mut outstanding = HashSet::new();
        for id in ids {
            if resolved.contains_key(id) || outstanding.contains(id) {
                continue;
            }
            match self.tags.get(id) {
                Some(resource) => {
                    resolved.insert(id.clone(), resource);
                }
                None => {
                    outstanding.insert(id.clone());
                }
            }
        }

        if outstanding.is_empty() {
            trace!("All tags served from cache");
            return Ok(TagLookup(resolved));
        }
        debug!(outstanding = outstanding.len(), "Looking up resource tags");

        for lister in &self.regions {
            if outstanding.is_empty() {
                break;
            }

            let resources = match self.list_region(cancel, lister.as_ref()).await {
                Ok(resources) => resources,
                Err(err) if err.is_admission() => return Err(err),
                Err(err) => {
                    warn!(region = lister.region(), error = %err, "Failed to list resources, skipping region");
                    continue;
                }
            };

            for resource in resources {
                if outstanding.remove(&resource.id) {
                    let entry = ResourceTags {
                        region: Some(resource.region),
                        tags: resource.tags,
                    };
                    self.tags.set(resource.id.clone(), entry.clone());
                    resolved.insert(resource.id, entry);
                }
            }
        }

        if !outstanding.is_empty() {
            debug!(missing = outstanding.len(), "Resources not found in any region");
        }
        for id in outstanding {
            self.tags.set(id.clone(), ResourceTags::default());
            resolved.insert(id, ResourceTags::default());
        }

        Ok(TagLookup(resolved))
    }

    /// Every resource of one region. Each page costs one rate limiter token.
    async fn list_region(&self, cancel: &CancellationToken, lister: &dyn ResourceLister) -> Result<Vec<TaggedResource>> {
        let mut resources = Vec::new();
        for page_number in 1..=MAX_RESOURCE_PAGES {
            self.rate_limiter.acquire(cancel, self.max_wait).await?;
            let page = cancellable(cancel, lister.list_resources(page_number)).await?;
            let listed = page.resources.len();
            resources.extend(page.resources);
            if listed == 0 || resources.len() >= page.total_count {
                return Ok(resources);
            }
        }
        warn!(
            region = lister.region(),
            pages = MAX_RESOURCE_PAGES,
            listed = resources.len(),
            "Page limit reached, listing truncated"
        );
        Ok(resources)
    }

    /// Checks that the API is reachable with the configured credentials.
    pub async fn health(&self, cancel: &CancellationToken) -> Result<()> {
        self.rate_limiter.acquire(cancel, self.max_wait).await?;
        cancellable(cancel, self.metrics.ping()).await
    }

    /// Drops expired cache entries, returning (responses, tags) removed.
    pub fn sweep_caches(&self) -> (usize, usize) {
        (self.responses.sweep(), self.tags.sweep())
    }

    pub fn close(&self) {
        self.rate_limiter.close();
    }
}

async fn cancellable<T>(cancel: &CancellationToken, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        datapoint,
        FakeMetricSource,
        FakeRegion,
    };
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn client(metrics: Arc<FakeMetricSource>, regions: Vec<Arc<FakeRegion>>) -> ApiClient {
        ApiClient::new(
            metrics,
            regions
                .into_iter()
                .map(|region| region as Arc<dyn ResourceLister>)
                .collect(),
            "cn-hangzhou",
            RateLimiter::new(100, 100),
            Duration::from_secs(5),
        )
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_metric_is_cached_within_ttl() {
        let metrics = Arc::new(FakeMetricSource::new().with_datapoints(
            "acs_kvstore",
            "CpuUsage",
            vec![datapoint("r-1", 12.0)],
        ));
        let client = client(metrics.clone(), vec![]);
        let cancel = CancellationToken::new();

        let first = client.fetch_metric(&cancel, "acs_kvstore", "CpuUsage").await.unwrap();
        let second = client.fetch_metric(&cancel, "acs_kvstore", "CpuUsage").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(metrics.calls(), 1);

        tokio::time::advance(RESPONSE_TTL + Duration::from_secs(1)).await;
        client.fetch_metric(&cancel, "acs_kvstore", "CpuUsage").await.unwrap();
        assert_eq!(metrics.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_metric_failures_are_not_cached() {
        let metrics = Arc::new(FakeMetricSource::new().with_failure("CpuUsage"));
        let client = client(metrics.clone(), vec![]);
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let err = client.fetch_metric(&cancel, "acs_kvstore", "CpuUsage").await.unwrap_err();
            assert!(matches!(err, ClientError::Remote { .. }));
        }
        assert_eq!(metrics.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_metric_observes_cancellation() {
        let metrics = Arc::new(FakeMetricSource::new().with_delay("acs_kvstore", Duration::from_secs(3600)));
        let client = client(metrics, vec![]);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = client.fetch_metric(&cancel, "acs_kvstore", "CpuUsage").await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_metric_surfaces_rate_limit_timeout() {
        let metrics = Arc::new(FakeMetricSource::new());
        let client = ApiClient::new(
            metrics.clone(),
            vec![],
            "cn-hangzhou",
            RateLimiter::new(1, 1),
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();

        client.fetch_metric(&cancel, "ns", "a").await.unwrap();
        let err = client.fetch_metric(&cancel, "ns", "b").await.unwrap_err();
        assert!(matches!(err, ClientError::RateLimitTimeout));
        assert_eq!(metrics.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn paged_metric_costs_one_token_per_page() {
        let points = (1..=5).map(|i| datapoint(&format!("r-{i}"), i as f64)).collect::<Vec<_>>();
        let metrics = Arc::new(
            FakeMetricSource::new()
                .with_datapoints("acs_kvstore", "CpuUsage", points.clone())
                .with_page_size(2),
        );
        let client = ApiClient::new(
            metrics.clone(),
            vec![],
            "cn-hangzhou",
            RateLimiter::new(1, 3),
            Duration::from_secs(5),
        );

        let response = client
            .fetch_metric(&CancellationToken::new(), "acs_kvstore", "CpuUsage")
            .await
            .unwrap();
        assert_eq!(response.datapoints, points);
        assert_eq!(response.request_id.as_deref(), Some("fake-1"));
        assert_eq!(metrics.calls(), 3);
        assert_eq!(client.rate_limiter().available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paging_waits_for_tokens_like_any_other_call() {
        let points = (1..=5).map(|i| datapoint(&format!("r-{i}"), i as f64)).collect::<Vec<_>>();
        let metrics = Arc::new(
            FakeMetricSource::new()
                .with_datapoints("acs_kvstore", "CpuUsage", points)
                .with_page_size(2),
        );
        let client = ApiClient::new(
            metrics.clone(),
            vec![],
            "cn-hangzhou",
            RateLimiter::new(1, 2),
            Duration::from_millis(10),
        );

        let err = client
            .fetch_metric(&CancellationToken::new(), "acs_kvstore", "CpuUsage")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RateLimitTimeout));
        assert_eq!(metrics.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn paged_region_listing_costs_one_token_per_page() {
        let mut region = FakeRegion::new("cn-hangzhou").with_page_size(2);
        for i in 1..=5 {
            region = region.with_resource(&format!("lb-{i}"), &[("team", "infra")]);
        }
        let region = Arc::new(region);
        let client = ApiClient::new(
            Arc::new(FakeMetricSource::new()),
            vec![region.clone() as Arc<dyn ResourceLister>],
            "cn-hangzhou",
            RateLimiter::new(1, 3),
            Duration::from_secs(5),
        );

        let lookup = client
            .fetch_tags_with_region(&CancellationToken::new(), &ids(&["lb-5"]))
            .await
            .unwrap();
        assert_eq!(lookup.tag("lb-5", "team"), Some("infra"));
        assert_eq!(region.calls(), 3);
        assert_eq!(client.rate_limiter().available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tags_are_resolved_across_regions() {
        let hangzhou = Arc::new(FakeRegion::new("cn-hangzhou").with_resource("lb-1", &[("team", "infra")]));
        let shanghai = Arc::new(FakeRegion::new("cn-shanghai").with_resource("lb-2", &[("Name", "web")]));
        let client = client(Arc::new(FakeMetricSource::new()), vec![hangzhou.clone(), shanghai.clone()]);

        let lookup = client
            .fetch_tags_with_region(&CancellationToken::new(), &ids(&["lb-1", "lb-2"]))
            .await
            .unwrap();

        assert_eq!(lookup.region("lb-1"), Some("cn-hangzhou"));
        assert_eq!(lookup.tag("lb-1", "team"), Some("infra"));
        assert_eq!(lookup.region("lb-2"), Some("cn-shanghai"));
        assert_eq!(lookup.tag("lb-2", "Name"), Some("web"));
        assert_eq!(hangzhou.calls(), 1);
        assert_eq!(shanghai.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_stops_once_everything_is_resolved() {
        let hangzhou = Arc::new(FakeRegion::new("cn-hangzhou").with_resource("lb-1", &[]));
        let shanghai = Arc::new(FakeRegion::new("cn-shanghai").with_resource("lb-2", &[]));
        let client = client(Arc::new(FakeMetricSource::new()), vec![hangzhou.clone(), shanghai.clone()]);

        client
            .fetch_tags_with_region(&CancellationToken::new(), &ids(&["lb-1"]))
            .await
            .unwrap();
        assert_eq!(hangzhou.calls(), 1);
        assert_eq!(shanghai.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_lookup_is_served_from_cache() {
        let hangzhou = Arc::new(FakeRegion::new("cn-hangzhou").with_resource("lb-1", &[("team", "infra")]));
        let client = client(Arc::new(FakeMetricSource::new()), vec![hangzhou.clone()]);
        let cancel = CancellationToken::new();
        let requested = ids(&["lb-1", "lb-missing"]);

        let first = client.fetch_tags_with_region(&cancel, &requested).await.unwrap();
        let second = client.fetch_tags_with_region(&cancel, &requested).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(hangzhou.calls(), 1);
        assert_eq!(second.get("lb-missing"), Some(&ResourceTags::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_region_is_skipped() {
        let broken = Arc::new(FakeRegion::failing("cn-beijing"));
        let shanghai = Arc::new(FakeRegion::new("cn-shanghai").with_resource("lb-2", &[("Group", "web")]));
        let client = client(Arc::new(FakeMetricSource::new()), vec![broken.clone(), shanghai.clone()]);

        let lookup = client
            .fetch_tags_with_region(&CancellationToken::new(), &ids(&["lb-2", "lb-3"]))
            .await
            .unwrap();

        assert_eq!(broken.calls(), 1);
        assert_eq!(
            lookup.get("lb-2"),
            Some(&ResourceTags {
                region: Some("cn-shanghai".to_string()),
                tags: BTreeMap::from([("Group".to_string(), "web".to_string())]),
            })
        );
        assert_eq!(lookup.get("lb-3"), Some(&ResourceTags::default()));
        assert_eq!(lookup.region("lb-3"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ids_are_looked_up_once() {
        let hangzhou = Arc::new(FakeRegion::new("cn-hangzhou").with_resource("lb-1", &[]));
        let client = client(Arc::new(FakeMetricSource::new()), vec![hangzhou.clone()]);

        let lookup = client
            .fetch_tags_with_region(&CancellationToken::new(), &ids(&["lb-1", "lb-1", "lb-1"]))
            .await
            .unwrap();
        assert_eq!(lookup.len(), 1);
        assert_eq!(hangzhou.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn health_uses_ping() {
        let metrics = Arc::new(FakeMetricSource::new());
        let healthy = client(metrics.clone(), vec![]);
        healthy.health(&CancellationToken::new()).await.unwrap();
        assert_eq!(metrics.pings(), 1);

        let unhealthy = client(Arc::new(FakeMetricSource::new().with_failing_ping()), vec![]);
        assert!(unhealthy.health(&CancellationToken::new()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_client_rejects_calls() {
        let metrics = Arc::new(FakeMetricSource::new());
        let client = client(metrics.clone(), vec![]);
        client.close();

        let err = client
            .fetch_metric(&CancellationToken::new(), "ns", "m")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RateLimiterClosed));
        assert_eq!(metrics.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_expired_entries() {
        let hangzhou = Arc::new(FakeRegion::new("cn-hangzhou"));
        let client = client(Arc::new(FakeMetricSource::new()), vec![hangzhou]);
        let cancel = CancellationToken::new();
        client.fetch_metric(&cancel, "ns", "m").await.unwrap();
        client.fetch_tags_with_region(&cancel, &ids(&["lb-1"])).await.unwrap();

        assert_eq!(client.sweep_caches(), (0, 0));
        tokio::time::advance(RESPONSE_TTL + Duration::from_secs(1)).await;
        assert_eq!(client.sweep_caches(), (1, 0));
        tokio::time::advance(TAG_TTL).await;
        assert_eq!(client.sweep_caches(), (0, 1));
    }
}

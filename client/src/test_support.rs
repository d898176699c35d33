//! In-memory stand-ins for the remote seams, with call counters.

use crate::{
    error::{
        ClientError,
        Result,
    },
    remote::{
        Datapoint,
        MetricPage,
        MetricSource,
        ResourceLister,
        ResourcePage,
        TaggedResource,
    },
};
use futures::future::BoxFuture;
use std::{
    collections::{
        BTreeMap,
        HashMap,
        HashSet,
    },
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
    time::Duration,
};

pub fn datapoint(instance_id: &str, average: f64) -> Datapoint {
    Datapoint {
        timestamp: 1_700_000_000_000,
        instance_id: instance_id.to_string(),
        average: Some(average),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub struct FakeMetricSource {
    datapoints: HashMap<(String, String), Vec<Datapoint>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    metric_delays: HashMap<String, Duration>,
    page_size: Option<usize>,
    ping_fails: bool,
    calls: AtomicUsize,
    pings: AtomicUsize,
}

impl FakeMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datapoints(mut self, namespace: &str, metric: &str, datapoints: Vec<Datapoint>) -> Self {
        self.datapoints
            .insert((namespace.to_string(), metric.to_string()), datapoints);
        self
    }

    /// Every fetch of `metric` fails, whatever the namespace.
    pub fn with_failure(mut self, metric: &str) -> Self {
        self.failing.insert(metric.to_string());
        self
    }

    /// Every fetch in `namespace` sleeps first.
    pub fn with_delay(mut self, namespace: &str, delay: Duration) -> Self {
        self.delays.insert(namespace.to_string(), delay);
        self
    }

    /// Every fetch of `metric` sleeps first, whatever the namespace.
    pub fn with_metric_delay(mut self, metric: &str, delay: Duration) -> Self {
        self.metric_delays.insert(metric.to_string(), delay);
        self
    }

    /// Serves data points `page_size` at a time, chained by `NextToken`.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    pub fn with_failing_ping(mut self) -> Self {
        self.ping_fails = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

impl MetricSource for FakeMetricSource {
    fn describe_metric_last<'a>(
        &'a self,
        namespace: &'a str,
        metric: &'a str,
        next_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<MetricPage>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.get(namespace).or_else(|| self.metric_delays.get(metric));
            if let Some(delay) = delay {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(metric) {
                return Err(ClientError::Remote {
                    api: "DescribeMetricLast",
                    message: format!("injected failure for {metric}"),
                });
            }

            let all = self
                .datapoints
                .get(&(namespace.to_string(), metric.to_string()))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let offset = next_token.and_then(|token| token.parse::<usize>().ok()).unwrap_or(0);
            let end = match self.page_size {
                Some(size) => (offset + size).min(all.len()),
                None => all.len(),
            };
            Ok(MetricPage {
                datapoints: all.get(offset..end).map(<[Datapoint]>::to_vec).unwrap_or_default(),
                next_token: (end < all.len()).then(|| end.to_string()),
                request_id: Some(format!("fake-{}", self.calls())),
            })
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.ping_fails {
                return Err(ClientError::Remote {
                    api: "DescribeMetricMetaList",
                    message: "injected ping failure".to_string(),
                });
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct FakeRegion {
    region: String,
    resources: Vec<TaggedResource>,
    page_size: Option<usize>,
    fails: bool,
    calls: AtomicUsize,
}

impl FakeRegion {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            resources: Vec::new(),
            page_size: None,
            fails: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A region whose listing always fails.
    pub fn failing(region: &str) -> Self {
        Self {
            fails: true,
            ..Self::new(region)
        }
    }

    pub fn with_resource(mut self, id: &str, tags: &[(&str, &str)]) -> Self {
        self.resources.push(TaggedResource {
            id: id.to_string(),
            region: self.region.clone(),
            tags: tags
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect::<BTreeMap<_, _>>(),
        });
        self
    }

    /// Lists resources `page_size` at a time.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ResourceLister for FakeRegion {
    fn region(&self) -> &str {
        &self.region
    }

    fn list_resources(&self, page_number: usize) -> BoxFuture<'_, Result<ResourcePage>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                return Err(ClientError::Remote {
                    api: "DescribeLoadBalancers",
                    message: format!("injected failure in {}", self.region),
                });
            }
            let size = self.page_size.unwrap_or(self.resources.len().max(1));
            let resources = self
                .resources
                .iter()
                .skip(page_number.saturating_sub(1) * size)
                .take(size)
                .cloned()
                .collect();
            Ok(ResourcePage {
                resources,
                total_count: self.resources.len(),
            })
        })
    }
}

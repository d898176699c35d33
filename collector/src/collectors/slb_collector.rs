use super::{
    CollectionSupport,
    SampleSink,
    ServiceCollector,
};
use crate::{
    error::CollectError,
    metrics::Descriptor,
};
use alicloud_client::{
    ApiClient,
    Datapoint,
    TagLookup,
};
use alicloud_exporter_config::{
    PrometheusConfig,
    ServiceConfig,
    ServiceKind,
};
use std::{
    collections::BTreeSet,
    future::Future,
    pin::Pin,
    sync::Arc,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tag keys surfaced as labels, with the casings looked up for each.
pub const TAG_LABELS: [(&str, [&str; 2]); 3] = [
    ("team", ["team", "Team"]),
    ("group", ["Group", "group"]),
    ("name", ["Name", "name"]),
];

/// Collector for load balancers. Samples are joined with the tags and region
/// of their instance; any tag outside [`TAG_LABELS`] is dropped.
pub struct SlbCollector {
    support: CollectionSupport,
    enrich_region: bool,
}

impl SlbCollector {
    pub fn new(client: Arc<ApiClient>, config: &ServiceConfig, prometheus: &PrometheusConfig) -> Self {
        let label_names = Self::label_names(config.enrich_region);
        Self {
            support: CollectionSupport::new(ServiceKind::Slb, client, config, prometheus, &label_names),
            enrich_region: config.enrich_region,
        }
    }

    pub fn label_names(enrich_region: bool) -> Vec<&'static str> {
        let mut names = vec!["instance_id", "protocol", "port", "vip"];
        if enrich_region {
            names.push("region");
        }
        names.extend(TAG_LABELS.iter().map(|(label, _)| *label));
        names
    }

    pub fn support(&self) -> &CollectionSupport {
        &self.support
    }

    async fn run(&self, cancel: &CancellationToken, sink: &SampleSink) -> Result<(), CollectError> {
        let started = Instant::now();
        debug!(metrics = self.support.metrics().len(), "Starting SLB collection");

        let (responses, failed) = self.support.fetch_all(cancel).await;

        let instance_ids = responses
            .iter()
            .flat_map(|response| response.datapoints.iter())
            .map(|datapoint| datapoint.instance_id.as_str())
            .filter(|id| !id.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let lookup = self.lookup_tags(cancel, &instance_ids).await;

        let mut emitted = 0;
        for response in &responses {
            let Some(descriptor) = self.support.descriptor(&response.metric) else {
                continue;
            };
            for datapoint in &response.datapoints {
                let labels = self.label_values(datapoint, &lookup);
                self.support.emit(sink, self.support.sample(&descriptor, labels, datapoint));
                emitted += 1;
            }
        }

        self.support.finish(cancel, started, emitted, failed, sink)
    }

    /// Enrichment never fails the collection; on error samples get empty tags.
    async fn lookup_tags(&self, cancel: &CancellationToken, instance_ids: &[String]) -> TagLookup {
        if instance_ids.is_empty() {
            return TagLookup::default();
        }
        match self.support.client().fetch_tags_with_region(cancel, instance_ids).await {
            Ok(lookup) => lookup,
            Err(err) => {
                warn!(error = %err, "Failed to get SLB instance tags, continuing without tags");
                TagLookup::default()
            }
        }
    }

    fn label_values(&self, datapoint: &Datapoint, lookup: &TagLookup) -> Vec<String> {
        let id = datapoint.instance_id.as_str();
        let mut values = vec![
            id.to_string(),
            datapoint.protocol.clone().unwrap_or_default(),
            datapoint.port.clone().unwrap_or_default(),
            datapoint.vip.clone().unwrap_or_default(),
        ];
        if self.enrich_region {
            let region = lookup
                .region(id)
                .unwrap_or_else(|| self.support.client().primary_region());
            values.push(region.to_string());
        }
        for (_, keys) in TAG_LABELS {
            let value = keys.iter().find_map(|key| lookup.tag(id, key)).unwrap_or_default();
            values.push(value.to_string());
        }
        values
    }
}

impl ServiceCollector for SlbCollector {
    fn name(&self) -> ServiceKind {
        ServiceKind::Slb
    }

    fn enabled(&self) -> bool {
        self.support.config().enabled
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.support.describe()
    }

    fn collect<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        sink: &'a SampleSink,
    ) -> Pin<Box<dyn Future<Output = Result<(), CollectError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.enabled() {
                return Ok(());
            }
            self.run(cancel, sink).await
        })
    }
}

use super::{
    CollectionSupport,
    SampleSink,
    ServiceCollector,
};
use crate::{
    error::CollectError,
    metrics::Descriptor,
};
use alicloud_client::ApiClient;
use alicloud_exporter_config::{
    PrometheusConfig,
    ServiceConfig,
    ServiceKind,
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const INSTANCE_LABELS: &[&str] = &["instance_id"];

/// Collector for services whose samples are identified by instance alone
/// (Redis, RDS).
pub struct StandardCollector {
    support: CollectionSupport,
}

impl StandardCollector {
    pub fn new(
        kind: ServiceKind,
        client: Arc<ApiClient>,
        config: &ServiceConfig,
        prometheus: &PrometheusConfig,
    ) -> Self {
        Self {
            support: CollectionSupport::new(kind, client, config, prometheus, INSTANCE_LABELS),
        }
    }

    pub fn support(&self) -> &CollectionSupport {
        &self.support
    }

    async fn run(&self, cancel: &CancellationToken, sink: &SampleSink) -> Result<(), CollectError> {
        let started = Instant::now();
        debug!(service = %self.support.kind(), metrics = self.support.metrics().len(), "Starting collection");

        let mut emitted = 0;
        let failed = self
            .support
            .fetch_each(cancel, |response| {
                let Some(descriptor) = self.support.descriptor(&response.metric) else {
                    return;
                };
                for datapoint in &response.datapoints {
                    let labels = vec![datapoint.instance_id.clone()];
                    self.support.emit(sink, self.support.sample(&descriptor, labels, datapoint));
                    emitted += 1;
                }
            })
            .await;

        self.support.finish(cancel, started, emitted, failed, sink)
    }
}

impl ServiceCollector for StandardCollector {
    fn name(&self) -> ServiceKind {
        self.support.kind()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collectors::test_helpers::{
            api_client,
            api_client_with,
            drain,
            prometheus,
            service_config,
        },
        metrics::Sample,
    };
    use alicloud_client::test_support::{
        datapoint,
        FakeMetricSource,
    };
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::unbounded_channel;

    const NAMESPACE: &str = "acs_kvstore";

    fn service_samples(samples: &[Sample]) -> Vec<(String, String, f64)> {
        let mut rows = samples
            .iter()
            .filter(|sample| !sample.name().contains("scrape_"))
            .map(|sample| {
                (
                    sample.name().to_string(),
                    sample.label("instance_id").unwrap_or_default().to_string(),
                    sample.value,
                )
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        rows
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failures_are_counted_and_do_not_stop_collection() {
        let metrics = ["CpuUsage", "MemoryUsage", "ConnectionUsage", "UsedQPS", "HitRate"];
        let source = FakeMetricSource::new()
            .with_datapoints(NAMESPACE, "CpuUsage", vec![datapoint("r-1", 10.0)])
            .with_datapoints(NAMESPACE, "ConnectionUsage", vec![datapoint("r-1", 30.0)])
            .with_datapoints(NAMESPACE, "HitRate", vec![datapoint("r-1", 99.0), datapoint("r-2", 98.0)])
            .with_failure("MemoryUsage")
            .with_failure("UsedQPS");
        let collector = StandardCollector::new(
            ServiceKind::Redis,
            api_client(source, vec![]),
            &service_config(NAMESPACE, &metrics),
            &prometheus(),
        );
        let (sink, receiver) = unbounded_channel();

        let err = collector
            .collect(&CancellationToken::new(), &sink)
            .await
            .unwrap_err();
        match err {
            CollectError::Partial {
                service,
                failed,
                total,
            } => {
                assert_eq!(service, ServiceKind::Redis);
                assert_eq!(failed, 2);
                assert_eq!(total, 5);
            }
            other => panic!("unexpected error: {other}"),
        }

        drop(sink);
        let samples = drain(receiver);
        assert_eq!(
            service_samples(&samples),
            vec![
                ("alicloud_redis_ConnectionUsage".to_string(), "r-1".to_string(), 30.0),
                ("alicloud_redis_CpuUsage".to_string(), "r-1".to_string(), 10.0),
                ("alicloud_redis_HitRate".to_string(), "r-1".to_string(), 99.0),
                ("alicloud_redis_HitRate".to_string(), "r-2".to_string(), 98.0),
            ]
        );

        let errors = samples
            .iter()
            .find(|sample| sample.name() == "alicloud_redis_scrape_errors_total")
            .unwrap();
        assert_eq!(errors.value, 1.0);
        assert_eq!(collector.support().stats().errors_total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_results_are_not_errors() {
        let collector = StandardCollector::new(
            ServiceKind::Rds,
            api_client(FakeMetricSource::new(), vec![]),
            &service_config("acs_rds_dashboard", &["CpuUsage", "DiskUsage"]),
            &prometheus(),
        );
        let (sink, receiver) = unbounded_channel();

        collector.collect(&CancellationToken::new(), &sink).await.unwrap();
        drop(sink);

        let samples = drain(receiver);
        assert!(service_samples(&samples).is_empty());
        // Internal series are always emitted.
        assert_eq!(samples.len(), 2);
        assert!(collector.support().stats().last_scrape.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_collector_is_a_no_op() {
        let source = Arc::new(FakeMetricSource::new());
        let mut config = service_config(NAMESPACE, &["CpuUsage"]);
        config.enabled = false;
        let collector = StandardCollector::new(
            ServiceKind::Redis,
            api_client_with(source.clone(), vec![]),
            &config,
            &prometheus(),
        );
        let (sink, receiver) = unbounded_channel();

        collector.collect(&CancellationToken::new(), &sink).await.unwrap();
        drop(sink);
        assert!(drain(receiver).is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_metric_list_uses_catalog() {
        let collector = StandardCollector::new(
            ServiceKind::Redis,
            api_client(FakeMetricSource::new(), vec![]),
            &service_config(NAMESPACE, &[]),
            &prometheus(),
        );
        assert_eq!(collector.support().metrics().len(), crate::catalog::REDIS_METRICS.len());

        let names = collector
            .describe()
            .iter()
            .map(|descriptor| descriptor.fq_name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names[0], "alicloud_redis_ConnectionUsage");
        assert_eq!(names.len(), crate::catalog::REDIS_METRICS.len() + 2);
        assert!(names.contains(&"alicloud_redis_scrape_errors_total".to_string()));
        assert!(names.contains(&"alicloud_redis_scrape_duration_seconds".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn descriptors_carry_global_labels() {
        let mut prometheus = prometheus();
        prometheus.global_labels.insert("env".to_string(), "prod".to_string());
        let collector = StandardCollector::new(
            ServiceKind::Rds,
            api_client(FakeMetricSource::new(), vec![]),
            &service_config("acs_rds_dashboard", &["CpuUsage"]),
            &prometheus,
        );
        let descriptors = collector.describe();
        assert_eq!(descriptors[0].label_names, vec!["instance_id".to_string()]);
        assert!(descriptors
            .iter()
            .all(|descriptor| descriptor.const_labels.get("env").map(String::as_str) == Some("prod")));
    }

    #[tokio::test(start_paused = true)]
    async fn timestamps_are_emitted_when_enabled() {
        let mut prometheus = prometheus();
        prometheus.emit_timestamps = true;
        let source = FakeMetricSource::new().with_datapoints(NAMESPACE, "CpuUsage", vec![datapoint("r-1", 1.0)]);
        let collector = StandardCollector::new(
            ServiceKind::Redis,
            api_client(source, vec![]),
            &service_config(NAMESPACE, &["CpuUsage"]),
            &prometheus,
        );
        let (sink, receiver) = unbounded_channel();
        collector.collect(&CancellationToken::new(), &sink).await.unwrap();
        drop(sink);

        let samples = drain(receiver);
        let cpu = samples
            .iter()
            .find(|sample| sample.name() == "alicloud_redis_CpuUsage")
            .unwrap();
        assert_eq!(cpu.timestamp_ms, Some(1_700_000_000_000));
    }
}

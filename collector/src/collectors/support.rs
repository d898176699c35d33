use super::{
    catalog,
    SampleSink,
};
use crate::{
    error::CollectError,
    metrics::{
        build_fq_name,
        Descriptor,
        MetricType,
        Sample,
    },
};
use alicloud_client::{
    ApiClient,
    Datapoint,
    MetricResponse,
};
use alicloud_exporter_config::{
    PrometheusConfig,
    ServiceConfig,
    ServiceKind,
};
use chrono::{
    DateTime,
    Utc,
};
use futures::{
    stream,
    StreamExt,
};
use parking_lot::Mutex;
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    pin::pin,
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollectorStats {
    /// Collection runs that had at least one failed metric.
    pub errors_total: u64,
    pub last_duration: Duration,
    pub last_scrape: Option<DateTime<Utc>>,
}

/// State and behaviour shared by every service collector: the resolved metric
/// list, descriptors, bounded fetching and the per-service internal series.
pub struct CollectionSupport {
    kind: ServiceKind,
    client: Arc<ApiClient>,
    config: ServiceConfig,
    metrics: Vec<String>,
    emit_timestamps: bool,
    descriptors: HashMap<String, Arc<Descriptor>>,
    scrape_errors: Arc<Descriptor>,
    scrape_duration: Arc<Descriptor>,
    stats: Mutex<CollectorStats>,
}

impl CollectionSupport {
    /// `label_names` are the per-sample labels of every metric of the service.
    pub fn new(
        kind: ServiceKind,
        client: Arc<ApiClient>,
        config: &ServiceConfig,
        prometheus: &PrometheusConfig,
        label_names: &[&str],
    ) -> Self {
        let configured = if config.metrics.is_empty() {
            catalog::metrics(kind).iter().map(|metric| metric.to_string()).collect()
        } else {
            config.metrics.clone()
        };
        let mut seen = HashSet::new();
        let metrics = configured
            .into_iter()
            .filter(|metric| seen.insert(metric.clone()))
            .collect::<Vec<_>>();

        let prefix = prometheus.metric_prefix.as_str();
        let service = kind.as_ref();
        let descriptors = metrics
            .iter()
            .map(|metric| {
                let descriptor = Descriptor::new(
                    build_fq_name(&[prefix, service, metric]),
                    format!("{metric} metric from Alibaba Cloud CloudMonitor"),
                    MetricType::Gauge,
                    label_names,
                )
                .with_const_labels(&prometheus.global_labels);
                (metric.clone(), Arc::new(descriptor))
            })
            .collect();

        let scrape_errors = Descriptor::counter(
            build_fq_name(&[prefix, service, "scrape_errors_total"]),
            format!("Total number of scrape errors for {service} service"),
        )
        .with_const_labels(&prometheus.global_labels);
        let scrape_duration = Descriptor::gauge(
            build_fq_name(&[prefix, service, "scrape_duration_seconds"]),
            format!("Duration of the last scrape of {service} service"),
        )
        .with_const_labels(&prometheus.global_labels);

        Self {
            kind,
            client,
            config: config.clone(),
            metrics,
            emit_timestamps: prometheus.emit_timestamps,
            descriptors,
            scrape_errors: Arc::new(scrape_errors),
            scrape_duration: Arc::new(scrape_duration),
            stats: Mutex::new(CollectorStats::default()),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn descriptor(&self, metric: &str) -> Option<Arc<Descriptor>> {
        self.descriptors.get(metric).cloned()
    }

    pub fn stats(&self) -> CollectorStats {
        *self.stats.lock()
    }

    pub fn describe(&self) -> Vec<Arc<Descriptor>> {
        self.metrics
            .iter()
            .filter_map(|metric| self.descriptor(metric))
            .chain([self.scrape_errors.clone(), self.scrape_duration.clone()])
            .collect()
    }

    /// Fetches every configured metric with at most `max_concurrency` calls in
    /// flight, handing each response to `on_response` as soon as it arrives.
    /// Returns the number of failed metrics. After `cancel` fires the
    /// remaining fetches fail fast, so responses already received are kept.
    pub async fn fetch_each(
        &self,
        cancel: &CancellationToken,
        mut on_response: impl FnMut(Arc<MetricResponse>),
    ) -> usize {
        let limit = self.config.max_concurrency.max(1);
        let mut results = pin!(stream::iter(self.metrics.clone())
            .map(|metric| {
                let client = self.client.clone();
                let namespace = self.config.namespace.clone();
                let cancel = cancel.clone();
                async move {
                    client
                        .fetch_metric(&cancel, &namespace, &metric)
                        .await
                        .map_err(|source| CollectError::Metric { metric, source })
                }
            })
            .buffer_unordered(limit));

        let mut failed = 0;
        while let Some(result) = results.next().await {
            match result {
                Ok(response) => on_response(response),
                Err(err) => {
                    failed += 1;
                    error!(service = %self.kind, error = %err, "Error collecting metric");
                }
            }
        }
        failed
    }

    /// Like [`fetch_each`](Self::fetch_each), collecting the responses.
    pub async fn fetch_all(&self, cancel: &CancellationToken) -> (Vec<Arc<MetricResponse>>, usize) {
        let mut responses = Vec::with_capacity(self.metrics.len());
        let failed = self.fetch_each(cancel, |response| responses.push(response)).await;
        (responses, failed)
    }

    pub fn sample(&self, descriptor: &Arc<Descriptor>, label_values: Vec<String>, datapoint: &Datapoint) -> Sample {
        let sample = Sample::new(descriptor.clone(), label_values, datapoint.value());
        if self.emit_timestamps && datapoint.timestamp > 0 {
            sample.with_timestamp(datapoint.timestamp)
        } else {
            sample
        }
    }

    pub fn emit(&self, sink: &SampleSink, sample: Sample) {
        if sink.send(sample).is_err() {
            trace!(service = %self.kind, "Sample receiver dropped");
        }
    }

    /// Records the run, emits the internal series and turns the failure count
    /// into the run's result. Failures after `cancel` fired are reported as a
    /// missed deadline.
    pub fn finish(
        &self,
        cancel: &CancellationToken,
        started: Instant,
        emitted: usize,
        failed: usize,
        sink: &SampleSink,
    ) -> Result<(), CollectError> {
        let duration = started.elapsed();
        let errors_total = {
            let mut stats = self.stats.lock();
            stats.last_duration = duration;
            stats.last_scrape = Some(Utc::now());
            if failed > 0 {
                stats.errors_total += 1;
            }
            stats.errors_total
        };

        self.emit(sink, Sample::new(self.scrape_errors.clone(), vec![], errors_total as f64));
        self.emit(sink, Sample::new(self.scrape_duration.clone(), vec![], duration.as_secs_f64()));
        debug!(service = %self.kind, samples = emitted, failed, ?duration, "Collection finished");

        if failed > 0 && cancel.is_cancelled() {
            return Err(CollectError::DeadlineExceeded);
        }
        if failed > 0 {
            return Err(CollectError::Partial {
                service: self.kind,
                failed,
                total: self.metrics.len(),
            });
        }
        Ok(())
    }
}

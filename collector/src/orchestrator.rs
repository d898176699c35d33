use crate::{
    collectors::{
        build_collectors,
        ServiceCollector,
    },
    error::CollectError,
    metrics::{
        build_fq_name,
        Descriptor,
        Sample,
    },
};
use alicloud_client::{
    ApiClient,
    ClientError,
};
use alicloud_exporter_config::{
    Config,
    PrometheusConfig,
    ScrapeConfig,
    ServiceKind,
};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc::unbounded_channel,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

/// How long a collector may keep running after the scrape deadline to emit
/// the samples it already fetched.
pub const DEADLINE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct CollectorFailure {
    pub service: ServiceKind,
    pub error: CollectError,
}

/// Aggregate result of one scrape.
#[derive(Debug)]
pub struct ScrapeOutcome {
    /// Samples returned, internal series included.
    pub total_samples: usize,
    pub collector_errors: Vec<CollectorFailure>,
    /// Error of the health check, if it ran and failed.
    pub health_error: Option<String>,
    pub duration: Duration,
    pub healthy: bool,
}

impl ScrapeOutcome {
    /// Failed collectors plus a failed health check.
    pub fn error_count(&self) -> usize {
        self.collector_errors.len() + usize::from(self.health_error.is_some())
    }
}

#[derive(Debug)]
pub struct Scrape {
    pub outcome: ScrapeOutcome,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub scrapes_total: u64,
    pub errors_total: u64,
}

struct InternalDescriptors {
    up: Arc<Descriptor>,
    scrapes_total: Arc<Descriptor>,
    scrape_errors_total: Arc<Descriptor>,
    scrape_duration: Arc<Descriptor>,
    last_scrape_timestamp: Arc<Descriptor>,
    last_scrape_error: Arc<Descriptor>,
}

impl InternalDescriptors {
    fn new(prometheus: &PrometheusConfig) -> Self {
        let prefix = prometheus.metric_prefix.as_str();
        let describe = |descriptor: Descriptor| Arc::new(descriptor.with_const_labels(&prometheus.global_labels));
        Self {
            up: describe(Descriptor::gauge(
                build_fq_name(&[prefix, "up"]),
                "Was the last scrape of Alibaba Cloud successful.",
            )),
            scrapes_total: describe(Descriptor::counter(
                build_fq_name(&[prefix, "scrapes_total"]),
                "Total number of times Alibaba Cloud was scraped for metrics.",
            )),
            scrape_errors_total: describe(Descriptor::counter(
                build_fq_name(&[prefix, "scrape_errors_total"]),
                "Total number of times an error occurred scraping Alibaba Cloud.",
            )),
            scrape_duration: describe(Descriptor::gauge(
                build_fq_name(&[prefix, "scrape_duration_seconds"]),
                "Time spent on the last scrape of Alibaba Cloud.",
            )),
            last_scrape_timestamp: describe(Descriptor::gauge(
                build_fq_name(&[prefix, "last_scrape_timestamp_seconds"]),
                "Unix timestamp of the last scrape of Alibaba Cloud.",
            )),
            last_scrape_error: describe(Descriptor::gauge(
                build_fq_name(&[prefix, "last_scrape_error"]),
                "Whether the last scrape of Alibaba Cloud resulted in an error (1 for error, 0 for success).",
            )),
        }
    }

    fn all(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.up.clone(),
            self.scrapes_total.clone(),
            self.scrape_errors_total.clone(),
            self.scrape_duration.clone(),
            self.last_scrape_timestamp.clone(),
            self.last_scrape_error.clone(),
        ]
    }
}

/// Runs every enabled collector concurrently under one scrape deadline and
/// folds their failures into a [`ScrapeOutcome`].
pub struct Orchestrator {
    client: Arc<ApiClient>,
    collectors: Vec<Arc<dyn ServiceCollector>>,
    timeout: Duration,
    health_check: bool,
    internal: InternalDescriptors,
    stats: Mutex<ScrapeStats>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<ApiClient>,
        collectors: Vec<Arc<dyn ServiceCollector>>,
        prometheus: &PrometheusConfig,
        scrape: &ScrapeConfig,
    ) -> Self {
        Self {
            client,
            collectors,
            timeout: scrape.timeout(),
            health_check: scrape.health_check,
            internal: InternalDescriptors::new(prometheus),
            stats: Mutex::new(ScrapeStats::default()),
        }
    }

    /// Builds the client and one collector per enabled service. Must be
    /// called inside a tokio runtime.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let client = Arc::new(ApiClient::from_config(&config.alicloud)?);
        let collectors = build_collectors(&client, config);
        info!(
            collectors = ?collectors.iter().map(|collector| collector.name()).collect::<Vec<_>>(),
            "Collectors initialized"
        );
        Ok(Self::new(client, collectors, &config.prometheus, &config.scrape))
    }

    pub fn collectors(&self) -> &[Arc<dyn ServiceCollector>] {
        &self.collectors
    }

    pub fn stats(&self) -> ScrapeStats {
        *self.stats.lock()
    }

    /// Internal families followed by those of every enabled collector.
    pub fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descriptors = self.internal.all();
        for collector in self.collectors.iter().filter(|collector| collector.enabled()) {
            descriptors.extend(collector.describe());
        }
        descriptors
    }

    /// Runs one scrape. Never fails: collector and health failures are
    /// reported through the outcome and the internal series.
    #[instrument(level = "debug", skip_all)]
    pub async fn scrape(&self) -> Scrape {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let _cancel_guard = cancel.clone().drop_guard();
        let deadline = tokio::spawn({
            let cancel = cancel.clone();
            let timeout = self.timeout;
            async move {
                tokio::time::sleep(timeout).await;
                warn!(?timeout, "Scrape deadline reached, cancelling collection");
                cancel.cancel();
            }
        });

        let health_error = if self.health_check {
            match self.client.health(&cancel).await {
                Ok(()) => None,
                Err(err) => {
                    error!(error = %err, "Alibaba Cloud health check failed");
                    Some(err.to_string())
                }
            }
        } else {
            None
        };

        let (sink, mut receiver) = unbounded_channel::<Sample>();
        let (services, handles): (Vec<_>, Vec<_>) = self
            .collectors
            .iter()
            .filter(|collector| collector.enabled())
            .map(|collector| {
                let service = collector.name();
                let collector = collector.clone();
                let cancel = cancel.clone();
                let sink = sink.clone();
                let handle = tokio::spawn(async move {
                    let mut collect = collector.collect(&cancel, &sink);
                    tokio::select! {
                        biased;
                        result = &mut collect => result,
                        _ = cancel.cancelled() => {
                            // In-flight calls observe the cancellation, so the collector
                            // gets a moment to emit what it already has.
                            match tokio::time::timeout(DEADLINE_GRACE, &mut collect).await {
                                Ok(result) => result,
                                Err(_) => {
                                    warn!(%service, "Collector ignored the scrape deadline");
                                    Err(CollectError::DeadlineExceeded)
                                }
                            }
                        }
                    }
                });
                (service, handle)
            })
            .unzip();
        drop(sink);

        let results = join_all(handles).await;
        deadline.abort();

        let mut collector_errors = Vec::new();
        for (service, joined) in services.into_iter().zip(results) {
            let result = joined.unwrap_or_else(|err| Err(CollectError::Panicked(err.to_string())));
            if let Err(error) = result {
                error!(%service, %error, "Collector failed");
                collector_errors.push(CollectorFailure { service, error });
            }
        }

        let mut samples = Vec::new();
        while let Ok(sample) = receiver.try_recv() {
            samples.push(sample);
        }

        let duration = started.elapsed();
        let healthy = health_error.is_none();
        let error_count = collector_errors.len() + usize::from(!healthy);
        let stats = {
            let mut stats = self.stats.lock();
            stats.scrapes_total += 1;
            stats.errors_total += error_count as u64;
            *stats
        };
        samples.extend(self.internal_samples(stats, healthy, error_count > 0, duration));

        let (responses, tags) = self.client.sweep_caches();
        if responses + tags > 0 {
            trace!(responses, tags, "Swept expired cache entries");
        }

        let outcome = ScrapeOutcome {
            total_samples: samples.len(),
            collector_errors,
            health_error,
            duration,
            healthy,
        };
        info!(
            samples = outcome.total_samples,
            errors = outcome.error_count(),
            ?duration,
            healthy,
            "Scrape finished"
        );

        Scrape { outcome, samples }
    }

    fn internal_samples(&self, stats: ScrapeStats, healthy: bool, failed: bool, duration: Duration) -> Vec<Sample> {
        let internal = &self.internal;
        let sample = |descriptor: &Arc<Descriptor>, value: f64| Sample::new(descriptor.clone(), vec![], value);
        vec![
            sample(&internal.up, if healthy { 1.0 } else { 0.0 }),
            sample(&internal.scrapes_total, stats.scrapes_total as f64),
            sample(&internal.scrape_errors_total, stats.errors_total as f64),
            sample(&internal.scrape_duration, duration.as_secs_f64()),
            sample(&internal.last_scrape_timestamp, Utc::now().timestamp() as f64),
            sample(&internal.last_scrape_error, if failed { 1.0 } else { 0.0 }),
        ]
    }

    /// Stops the shared rate limiter. Later scrapes report every call as failed.
    pub fn close(&self) {
        self.client.close();
        debug!("Orchestrator closed");
    }
}

use alicloud_client::ClientError;
use alicloud_exporter_config::ServiceKind;

#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error("metric {metric}: {source}")]
    Metric {
        metric: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to collect {failed} of {total} {service} metrics")]
    Partial {
        service: ServiceKind,
        failed: usize,
        total: usize,
    },
    #[error("collection did not finish before the scrape deadline")]
    DeadlineExceeded,
    #[error("collector task panicked: {0}")]
    Panicked(String),
}

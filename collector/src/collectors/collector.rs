use crate::{
    error::CollectError,
    metrics::{
        Descriptor,
        Sample,
    },
};
use alicloud_exporter_config::ServiceKind;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Receives the samples of a scrape as they are produced.
pub type SampleSink = UnboundedSender<Sample>;

/// Trait implemented by the collector of each monitored service
pub trait ServiceCollector: Send + Sync {
    fn name(&self) -> ServiceKind;

    fn enabled(&self) -> bool;

    /// Every family this collector can emit, available before any scrape.
    fn describe(&self) -> Vec<Arc<Descriptor>>;

    /// Sends the samples of one collection run to `sink`. Failures of single
    /// metrics do not stop the run; they are reported once at the end.
    fn collect<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        sink: &'a SampleSink,
    ) -> Pin<Box<dyn Future<Output = Result<(), CollectError>> + Send + 'a>>;
}

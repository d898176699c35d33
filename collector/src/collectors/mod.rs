//! # Collectors
//!
//! - **`ServiceCollector` trait**: the capability set every monitored service implements
//! - **`CollectionSupport`**: shared state and behaviour, composed into each collector
//! - **`StandardCollector`**: Redis and RDS, samples labelled by instance
//! - **`SlbCollector`**: load balancers, samples enriched with tags and region
//! - **`catalog`**: built-in metric names per service

pub mod catalog;
pub mod collector;
pub mod slb_collector;
pub mod standard_collector;
pub mod support;

pub use collector::{
    SampleSink,
    ServiceCollector,
};
pub use slb_collector::SlbCollector;
pub use standard_collector::StandardCollector;
pub use support::{
    CollectionSupport,
    CollectorStats,
};

use alicloud_client::ApiClient;
use alicloud_exporter_config::{
    Config,
    ServiceKind,
};
use std::sync::Arc;

/// One collector per enabled service, in `slb`, `redis`, `rds` order.
pub fn build_collectors(client: &Arc<ApiClient>, config: &Config) -> Vec<Arc<dyn ServiceCollector>> {
    config
        .services
        .enabled()
        .map(|(kind, service)| -> Arc<dyn ServiceCollector> {
            match kind {
                ServiceKind::Slb => Arc::new(SlbCollector::new(client.clone(), service, &config.prometheus)),
                ServiceKind::Redis | ServiceKind::Rds => Arc::new(StandardCollector::new(
                    kind,
                    client.clone(),
                    service,
                    &config.prometheus,
                )),
            }
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn builds_one_collector_per_enabled_service() {
        let mut config = Config::default();
        config.services.slb.enabled = true;
        config.services.rds.enabled = true;
        let client = test_helpers::api_client(alicloud_client::test_support::FakeMetricSource::new(), vec![]);

        let collectors = build_collectors(&client, &config);
        let names = collectors.iter().map(|collector| collector.name()).collect::<Vec<_>>();
        assert_eq!(names, vec![ServiceKind::Slb, ServiceKind::Rds]);
        assert!(collectors.iter().all(|collector| collector.enabled()));
    }
}

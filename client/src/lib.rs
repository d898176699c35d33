#[macro_use]
extern crate tracing;

mod api;
mod cache;
mod cms;
mod error;
mod rate_limiter;
mod remote;
mod rpc;
mod slb;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use api::{
    ApiClient,
    TagLookup,
};
pub use cache::{
    CacheEntry,
    MetricKey,
    ResourceTags,
    ResponseCache,
    TagCache,
    TtlCache,
    RESPONSE_TTL,
    TAG_TTL,
};
pub use cms::CmsClient;
pub use error::{
    ClientError,
    Result,
};
pub use rate_limiter::RateLimiter;
pub use remote::{
    Datapoint,
    MetricPage,
    MetricResponse,
    MetricSource,
    ResourceLister,
    ResourcePage,
    TaggedResource,
};
pub use rpc::{
    Credentials,
    RpcClient,
};
pub use slb::SlbClient;

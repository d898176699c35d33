use crate::{
    error::{
        ClientError,
        Result,
    },
    remote::{
        Datapoint,
        MetricPage,
        MetricSource,
    },
    rpc::RpcClient,
};
use futures::future::BoxFuture;
use serde::Deserialize;

pub const CMS_VERSION: &str = "2019-01-01";

const PAGE_LENGTH: usize = 1000;
const PING_NAMESPACE: &str = "acs_ecs_dashboard";

pub fn default_cms_endpoint(region: &str) -> String {
    format!("https://metrics.{region}.aliyuncs.com")
}

/// CloudMonitor client for the primary region.
#[derive(Debug, Clone)]
pub struct CmsClient {
    rpc: RpcClient,
}

/// Envelope fields shared by CloudMonitor responses. CloudMonitor reports
/// some failures with HTTP 200 and `Success: false`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Status {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl Status {
    fn check(&self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        Err(ClientError::Api {
            code: self.code.clone().unwrap_or_default(),
            message: self.message.clone().unwrap_or_default(),
            request_id: self.request_id.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetricLastPage {
    #[serde(flatten)]
    status: Status,
    #[serde(default)]
    next_token: Option<String>,
    /// JSON array encoded as a string.
    #[serde(default)]
    datapoints: Option<String>,
}

impl MetricLastPage {
    fn into_metric_page(self) -> Result<MetricPage> {
        self.status.check()?;
        Ok(MetricPage {
            datapoints: decode_datapoints(self.datapoints.as_deref())?,
            next_token: self.next_token.filter(|token| !token.is_empty()),
            request_id: self.status.request_id,
        })
    }
}

impl CmsClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    async fn metric_last_page(&self, namespace: &str, metric: &str, next_token: Option<&str>) -> Result<MetricPage> {
        let mut params = vec![
            ("Namespace", namespace.to_string()),
            ("MetricName", metric.to_string()),
            ("Length", PAGE_LENGTH.to_string()),
        ];
        if let Some(token) = next_token {
            params.push(("NextToken", token.to_string()));
        }

        let page: MetricLastPage = self.rpc.call("DescribeMetricLast", &params).await?;
        page.into_metric_page()
    }

    async fn metric_meta_list(&self) -> Result<()> {
        let status: Status = self
            .rpc
            .call(
                "DescribeMetricMetaList",
                &[("Namespace", PING_NAMESPACE.to_string()), ("PageSize", "1".to_string())],
            )
            .await?;
        status.check()
    }
}

impl MetricSource for CmsClient {
    fn describe_metric_last<'a>(
        &'a self,
        namespace: &'a str,
        metric: &'a str,
        next_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<MetricPage>> {
        Box::pin(self.metric_last_page(namespace, metric, next_token))
    }

    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.metric_meta_list())
    }
}

fn decode_datapoints(raw: Option<&str>) -> Result<Vec<Datapoint>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|source| ClientError::Decode {
            context: "DescribeMetricLast datapoints",
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_page_with_embedded_datapoints() {
        let body = r#"{
            "RequestId": "6A5F022D-AC7C-460E-94AE-B9E75083D027",
            "Success": true,
            "Code": "200",
            "Period": "60",
            "NextToken": "",
            "Datapoints": "[{\"timestamp\":1700000000000,\"instanceId\":\"r-1\",\"Average\":1.5,\"Maximum\":3}]"
        }"#;
        let page: MetricLastPage = serde_json::from_str(body).unwrap();
        let page = page.into_metric_page().unwrap();
        assert_eq!(page.next_token, None);
        assert_eq!(page.request_id.as_deref(), Some("6A5F022D-AC7C-460E-94AE-B9E75083D027"));
        assert_eq!(page.datapoints.len(), 1);
        assert_eq!(page.datapoints[0].instance_id, "r-1");
        assert_eq!(page.datapoints[0].value(), 1.5);
    }

    #[test]
    fn next_token_is_kept_when_more_pages_follow() {
        let body = r#"{"Success": true, "NextToken": "page-2", "Datapoints": "[]"}"#;
        let page: MetricLastPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.into_metric_page().unwrap().next_token.as_deref(), Some("page-2"));
    }

    #[test]
    fn missing_or_empty_datapoints_are_not_an_error() {
        assert_eq!(decode_datapoints(None).unwrap(), Vec::new());
        assert_eq!(decode_datapoints(Some("  ")).unwrap(), Vec::new());
        assert_eq!(decode_datapoints(Some("[]")).unwrap(), Vec::new());
    }

    #[test]
    fn malformed_datapoints_are_a_decode_error() {
        let err = decode_datapoints(Some("[{")).unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn unsuccessful_status_becomes_api_error() {
        let body = r#"{"RequestId": "req-1", "Success": false, "Code": "403", "Message": "denied"}"#;
        let status: Status = serde_json::from_str(body).unwrap();
        match status.check().unwrap_err() {
            ClientError::Api {
                code,
                message,
                request_id,
            } => {
                assert_eq!(code, "403");
                assert_eq!(message, "denied");
                assert_eq!(request_id, "req-1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_endpoint_uses_region() {
        assert_eq!(default_cms_endpoint("cn-beijing"), "https://metrics.cn-beijing.aliyuncs.com");
    }
}

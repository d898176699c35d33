//! Signed RPC-style requests against Alibaba Cloud product endpoints.
//!
//! Every request carries the common parameters and a signature computed as
//! `base64(HMAC-SHA1(secret + "&", "GET&%2F&" + encode(canonical_query)))`
//! where the canonical query is the sorted, RFC 3986 encoded parameter list.

use crate::error::{
    ClientError,
    Result,
};
use base64::Engine as _;
use chrono::{
    DateTime,
    Utc,
};
use hmac::{
    Hmac,
    Mac,
};
use serde::{
    de::DeserializeOwned,
    Deserialize,
};
use sha1::Sha1;
use std::{
    collections::BTreeMap,
    fmt,
};

type HmacSha1 = Hmac<Sha1>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    access_key_secret: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// Error body returned by the RPC endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
    version: &'static str,
    region: String,
    credentials: Credentials,
}

impl RpcClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        version: &'static str,
        region: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            version,
            region: region.into(),
            credentials,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub async fn call<T: DeserializeOwned>(&self, action: &'static str, params: &[(&str, String)]) -> Result<T> {
        let nonce = uuid::Uuid::new_v4().to_string();
        let query = self.signed_query(action, params, Utc::now(), &nonce)?;
        let url = format!("{}/?{query}", self.endpoint.trim_end_matches('/'));

        trace!(action, endpoint = %self.endpoint, "Sending RPC request");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ApiErrorBody>(&body) {
                Ok(error) => ClientError::Api {
                    code: error.code,
                    message: error.message,
                    request_id: error.request_id,
                },
                Err(_) => ClientError::Remote {
                    api: action,
                    message: format!("HTTP {status}: {}", String::from_utf8_lossy(&body)),
                },
            });
        }

        serde_json::from_slice(&body).map_err(|source| ClientError::Decode { context: action, source })
    }

    fn signed_query(
        &self,
        action: &str,
        params: &[(&str, String)],
        now: DateTime<Utc>,
        nonce: &str,
    ) -> Result<String> {
        let mut query = BTreeMap::from([
            ("AccessKeyId".to_string(), self.credentials.access_key_id.clone()),
            ("Action".to_string(), action.to_string()),
            ("Format".to_string(), "JSON".to_string()),
            ("RegionId".to_string(), self.region.clone()),
            ("SignatureMethod".to_string(), "HMAC-SHA1".to_string()),
            ("SignatureNonce".to_string(), nonce.to_string()),
            ("SignatureVersion".to_string(), "1.0".to_string()),
            ("Timestamp".to_string(), now.format(TIMESTAMP_FORMAT).to_string()),
            ("Version".to_string(), self.version.to_string()),
        ]);
        for (key, value) in params {
            query.insert((*key).to_string(), value.clone());
        }

        let canonical = canonicalize(&query);
        let signature = sign(&self.credentials.access_key_secret, &canonical)?;
        Ok(format!("{canonical}&Signature={}", encode(&signature)))
    }
}

/// RFC 3986 encoding: everything but `A-Z a-z 0-9 - _ . ~` is escaped.
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn canonicalize(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn string_to_sign(canonical: &str) -> String {
    format!("GET&{}&{}", encode("/"), encode(canonical))
}

fn sign(secret: &str, canonical: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(format!("{secret}&").as_bytes())
        .map_err(|err| ClientError::Signing(err.to_string()))?;
    mac.update(string_to_sign(canonical).as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

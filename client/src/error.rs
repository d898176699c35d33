#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Timed out waiting for a rate limiter token")]
    RateLimitTimeout,
    #[error("The rate limiter has been closed")]
    RateLimiterClosed,
    #[error("The request was cancelled")]
    Cancelled,
    #[error("{api} failed: {message}")]
    Remote { api: &'static str, message: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {code}: {message} (request id: {request_id})")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },
    #[error("Failed to sign request: {0}")]
    Signing(String),
    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// Errors that end a multi-step operation instead of being skipped over.
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            ClientError::RateLimitTimeout | ClientError::RateLimiterClosed | ClientError::Cancelled
        )
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

use radiosync_core::CoreError;
use thiserror::Error;

/// Errors from talking to the radio backend's REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure inside the retry middleware stack.
    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// The server answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// No bearer token could be obtained for an authenticated call.
    #[error("No access token available: {reason}")]
    Token { reason: String },

    /// The response body did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Endpoint derivation from the base URL failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    /// Convert into the core error for `resource`, keeping the message.
    #[must_use]
    pub fn into_fetch_failed(self, resource: &str) -> CoreError {
        CoreError::FetchFailed {
            resource: resource.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Convenience type alias for Results with `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

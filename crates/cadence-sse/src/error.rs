//! Error types for cadence-sse

use thiserror::Error;

/// Result type alias using cadence-sse Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend answered with a non-success status
    #[error("HTTP error! status: {status}: {body}")]
    Status { status: u16, body: String },

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a status error from a code and response body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if this error is worth retrying.
    ///
    /// Nothing in the streaming core retries; callers that want backoff can
    /// use this to decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Error::Sse(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status_codes() {
        assert!(Error::status(429, "slow down").is_retryable());
        assert!(Error::status(500, "boom").is_retryable());
        assert!(Error::status(503, "").is_retryable());
    }

    #[test]
    fn test_not_retryable_client_errors() {
        assert!(!Error::status(400, "bad").is_retryable());
        assert!(!Error::status(404, "missing").is_retryable());
        assert!(!Error::InvalidConfig("x".into()).is_retryable());
    }

    #[test]
    fn test_sse_errors_are_retryable() {
        assert!(Error::Sse("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_status_display() {
        let e = Error::status(502, "bad gateway");
        assert_eq!(e.to_string(), "HTTP error! status: 502: bad gateway");
    }
}

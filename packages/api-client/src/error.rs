//! Party server API error types

use thiserror::Error;

/// Party server API client errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid input provided to API method
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse party server response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The server answered with an `{"error": "..."}` payload
    #[error("{0}")]
    Server(String),

    /// The server answered with a non-success status code
    #[error("Party server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Rate limited by the party server
    #[error("Rate limited by the party server")]
    RateLimited,

    /// Request timeout
    #[error("Request to the party server timed out")]
    Timeout,
}

impl ApiError {
    /// Check if this error is transient
    ///
    /// Transient failures are worth offering a retry for:
    /// - Timeouts
    /// - Rate limiting
    /// - Transport errors (connect, timeout)
    /// - Server errors (5xx)
    ///
    /// The client itself never retries; this only classifies.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::RateLimited => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                matches!(e.status(), Some(status) if status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type for party server operations
pub type ApiResult<T> = Result<T, ApiError>;

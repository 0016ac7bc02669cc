//! Error types for the upstream clients

use thiserror::Error;

/// Errors that can occur when calling an upstream provider
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Missing API key environment variable
    #[error("Missing {0} environment variable")]
    MissingApiKey(&'static str),

    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// Rate limited - too many requests
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Unauthorized - invalid API key
    #[error("Unauthorized - invalid API key")]
    Unauthorized,

    /// Provider returned an error
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the provider
        message: String,
    },

    /// The call exceeded its deadline
    #[error("Deadline of {deadline_ms}ms exceeded during {operation}")]
    DeadlineExceeded {
        /// Operation that timed out
        operation: &'static str,
        /// Configured deadline in milliseconds
        deadline_ms: u64,
    },

    /// Embedding dimension did not match the expected size
    #[error("Embedding dimension {got} does not match expected {expected}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Returned dimension
        got: usize,
    },
}

impl UpstreamError {
    /// Whether the failure is transient and worth one retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_) | Self::RateLimited | Self::ApiError { status: 500..=599, .. }
        )
    }
}

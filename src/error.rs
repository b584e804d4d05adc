use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("local rate limit exhausted after {attempts} attempts (limit set {limit_set}, bucket {bucket})")]
    RateLimitExceeded {
        limit_set: String,
        bucket: String,
        attempts: u32,
    },

    #[error("upstream rate limited the request (retry after {retry_after:?})")]
    UpstreamRateLimited { retry_after: Option<Duration> },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("unauthorized: upstream answered {status}")]
    Unauthorized { status: u16 },

    #[error("upstream error: {status} {message}")]
    UpstreamError { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Whether running the same ingest again later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::RateLimitExceeded { .. }
                | IngestError::UpstreamRateLimited { .. }
                | IngestError::UpstreamError { .. }
                | IngestError::Http(_)
        )
    }

    /// Short stable label used for metrics and report output.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            IngestError::UpstreamRateLimited { .. } => "upstream_rate_limited",
            IngestError::NotFound { .. } => "not_found",
            IngestError::Unauthorized { .. } => "unauthorized",
            IngestError::UpstreamError { .. } => "upstream_error",
            IngestError::MalformedResponse(_) => "malformed_response",
            IngestError::StorageUnavailable(_) => "storage_unavailable",
            IngestError::Cancelled => "cancelled",
            IngestError::Http(_) => "http",
            IngestError::InvalidInput(_) => "invalid_input",
            IngestError::Config(_) => "config",
            IngestError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

//! Error types shared by the relay pipelines.

use thiserror::Error;

/// Failure reported by the upstream generation service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl UpstreamError {
    /// Whether this failure carries a rate-limit signature: an HTTP 429, the
    /// dedicated variant, or a rate-limit marker in its description.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            UpstreamError::RateLimited(_) => true,
            UpstreamError::Status { status: 429, .. } => true,
            other => {
                let msg = other.to_string().to_lowercase();
                msg.contains("429") || msg.contains("rate_limit") || msg.contains("rate limit")
            }
        }
    }
}

/// Errors surfaced by the relay to its callers.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    /// Every extraction stage failed. `raw` is the untouched model output.
    #[error("could not extract a structured object from model output")]
    ParseExhausted { raw: String },

    #[error("service not configured: {0}")]
    NotConfigured(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("job queue closed")]
    QueueClosed,

    #[error("worker dropped the job before replying")]
    WorkerDropped,
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;

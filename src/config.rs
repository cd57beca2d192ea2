//! Relay configuration: cache/governor/retry sizing, worker pool, upstream credentials
//! and per-request-type generation parameters.

use std::time::Duration;

use serde::Serialize;

use crate::error::{RelayError, Result};

pub const DEFAULT_REGION: &str = "us-south";
pub const DEFAULT_MODEL_ID: &str = "ibm/granite-3-2b-instruct";

/// Sampling parameters forwarded to the upstream model on every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl GenerationParams {
    /// Near-deterministic, single-line output.
    pub const fn translation() -> Self {
        Self {
            max_new_tokens: 300,
            min_new_tokens: 1,
            temperature: 0.05,
            top_p: 0.8,
            repetition_penalty: 1.1,
        }
    }

    /// Longer budget: the model writes description and qualifications when missing.
    pub const fn segmentation() -> Self {
        Self {
            max_new_tokens: 800,
            min_new_tokens: 1,
            temperature: 0.1,
            top_p: 0.9,
            repetition_penalty: 1.1,
        }
    }
}

/// Credentials and endpoint for the hosted model.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub project_id: String,
    pub region: String,
    pub model_id: String,
    pub request_timeout: Duration,
}

impl UpstreamConfig {
    /// Reads `VITE_IBM_API_KEY`, `VITE_IBM_PROJECT_ID`, `VITE_IBM_REGION` and
    /// `GENRELAY_MODEL_ID`. Returns `Ok(None)` when the credentials are absent.
    pub fn from_env() -> Result<Option<Self>> {
        let api_key = std::env::var("VITE_IBM_API_KEY").ok();
        let project_id = std::env::var("VITE_IBM_PROJECT_ID").ok();

        match (api_key, project_id) {
            (Some(api_key), Some(project_id)) => {
                if api_key.trim().is_empty() || project_id.trim().is_empty() {
                    return Err(RelayError::Config(
                        "VITE_IBM_API_KEY and VITE_IBM_PROJECT_ID must not be empty".into(),
                    ));
                }
                Ok(Some(Self {
                    api_key,
                    project_id,
                    region: std::env::var("VITE_IBM_REGION")
                        .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
                    model_id: std::env::var("GENRELAY_MODEL_ID")
                        .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
                    request_timeout: Duration::from_secs(60),
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("https://{}.ml.cloud.ibm.com", self.region)
    }
}

/// Sizing of the in-process reliability components.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum number of cached translations (default: 1000).
    pub cache_capacity: usize,
    /// Outbound calls admitted per `rate_window` (default: 2).
    pub rate_max_requests: usize,
    /// Trailing admission window (default: 1s).
    pub rate_window: Duration,
    /// Total attempts for a rate-limited translation call (default: 3).
    pub retry_max_attempts: u32,
    /// First backoff delay, doubled on every retry (default: 1s).
    pub retry_initial_delay: Duration,
    /// Worker tasks executing upstream calls (default: 4).
    pub workers: usize,
    /// Pending jobs before submitters wait (default: 64).
    pub queue_depth: usize,
    pub upstream: Option<UpstreamConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            rate_max_requests: 2,
            rate_window: Duration::from_secs(1),
            retry_max_attempts: 3,
            retry_initial_delay: Duration::from_secs(1),
            workers: 4,
            queue_depth: 64,
            upstream: None,
        }
    }
}

impl RelayConfig {
    /// Defaults plus upstream credentials from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            upstream: UpstreamConfig::from_env()?,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.rate_max_requests = max_requests;
        self.rate_window = window;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, initial_delay: Duration) -> Self {
        self.retry_max_attempts = max_attempts;
        self.retry_initial_delay = initial_delay;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_upstream(mut self, upstream: UpstreamConfig) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Rejects sizes that would make a component unusable.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(RelayError::Config("cache capacity must be > 0".into()));
        }
        if self.rate_max_requests == 0 {
            return Err(RelayError::Config("rate limit must admit at least one request".into()));
        }
        if self.rate_window.is_zero() {
            return Err(RelayError::Config("rate window must be non-zero".into()));
        }
        if self.retry_max_attempts == 0 {
            return Err(RelayError::Config("retry policy needs at least one attempt".into()));
        }
        if self.workers == 0 || self.queue_depth == 0 {
            return Err(RelayError::Config("worker pool needs workers and queue slots".into()));
        }
        Ok(())
    }
}

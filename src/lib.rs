//! genrelay: reliability layer over a hosted text-generation model.
//! Cached, rate-governed translation and job-posting segmentation with
//! retry/backoff and multi-stage recovery of structured output.

pub mod config;
pub mod error;
pub mod governor;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;
pub mod segment;
pub mod translate;
pub mod upstream;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

pub use config::{GenerationParams, RelayConfig, UpstreamConfig};
pub use error::{RelayError, Result, UpstreamError};
pub use orchestrator::Relay;
pub use segment::{SegmentRecord, Segmentation};
pub use translate::Translation;

use governor::RateGovernor;
use metrics::{MetricsRegistry, MetricsSnapshot};
use retry::RetryPolicy;
use scheduler::Scheduler;
use translate::ResponseCache;
use upstream::{Generator, WatsonxClient};

/// Shared state constructed once per process: cache, rate window, metrics and,
/// when a model is configured, the relay and its worker pool.
pub struct RelayContext {
    cache: Arc<ResponseCache>,
    metrics: Arc<MetricsRegistry>,
    relay: Option<Arc<Relay>>,
    scheduler: Option<Scheduler>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub translation_service: bool,
    pub segmentation_service: bool,
    pub model: Option<String>,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cache_size: usize,
    pub max_size: usize,
}

impl RelayContext {
    /// Build from configuration. Without upstream credentials the context runs
    /// unconfigured: translation is refused and segmentation returns sample data.
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        let generator: Option<Arc<dyn Generator>> = match config.upstream.clone() {
            Some(upstream) => Some(Arc::new(WatsonxClient::new(upstream)?)),
            None => {
                warn!("upstream credentials missing, generation disabled");
                None
            }
        };
        Self::build(config, generator)
    }

    /// Build around a caller-supplied generation backend.
    pub fn with_generator(config: RelayConfig, generator: Arc<dyn Generator>) -> Result<Self> {
        Self::build(config, Some(generator))
    }

    fn build(config: RelayConfig, generator: Option<Arc<dyn Generator>>) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(ResponseCache::new(config.cache_capacity)?);
        let governor = Arc::new(RateGovernor::new(
            config.rate_max_requests,
            config.rate_window,
        )?);
        let metrics = Arc::new(MetricsRegistry::new());

        let (relay, scheduler) = match generator {
            Some(generator) => {
                let relay = Arc::new(Relay::new(
                    generator,
                    Arc::clone(&cache),
                    Arc::clone(&governor),
                    RetryPolicy::new(config.retry_max_attempts, config.retry_initial_delay),
                    Arc::clone(&metrics),
                ));
                let scheduler = Scheduler::start(
                    Arc::clone(&relay),
                    Arc::clone(&metrics),
                    config.workers,
                    config.queue_depth,
                );
                info!(model = relay.model_name(), "relay ready");
                (Some(relay), Some(scheduler))
            }
            None => (None, None),
        };

        Ok(Self {
            cache,
            metrics,
            relay,
            scheduler,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.relay.is_some()
    }

    /// Translate `text`. Cache hits are answered without occupying a worker.
    pub async fn translate(&self, text: &str, from: &str, to: &str) -> Result<Translation> {
        let (Some(relay), Some(scheduler)) = (&self.relay, &self.scheduler) else {
            return Err(RelayError::NotConfigured(
                "translation model not loaded".into(),
            ));
        };
        if let Some(hit) = relay.cached_translation(text, from, to) {
            return Ok(hit);
        }
        scheduler.translate(text, from, to).await
    }

    /// Segment a job description. Blank input is rejected first; without a model
    /// the sample record is returned, marked as placeholder.
    pub async fn segment(&self, description: &str) -> Result<Segmentation> {
        orchestrator::validate_description(description)?;
        match &self.scheduler {
            Some(scheduler) => scheduler.segment(description).await,
            None => Ok(Segmentation::placeholder(
                SegmentRecord::sample(),
                segment::MOCK_MESSAGE,
            )),
        }
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            translation_service: self.is_configured(),
            segmentation_service: self.is_configured(),
            model: self.relay.as_ref().map(|r| r.model_name().to_string()),
            cache_size: self.cache.size(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            cache_size: self.cache.size(),
            max_size: self.cache.capacity(),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("translation cache cleared");
    }

    pub fn metrics_summary(&self) -> MetricsSnapshot {
        self.metrics.summary()
    }

    /// Drain the worker pool.
    pub async fn shutdown(self) {
        if let Some(scheduler) = self.scheduler {
            scheduler.shutdown().await;
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("genrelay=info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();
}

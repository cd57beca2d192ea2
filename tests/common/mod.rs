#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genrelay::config::GenerationParams;
use genrelay::governor::RateGovernor;
use genrelay::metrics::MetricsRegistry;
use genrelay::retry::RetryPolicy;
use genrelay::translate::ResponseCache;
use genrelay::upstream::{GenerationResult, Generator};
use genrelay::{Relay, UpstreamError};
use parking_lot::Mutex;

/// Generator replaying a fixed script of responses; repeats the last one when the
/// script runs out.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<GenerationResult, UpstreamError>>>,
    fallback: fn() -> Result<GenerationResult, UpstreamError>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<GenerationResult, UpstreamError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: || Err(UpstreamError::Other("script exhausted".into())),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn always(fallback: fn() -> Result<GenerationResult, UpstreamError>) -> Self {
        Self {
            fallback,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<GenerationResult, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(self.fallback)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn text(s: &str) -> Result<GenerationResult, UpstreamError> {
    Ok(GenerationResult::Structured(serde_json::json!({
        "results": [{ "generated_text": s }]
    })))
}

pub fn rate_limited() -> Result<GenerationResult, UpstreamError> {
    Err(UpstreamError::Status {
        status: 429,
        body: "Too Many Requests".into(),
    })
}

pub struct Harness {
    pub relay: Relay,
    pub generator: Arc<ScriptedGenerator>,
    pub cache: Arc<ResponseCache>,
    pub metrics: Arc<MetricsRegistry>,
}

pub fn harness(generator: ScriptedGenerator) -> Harness {
    let generator = Arc::new(generator);
    let cache = Arc::new(ResponseCache::new(16).unwrap());
    let governor = Arc::new(RateGovernor::new(2, Duration::from_secs(1)).unwrap());
    let metrics = Arc::new(MetricsRegistry::new());
    let relay = Relay::new(
        generator.clone(),
        Arc::clone(&cache),
        governor,
        RetryPolicy::new(3, Duration::from_secs(1)),
        Arc::clone(&metrics),
    );
    Harness {
        relay,
        generator,
        cache,
        metrics,
    }
}

//! Per-request composition of the reliability components.
//!
//! Translation: cache lookup, then per attempt admission + upstream call under the
//! retry policy, then normalization and cache store. Failures come back as
//! `"Error: ..."` strings.
//!
//! Segmentation: input validation, admission, a single upstream call, structured
//! extraction and company-name capitalization. Extraction failure yields a marked
//! placeholder record; an upstream failure is returned as an error.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::GenerationParams;
use crate::error::{RelayError, Result, UpstreamError};
use crate::governor::RateGovernor;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::segment::{self, Segmentation, SegmentRecord, StructuredExtractor};
use crate::translate::{self, ResponseCache, Translation, TranslationNormalizer};
use crate::upstream::{GenerationResult, Generator};

pub struct Relay {
    generator: Arc<dyn Generator>,
    cache: Arc<ResponseCache>,
    governor: Arc<RateGovernor>,
    retry: RetryPolicy,
    metrics: Arc<MetricsRegistry>,
}

impl Relay {
    pub fn new(
        generator: Arc<dyn Generator>,
        cache: Arc<ResponseCache>,
        governor: Arc<RateGovernor>,
        retry: RetryPolicy,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            generator,
            cache,
            governor,
            retry,
            metrics,
        }
    }

    /// Cached translation for this input, if any.
    pub fn cached_translation(&self, text: &str, from: &str, to: &str) -> Option<Translation> {
        let hit = self.cache.get(text, from, to)?;
        self.metrics.incr(metric_names::CACHE_HIT);
        debug!(from, to, "translation cache hit");
        Some(Translation {
            original_text: text.to_string(),
            translated_text: hit,
            from_language: from.to_string(),
            to_language: to.to_string(),
            cached: true,
        })
    }

    /// Translate `text`. Never fails: unrecoverable upstream failures are returned
    /// as an `"Error: ..."` translated text and are not cached.
    pub async fn translate(&self, text: &str, from: &str, to: &str) -> Translation {
        if let Some(hit) = self.cached_translation(text, from, to) {
            return hit;
        }
        self.metrics.incr(metric_names::CACHE_MISS);

        let prompt = translate::build_prompt(text, to);
        let params = GenerationParams::translation();

        let outcome = self
            .retry
            .run(|attempt| {
                let prompt = &prompt;
                async move {
                    debug!(attempt, "translation attempt");
                    self.call_upstream(prompt, &params).await?.into_text()
                }
            })
            .await;

        let translated_text = match outcome {
            RetryOutcome::Success(raw) => {
                let cleaned = TranslationNormalizer::global().clean(&raw, to);
                if !cleaned.is_empty() {
                    self.cache.set(text, from, to, cleaned.clone());
                }
                cleaned
            }
            RetryOutcome::RateLimitExceeded { attempts } => {
                self.metrics.incr(metric_names::TRANSLATE_ERROR);
                warn!(attempts, "translation rate limited");
                translate::rate_limit_message()
            }
            RetryOutcome::Failed(e) => {
                self.metrics.incr(metric_names::TRANSLATE_ERROR);
                warn!(error = %e, "translation failed");
                translate::failure_message(&e.to_string())
            }
            RetryOutcome::Exhausted { attempts } => {
                self.metrics.incr(metric_names::TRANSLATE_ERROR);
                translate::exhausted_message(attempts)
            }
        };

        Translation {
            original_text: text.to_string(),
            translated_text,
            from_language: from.to_string(),
            to_language: to.to_string(),
            cached: false,
        }
    }

    /// Segment a job description into a [`SegmentRecord`].
    ///
    /// Blank input is rejected before any upstream call. If no extraction stage
    /// recovers an object, a placeholder record is returned with `placeholder` set.
    pub async fn segment(&self, description: &str) -> Result<Segmentation> {
        validate_description(description)?;

        let prompt = segment::build_prompt(description);
        let raw = self
            .call_upstream(&prompt, &GenerationParams::segmentation())
            .await?
            .into_text()?;
        if raw.is_empty() {
            return Err(UpstreamError::Malformed("no generated text in response".into()).into());
        }

        match StructuredExtractor::global().extract(&raw) {
            Ok(extracted) => {
                self.metrics.incr(format!(
                    "{}.{}",
                    metric_names::EXTRACT_STAGE_PREFIX,
                    extracted.stage
                ));
                let mut record = extracted.record;
                record.capitalize_company();
                info!(stage = %extracted.stage, "job description segmented");
                Ok(Segmentation::extracted(record))
            }
            Err(RelayError::ParseExhausted { raw }) => {
                self.metrics.incr(metric_names::SEGMENT_PLACEHOLDER);
                warn!(raw_len = raw.len(), "model output unparseable, using placeholder record");
                let mut record = SegmentRecord::placeholder(description);
                record.capitalize_company();
                Ok(Segmentation::placeholder(record, segment::PLACEHOLDER_MESSAGE))
            }
            Err(e) => Err(e),
        }
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        (self.cache.size(), self.cache.capacity())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("translation cache cleared");
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// One admitted upstream call. No lock is held across the network call.
    async fn call_upstream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<GenerationResult, UpstreamError> {
        let waited = self.governor.admit().await;
        self.metrics.observe(metric_names::ADMISSION_WAIT, waited);

        let timer = self.metrics.timer(metric_names::UPSTREAM_LATENCY);
        let result = self.generator.generate(prompt, params).await;
        timer.stop();
        result
    }
}

/// Reject empty or whitespace-only job descriptions.
pub fn validate_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(RelayError::Validation("Job description is required".into()));
    }
    Ok(())
}

//! Observability for the relay: latency histograms over recent samples plus
//! named event counters (cache hits, placeholders, extraction stages).

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Samples kept per histogram.
const HISTOGRAM_DEPTH: usize = 1024;

/// Measures from creation until `stop`, then records into its registry.
pub struct Timer {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl Timer {
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.registry.observe(self.name, elapsed);
        elapsed
    }
}

/// Most recent `depth` samples, in microseconds.
struct Histogram {
    samples: VecDeque<u64>,
    depth: usize,
}

impl Histogram {
    fn new(depth: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(depth),
            depth,
        }
    }

    fn push(&mut self, micros: u64) {
        if self.samples.len() == self.depth {
            self.samples.pop_front();
        }
        self.samples.push_back(micros);
    }

    /// Nearest-rank quantile, `q` in 0..=1.
    fn quantile(&self, q: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = (q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank]
    }

    fn summarize(&self) -> HistogramSummary {
        HistogramSummary {
            p50_us: self.quantile(0.50),
            p95_us: self.quantile(0.95),
            p99_us: self.quantile(0.99),
            count: self.samples.len(),
        }
    }
}

/// Registry shared by the relay, the worker pool and the context.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, Histogram>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn observe(&self, name: &'static str, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.histograms
            .lock()
            .entry(name)
            .or_insert_with(|| Histogram::new(HISTOGRAM_DEPTH))
            .push(micros);
        tracing::trace!(metric = name, micros, "observed");
    }

    /// Bump a named counter by one.
    pub fn incr(&self, name: impl Into<String>) {
        *self.counters.lock().entry(name.into()).or_insert(0) += 1;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn timer(self: &Arc<Self>, name: &'static str) -> Timer {
        Timer {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Quantile (0..=1) of a histogram in microseconds; 0 when nothing was recorded.
    pub fn quantile(&self, name: &str, q: f64) -> u64 {
        self.histograms
            .lock()
            .get(name)
            .map_or(0, |h| h.quantile(q))
    }

    pub fn summary(&self) -> MetricsSnapshot {
        let histograms = self
            .histograms
            .lock()
            .iter()
            .map(|(&name, h)| (name.to_string(), h.summarize()))
            .collect();
        MetricsSnapshot {
            histograms,
            counters: self.counters.lock().clone(),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSummary {
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub histograms: HashMap<String, HistogramSummary>,
    pub counters: HashMap<String, u64>,
}

pub mod metric_names {
    pub const UPSTREAM_LATENCY: &str = "t_upstream_call";
    pub const ADMISSION_WAIT: &str = "t_admission_wait";
    pub const QUEUE_WAIT: &str = "t_queue_wait";
    pub const CACHE_HIT: &str = "cache_hit";
    pub const CACHE_MISS: &str = "cache_miss";
    pub const TRANSLATE_ERROR: &str = "translate_error";
    pub const SEGMENT_PLACEHOLDER: &str = "segment_placeholder";
    /// Per-stage extraction counters are named `extract_stage.<stage>`.
    pub const EXTRACT_STAGE_PREFIX: &str = "extract_stage";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_over_observed_samples() {
        let reg = MetricsRegistry::new();
        for v in 1..=100 {
            reg.observe(metric_names::UPSTREAM_LATENCY, Duration::from_micros(v));
        }
        assert_eq!(reg.quantile(metric_names::UPSTREAM_LATENCY, 0.5), 51);
        assert_eq!(reg.quantile(metric_names::UPSTREAM_LATENCY, 0.99), 99);
        assert_eq!(reg.quantile(metric_names::UPSTREAM_LATENCY, 1.0), 100);
        assert_eq!(reg.quantile("unknown", 0.5), 0);
    }

    #[test]
    fn histogram_keeps_only_recent_samples() {
        let mut h = Histogram::new(4);
        for v in [100, 1, 2, 3, 4] {
            h.push(v);
        }
        assert_eq!(h.samples.len(), 4);
        assert_eq!(h.quantile(1.0), 4);
    }

    #[test]
    fn counters_and_summary() {
        let reg = Arc::new(MetricsRegistry::new());
        reg.incr(metric_names::CACHE_HIT);
        reg.incr(metric_names::CACHE_HIT);
        reg.timer(metric_names::ADMISSION_WAIT).stop();

        let snap = reg.summary();
        assert_eq!(snap.counters[metric_names::CACHE_HIT], 2);
        assert_eq!(snap.histograms[metric_names::ADMISSION_WAIT].count, 1);
        assert_eq!(reg.counter(metric_names::CACHE_MISS), 0);
    }
}

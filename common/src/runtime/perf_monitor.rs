use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use serde::Serialize;

#[derive(Default)]
struct Histogram {
    samples: Vec<f64>,
}

impl Histogram {
    fn record(&mut self, value: f64) {
        self.samples.push(value);
    }

    fn summary(&self) -> HistogramSummary {
        if self.samples.is_empty() {
            return HistogramSummary::default();
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let p50 = percentile(&sorted, 0.50);
        let p95 = percentile(&sorted, 0.95);
        let p99 = percentile(&sorted, 0.99);
        HistogramSummary {
            count,
            mean: sum / count as f64,
            p50,
            p95,
            p99,
            min: sorted[0],
            max: sorted[count - 1],
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct HistogramSummary {
    pub count: usize,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

/// Process-wide counters, histograms, and cache-hit tracking, exposed as a
/// summary snapshot (spec.md §4, C12 "Performance Monitor").
#[derive(Default)]
pub struct PerformanceMonitor {
    counters: Mutex<HashMap<String, u64>>,
    histograms: Mutex<HashMap<String, Histogram>>,
    cache_hits: Mutex<HashMap<String, (u64, u64)>>,
}

impl PerformanceMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, counter: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry(counter.to_string()).or_insert(0) += 1;
    }

    pub fn observe(&self, histogram: &str, duration: Duration) {
        let mut histograms = self.histograms.lock().unwrap_or_else(|e| e.into_inner());
        histograms
            .entry(histogram.to_string())
            .or_default()
            .record(duration.as_secs_f64() * 1000.0);
    }

    pub fn record_cache_access(&self, cache: &str, hit: bool) {
        let mut cache_hits = self.cache_hits.lock().unwrap_or_else(|e| e.into_inner());
        let entry = cache_hits.entry(cache.to_string()).or_insert((0, 0));
        if hit {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> PerformanceSnapshot {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let histograms: HashMap<String, HistogramSummary> = self
            .histograms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, hist)| (name.clone(), hist.summary()))
            .collect();
        let cache_hit_rates: HashMap<String, f64> = self
            .cache_hits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, (hits, misses))| {
                let total = hits + misses;
                let rate = if total == 0 {
                    0.0
                } else {
                    *hits as f64 / total as f64
                };
                (name.clone(), rate)
            })
            .collect();
        PerformanceSnapshot {
            counters,
            histograms,
            cache_hit_rates,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PerformanceSnapshot {
    pub counters: HashMap<String, u64>,
    pub histograms: HashMap<String, HistogramSummary>,
    pub cache_hit_rates: HashMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let monitor = PerformanceMonitor::new();
        monitor.increment("queries");
        monitor.increment("queries");
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.counters["queries"], 2);
    }

    #[test]
    fn cache_hit_rate_reflects_hits_and_misses() {
        let monitor = PerformanceMonitor::new();
        monitor.record_cache_access("embeddings", true);
        monitor.record_cache_access("embeddings", true);
        monitor.record_cache_access("embeddings", false);
        let snapshot = monitor.snapshot();
        assert!((snapshot.cache_hit_rates["embeddings"] - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn histogram_summary_reports_percentiles() {
        let monitor = PerformanceMonitor::new();
        for ms in [10.0, 20.0, 30.0, 40.0, 50.0] {
            monitor.observe("latency", Duration::from_secs_f64(ms / 1000.0));
        }
        let snapshot = monitor.snapshot();
        let hist = &snapshot.histograms["latency"];
        assert_eq!(hist.count, 5);
        assert!((hist.p50 - 30.0).abs() < 1e-6);
    }
}

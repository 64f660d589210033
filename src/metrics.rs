//! Observability metrics: search latency, per-engine counts, create/delete throughput.

use std::collections::VecDeque;
use std::time::Duration;

use crate::search::Algorithm;

/// Number of recent search latencies kept for the mean and percentiles.
pub const LATENCY_WINDOW: usize = 10_000;

/// Collects runtime metrics for the HTTP server.
///
/// Counters cover the whole process lifetime; latency statistics cover the
/// last [`LATENCY_WINDOW`] searches.
#[derive(Debug)]
pub struct MetricsCollector {
    search_latencies_us: VecDeque<f64>,
    brute_searches: u64,
    vptree_searches: u64,
    total_creates: u64,
    total_deletes: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            search_latencies_us: VecDeque::with_capacity(LATENCY_WINDOW),
            brute_searches: 0,
            vptree_searches: 0,
            total_creates: 0,
            total_deletes: 0,
        }
    }

    /// Record a search with the engine that served it and its duration.
    pub fn record_search(&mut self, algorithm: Algorithm, duration: Duration) {
        match algorithm {
            Algorithm::Brute => self.brute_searches += 1,
            Algorithm::VpTree => self.vptree_searches += 1,
        }
        if self.search_latencies_us.len() == LATENCY_WINDOW {
            self.search_latencies_us.pop_front();
        }
        self.search_latencies_us.push_back(duration.as_micros() as f64);
    }

    /// Record a library, document or chunk creation.
    pub fn record_create(&mut self) {
        self.total_creates += 1;
    }

    /// Record a library, document or chunk deletion.
    pub fn record_delete(&mut self) {
        self.total_deletes += 1;
    }

    pub fn total_searches(&self) -> u64 {
        self.brute_searches + self.vptree_searches
    }

    pub fn searches(&self, algorithm: Algorithm) -> u64 {
        match algorithm {
            Algorithm::Brute => self.brute_searches,
            Algorithm::VpTree => self.vptree_searches,
        }
    }

    pub fn total_creates(&self) -> u64 {
        self.total_creates
    }

    pub fn total_deletes(&self) -> u64 {
        self.total_deletes
    }

    /// Average search latency in microseconds.
    pub fn avg_search_latency_us(&self) -> f64 {
        if self.search_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.search_latencies_us.iter().sum();
        sum / self.search_latencies_us.len() as f64
    }

    /// Number of latency samples currently held.
    pub fn latency_samples(&self) -> usize {
        self.search_latencies_us.len()
    }

    /// Get a percentile of search latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_search_latency_us(&self, percentile: f64) -> f64 {
        self.percentiles_search_latency_us(&[percentile])[0]
    }

    /// Several percentiles from a single sort of the window.
    pub fn percentiles_search_latency_us(&self, percentiles: &[f64]) -> Vec<f64> {
        if self.search_latencies_us.is_empty() {
            return vec![0.0; percentiles.len()];
        }

        let mut sorted: Vec<f64> = self.search_latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let last = sorted.len() - 1;
        percentiles
            .iter()
            .map(|p| {
                let index = ((p / 100.0) * last as f64).round() as usize;
                sorted[index.min(last)]
            })
            .collect()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let mut m = MetricsCollector::new();
        m.record_create();
        m.record_create();
        m.record_delete();

        assert_eq!(m.total_creates(), 2);
        assert_eq!(m.total_deletes(), 1);
        assert_eq!(m.total_searches(), 0);
    }

    #[test]
    fn test_metrics_latency() {
        let mut m = MetricsCollector::new();
        m.record_search(Algorithm::Brute, Duration::from_micros(100));
        m.record_search(Algorithm::VpTree, Duration::from_micros(200));
        m.record_search(Algorithm::VpTree, Duration::from_micros(300));

        assert_eq!(m.total_searches(), 3);
        assert_eq!(m.searches(Algorithm::Brute), 1);
        assert_eq!(m.searches(Algorithm::VpTree), 2);
        assert!((m.avg_search_latency_us() - 200.0).abs() < 1.0);
        assert!((m.percentile_search_latency_us(50.0) - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let mut m = MetricsCollector::new();
        for i in 0..(LATENCY_WINDOW + 500) {
            m.record_search(Algorithm::Brute, Duration::from_micros(i as u64));
        }

        assert_eq!(m.latency_samples(), LATENCY_WINDOW);
        assert_eq!(m.total_searches(), (LATENCY_WINDOW + 500) as u64);
        // The oldest 500 samples were evicted.
        assert_eq!(m.percentile_search_latency_us(0.0), 500.0);
        let p = m.percentiles_search_latency_us(&[0.0, 100.0]);
        assert_eq!(p, vec![500.0, (LATENCY_WINDOW + 499) as f64]);
    }

    #[test]
    fn test_metrics_empty() {
        let m = MetricsCollector::new();
        assert_eq!(m.avg_search_latency_us(), 0.0);
        assert_eq!(m.percentile_search_latency_us(99.0), 0.0);
    }
}

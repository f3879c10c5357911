//! Client-observed latency aggregation.

use hdrhistogram::Histogram;
use rainsim_types::SimTime;
use serde::Serialize;

/// Request-to-response latencies in microseconds, up to one minute.
pub struct LatencyRecorder {
    histogram: Histogram<u64>,
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new_with_bounds(1, 60_000_000, 3)
                .expect("constant histogram bounds"),
        }
    }

    pub fn record(&mut self, latency: SimTime) {
        self.histogram.saturating_record(latency.as_micros() as u64);
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.histogram.len(),
            mean_us: self.histogram.mean(),
            p50_us: self.histogram.value_at_quantile(0.5),
            p99_us: self.histogram.value_at_quantile(0.99),
            max_us: self.histogram.max(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_summary_of_known_samples() {
        let mut recorder = LatencyRecorder::new();
        for ms in 1..=100u64 {
            recorder.record(Duration::from_millis(ms));
        }
        let summary = recorder.summary();
        assert_eq!(summary.count, 100);
        // 3 significant digits: values land within 0.1% of the sample.
        assert!((summary.p50_us as i64 - 50_000).abs() <= 64);
        assert!((summary.p99_us as i64 - 99_000).abs() <= 128);
        assert!((summary.max_us as i64 - 100_000).abs() <= 128);
    }

    #[test]
    fn test_empty_recorder() {
        let summary = LatencyRecorder::new().summary();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.max_us, 0);
    }
}

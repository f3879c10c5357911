//! Per-node protocol statistics.
//!
//! Samples taken before the warmup deadline are dropped, so steady-state
//! numbers are not polluted by the initial fill.

use rainsim_types::SimTime;
use serde::Serialize;
use std::time::Duration;

/// Monotone event counter.
#[derive(Debug, Default)]
pub struct Counter {
    count: u64,
}

impl Counter {
    fn bump(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    fn document(&self, elapsed: SimTime) -> CounterDocument {
        let rate = if elapsed > Duration::ZERO {
            self.count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        CounterDocument {
            count: self.count,
            per_second: rate,
        }
    }
}

/// Running duration aggregate; reported as sample count and average.
#[derive(Debug, Default)]
pub struct SampleSet {
    count: u64,
    total: SimTime,
}

impl SampleSet {
    fn record(&mut self, sample: SimTime) {
        self.count += 1;
        self.total += sample;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    fn document(&self) -> SampleSetDocument {
        let average = if self.count > 0 {
            self.total.as_secs_f64() / self.count as f64
        } else {
            0.0
        };
        SampleSetDocument {
            samples: self.count,
            average_seconds: average,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CounterDocument {
    pub count: u64,
    pub per_second: f64,
}

#[derive(Debug, Serialize)]
pub struct SampleSetDocument {
    pub samples: u64,
    pub average_seconds: f64,
}

#[derive(Debug, Default)]
pub struct ServerStats {
    warmup: SimTime,
    pub get_requests: Counter,
    pub put_requests: Counter,
    pub rotx_requests: Counter,
    pub replica_updates: Counter,
    pub forwarded_get_requests: Counter,
    pub forwarded_put_requests: Counter,
    /// Write-to-apply delay of replica updates, measured skew-free.
    pub replication_time: SampleSet,
    /// Head update time minus returned update time, per owner get.
    pub value_staleness: SampleSet,
    /// Time from a remote write to it becoming visible under the GST.
    pub visibility_latency: SampleSet,
}

impl ServerStats {
    pub fn new(warmup: SimTime) -> Self {
        Self {
            warmup,
            ..Self::default()
        }
    }

    fn active(&self, now: SimTime) -> bool {
        now >= self.warmup
    }

    pub fn count_get(&mut self, now: SimTime) {
        if self.active(now) {
            self.get_requests.bump();
        }
    }

    pub fn count_put(&mut self, now: SimTime) {
        if self.active(now) {
            self.put_requests.bump();
        }
    }

    pub fn count_rotx(&mut self, now: SimTime) {
        if self.active(now) {
            self.rotx_requests.bump();
        }
    }

    pub fn count_replica_update(&mut self, now: SimTime) {
        if self.active(now) {
            self.replica_updates.bump();
        }
    }

    pub fn count_forwarded_get(&mut self, now: SimTime) {
        if self.active(now) {
            self.forwarded_get_requests.bump();
        }
    }

    pub fn count_forwarded_put(&mut self, now: SimTime) {
        if self.active(now) {
            self.forwarded_put_requests.bump();
        }
    }

    pub fn record_replication_time(&mut self, now: SimTime, sample: SimTime) {
        if self.active(now) {
            self.replication_time.record(sample);
        }
    }

    pub fn record_value_staleness(&mut self, now: SimTime, sample: SimTime) {
        if self.active(now) {
            self.value_staleness.record(sample);
        }
    }

    pub fn record_visibility_latency(&mut self, now: SimTime, sample: SimTime) {
        if self.active(now) {
            self.visibility_latency.record(sample);
        }
    }

    pub fn document(&self, now: SimTime) -> ServerStatsDocument {
        let elapsed = now.saturating_sub(self.warmup);
        ServerStatsDocument {
            get_requests: self.get_requests.document(elapsed),
            put_requests: self.put_requests.document(elapsed),
            rotx_requests: self.rotx_requests.document(elapsed),
            replica_updates: self.replica_updates.document(elapsed),
            forwarded_get_requests: self.forwarded_get_requests.document(elapsed),
            forwarded_put_requests: self.forwarded_put_requests.document(elapsed),
            replication_time: self.replication_time.document(),
            value_staleness: self.value_staleness.document(),
            visibility_latency: self.visibility_latency.document(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServerStatsDocument {
    pub get_requests: CounterDocument,
    pub put_requests: CounterDocument,
    pub rotx_requests: CounterDocument,
    pub replica_updates: CounterDocument,
    pub forwarded_get_requests: CounterDocument,
    pub forwarded_put_requests: CounterDocument,
    pub replication_time: SampleSetDocument,
    pub value_staleness: SampleSetDocument,
    pub visibility_latency: SampleSetDocument,
}

//! Run configuration: cluster shape, network model, protocol parameters,
//! and per-operation service costs.

use crate::SimTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cluster needs at least one replica")]
    NoReplicas,
    #[error("cluster needs at least one partition")]
    NoPartitions,
    #[error("cluster needs at least one key")]
    NoKeys,
    #[error("GST tree fanout must be at least 1")]
    ZeroFanout,
    #[error("each node needs at least one core")]
    ZeroCores,
    #[error("inter-replica delay matrix must be {expected}x{expected}, got {rows} rows")]
    BadDelayMatrix { expected: usize, rows: usize },
    #[error("transmission rate must be positive")]
    ZeroTransmissionRate,
}

/// Which protocol variant a run simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// Scalar GST (single stable timestamp per node).
    Scalar,
    /// Vector GST (one stable timestamp per replica).
    Vector,
}

/// What to do when an incoming replica update wins a write conflict against
/// the locally stored head version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictWinPolicy {
    /// Apply the winning update and keep draining the queue. Ties between
    /// equal timestamps resolve toward the higher replica id.
    #[default]
    Apply,
    /// Take no action: the winning update is neither applied nor dequeued,
    /// so that source replica's apply queue stops draining.
    Stall,
}

/// Cluster shape: how many replicas and partitions, the key range, the GST
/// aggregation tree fanout, and per-node hardware parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub num_replicas: u32,
    pub num_partitions: u32,
    /// Keys are `0..num_keys`; ownership is `key mod num_partitions`.
    pub num_keys: u64,
    /// Fanout of the intra-replica GST aggregation tree.
    pub tree_fanout: u32,
    /// Cores per node in the cooperative CPU model.
    pub cores_per_node: u32,
    /// Clock skew scale: each node draws `|Normal(0,1)| * clock_skew` once
    /// at startup and adds it to every physical clock reading.
    pub clock_skew: SimTime,
}

impl ClusterConfig {
    pub fn new(num_replicas: u32, num_partitions: u32) -> Self {
        Self {
            num_replicas,
            num_partitions,
            num_keys: 1024,
            tree_fanout: 2,
            cores_per_node: 1,
            clock_skew: Duration::ZERO,
        }
    }

    pub fn with_num_keys(mut self, num_keys: u64) -> Self {
        self.num_keys = num_keys;
        self
    }

    pub fn with_tree_fanout(mut self, fanout: u32) -> Self {
        self.tree_fanout = fanout;
        self
    }

    pub fn with_cores_per_node(mut self, cores: u32) -> Self {
        self.cores_per_node = cores;
        self
    }

    pub fn with_clock_skew(mut self, skew: SimTime) -> Self {
        self.clock_skew = skew;
        self
    }

    pub fn num_servers(&self) -> u32 {
        self.num_replicas * self.num_partitions
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_replicas == 0 {
            return Err(ConfigError::NoReplicas);
        }
        if self.num_partitions == 0 {
            return Err(ConfigError::NoPartitions);
        }
        if self.num_keys == 0 {
            return Err(ConfigError::NoKeys);
        }
        if self.tree_fanout == 0 {
            return Err(ConfigError::ZeroFanout);
        }
        if self.cores_per_node == 0 {
            return Err(ConfigError::ZeroCores);
        }
        Ok(())
    }
}

/// Network delay model.
///
/// Delivery delay for a message is the sender interface's transmission time
/// (wire size / rate, serialized through a `busy_until` cursor) plus the
/// propagation delay between the two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Propagation delay between two partitions of the same replica.
    pub intra_replica_delay: SimTime,
    /// Propagation delay from a node to itself.
    pub self_delay: SimTime,
    /// Propagation delay between replicas, indexed `[from][to]`.
    /// Empty means "use `intra_replica_delay` everywhere" (single-DC runs).
    pub inter_replica_delay: Vec<Vec<SimTime>>,
    /// Interface transmission rate in bytes per second.
    pub bytes_per_second: f64,
}

impl NetworkConfig {
    pub fn uniform(intra: SimTime, inter: SimTime, num_replicas: u32) -> Self {
        let n = num_replicas as usize;
        let mut matrix = vec![vec![inter; n]; n];
        for (i, row) in matrix.iter_mut().enumerate() {
            row[i] = intra;
        }
        Self {
            intra_replica_delay: intra,
            self_delay: Duration::ZERO,
            inter_replica_delay: matrix,
            bytes_per_second: 10e9 / 8.0, // 10 Gbit/s
        }
    }

    pub fn with_self_delay(mut self, delay: SimTime) -> Self {
        self.self_delay = delay;
        self
    }

    pub fn with_bits_per_second(mut self, bits: f64) -> Self {
        self.bytes_per_second = bits / 8.0;
        self
    }

    /// Time the sender's interface is occupied transmitting `bytes`.
    pub fn transmission_time(&self, bytes: u64) -> SimTime {
        Duration::from_secs_f64(bytes as f64 / self.bytes_per_second)
    }

    pub fn validate(&self, num_replicas: u32) -> Result<(), ConfigError> {
        if !(self.bytes_per_second > 0.0) {
            return Err(ConfigError::ZeroTransmissionRate);
        }
        let n = num_replicas as usize;
        if !self.inter_replica_delay.is_empty()
            && (self.inter_replica_delay.len() != n
                || self.inter_replica_delay.iter().any(|row| row.len() != n))
        {
            return Err(ConfigError::BadDelayMatrix {
                expected: n,
                rows: self.inter_replica_delay.len(),
            });
        }
        Ok(())
    }
}

/// Protocol-level parameters shared by both variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub variant: ProtocolVariant,
    /// Period of the GST aggregation round (leaves re-arm on completion).
    pub gst_interval: SimTime,
    /// Period of the clock tick that advances `vv[self]` and sends
    /// heartbeats.
    pub clock_interval: SimTime,
    /// Enable version-chain garbage collection. Off by default.
    pub gc_enabled: bool,
    /// How far behind the GST a version tail must be before GC trims it.
    pub gc_window: SimTime,
    pub conflict_win_policy: ConflictWinPolicy,
    /// Wire-size accounting charges this many bytes per value, regardless
    /// of the one-byte stored payload.
    pub simulated_value_size: u64,
}

impl ProtocolConfig {
    pub fn new(variant: ProtocolVariant) -> Self {
        Self {
            variant,
            gst_interval: Duration::from_millis(5),
            clock_interval: Duration::from_millis(1),
            gc_enabled: false,
            gc_window: Duration::from_secs(1),
            conflict_win_policy: ConflictWinPolicy::default(),
            simulated_value_size: 64,
        }
    }

    pub fn with_gst_interval(mut self, interval: SimTime) -> Self {
        self.gst_interval = interval;
        self
    }

    pub fn with_clock_interval(mut self, interval: SimTime) -> Self {
        self.clock_interval = interval;
        self
    }

    pub fn with_gc(mut self, window: SimTime) -> Self {
        self.gc_enabled = true;
        self.gc_window = window;
        self
    }

    pub fn with_conflict_win_policy(mut self, policy: ConflictWinPolicy) -> Self {
        self.conflict_win_policy = policy;
        self
    }
}

/// Fixed service costs charged to the CPU by each protocol operation.
///
/// Field names follow the operations they price; `*_per_byte`,
/// `*_per_replica`, `*_per_partition`, and `*_per_value` entries are
/// multiplied by the relevant count at the call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTimings {
    pub lock: SimTime,
    pub build_message_per_byte: SimTime,
    pub send: SimTime,
    pub send_per_byte: SimTime,
    pub get_request: SimTime,
    pub put_request: SimTime,
    pub get_value: SimTime,
    pub put_value: SimTime,
    pub visibility_check: SimTime,
    pub replica_update: SimTime,
    pub heartbeat: SimTime,
    pub clock_tick: SimTime,
    pub min_lst_per_replica: SimTime,
    pub lst_from_leaf_per_replica: SimTime,
    /// Charged once when an interior node has heard from all its children
    /// and folds its own contribution into the round.
    pub lst_round_end: SimTime,
    pub gst_check: SimTime,
    pub gst_update: SimTime,
    pub gst_update_per_rotx: SimTime,
    pub rotx_request_per_partition: SimTime,
    pub slice_response_per_value: SimTime,
    /// Sampling period of the CPU queue-depth statistic.
    pub cpu_stats_interval: SimTime,
}

impl Default for ServiceTimings {
    fn default() -> Self {
        Self {
            lock: Duration::from_nanos(100),
            build_message_per_byte: Duration::from_nanos(2),
            send: Duration::from_nanos(500),
            send_per_byte: Duration::from_nanos(2),
            get_request: Duration::from_nanos(300),
            put_request: Duration::from_nanos(300),
            get_value: Duration::from_nanos(400),
            put_value: Duration::from_nanos(600),
            visibility_check: Duration::from_nanos(50),
            replica_update: Duration::from_nanos(500),
            heartbeat: Duration::from_nanos(100),
            clock_tick: Duration::from_nanos(100),
            min_lst_per_replica: Duration::from_nanos(20),
            lst_from_leaf_per_replica: Duration::from_nanos(20),
            lst_round_end: Duration::from_nanos(20),
            gst_check: Duration::from_nanos(50),
            gst_update: Duration::from_nanos(100),
            gst_update_per_rotx: Duration::from_nanos(50),
            rotx_request_per_partition: Duration::from_nanos(100),
            slice_response_per_value: Duration::from_nanos(100),
            cpu_stats_interval: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_validation() {
        assert!(ClusterConfig::new(2, 4).validate().is_ok());
        assert_eq!(
            ClusterConfig::new(0, 4).validate(),
            Err(ConfigError::NoReplicas)
        );
        assert_eq!(
            ClusterConfig::new(2, 0).validate(),
            Err(ConfigError::NoPartitions)
        );
        assert_eq!(
            ClusterConfig::new(2, 4).with_tree_fanout(0).validate(),
            Err(ConfigError::ZeroFanout)
        );
        assert_eq!(
            ClusterConfig::new(2, 4).with_cores_per_node(0).validate(),
            Err(ConfigError::ZeroCores)
        );
    }

    #[test]
    fn test_uniform_network_matrix() {
        let intra = Duration::from_micros(50);
        let inter = Duration::from_millis(40);
        let net = NetworkConfig::uniform(intra, inter, 3);
        assert!(net.validate(3).is_ok());
        assert_eq!(net.inter_replica_delay[1][1], intra);
        assert_eq!(net.inter_replica_delay[1][2], inter);
    }

    #[test]
    fn test_bad_matrix_rejected() {
        let mut net = NetworkConfig::uniform(Duration::ZERO, Duration::ZERO, 3);
        net.inter_replica_delay.pop();
        assert_eq!(
            net.validate(3),
            Err(ConfigError::BadDelayMatrix {
                expected: 3,
                rows: 2
            })
        );
    }

    #[test]
    fn test_transmission_time() {
        let net = NetworkConfig::uniform(Duration::ZERO, Duration::ZERO, 1)
            .with_bits_per_second(8e9); // 1 GB/s
        assert_eq!(net.transmission_time(1000), Duration::from_micros(1));
    }
}

//! Configuration of a simulator run.

use rainsim_simulation::SimulationParams;
use rainsim_types::{
    ClusterConfig, ConflictWinPolicy, NetworkConfig, ProtocolConfig, ProtocolVariant,
    ServiceTimings, SimTime,
};
use std::time::Duration;

/// Everything a run needs, with defaults modeling a few datacenters 40ms
/// apart.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub num_replicas: u32,
    pub num_partitions: u32,
    pub variant: ProtocolVariant,
    /// Clients per replica; each issues one request every
    /// `request_interval`, alternating put and get on its own key.
    pub clients_per_replica: u32,
    pub request_interval: SimTime,
    pub intra_replica_delay: SimTime,
    pub inter_replica_delay: SimTime,
    pub clock_skew: SimTime,
    pub gst_interval: SimTime,
    pub clock_interval: SimTime,
    pub conflict_win_policy: ConflictWinPolicy,
    pub seed: u64,
    /// Statistics ignore everything before this time.
    pub warmup: SimTime,
    pub duration: SimTime,
}

impl SimulatorConfig {
    pub fn new(num_replicas: u32, num_partitions: u32, variant: ProtocolVariant) -> Self {
        Self {
            num_replicas,
            num_partitions,
            variant,
            clients_per_replica: 4,
            request_interval: Duration::from_millis(10),
            intra_replica_delay: Duration::from_micros(50),
            inter_replica_delay: Duration::from_millis(40),
            clock_skew: Duration::from_micros(100),
            gst_interval: Duration::from_millis(5),
            clock_interval: Duration::from_millis(1),
            conflict_win_policy: ConflictWinPolicy::default(),
            seed: 12345,
            warmup: Duration::from_millis(500),
            duration: Duration::from_secs(5),
        }
    }

    pub fn with_clients_per_replica(mut self, clients: u32) -> Self {
        self.clients_per_replica = clients;
        self
    }

    pub fn with_request_interval(mut self, interval: SimTime) -> Self {
        self.request_interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_duration(mut self, duration: SimTime) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_warmup(mut self, warmup: SimTime) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn num_clients(&self) -> u32 {
        self.num_replicas * self.clients_per_replica
    }

    /// Lower the parameters into the simulation runner's terms.
    pub fn simulation_params(&self) -> SimulationParams {
        let cluster = ClusterConfig::new(self.num_replicas, self.num_partitions)
            .with_clock_skew(self.clock_skew);
        let protocol = ProtocolConfig::new(self.variant)
            .with_gst_interval(self.gst_interval)
            .with_clock_interval(self.clock_interval)
            .with_conflict_win_policy(self.conflict_win_policy);
        SimulationParams {
            cluster,
            network: NetworkConfig::uniform(
                self.intra_replica_delay,
                self.inter_replica_delay,
                self.num_replicas,
            ),
            protocol,
            timings: ServiceTimings::default(),
            num_clients: self.num_clients(),
            seed: self.seed,
            warmup: self.warmup,
            stop_at: self.duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_carry_the_cluster_shape() {
        let config = SimulatorConfig::new(3, 4, ProtocolVariant::Vector)
            .with_clients_per_replica(2)
            .with_seed(9);
        let params = config.simulation_params();
        assert_eq!(params.cluster.num_servers(), 12);
        assert_eq!(params.num_clients, 6);
        assert_eq!(params.seed, 9);
        assert_eq!(params.protocol.variant, ProtocolVariant::Vector);
        assert!(params.cluster.validate().is_ok());
        assert!(params.network.validate(3).is_ok());
    }
}

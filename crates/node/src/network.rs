//! Per-node outbound network interface.
//!
//! One interface per sender. Transmissions serialize through a
//! `busy_until` cursor (wire size over the configured rate), then
//! propagation delay by replica pair is added on top. The interface also
//! enforces per-destination FIFO: two messages from one sender to one
//! destination may never reorder.

use rainsim_core::{Event, Scheduler};
use rainsim_engine::Transport;
use rainsim_types::{NetworkConfig, NodeId, ReplicaId, SimTime, Topology};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

pub struct NetworkLink {
    node: NodeId,
    replica: ReplicaId,
    config: NetworkConfig,
    topology: Topology,
    /// Home replicas of client nodes, for propagation lookups.
    client_homes: HashMap<NodeId, ReplicaId>,
    busy_until: SimTime,
    busy_time: SimTime,
    last_arrival: HashMap<NodeId, SimTime>,
}

#[derive(Debug, Serialize)]
pub struct NetworkStatsDocument {
    /// Fraction of simulated time the interface was transmitting.
    pub usage: f64,
}

impl NetworkLink {
    pub fn new(
        node: NodeId,
        replica: ReplicaId,
        config: NetworkConfig,
        topology: Topology,
        client_homes: HashMap<NodeId, ReplicaId>,
    ) -> Self {
        Self {
            node,
            replica,
            config,
            topology,
            client_homes,
            busy_until: Duration::ZERO,
            busy_time: Duration::ZERO,
            last_arrival: HashMap::new(),
        }
    }

    fn replica_of(&self, node: NodeId) -> ReplicaId {
        if self.topology.is_server(node) {
            self.topology.locate(node).0
        } else {
            *self
                .client_homes
                .get(&node)
                .unwrap_or_else(|| panic!("{node} has no home replica"))
        }
    }

    fn propagation(&self, to: NodeId) -> SimTime {
        if to == self.node {
            return self.config.self_delay;
        }
        let to_replica = self.replica_of(to);
        if to_replica == self.replica {
            return self.config.intra_replica_delay;
        }
        if self.config.inter_replica_delay.is_empty() {
            self.config.intra_replica_delay
        } else {
            self.config.inter_replica_delay[self.replica.index()][to_replica.index()]
        }
    }

    pub fn stats_document(&self, now: SimTime) -> NetworkStatsDocument {
        let usage = if now > Duration::ZERO {
            self.busy_time.as_secs_f64() / now.as_secs_f64()
        } else {
            0.0
        };
        NetworkStatsDocument { usage }
    }
}

impl Transport for NetworkLink {
    fn send(
        &mut self,
        at: SimTime,
        to: NodeId,
        wire_bytes: u64,
        event: Event,
        sched: &mut dyn Scheduler,
    ) {
        if self.busy_until < at {
            self.busy_until = at;
        }
        let transmission = self.config.transmission_time(wire_bytes);
        self.busy_until += transmission;
        self.busy_time += transmission;

        let arrival = self.busy_until + self.propagation(to);
        let last = self.last_arrival.entry(to).or_default();
        assert!(
            arrival >= *last,
            "{}: delivery to {to} at {arrival:?} reorders behind {last:?}",
            self.node
        );
        *last = arrival;
        sched.schedule_at(to, arrival, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rainsim_types::ClusterConfig;

    #[derive(Default)]
    struct Recorder {
        scheduled: Vec<(NodeId, SimTime)>,
    }

    impl Scheduler for Recorder {
        fn schedule_at(&mut self, to: NodeId, at: SimTime, _event: Event) {
            self.scheduled.push((to, at));
        }
    }

    fn us(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    fn link() -> NetworkLink {
        let topology = Topology::new(&ClusterConfig::new(2, 2)).expect("valid");
        // 1 byte per microsecond keeps transmission times legible.
        let mut config = NetworkConfig::uniform(us(10), us(1000), 2).with_bits_per_second(8e6);
        config.self_delay = Duration::ZERO;
        NetworkLink::new(NodeId(0), ReplicaId(0), config, topology, HashMap::new())
    }

    #[test]
    fn test_transmissions_serialize_through_the_interface() {
        let mut link = link();
        let mut sched = Recorder::default();
        // Two 100-byte messages handed over at the same instant: the second
        // transmission starts only after the first finishes.
        link.send(us(0), NodeId(1), 100, Event::FreeCore, &mut sched);
        link.send(us(0), NodeId(1), 100, Event::FreeCore, &mut sched);
        assert_eq!(sched.scheduled[0], (NodeId(1), us(100) + us(10)));
        assert_eq!(sched.scheduled[1], (NodeId(1), us(200) + us(10)));
    }

    #[test]
    fn test_propagation_by_replica_pair() {
        let mut link = link();
        let mut sched = Recorder::default();
        link.send(us(0), NodeId(1), 1, Event::FreeCore, &mut sched); // same replica
        link.send(us(0), NodeId(2), 1, Event::FreeCore, &mut sched); // other replica
        let (_, intra) = sched.scheduled[0];
        let (_, inter) = sched.scheduled[1];
        assert_eq!(intra, us(1) + us(10));
        assert_eq!(inter, us(2) + us(1000));
    }

    #[test]
    fn test_self_send_uses_self_delay() {
        let mut link = link();
        let mut sched = Recorder::default();
        link.send(us(5), NodeId(0), 1, Event::FreeCore, &mut sched);
        assert_eq!(sched.scheduled[0], (NodeId(0), us(5) + us(1)));
    }
}

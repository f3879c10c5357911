//! Server node shell.
//!
//! Owns the CPU, the network interface, and one protocol engine; wires
//! them together for each delivered event and assembles the per-node
//! statistics document at the end of a run.

use crate::network::{NetworkLink, NetworkStatsDocument};
use rainsim_core::{Event, NodeHandler, Scheduler};
use rainsim_cpu::{Cpu, CpuStatsDocument};
use rainsim_engine::{Ctx, GrState, GrvState, ServerStats, ServerStatsDocument};
use rainsim_messages::WireParams;
use rainsim_types::{
    ClusterConfig, NetworkConfig, NodeId, PartitionId, ProtocolConfig, ProtocolVariant, ReplicaId,
    ServiceTimings, SimTime, Topology,
};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

enum Engine {
    Gr(GrState),
    Grv(GrvState),
}

pub struct ServerNode {
    node: NodeId,
    replica: ReplicaId,
    partition: PartitionId,
    topology: Topology,
    timings: ServiceTimings,
    protocol: ProtocolConfig,
    wire: WireParams,
    /// Fixed offset added to every physical clock reading.
    skew_offset: SimTime,
    now: SimTime,
    stop_at: SimTime,
    cpu: Cpu,
    link: NetworkLink,
    stats: ServerStats,
    engine: Engine,
}

/// Everything a run reports about one node.
#[derive(Debug, Serialize)]
pub struct NodeStatsDocument {
    pub node: u32,
    pub replica: u32,
    pub partition: u32,
    pub server: ServerStatsDocument,
    pub cpu: CpuStatsDocument,
    pub network: NetworkStatsDocument,
}

pub struct ServerNodeParams<'a> {
    pub node: NodeId,
    pub cluster: &'a ClusterConfig,
    pub network: &'a NetworkConfig,
    pub protocol: &'a ProtocolConfig,
    pub timings: &'a ServiceTimings,
    pub topology: &'a Topology,
    pub client_homes: &'a HashMap<NodeId, ReplicaId>,
    /// Statistics ignore everything before this time.
    pub warmup: SimTime,
    /// The node reports itself finished past this time.
    pub stop_at: SimTime,
}

impl ServerNode {
    pub fn new(params: ServerNodeParams<'_>, rng: &mut impl Rng) -> Self {
        let (replica, partition) = params.topology.locate(params.node);
        let mut cpu = Cpu::new(
            params.node,
            params.cluster.cores_per_node,
            params.timings.lock,
            params.timings.cpu_stats_interval,
        );
        let engine = match params.protocol.variant {
            ProtocolVariant::Scalar => Engine::Gr(GrState::new(
                params.cluster.num_replicas,
                params.cluster.tree_fanout,
                &mut cpu,
            )),
            ProtocolVariant::Vector => Engine::Grv(GrvState::new(
                params.cluster.num_replicas,
                params.cluster.tree_fanout,
                &mut cpu,
            )),
        };
        let skew_offset = draw_skew(params.cluster.clock_skew, rng);
        debug!(node = %params.node, ?skew_offset, "server node created");
        Self {
            node: params.node,
            replica,
            partition,
            topology: params.topology.clone(),
            timings: params.timings.clone(),
            protocol: params.protocol.clone(),
            wire: WireParams {
                simulated_value_size: params.protocol.simulated_value_size,
                num_replicas: params.cluster.num_replicas as u64,
            },
            skew_offset,
            now: Duration::ZERO,
            stop_at: params.stop_at,
            cpu,
            link: NetworkLink::new(
                params.node,
                replica,
                params.network.clone(),
                params.topology.clone(),
                params.client_homes.clone(),
            ),
            stats: ServerStats::new(params.warmup),
            engine,
        }
    }

    /// Schedule the periodic protocol events and the first CPU statistics
    /// sample. Called once before the run starts.
    pub fn arm(&mut self, sched: &mut dyn Scheduler) {
        self.cpu.arm_stats(Duration::ZERO, sched);
        match &self.engine {
            Engine::Gr(_) => GrState::arm(
                self.node,
                self.partition,
                &self.topology,
                &self.protocol,
                sched,
            ),
            Engine::Grv(_) => GrvState::arm(
                self.node,
                self.partition,
                &self.topology,
                &self.protocol,
                sched,
            ),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn gr(&self) -> Option<&GrState> {
        match &self.engine {
            Engine::Gr(state) => Some(state),
            Engine::Grv(_) => None,
        }
    }

    pub fn grv(&self) -> Option<&GrvState> {
        match &self.engine {
            Engine::Grv(state) => Some(state),
            Engine::Gr(_) => None,
        }
    }

    pub fn stats_document(&self) -> NodeStatsDocument {
        NodeStatsDocument {
            node: self.node.0,
            replica: self.replica.0,
            partition: self.partition.0,
            server: self.stats.document(self.now),
            cpu: self.cpu.stats_document(),
            network: self.link.stats_document(self.now),
        }
    }
}

fn draw_skew(scale: SimTime, rng: &mut impl Rng) -> SimTime {
    if scale == Duration::ZERO {
        return Duration::ZERO;
    }
    let normal = Normal::<f64>::new(0.0, 1.0).expect("valid distribution");
    let magnitude: f64 = normal.sample(rng).abs();
    Duration::from_secs_f64(magnitude * scale.as_secs_f64())
}

impl NodeHandler for ServerNode {
    fn handle_event(&mut self, now: SimTime, event: Event, sched: &mut dyn Scheduler) {
        assert!(
            now >= self.now,
            "{}: event at {now:?} delivered before {:?}",
            self.node,
            self.now
        );
        self.now = now;
        let clock = now + self.skew_offset;

        let Some(run) = self.cpu.intake(now, event, sched) else {
            return;
        };
        trace!(node = %self.node, kind = run.type_name(), "run started");
        let mut ctx = Ctx {
            now,
            clock,
            node: self.node,
            replica: self.replica,
            partition: self.partition,
            topology: &self.topology,
            timings: &self.timings,
            protocol: &self.protocol,
            wire: self.wire,
            cpu: &mut self.cpu,
            transport: &mut self.link,
            sched: &mut *sched,
            stats: &mut self.stats,
        };
        match (&mut self.engine, run) {
            (Engine::Gr(state), Event::Scalar(event)) => state.handle(&mut ctx, event),
            (Engine::Grv(state), Event::Vector(event)) => state.handle(&mut ctx, event),
            (_, other) => panic!(
                "{}: {} event does not match the running protocol at {now:?}",
                self.node,
                other.type_name()
            ),
        }
        self.cpu.end_run(sched);
    }

    fn on_commit_check(&mut self, now: SimTime) -> bool {
        now >= self.stop_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rainsim_core::{ScalarEvent, VectorEvent};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Default)]
    struct Recorder {
        pending: Vec<(SimTime, NodeId, Event)>,
    }

    impl Scheduler for Recorder {
        fn schedule_at(&mut self, to: NodeId, at: SimTime, event: Event) {
            self.pending.push((at, to, event));
        }
    }

    impl Recorder {
        fn pop_earliest(&mut self) -> Option<(SimTime, NodeId, Event)> {
            let index = self
                .pending
                .iter()
                .enumerate()
                .min_by_key(|(_, (at, _, _))| *at)
                .map(|(index, _)| index)?;
            Some(self.pending.remove(index))
        }
    }

    fn single_node(variant: ProtocolVariant) -> (ServerNode, Recorder) {
        let cluster = ClusterConfig::new(1, 1);
        let network = NetworkConfig::uniform(Duration::ZERO, Duration::ZERO, 1);
        let protocol = ProtocolConfig::new(variant);
        let timings = ServiceTimings::default();
        let topology = Topology::new(&cluster).expect("valid");
        let mut rng = StdRng::seed_from_u64(7);
        let mut node = ServerNode::new(
            ServerNodeParams {
                node: NodeId(0),
                cluster: &cluster,
                network: &network,
                protocol: &protocol,
                timings: &timings,
                topology: &topology,
                client_homes: &HashMap::new(),
                warmup: Duration::ZERO,
                stop_at: Duration::from_secs(1),
            },
            &mut rng,
        );
        let mut sched = Recorder::default();
        node.arm(&mut sched);
        (node, sched)
    }

    #[test]
    fn test_skew_disabled_by_default() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(draw_skew(Duration::ZERO, &mut rng), Duration::ZERO);
        assert!(draw_skew(Duration::from_millis(1), &mut rng) > Duration::ZERO);
    }

    #[test]
    fn test_arm_schedules_the_periodic_events() {
        let (_, sched) = single_node(ProtocolVariant::Scalar);
        let kinds: Vec<_> = sched
            .pending
            .iter()
            .map(|(_, _, event)| event.type_name())
            .collect();
        assert!(kinds.contains(&"CpuStatsTick"));
        assert!(kinds.contains(&"Scalar::ClockTick"));
        assert!(kinds.contains(&"Scalar::StartGstRound"));
    }

    #[test]
    fn test_clock_tick_round_trip_reschedules_itself() {
        let (mut node, mut sched) = single_node(ProtocolVariant::Scalar);
        // Drive the tick through its lock stages until the unlocked stage
        // re-arms the next tick roughly one interval later.
        for _ in 0..10 {
            let (at, to, event) = sched.pop_earliest().expect("queue never drains");
            assert_eq!(to, NodeId(0));
            let rearmed = matches!(&event, Event::Scalar(ScalarEvent::ClockTick))
                && at >= Duration::from_millis(2);
            node.handle_event(at, event, &mut sched);
            if rearmed {
                return;
            }
        }
        panic!("clock tick never re-armed");
    }

    #[test]
    #[should_panic(expected = "does not match the running protocol")]
    fn test_mismatched_protocol_event_panics() {
        let (mut node, mut sched) = single_node(ProtocolVariant::Scalar);
        node.handle_event(
            Duration::from_micros(1),
            Event::Vector(VectorEvent::ClockTick),
            &mut sched,
        );
    }
}

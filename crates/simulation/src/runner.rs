//! The simulation driver.
//!
//! Owns the server nodes and the event queue, delivers events in time
//! order, and captures client-bound deliveries in per-client inboxes.
//! Fully deterministic: the only randomness is the per-node clock-skew
//! draw, taken from a seeded `ChaCha8Rng` in node-id order at build time.

use crate::event_queue::EventQueue;
use rainsim_core::{Event, NodeHandler, Scheduler};
use rainsim_node::{NodeStatsDocument, ServerNode, ServerNodeParams};
use rainsim_types::{
    ClusterConfig, ConfigError, NetworkConfig, NodeId, ProtocolConfig, ReplicaId, ServiceTimings,
    SimTime, Topology,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

pub struct SimulationParams {
    pub cluster: ClusterConfig,
    pub network: NetworkConfig,
    pub protocol: ProtocolConfig,
    pub timings: ServiceTimings,
    /// Client node ids are allocated after the server ids, homed on
    /// replicas round-robin.
    pub num_clients: u32,
    pub seed: u64,
    /// Statistics ignore everything before this time.
    pub warmup: SimTime,
    pub stop_at: SimTime,
}

impl SimulationParams {
    pub fn new(cluster: ClusterConfig, protocol: ProtocolConfig) -> Self {
        let num_replicas = cluster.num_replicas;
        Self {
            cluster,
            network: NetworkConfig::uniform(
                Duration::from_micros(50),
                Duration::from_millis(40),
                num_replicas,
            ),
            protocol,
            timings: ServiceTimings::default(),
            num_clients: 0,
            seed: 0,
            warmup: Duration::ZERO,
            stop_at: Duration::from_secs(1),
        }
    }
}

pub struct Simulation {
    topology: Topology,
    nodes: Vec<ServerNode>,
    queue: EventQueue,
    now: SimTime,
    stop_at: SimTime,
    client_homes: HashMap<NodeId, ReplicaId>,
    inboxes: HashMap<NodeId, Vec<(SimTime, Event)>>,
}

impl Simulation {
    pub fn new(params: SimulationParams) -> Result<Self, ConfigError> {
        params.cluster.validate()?;
        params.network.validate(params.cluster.num_replicas)?;
        let topology = Topology::new(&params.cluster)?;

        let num_servers = params.cluster.num_servers();
        let mut client_homes = HashMap::new();
        let mut inboxes = HashMap::new();
        for index in 0..params.num_clients {
            let client = NodeId(num_servers + index);
            client_homes.insert(client, ReplicaId(index % params.cluster.num_replicas));
            inboxes.insert(client, Vec::new());
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut queue = EventQueue::new();
        let mut nodes = Vec::with_capacity(num_servers as usize);
        for id in 0..num_servers {
            let mut node = ServerNode::new(
                ServerNodeParams {
                    node: NodeId(id),
                    cluster: &params.cluster,
                    network: &params.network,
                    protocol: &params.protocol,
                    timings: &params.timings,
                    topology: &topology,
                    client_homes: &client_homes,
                    warmup: params.warmup,
                    stop_at: params.stop_at,
                },
                &mut rng,
            );
            node.arm(&mut queue);
            nodes.push(node);
        }
        info!(
            servers = num_servers,
            clients = params.num_clients,
            seed = params.seed,
            "simulation built"
        );
        Ok(Self {
            topology,
            nodes,
            queue,
            now: Duration::ZERO,
            stop_at: params.stop_at,
            client_homes,
            inboxes,
        })
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn node(&self, node: NodeId) -> &ServerNode {
        &self.nodes[node.0 as usize]
    }

    /// Node id of the `index`-th client.
    pub fn client(&self, index: u32) -> NodeId {
        let client = NodeId(self.topology.num_servers() + index);
        assert!(self.client_homes.contains_key(&client), "no such client");
        client
    }

    pub fn client_home(&self, client: NodeId) -> ReplicaId {
        self.client_homes[&client]
    }

    /// Inject an externally generated event, e.g. a client request.
    pub fn inject(&mut self, at: SimTime, to: NodeId, event: Event) {
        assert!(at >= self.now, "injection at {at:?} is in the past");
        self.queue.schedule_at(to, at, event);
    }

    /// Deliver every event up to and including `until`.
    pub fn run_until(&mut self, until: SimTime) {
        while let Some(at) = self.queue.peek_time() {
            if at > until {
                break;
            }
            let (now, to, event) = self.queue.pop().expect("peeked");
            self.now = now;
            if self.topology.is_server(to) {
                let node = &mut self.nodes[to.0 as usize];
                node.handle_event(now, event, &mut self.queue);
            } else {
                self.inboxes
                    .get_mut(&to)
                    .unwrap_or_else(|| panic!("delivery to unknown node {to} at {now:?}"))
                    .push((now, event));
            }
        }
        self.now = until;
    }

    /// Drain everything delivered to `client` so far.
    pub fn take_responses(&mut self, client: NodeId) -> Vec<(SimTime, Event)> {
        std::mem::take(
            self.inboxes
                .get_mut(&client)
                .unwrap_or_else(|| panic!("{client} is not a client")),
        )
    }

    /// Run to the configured stop time, commit every node, and collect the
    /// per-node statistics documents.
    pub fn finish(&mut self) -> Vec<NodeStatsDocument> {
        let stop_at = self.stop_at;
        self.run_until(stop_at);
        for node in &mut self.nodes {
            assert!(
                node.on_commit_check(stop_at),
                "{} not finished at stop time {stop_at:?}",
                node.node_id()
            );
        }
        debug!(now = ?self.now, "simulation finished");
        self.nodes.iter().map(ServerNode::stats_document).collect()
    }
}

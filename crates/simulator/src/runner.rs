//! Drives a full run: builds the cluster, injects client requests, pairs
//! responses with their requests, and assembles the report.

use crate::config::SimulatorConfig;
use crate::metrics::{LatencyRecorder, LatencySummary};
use rainsim_core::{Event, ScalarEvent, VectorEvent};
use rainsim_messages::{scalar, vector};
use rainsim_node::NodeStatsDocument;
use rainsim_simulation::Simulation;
use rainsim_types::{
    ConfigError, Key, NodeId, ProtocolVariant, SimTime, Value, VersionVector,
};
use serde::Serialize;
use tracing::info;

pub struct Simulator {
    config: SimulatorConfig,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub variant: ProtocolVariant,
    pub servers: u32,
    pub clients: u32,
    pub duration_seconds: f64,
    pub requests_sent: u64,
    pub responses_received: u64,
    pub put_latency: LatencySummary,
    pub get_latency: LatencySummary,
    pub nodes: Vec<NodeStatsDocument>,
}

/// One client's requests, paired with its responses afterwards. Requests
/// go to a single server, so per-sender FIFO keeps both sides in order.
struct ClientPlan {
    client: NodeId,
    target: NodeId,
    key: Key,
    puts_sent: Vec<SimTime>,
    gets_sent: Vec<SimTime>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<RunReport, ConfigError> {
        let config = &self.config;
        let mut sim = Simulation::new(config.simulation_params())?;
        info!(
            replicas = config.num_replicas,
            partitions = config.num_partitions,
            variant = ?config.variant,
            "run starting"
        );

        let mut plans: Vec<ClientPlan> = (0..config.num_clients())
            .map(|index| {
                let client = sim.client(index);
                let home = sim.client_home(client);
                let key = Key(index as u64);
                let target = sim
                    .topology()
                    .node_for(home, sim.topology().partition_for_key(key));
                ClientPlan {
                    client,
                    target,
                    key,
                    puts_sent: Vec::new(),
                    gets_sent: Vec::new(),
                }
            })
            .collect();

        // Leave room for the last responses to drain before the stop time.
        let horizon = config
            .duration
            .saturating_sub(config.inter_replica_delay * 2)
            .saturating_sub(config.request_interval);
        for plan in &mut plans {
            let mut at = config.request_interval;
            let mut seq: u64 = 0;
            while at < horizon {
                if seq % 2 == 0 {
                    let value = Value((seq / 2 % 250) as u8 + 1);
                    sim.inject(at, plan.target, put_request(config, plan, value));
                    plan.puts_sent.push(at);
                } else {
                    sim.inject(at, plan.target, get_request(config, plan));
                    plan.gets_sent.push(at);
                }
                seq += 1;
                at += config.request_interval;
            }
        }

        let nodes = sim.finish();

        let mut put_latency = LatencyRecorder::new();
        let mut get_latency = LatencyRecorder::new();
        let mut requests_sent = 0u64;
        let mut responses_received = 0u64;
        for plan in &plans {
            requests_sent += (plan.puts_sent.len() + plan.gets_sent.len()) as u64;
            let mut puts_done = 0;
            let mut gets_done = 0;
            for (arrived, event) in sim.take_responses(plan.client) {
                responses_received += 1;
                match classify(&event) {
                    ResponseKind::Put => {
                        let sent = plan.puts_sent[puts_done];
                        puts_done += 1;
                        if sent >= config.warmup {
                            put_latency.record(arrived - sent);
                        }
                    }
                    ResponseKind::Get => {
                        let sent = plan.gets_sent[gets_done];
                        gets_done += 1;
                        if sent >= config.warmup {
                            get_latency.record(arrived - sent);
                        }
                    }
                }
            }
        }

        Ok(RunReport {
            variant: config.variant,
            servers: config.num_replicas * config.num_partitions,
            clients: config.num_clients(),
            duration_seconds: config.duration.as_secs_f64(),
            requests_sent,
            responses_received,
            put_latency: put_latency.summary(),
            get_latency: get_latency.summary(),
            nodes,
        })
    }
}

enum ResponseKind {
    Put,
    Get,
}

fn classify(event: &Event) -> ResponseKind {
    match event {
        Event::Scalar(ScalarEvent::PutResponse(_)) | Event::Vector(VectorEvent::PutResponse(_)) => {
            ResponseKind::Put
        }
        Event::Scalar(ScalarEvent::GetResponse(_)) | Event::Vector(VectorEvent::GetResponse(_)) => {
            ResponseKind::Get
        }
        other => panic!("unexpected client delivery {}", other.type_name()),
    }
}

fn put_request(config: &SimulatorConfig, plan: &ClientPlan, value: Value) -> Event {
    match config.variant {
        ProtocolVariant::Scalar => Event::Scalar(ScalarEvent::PutRequest(scalar::PutRequest {
            client: plan.client,
            proxy: None,
            key: plan.key,
            value,
            dependency_time: SimTime::ZERO,
        })),
        ProtocolVariant::Vector => Event::Vector(VectorEvent::PutRequest(vector::PutRequest {
            client: plan.client,
            proxy: None,
            key: plan.key,
            value,
            dependency_vector: VersionVector::new(config.num_replicas),
        })),
    }
}

fn get_request(config: &SimulatorConfig, plan: &ClientPlan) -> Event {
    match config.variant {
        ProtocolVariant::Scalar => Event::Scalar(ScalarEvent::GetRequest(scalar::GetRequest {
            client: plan.client,
            proxy: None,
            key: plan.key,
            gst: SimTime::ZERO,
        })),
        ProtocolVariant::Vector => Event::Vector(VectorEvent::GetRequest(vector::GetRequest {
            client: plan.client,
            proxy: None,
            key: plan.key,
            gst_vector: VersionVector::new(config.num_replicas),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_small_scalar_run_answers_every_request() {
        let config = SimulatorConfig::new(2, 2, ProtocolVariant::Scalar)
            .with_clients_per_replica(1)
            .with_duration(Duration::from_millis(500))
            .with_warmup(Duration::from_millis(50))
            .with_request_interval(Duration::from_millis(20));
        let report = Simulator::new(config).run().expect("valid config");
        assert!(report.requests_sent > 0);
        assert_eq!(report.responses_received, report.requests_sent);
        assert!(report.put_latency.count > 0);
        assert!(report.get_latency.count > 0);
        assert_eq!(report.nodes.len(), 4);
    }

    #[test]
    fn test_small_vector_run_answers_every_request() {
        let config = SimulatorConfig::new(2, 1, ProtocolVariant::Vector)
            .with_clients_per_replica(1)
            .with_duration(Duration::from_millis(500))
            .with_warmup(Duration::from_millis(50))
            .with_request_interval(Duration::from_millis(20));
        let report = Simulator::new(config).run().expect("valid config");
        assert_eq!(report.responses_received, report.requests_sent);
        assert!(report.put_latency.p50_us > 0);
    }
}

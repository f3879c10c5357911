#![allow(dead_code)]

use rainsim_core::{Event, ScalarEvent, VectorEvent};
use rainsim_messages::{scalar, vector};
use rainsim_simulation::{Simulation, SimulationParams};
use rainsim_types::{
    ClusterConfig, Key, NetworkConfig, NodeId, ProtocolConfig, ProtocolVariant, SimTime, Value,
    VersionVector,
};
use std::time::Duration;

pub fn us(n: u64) -> SimTime {
    Duration::from_micros(n)
}

pub fn ms(n: u64) -> SimTime {
    Duration::from_millis(n)
}

/// A cluster with 50ms between datacenters and 10us within one, the shape
/// most scenarios use.
pub fn params(
    replicas: u32,
    partitions: u32,
    variant: ProtocolVariant,
    num_clients: u32,
) -> SimulationParams {
    let cluster = ClusterConfig::new(replicas, partitions).with_tree_fanout(1);
    let mut params = SimulationParams::new(cluster, ProtocolConfig::new(variant));
    params.network = NetworkConfig::uniform(us(10), ms(50), replicas);
    params.num_clients = num_clients;
    params.seed = 42;
    params.stop_at = Duration::from_secs(1);
    params
}

pub fn scalar_put(
    sim: &mut Simulation,
    at: SimTime,
    client: NodeId,
    to: NodeId,
    key: u64,
    value: u8,
) {
    sim.inject(
        at,
        to,
        Event::Scalar(ScalarEvent::PutRequest(scalar::PutRequest {
            client,
            proxy: None,
            key: Key(key),
            value: Value(value),
            dependency_time: Duration::ZERO,
        })),
    );
}

pub fn scalar_get(sim: &mut Simulation, at: SimTime, client: NodeId, to: NodeId, key: u64) {
    sim.inject(
        at,
        to,
        Event::Scalar(ScalarEvent::GetRequest(scalar::GetRequest {
            client,
            proxy: None,
            key: Key(key),
            gst: Duration::ZERO,
        })),
    );
}

pub fn scalar_rotx(
    sim: &mut Simulation,
    at: SimTime,
    client: NodeId,
    to: NodeId,
    keys: Vec<u64>,
    dependency_time: SimTime,
) {
    sim.inject(
        at,
        to,
        Event::Scalar(ScalarEvent::RotxRequest(scalar::RotxRequest {
            client,
            dependency_time,
            gst: Duration::ZERO,
            keys: keys.into_iter().map(Key).collect(),
        })),
    );
}

pub fn vector_put(
    sim: &mut Simulation,
    at: SimTime,
    client: NodeId,
    to: NodeId,
    key: u64,
    value: u8,
    num_replicas: u32,
) {
    sim.inject(
        at,
        to,
        Event::Vector(VectorEvent::PutRequest(vector::PutRequest {
            client,
            proxy: None,
            key: Key(key),
            value: Value(value),
            dependency_vector: VersionVector::new(num_replicas),
        })),
    );
}

pub fn vector_get(
    sim: &mut Simulation,
    at: SimTime,
    client: NodeId,
    to: NodeId,
    key: u64,
    num_replicas: u32,
) {
    sim.inject(
        at,
        to,
        Event::Vector(VectorEvent::GetRequest(vector::GetRequest {
            client,
            proxy: None,
            key: Key(key),
            gst_vector: VersionVector::new(num_replicas),
        })),
    );
}

pub fn vector_rotx(
    sim: &mut Simulation,
    at: SimTime,
    client: NodeId,
    to: NodeId,
    keys: Vec<u64>,
    dependency_time: SimTime,
    num_replicas: u32,
) {
    sim.inject(
        at,
        to,
        Event::Vector(VectorEvent::RotxRequest(vector::RotxRequest {
            client,
            dependency_time,
            keys: keys.into_iter().map(Key).collect(),
            gst_vector: VersionVector::new(num_replicas),
        })),
    );
}

pub fn scalar_put_responses(inbox: &[(SimTime, Event)]) -> Vec<(SimTime, scalar::PutResponse)> {
    inbox
        .iter()
        .filter_map(|(at, event)| match event {
            Event::Scalar(ScalarEvent::PutResponse(resp)) => Some((*at, resp.clone())),
            _ => None,
        })
        .collect()
}

pub fn scalar_get_responses(inbox: &[(SimTime, Event)]) -> Vec<(SimTime, scalar::GetResponse)> {
    inbox
        .iter()
        .filter_map(|(at, event)| match event {
            Event::Scalar(ScalarEvent::GetResponse(resp)) => Some((*at, resp.clone())),
            _ => None,
        })
        .collect()
}

pub fn scalar_rotx_responses(inbox: &[(SimTime, Event)]) -> Vec<(SimTime, scalar::RotxResponse)> {
    inbox
        .iter()
        .filter_map(|(at, event)| match event {
            Event::Scalar(ScalarEvent::RotxResponse(resp)) => Some((*at, resp.clone())),
            _ => None,
        })
        .collect()
}

pub fn vector_put_responses(inbox: &[(SimTime, Event)]) -> Vec<(SimTime, vector::PutResponse)> {
    inbox
        .iter()
        .filter_map(|(at, event)| match event {
            Event::Vector(VectorEvent::PutResponse(resp)) => Some((*at, resp.clone())),
            _ => None,
        })
        .collect()
}

pub fn vector_get_responses(inbox: &[(SimTime, Event)]) -> Vec<(SimTime, vector::GetResponse)> {
    inbox
        .iter()
        .filter_map(|(at, event)| match event {
            Event::Vector(VectorEvent::GetResponse(resp)) => Some((*at, resp.clone())),
            _ => None,
        })
        .collect()
}

pub fn vector_rotx_responses(inbox: &[(SimTime, Event)]) -> Vec<(SimTime, vector::RotxResponse)> {
    inbox
        .iter()
        .filter_map(|(at, event)| match event {
            Event::Vector(VectorEvent::RotxResponse(resp)) => Some((*at, resp.clone())),
            _ => None,
        })
        .collect()
}

//! Full-cluster scenarios for the vector-GST variant.

mod common;

use common::*;
use rainsim_simulation::Simulation;
use rainsim_types::{NodeId, ProtocolVariant, ReplicaId, Value};
use std::time::Duration;

#[test]
fn test_round_trip_reports_the_source_replica() {
    let mut sim = Simulation::new(params(1, 1, ProtocolVariant::Vector, 1)).expect("valid");
    let client = sim.client(0);
    let server = NodeId(0);

    vector_put(&mut sim, ms(20), client, server, 5, 7, 1);
    sim.run_until(ms(30));
    let puts = vector_put_responses(&sim.take_responses(client));
    assert_eq!(puts.len(), 1);
    let put = &puts[0].1;
    assert_eq!(put.source_replica, ReplicaId(0));
    assert!(put.update_time >= ms(20));

    vector_get(&mut sim, ms(30), client, server, 5, 1);
    sim.run_until(ms(40));
    let gets = vector_get_responses(&sim.take_responses(client));
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].1.value, Value(7));
    assert_eq!(gets[0].1.update_time, put.update_time);
    assert_eq!(gets[0].1.source_replica, ReplicaId(0));
}

#[test]
fn test_dependency_free_write_visible_once_replicated() {
    let mut sim = Simulation::new(params(2, 1, ProtocolVariant::Vector, 2)).expect("valid");
    let writer = sim.client(0);
    let reader = sim.client(1);
    let node_a = NodeId(0);
    let node_b = NodeId(1);

    vector_put(&mut sim, ms(10), writer, node_a, 5, 1, 2);
    vector_put(&mut sim, ms(200), writer, node_a, 5, 2, 2);

    // A write with an empty dependency vector is visible remotely as soon
    // as its replica update lands (about 250ms: 200ms send + 50ms
    // propagation). Before that the old value answers.
    vector_get(&mut sim, ms(230), reader, node_b, 5, 2);
    sim.run_until(ms(240));
    let gets = vector_get_responses(&sim.take_responses(reader));
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].1.value, Value(1));

    vector_get(&mut sim, ms(260), reader, node_b, 5, 2);
    sim.run_until(ms(280));
    let gets = vector_get_responses(&sim.take_responses(reader));
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].1.value, Value(2));
    assert_eq!(gets[0].1.source_replica, ReplicaId(0));
}

#[test]
fn test_gst_vector_slots_are_monotone() {
    let mut sim = Simulation::new(params(2, 1, ProtocolVariant::Vector, 2)).expect("valid");
    let writer = sim.client(0);
    for i in 0..20u64 {
        vector_put(&mut sim, ms(10 + i * 10), writer, NodeId(0), i % 3, 1, 2);
    }

    let mut last = vec![Duration::ZERO; 2];
    for step in 1..=6u64 {
        sim.run_until(ms(step * 50));
        let state = sim.node(NodeId(1)).grv().expect("vector");
        for r in 0..2 {
            let slot = state.gst_vector().get(ReplicaId(r));
            assert!(
                slot >= last[r as usize],
                "gst[{r}] went backwards at {:?}",
                sim.now()
            );
            last[r as usize] = slot;
        }
    }
}

#[test]
fn test_rotx_snapshot_waits_for_owner_clocks() {
    let mut sim = Simulation::new(params(1, 2, ProtocolVariant::Vector, 1)).expect("valid");
    let client = sim.client(0);

    vector_put(&mut sim, ms(10), client, NodeId(0), 0, 3, 1);
    vector_put(&mut sim, ms(10), client, NodeId(1), 1, 4, 1);
    sim.run_until(ms(50));
    let puts = vector_put_responses(&sim.take_responses(client));
    assert_eq!(puts.len(), 2);
    let newest_write = puts.iter().map(|(_, p)| p.update_time).max().expect("puts");

    // Snapshot time is pinned to the 60ms dependency; slice owners hold
    // their answers until their clocks cover it.
    vector_rotx(&mut sim, ms(50), client, NodeId(0), vec![0, 1], ms(60), 1);
    sim.run_until(ms(59));
    assert!(sim.take_responses(client).is_empty());

    sim.run_until(ms(100));
    let rotxs = vector_rotx_responses(&sim.take_responses(client));
    assert_eq!(rotxs.len(), 1);
    let (arrived, resp) = (&rotxs[0].0, &rotxs[0].1);
    assert!(*arrived >= ms(60));
    assert_eq!(resp.values, vec![Value(3), Value(4)]);
    assert_eq!(resp.dependency_vector.get(ReplicaId(0)), newest_write);
}

#[test]
fn test_put_waits_for_its_dependency_time() {
    let mut sim = Simulation::new(params(1, 1, ProtocolVariant::Vector, 1)).expect("valid");
    let client = sim.client(0);

    // Dependency 30ms in the node's simulated future: the write must be
    // delayed until the local clock reaches it.
    let mut deps = rainsim_types::VersionVector::new(1);
    deps.set(ReplicaId(0), ms(80));
    sim.inject(
        ms(50),
        NodeId(0),
        rainsim_core::Event::Vector(rainsim_core::VectorEvent::PutRequest(
            rainsim_messages::vector::PutRequest {
                client,
                proxy: None,
                key: rainsim_types::Key(1),
                value: Value(6),
                dependency_vector: deps,
            },
        )),
    );
    sim.run_until(ms(120));
    let puts = vector_put_responses(&sim.take_responses(client));
    assert_eq!(puts.len(), 1);
    assert!(puts[0].0 >= ms(80));
    assert!(puts[0].1.update_time >= ms(80));
}

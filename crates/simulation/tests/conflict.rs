//! Write-conflict resolution across replicas.
//!
//! Two clusters of two replicas race puts on the same key at the same
//! instant. With zero clock skew and identical service costs the two
//! writes carry identical timestamps, forcing the `(timestamp, source
//! replica)` tie-break.

mod common;

use common::*;
use rainsim_simulation::Simulation;
use rainsim_types::{ConflictWinPolicy, Key, NodeId, ProtocolVariant, ReplicaId, Value};

#[test]
fn test_tied_timestamps_resolve_to_the_higher_replica() {
    let mut sim = Simulation::new(params(2, 1, ProtocolVariant::Scalar, 2)).expect("valid");
    let client_a = sim.client(0);
    let client_b = sim.client(1);

    scalar_put(&mut sim, ms(100), client_a, NodeId(0), 5, 1);
    scalar_put(&mut sim, ms(100), client_b, NodeId(1), 5, 2);
    sim.run_until(ms(400));

    let head_a = sim
        .node(NodeId(0))
        .gr()
        .expect("scalar")
        .store()
        .head(Key(5))
        .expect("head on replica 0");
    let head_b = sim
        .node(NodeId(1))
        .gr()
        .expect("scalar")
        .store()
        .head(Key(5))
        .expect("head on replica 1");

    // The race actually tied, and both replicas converged on replica 1's
    // write.
    assert_eq!(head_a.update_time, head_b.update_time);
    assert_eq!(head_a.source_replica, ReplicaId(1));
    assert_eq!(head_b.source_replica, ReplicaId(1));
    assert_eq!(head_a.value, Value(2));
    assert_eq!(head_b.value, Value(2));
}

#[test]
fn test_stall_policy_strands_the_losing_side_queue() {
    let mut p = params(2, 1, ProtocolVariant::Scalar, 2);
    p.protocol.conflict_win_policy = ConflictWinPolicy::Stall;
    let mut sim = Simulation::new(p).expect("valid");
    let client_a = sim.client(0);
    let client_b = sim.client(1);

    scalar_put(&mut sim, ms(100), client_a, NodeId(0), 5, 1);
    scalar_put(&mut sim, ms(100), client_b, NodeId(1), 5, 2);
    // A later write from replica 1 queues behind the stalled winner and
    // never reaches replica 0's store.
    scalar_put(&mut sim, ms(300), client_b, NodeId(1), 5, 9);
    sim.run_until(ms(600));

    let head_a = sim
        .node(NodeId(0))
        .gr()
        .expect("scalar")
        .store()
        .head(Key(5))
        .expect("head on replica 0");
    let head_b = sim
        .node(NodeId(1))
        .gr()
        .expect("scalar")
        .store()
        .head(Key(5))
        .expect("head on replica 1");

    assert_eq!(head_a.source_replica, ReplicaId(0));
    assert_eq!(head_a.value, Value(1));
    assert_eq!(head_b.value, Value(9));
}

//! Messages of the scalar-GST variant.

use crate::{wire, WireParams, WireSize};
use rainsim_types::{Key, NodeId, PartitionId, ReplicaId, SimTime, Value};

/// Client get, possibly arriving via a proxy partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub client: NodeId,
    /// Set by the partition that forwarded the request; the response goes
    /// back through it.
    pub proxy: Option<NodeId>,
    pub key: Key,
    /// The freshest GST the client has observed.
    pub gst: SimTime,
}

impl WireSize for GetRequest {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        2 * wire::NODE_ID + wire::KEY + wire::TIMESTAMP
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    pub client: NodeId,
    pub value: Value,
    pub update_time: SimTime,
    pub gst: SimTime,
}

impl WireSize for GetResponse {
    fn wire_size(&self, params: &WireParams) -> u64 {
        wire::NODE_ID + 2 * wire::TIMESTAMP + params.simulated_value_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub client: NodeId,
    pub proxy: Option<NodeId>,
    pub key: Key,
    pub value: Value,
    /// Latest update time the client depends on; the put waits until the
    /// local clock passes it.
    pub dependency_time: SimTime,
}

impl WireSize for PutRequest {
    fn wire_size(&self, params: &WireParams) -> u64 {
        2 * wire::NODE_ID + wire::KEY + wire::TIMESTAMP + params.simulated_value_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResponse {
    pub client: NodeId,
    pub update_time: SimTime,
}

impl WireSize for PutResponse {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        wire::NODE_ID + wire::TIMESTAMP
    }
}

/// Replicated write, sent to the owning partition of every peer replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaUpdate {
    pub key: Key,
    pub value: Value,
    pub update_time: SimTime,
    /// Skew-free copy of the update time. Simulation bookkeeping for the
    /// staleness statistics; charged zero wire bytes.
    pub update_time_no_skew: SimTime,
    pub source_replica: ReplicaId,
    /// Head version the writer observed, for conflict detection at the
    /// receiver.
    pub previous_update_time: SimTime,
    pub previous_source_replica: ReplicaId,
}

impl WireSize for ReplicaUpdate {
    fn wire_size(&self, params: &WireParams) -> u64 {
        wire::KEY + 2 * wire::TIMESTAMP + 2 * wire::REPLICA_ID + params.simulated_value_size
    }
}

/// Periodic liveness signal carrying the sender replica's clock.
///
/// `time == 0` means "clock has not advanced past the last version-vector
/// bump"; receivers ignore those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub replica: ReplicaId,
    pub time: SimTime,
}

impl WireSize for Heartbeat {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        wire::REPLICA_ID + wire::TIMESTAMP
    }
}

/// Leaf-to-root step of the GST aggregation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LstFromLeaf {
    pub leaf_partition: PartitionId,
    pub lst: SimTime,
}

impl WireSize for LstFromLeaf {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        wire::COUNT + wire::TIMESTAMP
    }
}

/// Root broadcast completing the GST aggregation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GstFromRoot {
    pub gst: SimTime,
}

impl WireSize for GstFromRoot {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        wire::TIMESTAMP
    }
}

/// Kicks off a snapshot read of several keys on the coordinator, which may
/// be the requesting node itself (a read-only transaction delegating to its
/// own snapshot machinery).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub client: NodeId,
    /// Requester-local transaction record to route the response back to.
    pub request_id: u32,
    pub gst: SimTime,
    pub keys: Vec<Key>,
}

impl WireSize for SnapshotRequest {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        wire::NODE_ID + wire::COUNT + wire::TIMESTAMP + self.keys.len() as u64 * wire::KEY
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotResponse {
    pub request_id: u32,
    pub gst: SimTime,
    /// Maximum update time across the returned values.
    pub update_time: SimTime,
    /// Values in request key order.
    pub values: Vec<Value>,
}

impl WireSize for SnapshotResponse {
    fn wire_size(&self, params: &WireParams) -> u64 {
        wire::COUNT
            + 2 * wire::TIMESTAMP
            + self.values.len() as u64 * params.simulated_value_size
    }
}

/// Fan-out read of one key at a fixed snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest {
    pub from: NodeId,
    pub snapshot_time: SimTime,
    /// Coordinator-local snapshot record this slice belongs to.
    pub snapshot_id: u32,
    pub key: Key,
    /// Position of `key` in the transaction's key list.
    pub key_index: u32,
}

impl WireSize for SliceRequest {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        wire::NODE_ID + wire::TIMESTAMP + 2 * wire::COUNT + wire::KEY
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceResponse {
    pub snapshot_id: u32,
    pub key_index: u32,
    pub value: Value,
    pub update_time: SimTime,
    /// The responder's GST, folded into the coordinator's.
    pub gst: SimTime,
}

impl WireSize for SliceResponse {
    fn wire_size(&self, params: &WireParams) -> u64 {
        2 * wire::COUNT + 2 * wire::TIMESTAMP + params.simulated_value_size
    }
}

/// Read-only transaction over a set of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotxRequest {
    pub client: NodeId,
    pub dependency_time: SimTime,
    pub gst: SimTime,
    pub keys: Vec<Key>,
}

impl WireSize for RotxRequest {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        wire::NODE_ID + 2 * wire::TIMESTAMP + wire::COUNT + self.keys.len() as u64 * wire::KEY
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotxResponse {
    /// Values in request key order.
    pub values: Vec<Value>,
    /// Maximum update time across the returned values.
    pub update_time: SimTime,
    pub gst: SimTime,
}

impl WireSize for RotxResponse {
    fn wire_size(&self, params: &WireParams) -> u64 {
        2 * wire::TIMESTAMP
            + wire::COUNT
            + self.values.len() as u64 * params.simulated_value_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const PARAMS: WireParams = WireParams {
        simulated_value_size: 64,
        num_replicas: 3,
    };

    #[test]
    fn test_value_bearing_messages_charge_simulated_size() {
        let get = GetResponse {
            client: NodeId(9),
            value: Value(1),
            update_time: Duration::ZERO,
            gst: Duration::ZERO,
        };
        // One byte stored, 64 bytes on the wire.
        assert_eq!(get.wire_size(&PARAMS), 4 + 16 + 64);

        let update = ReplicaUpdate {
            key: Key(1),
            value: Value(1),
            update_time: Duration::ZERO,
            update_time_no_skew: Duration::ZERO,
            source_replica: ReplicaId(0),
            previous_update_time: Duration::ZERO,
            previous_source_replica: ReplicaId(0),
        };
        // update_time_no_skew is bookkeeping: two timestamps charged, not three.
        assert_eq!(update.wire_size(&PARAMS), 8 + 16 + 8 + 64);
    }

    #[test]
    fn test_rotx_sizes_scale_with_keys() {
        let request = RotxRequest {
            client: NodeId(9),
            dependency_time: Duration::ZERO,
            gst: Duration::ZERO,
            keys: vec![Key(1), Key(2), Key(3)],
        };
        assert_eq!(request.wire_size(&PARAMS), 4 + 16 + 4 + 3 * 8);

        let response = RotxResponse {
            values: vec![Value(0); 3],
            update_time: Duration::ZERO,
            gst: Duration::ZERO,
        };
        assert_eq!(response.wire_size(&PARAMS), 16 + 4 + 3 * 64);
    }
}

//! Messages of the vector-GST variant.
//!
//! Same protocol skeleton as [`crate::scalar`], with vectors where the
//! scalar variant carries single timestamps, and multi-key slices where the
//! scalar variant sends one slice per key.

use crate::{wire, WireParams, WireSize};
use rainsim_types::{Key, NodeId, PartitionId, ReplicaId, SimTime, Value, VersionVector};

// The heartbeat is identical in both variants.
pub use crate::scalar::Heartbeat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub client: NodeId,
    pub proxy: Option<NodeId>,
    pub key: Key,
    /// The freshest GST vector the client has observed.
    pub gst_vector: VersionVector,
}

impl WireSize for GetRequest {
    fn wire_size(&self, params: &WireParams) -> u64 {
        2 * wire::NODE_ID + wire::KEY + params.vector()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    pub client: NodeId,
    pub value: Value,
    pub update_time: SimTime,
    pub source_replica: ReplicaId,
    pub gst_vector: VersionVector,
}

impl WireSize for GetResponse {
    fn wire_size(&self, params: &WireParams) -> u64 {
        wire::NODE_ID
            + wire::TIMESTAMP
            + wire::REPLICA_ID
            + params.vector()
            + params.simulated_value_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub client: NodeId,
    pub proxy: Option<NodeId>,
    pub key: Key,
    pub value: Value,
    /// Update times the client depends on, one per replica; the put waits
    /// until the local clock passes their maximum.
    pub dependency_vector: VersionVector,
}

impl WireSize for PutRequest {
    fn wire_size(&self, params: &WireParams) -> u64 {
        2 * wire::NODE_ID + wire::KEY + params.vector() + params.simulated_value_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResponse {
    pub client: NodeId,
    pub update_time: SimTime,
    pub source_replica: ReplicaId,
}

impl WireSize for PutResponse {
    fn wire_size(&self, _params: &WireParams) -> u64 {
        wire::NODE_ID + wire::TIMESTAMP + wire::REPLICA_ID
    }
}

/// Replicated write carrying its full dependency vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaUpdate {
    pub key: Key,
    pub value: Value,
    pub update_time: SimTime,
    /// Skew-free update time, for the staleness statistics only.
    pub update_time_no_skew: SimTime,
    pub source_replica: ReplicaId,
    pub previous_update_time: SimTime,
    pub previous_source_replica: ReplicaId,
    pub dependency_vector: VersionVector,
}

impl WireSize for ReplicaUpdate {
    fn wire_size(&self, params: &WireParams) -> u64 {
        wire::KEY
            + 2 * wire::TIMESTAMP
            + 2 * wire::REPLICA_ID
            + params.vector()
            + params.simulated_value_size
    }
}

/// Leaf-to-root step of the GST-vector aggregation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LstFromLeaf {
    pub leaf_partition: PartitionId,
    pub lst_vector: VersionVector,
}

impl WireSize for LstFromLeaf {
    fn wire_size(&self, params: &WireParams) -> u64 {
        wire::COUNT + params.vector()
    }
}

/// Root broadcast completing the aggregation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GstFromRoot {
    pub gst_vector: VersionVector,
}

impl WireSize for GstFromRoot {
    fn wire_size(&self, params: &WireParams) -> u64 {
        params.vector()
    }
}

/// One key of a slice request, tagged with its position in the
/// transaction's key list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceKey {
    pub key_index: u32,
    pub key: Key,
}

/// Per-partition fan-out read of a read-only transaction: all the
/// transaction's keys owned by one partition, at a fixed snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest {
    pub from: NodeId,
    pub snapshot_time: SimTime,
    /// Coordinator-local transaction record this slice belongs to.
    pub rotx_id: u32,
    pub keys: Vec<SliceKey>,
    pub gst_vector: VersionVector,
}

impl WireSize for SliceRequest {
    fn wire_size(&self, params: &WireParams) -> u64 {
        wire::NODE_ID
            + wire::TIMESTAMP
            + 2 * wire::COUNT
            + self.keys.len() as u64 * (wire::KEY + wire::COUNT)
            + params.vector()
    }
}

/// One value of a slice response; the update time and source replica feed
/// the coordinator's merged dependency vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceValue {
    pub key_index: u32,
    pub value: Value,
    pub update_time: SimTime,
    pub source_replica: ReplicaId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceResponse {
    pub rotx_id: u32,
    pub values: Vec<SliceValue>,
}

impl WireSize for SliceResponse {
    fn wire_size(&self, params: &WireParams) -> u64 {
        2 * wire::COUNT
            + self.values.len() as u64
                * (wire::COUNT + wire::TIMESTAMP + wire::REPLICA_ID + params.simulated_value_size)
    }
}

/// Read-only transaction over a set of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotxRequest {
    pub client: NodeId,
    pub dependency_time: SimTime,
    pub keys: Vec<Key>,
    pub gst_vector: VersionVector,
}

impl WireSize for RotxRequest {
    fn wire_size(&self, params: &WireParams) -> u64 {
        wire::NODE_ID
            + wire::TIMESTAMP
            + 2 * wire::COUNT
            + self.keys.len() as u64 * wire::KEY
            + params.vector()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotxResponse {
    /// Values in request key order.
    pub values: Vec<Value>,
    /// Per-replica maximum of the returned values' update times.
    pub dependency_vector: VersionVector,
}

impl WireSize for RotxResponse {
    fn wire_size(&self, params: &WireParams) -> u64 {
        2 * wire::COUNT
            + self.values.len() as u64 * params.simulated_value_size
            + params.vector()
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
    fn test_vector_fields_scale_with_replicas() {
        let request = GetRequest {
            client: NodeId(9),
            proxy: None,
            key: Key(1),
            gst_vector: VersionVector::new(3),
        };
        assert_eq!(request.wire_size(&PARAMS), 8 + 8 + 3 * 8);

        let root = GstFromRoot {
            gst_vector: VersionVector::new(3),
        };
        assert_eq!(root.wire_size(&PARAMS), 3 * 8);
    }

    #[test]
    fn test_slice_sizes_scale_with_keys() {
        let request = SliceRequest {
            from: NodeId(0),
            snapshot_time: Duration::ZERO,
            rotx_id: 7,
            keys: vec![
                SliceKey {
                    key_index: 0,
                    key: Key(4),
                },
                SliceKey {
                    key_index: 2,
                    key: Key(8),
                },
            ],
            gst_vector: VersionVector::new(3),
        };
        assert_eq!(request.wire_size(&PARAMS), 4 + 8 + 8 + 2 * 12 + 3 * 8);

        let response = SliceResponse {
            rotx_id: 7,
            values: vec![
                SliceValue {
                    key_index: 0,
                    value: Value(1),
                    update_time: Duration::ZERO,
                    source_replica: ReplicaId(0),
                };
                2
            ],
        };
        assert_eq!(response.wire_size(&PARAMS), 8 + 2 * (4 + 8 + 4 + 64));
    }
}

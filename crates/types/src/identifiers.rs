//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data-center replica identifier (`0..num_replicas`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaId(pub u32);

impl ReplicaId {
    /// Get the raw index, for version-vector slot access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Replica({})", self.0)
    }
}

/// Partition identifier within a replica (`0..num_partitions`).
///
/// Partition 0 is the root of the GST aggregation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// The root partition of the GST aggregation tree.
    pub const ROOT: Self = PartitionId(0);

    pub fn is_root(self) -> bool {
        self.0 == 0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Partition({})", self.0)
    }
}

/// Simulation-wide node identifier.
///
/// Server nodes occupy the contiguous range `0..num_replicas*num_partitions`
/// (replica-major, see [`crate::Topology`]); client nodes come after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Key in the replicated store. Ownership is `key mod num_partitions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(pub u64);

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

/// Stored payload.
///
/// The simulation stores a single byte per version; wire-size accounting
/// uses the configured simulated value size instead (see
/// [`crate::ProtocolConfig::simulated_value_size`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Value(pub u8);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        assert_eq!(ReplicaId(2).to_string(), "Replica(2)");
        assert_eq!(PartitionId(0).to_string(), "Partition(0)");
        assert_eq!(NodeId(7).to_string(), "Node(7)");
        assert_eq!(Key(41).to_string(), "Key(41)");
        assert_eq!(Value(0xab).to_string(), "0xab");
    }

    #[test]
    fn test_root_partition() {
        assert!(PartitionId::ROOT.is_root());
        assert!(!PartitionId(1).is_root());
    }
}

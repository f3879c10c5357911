//! Cluster topology: node numbering, key ownership, and the GST
//! aggregation tree.

use crate::{ClusterConfig, ConfigError, Key, NodeId, PartitionId, ReplicaId};

/// Static cluster topology derived from a validated [`ClusterConfig`].
///
/// Server nodes are numbered replica-major: node `r * num_partitions + p`
/// hosts partition `p` of replica `r`. Within each replica, partitions form
/// a `tree_fanout`-ary aggregation tree rooted at partition 0; partition
/// `p`'s parent is `(p - 1) / fanout` and its children start at
/// `p * fanout + 1`.
#[derive(Debug, Clone)]
pub struct Topology {
    num_replicas: u32,
    num_partitions: u32,
    tree_fanout: u32,
}

impl Topology {
    pub fn new(cluster: &ClusterConfig) -> Result<Self, ConfigError> {
        cluster.validate()?;
        Ok(Self {
            num_replicas: cluster.num_replicas,
            num_partitions: cluster.num_partitions,
            tree_fanout: cluster.tree_fanout,
        })
    }

    pub fn num_replicas(&self) -> u32 {
        self.num_replicas
    }

    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    pub fn num_servers(&self) -> u32 {
        self.num_replicas * self.num_partitions
    }

    /// Node hosting `partition` of `replica`.
    pub fn node_for(&self, replica: ReplicaId, partition: PartitionId) -> NodeId {
        debug_assert!(replica.0 < self.num_replicas);
        debug_assert!(partition.0 < self.num_partitions);
        NodeId(replica.0 * self.num_partitions + partition.0)
    }

    /// Inverse of [`Self::node_for`]. Panics for non-server node ids.
    pub fn locate(&self, node: NodeId) -> (ReplicaId, PartitionId) {
        assert!(node.0 < self.num_servers(), "{node} is not a server node");
        (
            ReplicaId(node.0 / self.num_partitions),
            PartitionId(node.0 % self.num_partitions),
        )
    }

    pub fn is_server(&self, node: NodeId) -> bool {
        node.0 < self.num_servers()
    }

    /// Partition owning `key`.
    pub fn partition_for_key(&self, key: Key) -> PartitionId {
        PartitionId((key.0 % self.num_partitions as u64) as u32)
    }

    /// Node owning `key` within `replica`.
    pub fn owner(&self, replica: ReplicaId, key: Key) -> NodeId {
        self.node_for(replica, self.partition_for_key(key))
    }

    pub fn replicas(&self) -> impl Iterator<Item = ReplicaId> {
        (0..self.num_replicas).map(ReplicaId)
    }

    pub fn partitions(&self) -> impl Iterator<Item = PartitionId> {
        (0..self.num_partitions).map(PartitionId)
    }

    /// Peer replicas of `replica` (every other replica).
    pub fn peer_replicas(&self, replica: ReplicaId) -> impl Iterator<Item = ReplicaId> {
        (0..self.num_replicas)
            .map(ReplicaId)
            .filter(move |&r| r != replica)
    }

    /// Parent of `partition` in the aggregation tree. Panics at the root.
    pub fn tree_parent(&self, partition: PartitionId) -> PartitionId {
        assert!(!partition.is_root(), "root partition has no parent");
        PartitionId((partition.0 - 1) / self.tree_fanout)
    }

    /// Which child slot `partition` occupies under its parent.
    pub fn tree_child_index(&self, partition: PartitionId) -> usize {
        assert!(!partition.is_root(), "root partition has no parent");
        ((partition.0 - 1) % self.tree_fanout) as usize
    }

    pub fn tree_children(&self, partition: PartitionId) -> impl Iterator<Item = PartitionId> {
        let first = partition.0 * self.tree_fanout + 1;
        let last = (first + self.tree_fanout).min(self.num_partitions);
        (first.min(self.num_partitions)..last).map(PartitionId)
    }

    pub fn tree_num_children(&self, partition: PartitionId) -> usize {
        self.tree_children(partition).count()
    }

    pub fn tree_is_leaf(&self, partition: PartitionId) -> bool {
        self.tree_num_children(partition) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topo(replicas: u32, partitions: u32, fanout: u32) -> Topology {
        Topology::new(&ClusterConfig::new(replicas, partitions).with_tree_fanout(fanout))
            .expect("valid config")
    }

    #[test]
    fn test_node_numbering_round_trips() {
        let t = topo(3, 4, 2);
        assert_eq!(t.num_servers(), 12);
        for r in t.replicas() {
            for p in t.partitions() {
                let node = t.node_for(r, p);
                assert!(t.is_server(node));
                assert_eq!(t.locate(node), (r, p));
            }
        }
        assert!(!t.is_server(NodeId(12)));
    }

    #[test]
    fn test_key_ownership() {
        let t = topo(2, 4, 2);
        assert_eq!(t.partition_for_key(Key(0)), PartitionId(0));
        assert_eq!(t.partition_for_key(Key(7)), PartitionId(3));
        assert_eq!(t.owner(ReplicaId(1), Key(6)), t.node_for(ReplicaId(1), PartitionId(2)));
    }

    #[test]
    fn test_binary_tree_shape() {
        // 7 partitions, fanout 2:
        //        0
        //      1   2
        //    3 4   5 6
        let t = topo(1, 7, 2);
        assert_eq!(t.tree_parent(PartitionId(1)), PartitionId(0));
        assert_eq!(t.tree_parent(PartitionId(2)), PartitionId(0));
        assert_eq!(t.tree_parent(PartitionId(5)), PartitionId(2));
        assert_eq!(t.tree_child_index(PartitionId(5)), 0);
        assert_eq!(t.tree_child_index(PartitionId(6)), 1);
        assert_eq!(
            t.tree_children(PartitionId(1)).collect::<Vec<_>>(),
            vec![PartitionId(3), PartitionId(4)]
        );
        assert!(t.tree_is_leaf(PartitionId(3)));
        assert!(!t.tree_is_leaf(PartitionId(0)));
    }

    #[test]
    fn test_ragged_tree_edge() {
        // 6 partitions, fanout 2: partition 2 has one child (5).
        let t = topo(1, 6, 2);
        assert_eq!(t.tree_num_children(PartitionId(2)), 1);
        assert_eq!(
            t.tree_children(PartitionId(2)).collect::<Vec<_>>(),
            vec![PartitionId(5)]
        );
        assert!(t.tree_is_leaf(PartitionId(5)));
    }

    #[test]
    fn test_single_partition_is_root_and_leaf() {
        let t = topo(2, 1, 2);
        assert!(t.tree_is_leaf(PartitionId::ROOT));
        assert_eq!(t.tree_num_children(PartitionId::ROOT), 0);
    }

    #[test]
    fn test_peer_replicas() {
        let t = topo(3, 1, 2);
        assert_eq!(
            t.peer_replicas(ReplicaId(1)).collect::<Vec<_>>(),
            vec![ReplicaId(0), ReplicaId(2)]
        );
    }
}

//! Core types shared by every rainsim crate.
//!
//! This crate is dependency-light on purpose: identifiers, the version
//! vector, cluster topology arithmetic, and run configuration. Everything
//! here is plain data — no events, no protocol logic.

pub mod config;
pub mod identifiers;
pub mod topology;
pub mod version_vector;

pub use config::{
    ClusterConfig, ConfigError, ConflictWinPolicy, NetworkConfig, ProtocolConfig, ProtocolVariant,
    ServiceTimings,
};
pub use identifiers::{Key, NodeId, PartitionId, ReplicaId, Value};
pub use topology::Topology;
pub use version_vector::VersionVector;

/// Simulated time: elapsed duration since the start of the run.
///
/// All protocol timestamps (update times, GST components, clock readings)
/// are of this type. `Duration` is totally ordered, so timestamps can key
/// maps and drive tie-breaks without float hazards.
pub type SimTime = std::time::Duration;

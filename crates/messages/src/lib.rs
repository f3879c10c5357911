//! Protocol messages for both variants.
//!
//! Messages never leave the process; what matters for the simulation is the
//! number of bytes a message *would* occupy on the wire, which drives the
//! network interface's transmission-time accounting. [`WireSize`] computes
//! that from logical field sizes: a stored value is charged at the
//! configured simulated value size, and simulation-only bookkeeping fields
//! (such as skew-free update times, used by the staleness statistics) are
//! charged nothing.

pub mod scalar;
pub mod vector;

/// Logical field sizes used by wire-size accounting.
pub mod wire {
    /// A timestamp on the wire.
    pub const TIMESTAMP: u64 = 8;
    /// A key on the wire.
    pub const KEY: u64 = 8;
    /// A node identifier on the wire.
    pub const NODE_ID: u64 = 4;
    /// A replica identifier on the wire.
    pub const REPLICA_ID: u64 = 4;
    /// A count / index field on the wire.
    pub const COUNT: u64 = 4;
}

/// Parameters wire-size accounting depends on.
#[derive(Debug, Clone, Copy)]
pub struct WireParams {
    /// Bytes charged per stored value (the actual payload is one byte).
    pub simulated_value_size: u64,
    /// Slots in a version vector.
    pub num_replicas: u64,
}

impl WireParams {
    pub(crate) fn vector(&self) -> u64 {
        self.num_replicas * wire::TIMESTAMP
    }
}

/// Simulated on-wire size of a message.
pub trait WireSize {
    fn wire_size(&self, params: &WireParams) -> u64;
}

//! Event model and the traits connecting nodes to the scheduling kernel.
//!
//! Everything a node can receive is an [`Event`]. Protocol messages arrive
//! over the simulated network; CPU-substrate events (core bookkeeping, lock
//! round-trips carrying continuations) are scheduled by a node to itself.

pub mod event;
pub mod traits;

pub use event::{Event, LockId, RwLockId, ScalarEvent, VectorEvent};
pub use traits::{NodeHandler, Scheduler};

//! Traits at the seam between nodes and the scheduling kernel.

use crate::Event;
use rainsim_types::{NodeId, SimTime};

/// Injects events into the simulation's time-ordered queue.
///
/// Implemented by the runner; handed to nodes by reference for the duration
/// of one event delivery. Times are absolute simulation times: callers add
/// their own accrued CPU time and network delays before scheduling.
pub trait Scheduler {
    fn schedule_at(&mut self, to: NodeId, at: SimTime, event: Event);
}

/// A node, as seen by the runner.
///
/// `handle_event` must be synchronous and deterministic: no I/O, no real
/// clocks, no randomness beyond state seeded at construction. All outputs go
/// through the scheduler.
pub trait NodeHandler {
    /// Deliver one event at simulated time `now`.
    fn handle_event(&mut self, now: SimTime, event: Event, sched: &mut dyn Scheduler);

    /// Periodic liveness check. Returns true once the node considers the
    /// run finished; statistics are flushed at that point.
    fn on_commit_check(&mut self, now: SimTime) -> bool;
}

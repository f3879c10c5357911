//! Time-ordered event queue.
//!
//! Events are keyed by `(time, sequence)`: delivery is strictly
//! nondecreasing in time, and events scheduled for the same instant are
//! delivered in scheduling order. Given the same inputs the queue drains in
//! exactly the same order every run.

use rainsim_core::{Event, Scheduler};
use rainsim_types::{NodeId, SimTime};
use std::collections::BTreeMap;

/// Ordering key of one queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    pub at: SimTime,
    pub seq: u64,
}

#[derive(Default)]
pub struct EventQueue {
    queue: BTreeMap<EventKey, (NodeId, Event)>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Time of the next event, if any.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.keys().next().map(|key| key.at)
    }

    pub fn pop(&mut self) -> Option<(SimTime, NodeId, Event)> {
        let (key, (to, event)) = self.queue.pop_first()?;
        Some((key.at, to, event))
    }
}

impl Scheduler for EventQueue {
    fn schedule_at(&mut self, to: NodeId, at: SimTime, event: Event) {
        let key = EventKey {
            at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queue.insert(key, (to, event));
    }
}

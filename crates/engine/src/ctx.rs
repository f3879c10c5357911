//! Per-delivery handler context.
//!
//! A [`Ctx`] is assembled by the node shell for each delivered event and
//! borrows everything a handler may touch: the CPU accounting for the
//! current run, the outbound network interface, the event queue, and the
//! node's statistics. Handlers never see the scheduler directly; sends and
//! self-scheduling go through here so the invariants around lock
//! suspension hold in one place.

use crate::stats::ServerStats;
use rainsim_core::{Event, LockId, Scheduler};
use rainsim_cpu::Cpu;
use rainsim_messages::{WireParams, WireSize};
use rainsim_types::{NodeId, PartitionId, ProtocolConfig, ReplicaId, ServiceTimings, SimTime, Topology};

/// Outbound network interface, implemented by the node shell.
///
/// `at` is the departure time (delivery time plus CPU time accrued so
/// far); the transport adds transmission occupancy and propagation delay.
pub trait Transport {
    fn send(
        &mut self,
        at: SimTime,
        to: NodeId,
        wire_bytes: u64,
        event: Event,
        sched: &mut dyn Scheduler,
    );
}

pub struct Ctx<'a> {
    pub now: SimTime,
    /// `now` plus this node's fixed clock-skew offset.
    pub clock: SimTime,
    pub node: NodeId,
    pub replica: ReplicaId,
    pub partition: PartitionId,
    pub topology: &'a Topology,
    pub timings: &'a ServiceTimings,
    pub protocol: &'a ProtocolConfig,
    pub wire: WireParams,
    pub cpu: &'a mut Cpu,
    pub transport: &'a mut dyn Transport,
    pub sched: &'a mut dyn Scheduler,
    pub stats: &'a mut ServerStats,
}

impl Ctx<'_> {
    pub fn add_time(&mut self, time: SimTime) {
        self.cpu.add_time(time);
    }

    pub fn allow_no_time(&mut self) {
        self.cpu.allow_no_time();
    }

    pub fn wire_size<M: WireSize>(&self, message: &M) -> u64 {
        message.wire_size(&self.wire)
    }

    /// Charge the cost of building a `bytes`-sized message.
    pub fn charge_build(&mut self, bytes: u64) {
        self.add_time(self.timings.build_message_per_byte * bytes as u32);
    }

    /// Hand a message to the network. Forbidden once the current run has
    /// suspended on a lock; send before locking or from a later stage.
    pub fn send(&mut self, to: NodeId, wire_bytes: u64, event: Event) {
        assert!(
            !self.cpu.lock_called(),
            "{}: send after suspending on a lock",
            self.node
        );
        self.add_time(self.timings.send + self.timings.send_per_byte * wire_bytes as u32);
        let at = self.now + self.cpu.elapsed_time();
        self.transport.send(at, to, wire_bytes, event, self.sched);
    }

    /// Schedule an event to this node after `delay` of simulated time
    /// (past the CPU time accrued so far).
    pub fn schedule_self(&mut self, delay: SimTime, event: Event) {
        assert!(
            !self.cpu.lock_called(),
            "{}: schedule_self after suspending on a lock",
            self.node
        );
        let at = self.now + self.cpu.elapsed_time() + delay;
        self.sched.schedule_at(self.node, at, event);
    }

    pub fn lock(&mut self, lock: LockId, cont: Event) {
        self.cpu.lock_acquire(self.sched, lock, cont);
    }

    pub fn unlock(&mut self, lock: LockId, cont: Option<Event>) {
        self.cpu.lock_release(self.sched, lock, cont);
    }
}

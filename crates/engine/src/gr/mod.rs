//! Scalar-GST engine.
//!
//! Each node tracks a version vector (latest update time seen from each
//! replica) and a scalar GST. The version vector is guarded by one main
//! lock plus one lock per source replica for the apply path; the GST is
//! guarded by the main lock.

mod getput;
mod gst;
mod heartbeat;
mod replication;
mod rotx;
mod slice;
mod snapshot;
mod store;

use crate::ctx::Ctx;
use crate::slots::SlotArena;
use getput::{GetSlot, PutSlot};
use rainsim_core::{Event, LockId, ScalarEvent, Scheduler};
use rainsim_cpu::Cpu;
use rainsim_messages::scalar;
use rainsim_store::VersionStore;
use rainsim_types::{
    NodeId, PartitionId, ProtocolConfig, ReplicaId, SimTime, Topology, VersionVector,
};
use rotx::RotxSlot;
use snapshot::SnapshotSlot;
use std::collections::VecDeque;
use std::time::Duration;

pub(crate) fn ev(event: ScalarEvent) -> Event {
    Event::Scalar(event)
}

pub struct GrState {
    pub(crate) vv: VersionVector,
    pub(crate) gst: SimTime,
    pub(crate) store: VersionStore<()>,
    /// Minimum LST heard so far in the current aggregation round.
    pub(crate) min_lst: SimTime,
    /// One flag per tree child slot.
    pub(crate) lst_received: Vec<bool>,
    pub(crate) main_lock: LockId,
    /// One apply lock per source replica; applies from different replicas
    /// do not contend.
    pub(crate) replica_locks: Vec<LockId>,
    pub(crate) gets: SlotArena<GetSlot>,
    pub(crate) puts: SlotArena<PutSlot>,
    pub(crate) snapshots: SlotArena<SnapshotSlot>,
    pub(crate) rotxs: SlotArena<RotxSlot>,
    /// Per-source-replica apply queues keeping replica updates in
    /// production order.
    pub(crate) apply_queues: Vec<VecDeque<scalar::ReplicaUpdate>>,
}

impl GrState {
    pub fn new(num_replicas: u32, tree_fanout: u32, cpu: &mut Cpu) -> Self {
        let main_lock = cpu.new_lock();
        let replica_locks = (0..num_replicas).map(|_| cpu.new_lock()).collect();
        Self {
            vv: VersionVector::new(num_replicas),
            gst: Duration::ZERO,
            store: VersionStore::new(),
            min_lst: Duration::ZERO,
            lst_received: vec![false; tree_fanout as usize],
            main_lock,
            replica_locks,
            gets: SlotArena::new(),
            puts: SlotArena::new(),
            snapshots: SlotArena::new(),
            rotxs: SlotArena::new(),
            apply_queues: (0..num_replicas).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Schedule the periodic protocol events at startup. Runs outside any
    /// CPU run.
    pub fn arm(
        node: NodeId,
        partition: PartitionId,
        topology: &Topology,
        protocol: &ProtocolConfig,
        sched: &mut dyn Scheduler,
    ) {
        sched.schedule_at(node, protocol.clock_interval, ev(ScalarEvent::ClockTick));
        if topology.tree_is_leaf(partition) {
            sched.schedule_at(node, protocol.gst_interval, ev(ScalarEvent::StartGstRound));
        }
    }

    pub fn handle(&mut self, ctx: &mut Ctx, event: ScalarEvent) {
        match event {
            ScalarEvent::GetRequest(req) => self.on_get_request(ctx, req),
            ScalarEvent::ForwardedGetLocked(req) => self.on_forwarded_get_locked(ctx, req),
            ScalarEvent::GetLocked { slot } => self.on_get_locked(ctx, slot),
            ScalarEvent::GetUnlocked { slot } => self.on_get_unlocked(ctx, slot),
            ScalarEvent::GetResponse(resp) => self.on_get_response(ctx, resp),
            ScalarEvent::PutRequest(req) => self.on_put_request(ctx, req),
            ScalarEvent::PutLocked { slot } => self.on_put_locked(ctx, slot),
            ScalarEvent::PutUnlocked { slot } => self.on_put_unlocked(ctx, slot),
            ScalarEvent::PutResponse(resp) => self.on_put_response(ctx, resp),
            ScalarEvent::ReplicaUpdate(update) => self.on_replica_update(ctx, update),
            ScalarEvent::ReplicaUpdateLocked(update) => {
                self.on_replica_update_locked(ctx, update)
            }
            ScalarEvent::ReplicaUpdateUnlocked(update) => {
                self.on_replica_update_unlocked(ctx, update)
            }
            ScalarEvent::Heartbeat(hb) => self.on_heartbeat(ctx, hb),
            ScalarEvent::HeartbeatLocked(hb) => self.on_heartbeat_locked(ctx, hb),
            ScalarEvent::ClockTick => self.on_clock_tick(ctx),
            ScalarEvent::ClockTickLocked => self.on_clock_tick_locked(ctx),
            ScalarEvent::ClockTickUnlocked { send_time } => {
                self.on_clock_tick_unlocked(ctx, send_time)
            }
            ScalarEvent::StartGstRound => self.on_start_gst_round(ctx),
            ScalarEvent::LstFromLeaf(lst) => self.on_lst_from_leaf(ctx, lst),
            ScalarEvent::LstRootLocked => self.on_lst_root_locked(ctx),
            ScalarEvent::LstRootUnlocked => self.on_lst_root_unlocked(ctx),
            ScalarEvent::GstFromRoot(msg) => self.on_gst_from_root(ctx, msg),
            ScalarEvent::GstFromRootLocked(msg) => self.on_gst_from_root_locked(ctx, msg),
            ScalarEvent::GstFromRootUnlocked(msg) => self.on_gst_from_root_unlocked(ctx, msg),
            ScalarEvent::SnapshotRequest(req) => self.on_snapshot_request(ctx, req),
            ScalarEvent::SnapshotLocked { slot } => self.on_snapshot_locked(ctx, slot),
            ScalarEvent::SnapshotUnlocked { slot } => self.on_snapshot_unlocked(ctx, slot),
            ScalarEvent::SnapshotResponse(resp) => self.on_snapshot_response(ctx, resp),
            ScalarEvent::SliceRequest(req) => self.on_slice_request(ctx, req),
            ScalarEvent::SliceRequestLocked(req) => self.on_slice_request_locked(ctx, req),
            ScalarEvent::SliceRequestUnlocked(req) => self.on_slice_request_unlocked(ctx, req),
            ScalarEvent::SliceResponse(resp) => self.on_slice_response(ctx, resp),
            ScalarEvent::SliceResponseLocked(resp) => self.on_slice_response_locked(ctx, resp),
            ScalarEvent::SliceResponseUnlocked(resp) => {
                self.on_slice_response_unlocked(ctx, resp)
            }
            ScalarEvent::RotxRequest(req) => self.on_rotx_request(ctx, req),
            ScalarEvent::RotxResponse(_) => {
                panic!("{}: client-bound RotxResponse delivered to a server", ctx.node)
            }
        }
    }

    pub(crate) fn apply_lock(&self, replica: ReplicaId) -> LockId {
        self.replica_locks[replica.index()]
    }

    /// Current GST, for inspection by tests and the runner.
    pub fn gst(&self) -> SimTime {
        self.gst
    }

    pub fn version_vector(&self) -> &VersionVector {
        &self.vv
    }

    pub fn store(&self) -> &VersionStore<()> {
        &self.store
    }
}

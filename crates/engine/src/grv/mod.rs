//! Vector-GST engine.
//!
//! Same skeleton as [`crate::gr`], with a stable-time vector instead of a
//! scalar: one slot per replica, each version carrying the dependency
//! vector its writer observed. Two locks: the version-vector lock guards
//! `vv` and the store's write path, the GST-vector lock guards `gsv`.

mod getput;
mod gst;
mod heartbeat;
mod replication;
mod rotx;
mod slice;
mod store;

use crate::ctx::Ctx;
use crate::slots::SlotArena;
use getput::PutSlot;
use rainsim_core::{Event, LockId, Scheduler, VectorEvent};
use rainsim_cpu::Cpu;
use rainsim_messages::vector;
use rainsim_store::VersionStore;
use rainsim_types::{NodeId, PartitionId, ProtocolConfig, SimTime, Topology, VersionVector};
use rotx::RotxSlot;
use std::collections::VecDeque;

pub(crate) fn ev(event: VectorEvent) -> Event {
    Event::Vector(event)
}

pub struct GrvState {
    pub(crate) vv: VersionVector,
    pub(crate) gsv: VersionVector,
    pub(crate) store: VersionStore<VersionVector>,
    pub(crate) min_lst: VersionVector,
    pub(crate) lst_received: Vec<bool>,
    pub(crate) lock_vv: LockId,
    pub(crate) lock_gsv: LockId,
    pub(crate) puts: SlotArena<PutSlot>,
    pub(crate) rotxs: SlotArena<RotxSlot>,
    pub(crate) apply_queues: Vec<VecDeque<vector::ReplicaUpdate>>,
}

impl GrvState {
    pub fn new(num_replicas: u32, tree_fanout: u32, cpu: &mut Cpu) -> Self {
        Self {
            vv: VersionVector::new(num_replicas),
            gsv: VersionVector::new(num_replicas),
            store: VersionStore::new(),
            min_lst: VersionVector::new(num_replicas),
            lst_received: vec![false; tree_fanout as usize],
            lock_vv: cpu.new_lock(),
            lock_gsv: cpu.new_lock(),
            puts: SlotArena::new(),
            rotxs: SlotArena::new(),
            apply_queues: (0..num_replicas).map(|_| VecDeque::new()).collect(),
        }
    }

    pub fn arm(
        node: NodeId,
        partition: PartitionId,
        topology: &Topology,
        protocol: &ProtocolConfig,
        sched: &mut dyn Scheduler,
    ) {
        sched.schedule_at(node, protocol.clock_interval, ev(VectorEvent::ClockTick));
        if topology.tree_is_leaf(partition) {
            sched.schedule_at(node, protocol.gst_interval, ev(VectorEvent::StartGstRound));
        }
    }

    pub fn handle(&mut self, ctx: &mut Ctx, event: VectorEvent) {
        match event {
            VectorEvent::GetRequest(req) => self.on_get_request(ctx, req),
            VectorEvent::ForwardedGetLocked(req) => self.on_forwarded_get_locked(ctx, req),
            VectorEvent::GetLocked(req) => self.on_get_locked(ctx, req),
            VectorEvent::GetUnlocked(req) => self.on_get_unlocked(ctx, req),
            VectorEvent::GetResponse(resp) => self.on_get_response(ctx, resp),
            VectorEvent::PutRequest(req) => self.on_put_request(ctx, req),
            VectorEvent::PutLocked { slot } => self.on_put_locked(ctx, slot),
            VectorEvent::PutUnlocked { slot } => self.on_put_unlocked(ctx, slot),
            VectorEvent::PutResponse(resp) => self.on_put_response(ctx, resp),
            VectorEvent::ReplicaUpdate(update) => self.on_replica_update(ctx, update),
            VectorEvent::ReplicaUpdateLocked(update) => {
                self.on_replica_update_locked(ctx, update)
            }
            VectorEvent::ReplicaUpdateUnlocked(update) => {
                self.on_replica_update_unlocked(ctx, update)
            }
            VectorEvent::Heartbeat(hb) => self.on_heartbeat(ctx, hb),
            VectorEvent::HeartbeatLocked(hb) => self.on_heartbeat_locked(ctx, hb),
            VectorEvent::ClockTick => self.on_clock_tick(ctx),
            VectorEvent::ClockTickLocked => self.on_clock_tick_locked(ctx),
            VectorEvent::ClockTickUnlocked { send_time } => {
                self.on_clock_tick_unlocked(ctx, send_time)
            }
            VectorEvent::StartGstRound => self.on_start_gst_round(ctx),
            VectorEvent::LstFromLeaf(lst) => self.on_lst_from_leaf(ctx, lst),
            VectorEvent::LstRootLocked => self.on_lst_root_locked(ctx),
            VectorEvent::LstRootUnlocked => self.on_lst_root_unlocked(ctx),
            VectorEvent::GstFromRoot(msg) => self.on_gst_from_root(ctx, msg),
            VectorEvent::GstFromRootLocked(msg) => self.on_gst_from_root_locked(ctx, msg),
            VectorEvent::GstFromRootUnlocked => self.on_gst_from_root_unlocked(ctx),
            VectorEvent::SliceRequest(req) => self.on_slice_request(ctx, req),
            VectorEvent::SliceRequestLocked(req) => self.on_slice_request_locked(ctx, req),
            VectorEvent::SliceRequestUnlocked(req) => self.on_slice_request_unlocked(ctx, req),
            VectorEvent::SliceResponse(resp) => self.on_slice_response(ctx, resp),
            VectorEvent::RotxRequest(req) => self.on_rotx_request(ctx, req),
            VectorEvent::RotxRequestLocked(req) => self.on_rotx_request_locked(ctx, req),
            VectorEvent::RotxRequestUnlocked(req) => self.on_rotx_request_unlocked(ctx, req),
            VectorEvent::RotxResponse(_) => {
                panic!("{}: client-bound RotxResponse delivered to a server", ctx.node)
            }
        }
    }

    pub fn gst_vector(&self) -> &VersionVector {
        &self.gsv
    }

    pub fn version_vector(&self) -> &VersionVector {
        &self.vv
    }

    pub fn store(&self) -> &VersionStore<VersionVector> {
        &self.store
    }

    /// Scalar dependency time of a put: the maximum slot of its vector.
    pub(crate) fn max_dependency(vector: &VersionVector) -> SimTime {
        vector.as_slice().iter().copied().max().unwrap_or(SimTime::ZERO)
    }
}

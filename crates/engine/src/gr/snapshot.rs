//! Snapshot reads: fix a snapshot time under the main lock, then fan one
//! slice request per key out to the owning partitions.

use super::{ev, GrState};
use crate::ctx::Ctx;
use rainsim_core::ScalarEvent;
use rainsim_messages::scalar::{SliceRequest, SnapshotRequest, SnapshotResponse};
use rainsim_types::{Key, NodeId, SimTime, Value};

pub(crate) struct SnapshotSlot {
    pub client: NodeId,
    /// Requester-local id (the coordinator's ROTX slot).
    pub request_id: u32,
    /// Request threshold before the lock; reused afterwards as the
    /// max-fold of the responders' GSTs.
    pub gst: SimTime,
    /// Snapshot time, fixed under the lock.
    pub time: SimTime,
    pub keys: Vec<Key>,
    pub values: Vec<Value>,
    /// Max-fold of the returned versions' update times.
    pub update_time: SimTime,
    pub received: usize,
}

impl GrState {
    pub(crate) fn on_snapshot_request(&mut self, ctx: &mut Ctx, request: SnapshotRequest) {
        ctx.charge_build(ctx.wire_size(&request));
        let num_keys = request.keys.len();
        let slot = self.snapshots.insert(SnapshotSlot {
            client: request.client,
            request_id: request.request_id,
            gst: request.gst,
            time: SimTime::ZERO,
            keys: request.keys,
            values: vec![Value(0); num_keys],
            update_time: SimTime::ZERO,
            received: 0,
        });
        ctx.lock(self.main_lock, ev(ScalarEvent::SnapshotLocked { slot }));
    }

    pub(crate) fn on_snapshot_locked(&mut self, ctx: &mut Ctx, slot: u32) {
        let request_gst = self.snapshots.get(slot).gst;
        self.update_gst(ctx, request_gst);
        let record = self.snapshots.get_mut(slot);
        record.time = self.gst;
        record.gst = SimTime::ZERO;
        ctx.unlock(self.main_lock, Some(ev(ScalarEvent::SnapshotUnlocked { slot })));
    }

    pub(crate) fn on_snapshot_unlocked(&mut self, ctx: &mut Ctx, slot: u32) {
        let record = self.snapshots.get(slot);
        let snapshot_time = record.time;
        let keys = record.keys.clone();

        let probe = SliceRequest {
            from: ctx.node,
            snapshot_time,
            snapshot_id: slot,
            key: Key(0),
            key_index: 0,
        };
        let size = ctx.wire_size(&probe);
        ctx.charge_build(size);
        for (index, key) in keys.into_iter().enumerate() {
            let request = SliceRequest {
                from: ctx.node,
                snapshot_time,
                snapshot_id: slot,
                key,
                key_index: index as u32,
            };
            let owner = ctx.topology.owner(ctx.replica, key);
            ctx.send(owner, size, ev(ScalarEvent::SliceRequest(request)));
        }
    }

    /// All slices arrived: answer the requester, or complete the local
    /// transaction directly when we coordinated it ourselves.
    pub(crate) fn finish_snapshot(&mut self, ctx: &mut Ctx, slot: u32) {
        let record = self.snapshots.remove(slot);
        let response = SnapshotResponse {
            request_id: record.request_id,
            gst: record.gst,
            update_time: record.update_time,
            values: record.values,
        };
        let size = ctx.wire_size(&response);
        ctx.charge_build(size);
        if record.client == ctx.node {
            self.complete_rotx(ctx, response);
        } else {
            ctx.send(record.client, size, ev(ScalarEvent::SnapshotResponse(response)));
        }
    }
}

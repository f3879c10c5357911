//! Read-only transactions.
//!
//! A ROTX coordinator parks the transaction until its dependency time is
//! covered by the GST, then delegates to the snapshot machinery against
//! itself. GST raises re-evaluate every parked transaction.

use super::{ev, GrState};
use crate::ctx::Ctx;
use rainsim_core::ScalarEvent;
use rainsim_messages::scalar::{RotxRequest, RotxResponse, SnapshotRequest, SnapshotResponse};
use rainsim_types::{Key, NodeId, SimTime};
use tracing::trace;

pub(crate) struct RotxSlot {
    pub client: NodeId,
    pub dependency_time: SimTime,
    /// GST threshold carried by the request, forwarded to the snapshot.
    pub gst: SimTime,
    pub keys: Vec<Key>,
    pub waiting_gst: bool,
}

impl GrState {
    pub(crate) fn on_rotx_request(&mut self, ctx: &mut Ctx, request: RotxRequest) {
        let snapshot_size = ctx.wire_size(&SnapshotRequest {
            client: ctx.node,
            request_id: 0,
            gst: request.gst,
            keys: request.keys.clone(),
        });
        ctx.charge_build(ctx.wire_size(&request) + snapshot_size);

        let dependency_time = request.dependency_time;
        let slot = self.rotxs.insert(RotxSlot {
            client: request.client,
            dependency_time,
            gst: request.gst,
            keys: request.keys,
            waiting_gst: false,
        });
        if dependency_time <= self.gst {
            self.start_snapshot(ctx, slot);
        } else {
            trace!(node = %ctx.node, ?dependency_time, gst = ?self.gst, "rotx parked on gst");
            self.rotxs.get_mut(slot).waiting_gst = true;
        }
    }

    /// Deliver the snapshot request to ourselves; the snapshot path owns
    /// the rest of the transaction.
    fn start_snapshot(&mut self, ctx: &mut Ctx, slot: u32) {
        let record = self.rotxs.get(slot);
        let request = SnapshotRequest {
            client: ctx.node,
            request_id: slot,
            gst: record.gst,
            keys: record.keys.clone(),
        };
        ctx.schedule_self(SimTime::ZERO, ev(ScalarEvent::SnapshotRequest(request)));
    }

    /// Called under the main lock whenever the GST rises.
    pub(crate) fn on_gst_raised(&mut self, ctx: &mut Ctx) {
        let parked: Vec<u32> = self.rotxs.ids().collect();
        for slot in parked {
            ctx.add_time(ctx.timings.gst_update_per_rotx);
            let record = self.rotxs.get_mut(slot);
            if record.waiting_gst && record.dependency_time < self.gst {
                record.waiting_gst = false;
                self.start_snapshot(ctx, slot);
            }
        }
    }

    /// Snapshot completion for a transaction this node coordinates.
    pub(crate) fn complete_rotx(&mut self, ctx: &mut Ctx, snapshot: SnapshotResponse) {
        let record = self.rotxs.remove(snapshot.request_id);
        let response = RotxResponse {
            values: snapshot.values,
            update_time: snapshot.update_time,
            gst: snapshot.gst,
        };
        let size = ctx.wire_size(&response);
        ctx.charge_build(size);
        ctx.send(record.client, size, ev(ScalarEvent::RotxResponse(response)));
        ctx.stats.count_rotx(ctx.now);
    }

    /// A snapshot response arriving over the network belongs to a
    /// transaction coordinated here.
    pub(crate) fn on_snapshot_response(&mut self, ctx: &mut Ctx, response: SnapshotResponse) {
        self.complete_rotx(ctx, response);
    }
}

//! Slice reads: one key at a fixed snapshot time.

use super::{ev, GrState};
use crate::ctx::Ctx;
use rainsim_core::ScalarEvent;
use rainsim_messages::scalar::{SliceRequest, SliceResponse};

impl GrState {
    pub(crate) fn on_slice_request(&mut self, ctx: &mut Ctx, request: SliceRequest) {
        // The snapshot time doubles as a GST hint from the coordinator.
        if self.gst_need_update(ctx, request.snapshot_time) {
            ctx.lock(self.main_lock, ev(ScalarEvent::SliceRequestLocked(request)));
        } else {
            self.on_slice_request_unlocked(ctx, request);
        }
    }

    pub(crate) fn on_slice_request_locked(&mut self, ctx: &mut Ctx, request: SliceRequest) {
        self.update_gst(ctx, request.snapshot_time);
        ctx.unlock(
            self.main_lock,
            Some(ev(ScalarEvent::SliceRequestUnlocked(request))),
        );
    }

    pub(crate) fn on_slice_request_unlocked(&mut self, ctx: &mut Ctx, request: SliceRequest) {
        let version = self.get_value_at(ctx, request.key, request.snapshot_time);
        let (value, update_time) = version
            .map(|v| (v.value, v.update_time))
            .unwrap_or(super::store::MISSING);
        let response = SliceResponse {
            snapshot_id: request.snapshot_id,
            key_index: request.key_index,
            value,
            update_time,
            gst: self.gst,
        };
        let size = ctx.wire_size(&response);
        ctx.charge_build(size);
        ctx.send(request.from, size, ev(ScalarEvent::SliceResponse(response)));
    }

    pub(crate) fn on_slice_response(&mut self, ctx: &mut Ctx, response: SliceResponse) {
        if self.gst_need_update(ctx, response.gst) {
            ctx.lock(self.main_lock, ev(ScalarEvent::SliceResponseLocked(response)));
        } else {
            self.on_slice_response_unlocked(ctx, response);
        }
    }

    pub(crate) fn on_slice_response_locked(&mut self, ctx: &mut Ctx, response: SliceResponse) {
        self.update_gst(ctx, response.gst);
        ctx.unlock(
            self.main_lock,
            Some(ev(ScalarEvent::SliceResponseUnlocked(response))),
        );
    }

    pub(crate) fn on_slice_response_unlocked(&mut self, ctx: &mut Ctx, response: SliceResponse) {
        ctx.add_time(ctx.timings.slice_response_per_value);
        let record = self.snapshots.get_mut(response.snapshot_id);
        record.values[response.key_index as usize] = response.value;
        record.update_time = record.update_time.max(response.update_time);
        record.gst = record.gst.max(response.gst);
        record.received += 1;
        if record.received == record.keys.len() {
            self.finish_snapshot(ctx, response.snapshot_id);
        }
    }
}

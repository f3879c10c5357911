//! Multi-key slice reads at a fixed snapshot time.

use super::{ev, GrvState};
use crate::ctx::Ctx;
use rainsim_core::VectorEvent;
use rainsim_messages::vector::{SliceRequest, SliceResponse, SliceValue};

impl GrvState {
    pub(crate) fn on_slice_request(&mut self, ctx: &mut Ctx, request: SliceRequest) {
        ctx.allow_no_time();
        if request.snapshot_time > ctx.clock {
            // Snapshot in our future; retry once the clock covers it.
            let delay = request.snapshot_time - ctx.clock;
            ctx.schedule_self(delay, ev(VectorEvent::SliceRequest(request)));
            return;
        }
        if self.gsv_need_update(ctx, &request.gst_vector) {
            ctx.lock(self.lock_gsv, ev(VectorEvent::SliceRequestLocked(request)));
        } else {
            self.on_slice_request_unlocked(ctx, request);
        }
    }

    pub(crate) fn on_slice_request_locked(&mut self, ctx: &mut Ctx, request: SliceRequest) {
        self.update_gsv(ctx, &request.gst_vector);
        ctx.unlock(
            self.lock_gsv,
            Some(ev(VectorEvent::SliceRequestUnlocked(request))),
        );
    }

    pub(crate) fn on_slice_request_unlocked(&mut self, ctx: &mut Ctx, request: SliceRequest) {
        // The snapshot vector is our GST vector with the local slot pinned
        // to the clock: locally we can see up to now, remotely up to the
        // stable frontier.
        let mut snapshot = self.gsv.clone();
        snapshot.set(ctx.replica, ctx.clock);

        let mut values = Vec::with_capacity(request.keys.len());
        for slice_key in &request.keys {
            let version = self.get_value_at(ctx, slice_key.key, &snapshot);
            let (value, update_time, source_replica) = version
                .map(|v| (v.value, v.update_time, v.source_replica))
                .unwrap_or(super::store::MISSING);
            values.push(SliceValue {
                key_index: slice_key.key_index,
                value,
                update_time,
                source_replica,
            });
        }
        let response = SliceResponse {
            rotx_id: request.rotx_id,
            values,
        };
        let size = ctx.wire_size(&response);
        ctx.charge_build(size);
        ctx.send(request.from, size, ev(VectorEvent::SliceResponse(response)));
    }

    pub(crate) fn on_slice_response(&mut self, ctx: &mut Ctx, response: SliceResponse) {
        ctx.add_time(ctx.timings.slice_response_per_value * response.values.len() as u32);
        let record = self.rotxs.get_mut(response.rotx_id);
        for value in &response.values {
            record
                .dependency_vector
                .set_max(value.source_replica, value.update_time);
            record.values[value.key_index as usize] = value.value;
        }
        record.received += response.values.len();
        if record.received == record.expected {
            self.finish_rotx(ctx, response.rotx_id);
        }
    }
}

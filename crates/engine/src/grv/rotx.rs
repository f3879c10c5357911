//! Read-only transactions, vector variant.
//!
//! No parking here: the coordinator picks a snapshot time at or past the
//! dependency, fans one multi-key slice per partition out, and slice
//! owners self-reschedule until their clock covers the snapshot.

use super::{ev, GrvState};
use crate::ctx::Ctx;
use rainsim_core::VectorEvent;
use rainsim_messages::vector::{RotxRequest, RotxResponse, SliceKey, SliceRequest};
use rainsim_types::{NodeId, Value, VersionVector};

pub(crate) struct RotxSlot {
    pub client: NodeId,
    /// Per-replica max of the returned versions' update times.
    pub dependency_vector: VersionVector,
    pub values: Vec<Value>,
    pub expected: usize,
    pub received: usize,
}

impl GrvState {
    pub(crate) fn on_rotx_request(&mut self, ctx: &mut Ctx, request: RotxRequest) {
        if self.gsv_need_update(ctx, &request.gst_vector) {
            ctx.lock(self.lock_gsv, ev(VectorEvent::RotxRequestLocked(request)));
        } else {
            self.on_rotx_request_unlocked(ctx, request);
        }
    }

    pub(crate) fn on_rotx_request_locked(&mut self, ctx: &mut Ctx, request: RotxRequest) {
        self.update_gsv(ctx, &request.gst_vector);
        ctx.unlock(
            self.lock_gsv,
            Some(ev(VectorEvent::RotxRequestUnlocked(request))),
        );
    }

    pub(crate) fn on_rotx_request_unlocked(&mut self, ctx: &mut Ctx, request: RotxRequest) {
        ctx.charge_build(ctx.wire_size(&request));
        let num_keys = request.keys.len();
        let slot = self.rotxs.insert(RotxSlot {
            client: request.client,
            dependency_vector: VersionVector::new(self.vv.len() as u32),
            values: vec![Value(0); num_keys],
            expected: num_keys,
            received: 0,
        });
        let snapshot_time = ctx.clock.max(request.dependency_time);

        let partitions: Vec<_> = ctx.topology.partitions().collect();
        for partition in partitions {
            ctx.add_time(ctx.timings.rotx_request_per_partition);
            let keys: Vec<SliceKey> = request
                .keys
                .iter()
                .enumerate()
                .filter(|(_, &key)| ctx.topology.partition_for_key(key) == partition)
                .map(|(index, &key)| SliceKey {
                    key_index: index as u32,
                    key,
                })
                .collect();
            if keys.is_empty() {
                continue;
            }
            let slice = SliceRequest {
                from: ctx.node,
                snapshot_time,
                rotx_id: slot,
                keys,
                gst_vector: self.gsv.clone(),
            };
            let size = ctx.wire_size(&slice);
            ctx.charge_build(size);
            let owner = ctx.topology.node_for(ctx.replica, partition);
            ctx.send(owner, size, ev(VectorEvent::SliceRequest(slice)));
        }
    }

    pub(crate) fn finish_rotx(&mut self, ctx: &mut Ctx, slot: u32) {
        let record = self.rotxs.remove(slot);
        let response = RotxResponse {
            values: record.values,
            dependency_vector: record.dependency_vector,
        };
        let size = ctx.wire_size(&response);
        ctx.charge_build(size);
        ctx.send(record.client, size, ev(VectorEvent::RotxResponse(response)));
        ctx.stats.count_rotx(ctx.now);
    }
}

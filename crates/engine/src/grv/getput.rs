//! Get and put paths, vector variant.

use super::{ev, GrvState};
use crate::ctx::Ctx;
use rainsim_core::VectorEvent;
use rainsim_messages::vector::{GetRequest, GetResponse, PutRequest, PutResponse, ReplicaUpdate};
use rainsim_types::{Key, NodeId, ReplicaId, SimTime, Value, VersionVector};
use tracing::trace;

pub(crate) struct PutSlot {
    pub key: Key,
    pub value: Value,
    pub destination: NodeId,
    pub client: NodeId,
    pub dependency_vector: VersionVector,
    pub update_time: SimTime,
    pub update_time_no_skew: SimTime,
    pub discarded: bool,
    pub previous_update_time: SimTime,
    pub previous_source_replica: ReplicaId,
}

impl GrvState {
    pub(crate) fn on_get_request(&mut self, ctx: &mut Ctx, mut request: GetRequest) {
        ctx.add_time(ctx.timings.get_request);
        let owner = ctx.topology.owner(ctx.replica, request.key);
        if owner != ctx.node {
            assert!(request.proxy.is_none(), "{}: double forward", ctx.node);
            request.proxy = Some(ctx.node);
            ctx.stats.count_forwarded_get(ctx.now);
            let size = ctx.wire_size(&request);
            ctx.send(owner, size, ev(VectorEvent::GetRequest(request.clone())));
            if self.gsv_need_update(ctx, &request.gst_vector) {
                ctx.lock(self.lock_gsv, ev(VectorEvent::ForwardedGetLocked(request)));
            }
            return;
        }

        if self.gsv_need_update(ctx, &request.gst_vector) {
            ctx.lock(self.lock_gsv, ev(VectorEvent::GetLocked(request)));
        } else {
            self.on_get_unlocked(ctx, request);
        }
    }

    pub(crate) fn on_forwarded_get_locked(&mut self, ctx: &mut Ctx, request: GetRequest) {
        self.update_gsv(ctx, &request.gst_vector);
        ctx.unlock(self.lock_gsv, None);
    }

    pub(crate) fn on_get_locked(&mut self, ctx: &mut Ctx, request: GetRequest) {
        self.update_gsv(ctx, &request.gst_vector);
        ctx.unlock(self.lock_gsv, Some(ev(VectorEvent::GetUnlocked(request))));
    }

    pub(crate) fn on_get_unlocked(&mut self, ctx: &mut Ctx, request: GetRequest) {
        let threshold = self.gsv.clone();
        let version = self.get_value(ctx, request.key, &threshold);
        let (value, update_time, source_replica) = version
            .map(|v| (v.value, v.update_time, v.source_replica))
            .unwrap_or(super::store::MISSING);

        ctx.stats.count_get(ctx.now);
        if let Some(head) = self.store.head(request.key) {
            let staleness = head.update_time.saturating_sub(update_time);
            ctx.stats.record_value_staleness(ctx.now, staleness);
        }

        let response = GetResponse {
            client: request.client,
            value,
            update_time,
            source_replica,
            gst_vector: self.gsv.clone(),
        };
        let size = ctx.wire_size(&response);
        ctx.charge_build(size);
        let destination = request.proxy.unwrap_or(request.client);
        ctx.send(destination, size, ev(VectorEvent::GetResponse(response)));
    }

    pub(crate) fn on_get_response(&mut self, ctx: &mut Ctx, response: GetResponse) {
        assert_ne!(response.client, ctx.node);
        let size = ctx.wire_size(&response);
        ctx.send(response.client, size, ev(VectorEvent::GetResponse(response)));
    }

    pub(crate) fn on_put_request(&mut self, ctx: &mut Ctx, mut request: PutRequest) {
        ctx.add_time(ctx.timings.put_request);
        let owner = ctx.topology.owner(ctx.replica, request.key);
        if owner != ctx.node {
            assert!(request.proxy.is_none(), "{}: double forward", ctx.node);
            request.proxy = Some(ctx.node);
            ctx.stats.count_forwarded_put(ctx.now);
            let size = ctx.wire_size(&request);
            ctx.send(owner, size, ev(VectorEvent::PutRequest(request)));
            return;
        }

        let dependency_time = Self::max_dependency(&request.dependency_vector);
        if dependency_time > ctx.clock {
            let delay = dependency_time - ctx.clock;
            trace!(node = %ctx.node, ?delay, "put dependency ahead of clock, delaying");
            ctx.schedule_self(delay, ev(VectorEvent::PutRequest(request)));
            return;
        }

        let slot = self.puts.insert(PutSlot {
            key: request.key,
            value: request.value,
            destination: request.proxy.unwrap_or(request.client),
            client: request.client,
            dependency_vector: request.dependency_vector,
            update_time: SimTime::ZERO,
            update_time_no_skew: SimTime::ZERO,
            discarded: false,
            previous_update_time: SimTime::ZERO,
            previous_source_replica: ReplicaId(0),
        });
        ctx.lock(self.lock_vv, ev(VectorEvent::PutLocked { slot }));
    }

    pub(crate) fn on_put_locked(&mut self, ctx: &mut Ctx, slot: u32) {
        let update_time = ctx.clock;

        let record = self.puts.get_mut(slot);
        record.update_time = update_time;
        record.update_time_no_skew = ctx.now;
        let key = record.key;
        let value = record.value;
        let deps = record.dependency_vector.clone();
        if let Some(head) = self.store.head(key) {
            record.previous_update_time = head.update_time;
            record.previous_source_replica = head.source_replica;
        }

        let applied = self.put_value(ctx, key, value, update_time, deps, ctx.replica);
        self.puts.get_mut(slot).discarded = !applied;
        self.vv.set(ctx.replica, update_time);

        ctx.unlock(self.lock_vv, Some(ev(VectorEvent::PutUnlocked { slot })));
    }

    pub(crate) fn on_put_unlocked(&mut self, ctx: &mut Ctx, slot: u32) {
        let record = self.puts.remove(slot);
        let response = PutResponse {
            client: record.client,
            update_time: record.update_time,
            source_replica: ctx.replica,
        };
        ctx.stats.count_put(ctx.now);
        let size = ctx.wire_size(&response);
        ctx.charge_build(size);
        ctx.send(record.destination, size, ev(VectorEvent::PutResponse(response)));
        if !record.discarded {
            self.replicate_value(ctx, &record);
        }
    }

    pub(crate) fn on_put_response(&mut self, ctx: &mut Ctx, response: PutResponse) {
        assert_ne!(response.client, ctx.node);
        let size = ctx.wire_size(&response);
        ctx.send(response.client, size, ev(VectorEvent::PutResponse(response)));
    }

    fn replicate_value(&mut self, ctx: &mut Ctx, record: &PutSlot) {
        let update = ReplicaUpdate {
            key: record.key,
            value: record.value,
            update_time: record.update_time,
            update_time_no_skew: record.update_time_no_skew,
            source_replica: ctx.replica,
            previous_update_time: record.previous_update_time,
            previous_source_replica: record.previous_source_replica,
            dependency_vector: record.dependency_vector.clone(),
        };
        let size = ctx.wire_size(&update);
        ctx.charge_build(size);
        let peers: Vec<NodeId> = ctx
            .topology
            .peer_replicas(ctx.replica)
            .map(|r| ctx.topology.node_for(r, ctx.partition))
            .collect();
        for peer in peers {
            ctx.send(peer, size, ev(VectorEvent::ReplicaUpdate(update.clone())));
        }
    }
}

//! Get and put paths.

use super::{ev, GrState};
use crate::ctx::Ctx;
use rainsim_core::ScalarEvent;
use rainsim_messages::scalar::{GetRequest, GetResponse, PutRequest, PutResponse, ReplicaUpdate};
use rainsim_types::{Key, NodeId, ReplicaId, SimTime, Value};
use tracing::trace;

pub(crate) struct GetSlot {
    pub key: Key,
    /// GST threshold carried by the request.
    pub gst: SimTime,
    /// Where the response goes: the proxy if the request was forwarded,
    /// the client otherwise.
    pub destination: NodeId,
    pub client: NodeId,
}

pub(crate) struct PutSlot {
    pub key: Key,
    pub value: Value,
    pub destination: NodeId,
    pub client: NodeId,
    pub update_time: SimTime,
    pub update_time_no_skew: SimTime,
    pub discarded: bool,
    pub previous_update_time: SimTime,
    pub previous_source_replica: ReplicaId,
}

impl GrState {
    pub(crate) fn on_get_request(&mut self, ctx: &mut Ctx, mut request: GetRequest) {
        ctx.add_time(ctx.timings.get_request);
        let owner = ctx.topology.owner(ctx.replica, request.key);
        if owner != ctx.node {
            // Forward once; the owner responds through us.
            assert!(request.proxy.is_none(), "{}: double forward", ctx.node);
            request.proxy = Some(ctx.node);
            ctx.stats.count_forwarded_get(ctx.now);
            let request_gst = request.gst;
            let size = ctx.wire_size(&request);
            ctx.send(owner, size, ev(ScalarEvent::GetRequest(request.clone())));
            // The client may still know a fresher GST than we do.
            if self.gst_need_update(ctx, request_gst) {
                ctx.lock(self.main_lock, ev(ScalarEvent::ForwardedGetLocked(request)));
            }
            return;
        }

        let request_gst = request.gst;
        let slot = self.gets.insert(GetSlot {
            key: request.key,
            gst: request.gst,
            destination: request.proxy.unwrap_or(request.client),
            client: request.client,
        });
        if self.gst_need_update(ctx, request_gst) {
            ctx.lock(self.main_lock, ev(ScalarEvent::GetLocked { slot }));
        } else {
            self.on_get_unlocked(ctx, slot);
        }
    }

    pub(crate) fn on_forwarded_get_locked(&mut self, ctx: &mut Ctx, request: GetRequest) {
        self.update_gst(ctx, request.gst);
        ctx.unlock(self.main_lock, None);
    }

    pub(crate) fn on_get_locked(&mut self, ctx: &mut Ctx, slot: u32) {
        let gst = self.gets.get(slot).gst;
        self.update_gst(ctx, gst);
        ctx.unlock(self.main_lock, Some(ev(ScalarEvent::GetUnlocked { slot })));
    }

    pub(crate) fn on_get_unlocked(&mut self, ctx: &mut Ctx, slot: u32) {
        let record = self.gets.remove(slot);
        let version = self.get_value(ctx, record.key, self.gst);
        let (value, update_time) = version
            .map(|v| (v.value, v.update_time))
            .unwrap_or(super::store::MISSING);

        ctx.stats.count_get(ctx.now);
        if let Some(head) = self.store.head(record.key) {
            let staleness = head.update_time.saturating_sub(update_time);
            ctx.stats.record_value_staleness(ctx.now, staleness);
        }

        let response = GetResponse {
            client: record.client,
            value,
            update_time,
            gst: self.gst,
        };
        let size = ctx.wire_size(&response);
        ctx.charge_build(size);
        ctx.send(record.destination, size, ev(ScalarEvent::GetResponse(response)));
    }

    /// A response arriving at a server is a forwarded request coming back
    /// through its proxy; relay it to the client.
    pub(crate) fn on_get_response(&mut self, ctx: &mut Ctx, response: GetResponse) {
        assert_ne!(response.client, ctx.node);
        let size = ctx.wire_size(&response);
        ctx.send(response.client, size, ev(ScalarEvent::GetResponse(response)));
    }

    pub(crate) fn on_put_request(&mut self, ctx: &mut Ctx, mut request: PutRequest) {
        ctx.add_time(ctx.timings.put_request);
        let owner = ctx.topology.owner(ctx.replica, request.key);
        if owner != ctx.node {
            assert!(request.proxy.is_none(), "{}: double forward", ctx.node);
            request.proxy = Some(ctx.node);
            ctx.stats.count_forwarded_put(ctx.now);
            let size = ctx.wire_size(&request);
            ctx.send(owner, size, ev(ScalarEvent::PutRequest(request)));
            return;
        }

        if request.dependency_time > ctx.clock {
            // Clock skew put the dependency in our future; retry when the
            // local clock catches up.
            let delay = request.dependency_time - ctx.clock;
            trace!(node = %ctx.node, ?delay, "put dependency ahead of clock, delaying");
            ctx.schedule_self(delay, ev(ScalarEvent::PutRequest(request)));
            return;
        }

        ctx.stats.count_put(ctx.now);
        let slot = self.puts.insert(PutSlot {
            key: request.key,
            value: request.value,
            destination: request.proxy.unwrap_or(request.client),
            client: request.client,
            update_time: SimTime::ZERO,
            update_time_no_skew: SimTime::ZERO,
            discarded: false,
            previous_update_time: SimTime::ZERO,
            previous_source_replica: ReplicaId(0),
        });
        let response_size = ctx.wire_size(&PutResponse {
            client: request.client,
            update_time: SimTime::ZERO,
        });
        ctx.charge_build(response_size);
        ctx.lock(self.main_lock, ev(ScalarEvent::PutLocked { slot }));
    }

    pub(crate) fn on_put_locked(&mut self, ctx: &mut Ctx, slot: u32) {
        let update_time = ctx.clock;
        self.vv.set(ctx.replica, update_time);

        let record = self.puts.get_mut(slot);
        record.update_time = update_time;
        record.update_time_no_skew = ctx.now;
        let key = record.key;
        let value = record.value;
        if let Some(head) = self.store.head(key) {
            record.previous_update_time = head.update_time;
            record.previous_source_replica = head.source_replica;
        }

        let applied = self.put_value(ctx, key, value, update_time, ctx.replica);
        self.puts.get_mut(slot).discarded = !applied;

        ctx.unlock(self.main_lock, Some(ev(ScalarEvent::PutUnlocked { slot })));
    }

    pub(crate) fn on_put_unlocked(&mut self, ctx: &mut Ctx, slot: u32) {
        let record = self.puts.remove(slot);
        let response = PutResponse {
            client: record.client,
            update_time: record.update_time,
        };
        let size = ctx.wire_size(&response);
        ctx.send(record.destination, size, ev(ScalarEvent::PutResponse(response)));
        if !record.discarded {
            self.replicate_value(ctx, &record);
        }
    }

    pub(crate) fn on_put_response(&mut self, ctx: &mut Ctx, response: PutResponse) {
        assert_ne!(response.client, ctx.node);
        let size = ctx.wire_size(&response);
        ctx.send(response.client, size, ev(ScalarEvent::PutResponse(response)));
    }

    /// Fan an applied write out to the owning partition of every peer
    /// replica.
    fn replicate_value(&mut self, ctx: &mut Ctx, record: &PutSlot) {
        let update = ReplicaUpdate {
            key: record.key,
            value: record.value,
            update_time: record.update_time,
            update_time_no_skew: record.update_time_no_skew,
            source_replica: ctx.replica,
            previous_update_time: record.previous_update_time,
            previous_source_replica: record.previous_source_replica,
        };
        let size = ctx.wire_size(&update);
        ctx.charge_build(size);
        let peers: Vec<NodeId> = ctx
            .topology
            .peer_replicas(ctx.replica)
            .map(|r| ctx.topology.node_for(r, ctx.partition))
            .collect();
        for peer in peers {
            ctx.send(peer, size, ev(ScalarEvent::ReplicaUpdate(update.clone())));
        }
    }
}

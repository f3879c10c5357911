//! Clock ticks and heartbeats, vector variant.
//!
//! The version-vector slot advances unconditionally under the vv lock each
//! tick, so heartbeats always carry the fresh clock.

use super::{ev, GrvState};
use crate::ctx::Ctx;
use rainsim_core::VectorEvent;
use rainsim_messages::vector::Heartbeat;
use rainsim_types::NodeId;

impl GrvState {
    pub(crate) fn on_heartbeat(&mut self, ctx: &mut Ctx, heartbeat: Heartbeat) {
        ctx.lock(self.lock_vv, ev(VectorEvent::HeartbeatLocked(heartbeat)));
    }

    pub(crate) fn on_heartbeat_locked(&mut self, ctx: &mut Ctx, heartbeat: Heartbeat) {
        ctx.add_time(ctx.timings.heartbeat);
        self.vv.set_max(heartbeat.replica, heartbeat.time);
        ctx.unlock(self.lock_vv, None);
    }

    pub(crate) fn on_clock_tick(&mut self, ctx: &mut Ctx) {
        ctx.add_time(ctx.timings.clock_tick);
        ctx.lock(self.lock_vv, ev(VectorEvent::ClockTickLocked));
    }

    pub(crate) fn on_clock_tick_locked(&mut self, ctx: &mut Ctx) {
        self.vv.set(ctx.replica, ctx.clock);
        ctx.unlock(
            self.lock_vv,
            Some(ev(VectorEvent::ClockTickUnlocked { send_time: true })),
        );
    }

    pub(crate) fn on_clock_tick_unlocked(&mut self, ctx: &mut Ctx, send_time: bool) {
        debug_assert!(send_time);
        let heartbeat = Heartbeat {
            replica: ctx.replica,
            time: ctx.clock,
        };
        let size = ctx.wire_size(&heartbeat);
        ctx.charge_build(size);
        let peers: Vec<NodeId> = ctx
            .topology
            .peer_replicas(ctx.replica)
            .map(|r| ctx.topology.node_for(r, ctx.partition))
            .collect();
        for peer in peers {
            ctx.send(peer, size, ev(VectorEvent::Heartbeat(heartbeat)));
        }
        ctx.schedule_self(ctx.protocol.clock_interval, ev(VectorEvent::ClockTick));
    }
}

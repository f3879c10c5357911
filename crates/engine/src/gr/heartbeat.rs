//! Clock ticks and heartbeats.
//!
//! Every `clock_interval` a node bumps its own version-vector slot to the
//! local clock and announces the clock to the same partition of every peer
//! replica, so idle partitions keep contributing fresh LSTs. A heartbeat
//! carrying time zero means the clock has not advanced past the last bump;
//! receivers learn nothing from it.

use super::{ev, GrState};
use crate::ctx::Ctx;
use rainsim_core::ScalarEvent;
use rainsim_messages::scalar::Heartbeat;
use rainsim_types::{NodeId, SimTime};

impl GrState {
    pub(crate) fn on_heartbeat(&mut self, ctx: &mut Ctx, heartbeat: Heartbeat) {
        ctx.add_time(ctx.timings.heartbeat);
        if self.vv.get(heartbeat.replica) < heartbeat.time {
            ctx.lock(
                self.apply_lock(heartbeat.replica),
                ev(ScalarEvent::HeartbeatLocked(heartbeat)),
            );
        }
    }

    pub(crate) fn on_heartbeat_locked(&mut self, ctx: &mut Ctx, heartbeat: Heartbeat) {
        ctx.add_time(ctx.timings.heartbeat);
        // Re-check under the lock; an apply may have advanced the slot.
        if self.vv.get(heartbeat.replica) < heartbeat.time {
            self.vv.set(heartbeat.replica, heartbeat.time);
        }
        ctx.unlock(self.apply_lock(heartbeat.replica), None);
    }

    pub(crate) fn on_clock_tick(&mut self, ctx: &mut Ctx) {
        ctx.add_time(ctx.timings.clock_tick);
        if ctx.clock >= self.vv.get(ctx.replica) + ctx.protocol.clock_interval {
            ctx.lock(self.main_lock, ev(ScalarEvent::ClockTickLocked));
        } else {
            // A recent put already advanced our slot; announce nothing.
            self.on_clock_tick_unlocked(ctx, false);
        }
    }

    pub(crate) fn on_clock_tick_locked(&mut self, ctx: &mut Ctx) {
        ctx.add_time(ctx.timings.clock_tick);
        let send_time = ctx.clock >= self.vv.get(ctx.replica) + ctx.protocol.clock_interval;
        if send_time {
            self.vv.set(ctx.replica, ctx.clock);
        }
        ctx.unlock(
            self.main_lock,
            Some(ev(ScalarEvent::ClockTickUnlocked { send_time })),
        );
    }

    pub(crate) fn on_clock_tick_unlocked(&mut self, ctx: &mut Ctx, send_time: bool) {
        let heartbeat = Heartbeat {
            replica: ctx.replica,
            time: if send_time { ctx.clock } else { SimTime::ZERO },
        };
        let size = ctx.wire_size(&heartbeat);
        ctx.charge_build(size);
        let peers: Vec<NodeId> = ctx
            .topology
            .peer_replicas(ctx.replica)
            .map(|r| ctx.topology.node_for(r, ctx.partition))
            .collect();
        for peer in peers {
            ctx.send(peer, size, ev(ScalarEvent::Heartbeat(heartbeat)));
        }
        ctx.schedule_self(ctx.protocol.clock_interval, ev(ScalarEvent::ClockTick));
    }
}

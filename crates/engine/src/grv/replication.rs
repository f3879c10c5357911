//! Applying replica updates, vector variant. Same ordering and conflict
//! rules as the scalar engine, but the apply path shares the single
//! version-vector lock.

use super::{ev, GrvState};
use crate::ctx::Ctx;
use rainsim_core::VectorEvent;
use rainsim_messages::vector::ReplicaUpdate;
use rainsim_types::{ConflictWinPolicy, ReplicaId, SimTime};
use tracing::warn;

impl GrvState {
    pub(crate) fn on_replica_update(&mut self, ctx: &mut Ctx, update: ReplicaUpdate) {
        let queue = &mut self.apply_queues[update.source_replica.index()];
        let was_empty = queue.is_empty();
        queue.push_back(update.clone());
        if was_empty {
            self.apply_replica_update(ctx, update);
        } else {
            ctx.allow_no_time();
        }
    }

    pub(crate) fn apply_replica_update(&mut self, ctx: &mut Ctx, update: ReplicaUpdate) {
        assert_ne!(update.source_replica, ctx.replica);
        ctx.add_time(ctx.timings.replica_update);

        let head = self.get_head(ctx, update.key);
        let (head_time, head_replica) = head
            .map(|h| (h.update_time, h.source_replica))
            .unwrap_or((SimTime::ZERO, ReplicaId(0)));

        let conflict = (update.previous_update_time, update.previous_source_replica)
            != (head_time, head_replica);
        if conflict {
            let incoming_loses = update.update_time < head_time
                || (update.update_time == head_time && update.source_replica < head_replica);
            if incoming_loses {
                self.on_replica_update_unlocked(ctx, update);
                return;
            }
            if ctx.protocol.conflict_win_policy == ConflictWinPolicy::Stall {
                warn!(
                    node = %ctx.node, key = %update.key,
                    source = %update.source_replica,
                    "conflicting replica update wins against local head, stalling queue"
                );
                return;
            }
        }

        ctx.lock(self.lock_vv, ev(VectorEvent::ReplicaUpdateLocked(update)));
    }

    pub(crate) fn on_replica_update_locked(&mut self, ctx: &mut Ctx, update: ReplicaUpdate) {
        self.put_value(
            ctx,
            update.key,
            update.value,
            update.update_time,
            update.dependency_vector.clone(),
            update.source_replica,
        );
        self.vv.set(update.source_replica, update.update_time);

        ctx.stats.count_replica_update(ctx.now);
        let lag = ctx.now.saturating_sub(update.update_time_no_skew);
        assert!(lag > SimTime::ZERO, "{}: replica update applied before it was produced", ctx.node);
        ctx.stats.record_replication_time(ctx.now, lag);

        ctx.unlock(
            self.lock_vv,
            Some(ev(VectorEvent::ReplicaUpdateUnlocked(update))),
        );
    }

    pub(crate) fn on_replica_update_unlocked(&mut self, ctx: &mut Ctx, update: ReplicaUpdate) {
        ctx.allow_no_time();
        let queue = &mut self.apply_queues[update.source_replica.index()];
        let finished = queue.pop_front();
        assert_eq!(
            finished.as_ref().map(|u| (u.key, u.update_time)),
            Some((update.key, update.update_time)),
            "{}: apply queue out of order",
            ctx.node
        );
        if let Some(next) = queue.front().cloned() {
            self.apply_replica_update(ctx, next);
        }
    }
}

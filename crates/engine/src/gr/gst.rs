//! GST aggregation: leaf LST rounds, tree folding, root broadcast.

use super::{ev, GrState};
use crate::ctx::Ctx;
use rainsim_core::ScalarEvent;
use rainsim_messages::scalar::{GstFromRoot, LstFromLeaf};
use rainsim_types::SimTime;
use tracing::debug;

impl GrState {
    /// Minimum over the version vector, the partition's LST contribution.
    fn min_replica_version(&self, ctx: &mut Ctx) -> SimTime {
        ctx.add_time(ctx.timings.min_lst_per_replica * self.vv.len() as u32);
        self.vv.min()
    }

    fn count_lst_received(&self) -> usize {
        self.lst_received.iter().filter(|&&r| r).count()
    }

    fn arm_next_round(&self, ctx: &mut Ctx) {
        ctx.schedule_self(ctx.protocol.gst_interval, ev(ScalarEvent::StartGstRound));
    }

    pub(crate) fn on_start_gst_round(&mut self, ctx: &mut Ctx) {
        assert!(ctx.topology.tree_is_leaf(ctx.partition));
        if ctx.partition.is_root() {
            // Single-partition replica: the whole tree collapses to one
            // node, so the leaf LST becomes the GST directly.
            let lst = self.min_replica_version(ctx);
            self.update_gst(ctx, lst);
            self.arm_next_round(ctx);
            return;
        }
        let lst = self.min_replica_version(ctx);
        let message = LstFromLeaf {
            leaf_partition: ctx.partition,
            lst,
        };
        let size = ctx.wire_size(&message);
        ctx.charge_build(size);
        let parent = ctx
            .topology
            .node_for(ctx.replica, ctx.topology.tree_parent(ctx.partition));
        ctx.send(parent, size, ev(ScalarEvent::LstFromLeaf(message)));
    }

    pub(crate) fn on_lst_from_leaf(&mut self, ctx: &mut Ctx, message: LstFromLeaf) {
        assert!(!message.leaf_partition.is_root());
        let child = ctx.topology.tree_child_index(message.leaf_partition);
        assert!(
            !self.lst_received[child],
            "{}: duplicate LST from partition {} in one round",
            ctx.node, message.leaf_partition
        );
        let received = self.count_lst_received();
        if received == 0 || message.lst < self.min_lst {
            self.min_lst = message.lst;
        }
        ctx.add_time(ctx.timings.lst_from_leaf_per_replica);
        self.lst_received[child] = true;

        if received + 1 == ctx.topology.tree_num_children(ctx.partition) {
            self.lst_received.fill(false);
            let own = self.min_replica_version(ctx);
            if own < self.min_lst {
                self.min_lst = own;
            }
            ctx.add_time(ctx.timings.lst_round_end);
            if ctx.partition.is_root() {
                ctx.lock(self.main_lock, ev(ScalarEvent::LstRootLocked));
            } else {
                self.send_lst_to_parent(ctx);
            }
        }
    }

    pub(crate) fn on_lst_root_locked(&mut self, ctx: &mut Ctx) {
        let lst = self.min_lst;
        self.update_gst(ctx, lst);
        ctx.unlock(self.main_lock, Some(ev(ScalarEvent::LstRootUnlocked)));
    }

    pub(crate) fn on_lst_root_unlocked(&mut self, ctx: &mut Ctx) {
        self.send_gst_to_children(ctx, self.gst);
    }

    fn send_lst_to_parent(&mut self, ctx: &mut Ctx) {
        assert!(!ctx.partition.is_root());
        let message = LstFromLeaf {
            leaf_partition: ctx.partition,
            lst: self.min_lst,
        };
        let size = ctx.wire_size(&message);
        ctx.charge_build(size);
        self.lst_received.fill(false);
        let parent = ctx
            .topology
            .node_for(ctx.replica, ctx.topology.tree_parent(ctx.partition));
        ctx.send(parent, size, ev(ScalarEvent::LstFromLeaf(message)));
    }

    fn send_gst_to_children(&self, ctx: &mut Ctx, gst: SimTime) {
        let message = GstFromRoot { gst };
        let size = ctx.wire_size(&message);
        ctx.charge_build(size);
        let children: Vec<_> = ctx
            .topology
            .tree_children(ctx.partition)
            .map(|p| ctx.topology.node_for(ctx.replica, p))
            .collect();
        for child in children {
            ctx.send(child, size, ev(ScalarEvent::GstFromRoot(message)));
        }
    }

    pub(crate) fn on_gst_from_root(&mut self, ctx: &mut Ctx, message: GstFromRoot) {
        ctx.lock(self.main_lock, ev(ScalarEvent::GstFromRootLocked(message)));
    }

    pub(crate) fn on_gst_from_root_locked(&mut self, ctx: &mut Ctx, message: GstFromRoot) {
        self.update_gst(ctx, message.gst);
        ctx.unlock(
            self.main_lock,
            Some(ev(ScalarEvent::GstFromRootUnlocked(message))),
        );
    }

    pub(crate) fn on_gst_from_root_unlocked(&mut self, ctx: &mut Ctx, message: GstFromRoot) {
        if ctx.topology.tree_is_leaf(ctx.partition) {
            ctx.allow_no_time();
            self.arm_next_round(ctx);
        } else {
            self.send_gst_to_children(ctx, message.gst);
        }
    }

    /// Fast-path check before taking the main lock for a GST raise.
    pub(crate) fn gst_need_update(&self, ctx: &mut Ctx, gst: SimTime) -> bool {
        ctx.add_time(ctx.timings.gst_check);
        self.gst < gst
    }

    /// Raise the GST. Callers hold the main lock, except the
    /// single-partition short-circuit which has no tree traffic to race
    /// with. A raise re-evaluates parked read-only transactions and the
    /// visibility statistics.
    pub(crate) fn update_gst(&mut self, ctx: &mut Ctx, gst: SimTime) {
        ctx.add_time(ctx.timings.gst_update);
        if self.gst < gst {
            debug!(node = %ctx.node, from = ?self.gst, to = ?gst, "gst raised");
            self.record_visibility_transitions(ctx, self.gst, gst);
            self.gst = gst;
            self.on_gst_raised(ctx);
            if ctx.protocol.gc_enabled {
                self.collect_garbage(ctx);
            }
        }
    }

    /// Versions that crossed the visibility boundary in this raise feed the
    /// visibility-latency statistic. The walk is bookkeeping, not protocol
    /// work, so its CPU time is rolled back.
    fn record_visibility_transitions(&self, ctx: &mut Ctx, old_gst: SimTime, new_gst: SimTime) {
        let saved = ctx.cpu.elapsed_time();
        let own = ctx.replica;
        let now = ctx.now;
        let mut samples = Vec::new();
        let visibility_check = ctx.timings.visibility_check;
        self.store.for_each(|_, version| {
            ctx.cpu.add_time(visibility_check);
            if version.source_replica == own {
                return;
            }
            if version.update_time > old_gst && version.update_time <= new_gst {
                samples.push(now.saturating_sub(version.update_time));
            }
        });
        for sample in samples {
            ctx.stats.record_visibility_latency(now, sample);
        }
        ctx.cpu.set_elapsed_time(saved);
    }
}

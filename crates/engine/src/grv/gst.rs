//! GST-vector aggregation.
//!
//! Rounds fold whole vectors component-wise instead of scalar minima;
//! otherwise the tree choreography matches the scalar engine.

use super::{ev, GrvState};
use crate::ctx::Ctx;
use rainsim_core::VectorEvent;
use rainsim_messages::vector::{GstFromRoot, LstFromLeaf};
use rainsim_types::VersionVector;
use tracing::debug;

impl GrvState {
    fn arm_next_round(&self, ctx: &mut Ctx) {
        ctx.schedule_self(ctx.protocol.gst_interval, ev(VectorEvent::StartGstRound));
    }

    fn count_lst_received(&self) -> usize {
        self.lst_received.iter().filter(|&&r| r).count()
    }

    pub(crate) fn on_start_gst_round(&mut self, ctx: &mut Ctx) {
        assert!(ctx.topology.tree_is_leaf(ctx.partition));
        if ctx.partition.is_root() {
            // Single-partition replica: the version vector is the round's
            // result.
            let lst = self.vv.clone();
            ctx.add_time(ctx.timings.min_lst_per_replica * lst.len() as u32);
            self.update_gsv(ctx, &lst);
            self.arm_next_round(ctx);
            return;
        }
        ctx.add_time(ctx.timings.min_lst_per_replica * self.vv.len() as u32);
        let message = LstFromLeaf {
            leaf_partition: ctx.partition,
            lst_vector: self.vv.clone(),
        };
        let size = ctx.wire_size(&message);
        ctx.charge_build(size);
        let parent = ctx
            .topology
            .node_for(ctx.replica, ctx.topology.tree_parent(ctx.partition));
        ctx.send(parent, size, ev(VectorEvent::LstFromLeaf(message)));
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
        if received == 0 {
            self.min_lst = message.lst_vector;
        } else {
            self.min_lst.merge_min(&message.lst_vector);
        }
        ctx.add_time(ctx.timings.lst_from_leaf_per_replica * self.min_lst.len() as u32);
        self.lst_received[child] = true;

        if received + 1 == ctx.topology.tree_num_children(ctx.partition) {
            self.lst_received.fill(false);
            self.min_lst.merge_min(&self.vv.clone());
            ctx.add_time(ctx.timings.lst_round_end);
            if ctx.partition.is_root() {
                ctx.lock(self.lock_gsv, ev(VectorEvent::LstRootLocked));
            } else {
                self.send_lst_to_parent(ctx);
            }
        }
    }

    pub(crate) fn on_lst_root_locked(&mut self, ctx: &mut Ctx) {
        let lst = self.min_lst.clone();
        self.update_gsv(ctx, &lst);
        ctx.unlock(self.lock_gsv, Some(ev(VectorEvent::LstRootUnlocked)));
    }

    pub(crate) fn on_lst_root_unlocked(&mut self, ctx: &mut Ctx) {
        self.send_gsv_to_children(ctx, &self.gsv.clone());
    }

    fn send_lst_to_parent(&mut self, ctx: &mut Ctx) {
        assert!(!ctx.partition.is_root());
        let message = LstFromLeaf {
            leaf_partition: ctx.partition,
            lst_vector: self.min_lst.clone(),
        };
        let size = ctx.wire_size(&message);
        ctx.charge_build(size);
        self.lst_received.fill(false);
        let parent = ctx
            .topology
            .node_for(ctx.replica, ctx.topology.tree_parent(ctx.partition));
        ctx.send(parent, size, ev(VectorEvent::LstFromLeaf(message)));
    }

    fn send_gsv_to_children(&self, ctx: &mut Ctx, gsv: &VersionVector) {
        let message = GstFromRoot {
            gst_vector: gsv.clone(),
        };
        let size = ctx.wire_size(&message);
        ctx.charge_build(size);
        let children: Vec<_> = ctx
            .topology
            .tree_children(ctx.partition)
            .map(|p| ctx.topology.node_for(ctx.replica, p))
            .collect();
        for child in children {
            ctx.send(child, size, ev(VectorEvent::GstFromRoot(message.clone())));
        }
    }

    /// Children are notified before the local fold so the broadcast is not
    /// delayed behind this node's lock.
    pub(crate) fn on_gst_from_root(&mut self, ctx: &mut Ctx, message: GstFromRoot) {
        if !ctx.topology.tree_is_leaf(ctx.partition) {
            self.send_gsv_to_children(ctx, &message.gst_vector);
        }
        ctx.lock(self.lock_gsv, ev(VectorEvent::GstFromRootLocked(message)));
    }

    pub(crate) fn on_gst_from_root_locked(&mut self, ctx: &mut Ctx, message: GstFromRoot) {
        self.update_gsv(ctx, &message.gst_vector);
        ctx.unlock(self.lock_gsv, Some(ev(VectorEvent::GstFromRootUnlocked)));
    }

    pub(crate) fn on_gst_from_root_unlocked(&mut self, ctx: &mut Ctx) {
        ctx.allow_no_time();
        if ctx.topology.tree_is_leaf(ctx.partition) {
            self.arm_next_round(ctx);
        }
    }

    /// Fast-path check before taking the GST-vector lock.
    pub(crate) fn gsv_need_update(&self, ctx: &mut Ctx, other: &VersionVector) -> bool {
        ctx.add_time(ctx.timings.gst_check * other.len() as u32);
        self.gsv
            .as_slice()
            .iter()
            .zip(other.as_slice())
            .any(|(mine, theirs)| theirs > mine)
    }

    /// Raise GST-vector slots component-wise. Caller holds the GST-vector
    /// lock.
    pub(crate) fn update_gsv(&mut self, ctx: &mut Ctx, other: &VersionVector) {
        ctx.add_time(ctx.timings.gst_update * other.len() as u32);
        let old = self.gsv.clone();
        self.gsv.merge_max(other);
        if self.gsv != old {
            debug!(node = %ctx.node, from = %old, to = %self.gsv, "gst vector raised");
            self.record_visibility_transitions(ctx, &old);
            if ctx.protocol.gc_enabled {
                self.collect_garbage(ctx);
            }
        }
    }

    /// Bookkeeping walk, CPU time rolled back.
    fn record_visibility_transitions(&self, ctx: &mut Ctx, old_gsv: &VersionVector) {
        let saved = ctx.cpu.elapsed_time();
        let own = ctx.replica;
        let now = ctx.now;
        let new_gsv = &self.gsv;
        let visibility_check = ctx.timings.visibility_check;
        let mut samples = Vec::new();
        self.store.for_each(|_, version| {
            ctx.cpu.add_time(visibility_check);
            if version.source_replica == own {
                return;
            }
            let was_visible = version
                .deps
                .dominated_by_excluding(old_gsv, version.source_replica);
            let is_visible = version
                .deps
                .dominated_by_excluding(new_gsv, version.source_replica);
            if !was_visible && is_visible {
                samples.push(now.saturating_sub(version.update_time));
            }
        });
        for sample in samples {
            ctx.stats.record_visibility_latency(now, sample);
        }
        ctx.cpu.set_elapsed_time(saved);
    }
}

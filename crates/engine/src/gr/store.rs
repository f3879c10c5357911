//! Read and write paths over the version store.

use super::GrState;
use crate::ctx::Ctx;
use rainsim_store::Version;
use rainsim_types::{Key, ReplicaId, SimTime, Value};

/// What a read returns when the key has no visible version.
pub(crate) const MISSING: (Value, SimTime) = (Value(0), SimTime::ZERO);

impl GrState {
    /// Newest version visible under `threshold`: written by this replica,
    /// or with an update time at or below the threshold.
    pub(crate) fn get_value(
        &self,
        ctx: &mut Ctx,
        key: Key,
        threshold: SimTime,
    ) -> Option<Version<()>> {
        ctx.add_time(ctx.timings.get_value);
        let own = ctx.replica;
        self.store
            .find(key, |version| {
                ctx.add_time(ctx.timings.visibility_check);
                version.source_replica == own || version.update_time <= threshold
            })
            .cloned()
    }

    /// Newest version at or below `time`, with no own-replica exemption.
    /// Slice reads use this so a snapshot never observes a local write
    /// newer than its snapshot time.
    pub(crate) fn get_value_at(
        &self,
        ctx: &mut Ctx,
        key: Key,
        time: SimTime,
    ) -> Option<Version<()>> {
        ctx.add_time(ctx.timings.get_value);
        self.store
            .find(key, |version| {
                ctx.add_time(ctx.timings.visibility_check);
                version.update_time <= time
            })
            .cloned()
    }

    /// Newest version regardless of visibility, charged like a read.
    pub(crate) fn get_head(&self, ctx: &mut Ctx, key: Key) -> Option<Version<()>> {
        ctx.add_time(ctx.timings.get_value);
        if self.store.head(key).is_some() {
            ctx.add_time(ctx.timings.visibility_check);
        }
        self.store.head(key).cloned()
    }

    /// Append a version unless the current head is strictly newer (possible
    /// under clock skew). Returns whether the write was applied.
    pub(crate) fn put_value(
        &mut self,
        ctx: &mut Ctx,
        key: Key,
        value: Value,
        update_time: SimTime,
        source_replica: ReplicaId,
    ) -> bool {
        ctx.add_time(ctx.timings.put_value);
        if let Some(head) = self.store.head(key) {
            if head.update_time > update_time {
                return false;
            }
        }
        self.store.put(
            key,
            Version {
                value,
                update_time,
                source_replica,
                deps: (),
            },
        );
        true
    }

    /// Trim version chains that can no longer serve any read. Only called
    /// when garbage collection is enabled; the horizon trails the GST by
    /// the configured window.
    pub(crate) fn collect_garbage(&mut self, ctx: &mut Ctx) {
        let horizon = self.gst.saturating_sub(ctx.protocol.gc_window);
        self.store.gc(|version| version.update_time <= horizon);
    }
}

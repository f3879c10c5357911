//! Read and write paths over the vector-dependency store.

use super::GrvState;
use crate::ctx::Ctx;
use rainsim_store::Version;
use rainsim_types::{Key, ReplicaId, SimTime, Value, VersionVector};

pub(crate) const MISSING: (Value, SimTime, ReplicaId) =
    (Value(0), SimTime::ZERO, ReplicaId(0));

impl GrvState {
    /// Newest version visible under `threshold`: written by this replica,
    /// or with every recorded dependency covered by the threshold vector
    /// (the writer's own slot exempt).
    pub(crate) fn get_value(
        &self,
        ctx: &mut Ctx,
        key: Key,
        threshold: &VersionVector,
    ) -> Option<Version<VersionVector>> {
        ctx.add_time(ctx.timings.get_value);
        let own = ctx.replica;
        let per_version = ctx.timings.visibility_check * threshold.len() as u32;
        self.store
            .find(key, |version| {
                ctx.cpu.add_time(per_version);
                version.source_replica == own
                    || version
                        .deps
                        .dominated_by_excluding(threshold, version.source_replica)
            })
            .cloned()
    }

    /// Newest version whose dependencies are covered by `snapshot` on every
    /// slot, the writer's included. Slice reads use this so local writes
    /// newer than the snapshot stay invisible.
    pub(crate) fn get_value_at(
        &self,
        ctx: &mut Ctx,
        key: Key,
        snapshot: &VersionVector,
    ) -> Option<Version<VersionVector>> {
        ctx.add_time(ctx.timings.get_value);
        let per_version = ctx.timings.visibility_check * snapshot.len() as u32;
        self.store
            .find(key, |version| {
                ctx.cpu.add_time(per_version);
                version
                    .deps
                    .as_slice()
                    .iter()
                    .zip(snapshot.as_slice())
                    .all(|(dep, cover)| dep <= cover)
            })
            .cloned()
    }

    pub(crate) fn get_head(&self, ctx: &mut Ctx, key: Key) -> Option<Version<VersionVector>> {
        ctx.add_time(ctx.timings.get_value);
        if self.store.head(key).is_some() {
            ctx.add_time(ctx.timings.visibility_check);
        }
        self.store.head(key).cloned()
    }

    /// Append a version unless the head is strictly newer. Storing the
    /// dependency vector is charged like building it.
    pub(crate) fn put_value(
        &mut self,
        ctx: &mut Ctx,
        key: Key,
        value: Value,
        update_time: SimTime,
        deps: VersionVector,
        source_replica: ReplicaId,
    ) -> bool {
        ctx.add_time(ctx.timings.put_value);
        ctx.charge_build(2 * 8 * deps.len() as u64);
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
                deps,
            },
        );
        true
    }

    pub(crate) fn collect_garbage(&mut self, ctx: &mut Ctx) {
        let mut horizon = self.gsv.clone();
        let window = ctx.protocol.gc_window;
        for replica in 0..horizon.len() as u32 {
            let r = ReplicaId(replica);
            horizon.set(r, horizon.get(r).saturating_sub(window));
        }
        self.store.gc(|version| {
            version
                .deps
                .as_slice()
                .iter()
                .zip(horizon.as_slice())
                .all(|(dep, cover)| dep <= cover)
        });
    }
}

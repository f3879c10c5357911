//! Multi-version key-value store.
//!
//! Each key maps to a chain of versions, newest first. The store itself
//! performs no validation: protocol code decides whether an incoming write
//! becomes the new head or is discarded, and which version a read may see.
//! Versions live in an arena indexed by `u32` so chains cost one index per
//! link instead of a pointer-sized allocation each.
//!
//! The dependency payload is generic: the scalar protocol variant stores no
//! per-version dependencies (`()`), the vector variant stores the writer's
//! dependency vector.

use rainsim_types::{Key, ReplicaId, SimTime, Value};
use std::collections::HashMap;

/// One written version of a key.
#[derive(Debug, Clone)]
pub struct Version<D> {
    pub value: Value,
    pub update_time: SimTime,
    pub source_replica: ReplicaId,
    pub deps: D,
}

struct Slot<D> {
    version: Version<D>,
    prev: Option<u32>,
}

pub struct VersionStore<D> {
    heads: HashMap<Key, u32>,
    arena: Vec<Option<Slot<D>>>,
    free: Vec<u32>,
}

impl<D> Default for VersionStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> VersionStore<D> {
    pub fn new() -> Self {
        Self {
            heads: HashMap::new(),
            arena: Vec::new(),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, slot: Slot<D>) -> u32 {
        match self.free.pop() {
            Some(index) => {
                self.arena[index as usize] = Some(slot);
                index
            }
            None => {
                self.arena.push(Some(slot));
                (self.arena.len() - 1) as u32
            }
        }
    }

    fn slot(&self, index: u32) -> &Slot<D> {
        self.arena[index as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("version slot {index} is free"))
    }

    /// Install `version` as the new head of `key`'s chain.
    pub fn put(&mut self, key: Key, version: Version<D>) {
        let prev = self.heads.get(&key).copied();
        let index = self.alloc(Slot { version, prev });
        self.heads.insert(key, index);
    }

    /// The newest version of `key`, regardless of visibility.
    pub fn head(&self, key: Key) -> Option<&Version<D>> {
        self.heads.get(&key).map(|&index| &self.slot(index).version)
    }

    /// Walk `key`'s chain newest-first and return the first version the
    /// predicate accepts. The predicate is called once per visited version,
    /// which lets callers charge service time per visibility check.
    pub fn find(
        &self,
        key: Key,
        mut visible: impl FnMut(&Version<D>) -> bool,
    ) -> Option<&Version<D>> {
        let mut next = self.heads.get(&key).copied();
        while let Some(index) = next {
            let slot = self.slot(index);
            if visible(&slot.version) {
                return Some(&slot.version);
            }
            next = slot.prev;
        }
        None
    }

    /// Visit every stored version, chains walked newest-first.
    pub fn for_each(&self, mut f: impl FnMut(Key, &Version<D>)) {
        for (&key, &head) in &self.heads {
            let mut next = Some(head);
            while let Some(index) = next {
                let slot = self.slot(index);
                f(key, &slot.version);
                next = slot.prev;
            }
        }
    }

    /// Number of live versions across all chains.
    pub fn len(&self) -> usize {
        self.arena.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop versions no read can reach anymore.
    ///
    /// The two newest versions of each chain always survive. Past those,
    /// the newest version satisfying `at_horizon` (visible at the GC
    /// horizon) is the last possible read target, so everything older is
    /// freed.
    pub fn gc(&mut self, at_horizon: impl Fn(&Version<D>) -> bool) {
        let heads: Vec<u32> = self.heads.values().copied().collect();
        for head in heads {
            let Some(second) = self.slot(head).prev else {
                continue;
            };
            // Find the cut point: the newest version at or below the
            // horizon, starting from the second-newest. If no version is
            // at the horizon yet, every older one may still become
            // visible and the chain is left alone.
            let mut keep = second;
            let cut = loop {
                if at_horizon(&self.slot(keep).version) {
                    break Some(keep);
                }
                match self.slot(keep).prev {
                    Some(prev) => keep = prev,
                    None => break None,
                }
            };
            let Some(cut) = cut else { continue };
            let mut dead = self.arena[cut as usize]
                .as_mut()
                .and_then(|slot| slot.prev.take());
            while let Some(index) = dead {
                dead = self.arena[index as usize]
                    .take()
                    .and_then(|slot| slot.prev);
                self.free.push(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn version(value: u8, micros: u64, replica: u32) -> Version<()> {
        Version {
            value: Value(value),
            update_time: Duration::from_micros(micros),
            source_replica: ReplicaId(replica),
            deps: (),
        }
    }

    #[test]
    fn test_head_tracks_latest_put() {
        let mut store = VersionStore::new();
        let key = Key(7);
        assert!(store.head(key).is_none());
        store.put(key, version(1, 10, 0));
        store.put(key, version(2, 20, 0));
        let head = store.head(key).unwrap();
        assert_eq!(head.value, Value(2));
        assert_eq!(head.update_time, Duration::from_micros(20));
    }

    #[test]
    fn test_find_walks_chain_newest_first() {
        let mut store = VersionStore::new();
        let key = Key(1);
        store.put(key, version(1, 10, 1));
        store.put(key, version(2, 20, 1));
        store.put(key, version(3, 30, 1));

        let mut visited = Vec::new();
        let horizon = Duration::from_micros(15);
        let found = store
            .find(key, |v| {
                visited.push(v.value);
                v.update_time <= horizon
            })
            .unwrap();
        assert_eq!(found.value, Value(1));
        assert_eq!(visited, vec![Value(3), Value(2), Value(1)]);
    }

    #[test]
    fn test_find_nothing_visible() {
        let mut store = VersionStore::new();
        let key = Key(1);
        store.put(key, version(1, 10, 0));
        assert!(store.find(key, |_| false).is_none());
    }

    #[test]
    fn test_gc_keeps_two_newest_and_horizon_version() {
        let mut store = VersionStore::new();
        let key = Key(3);
        for (value, micros) in [(1, 10), (2, 20), (3, 30), (4, 40), (5, 50)] {
            store.put(key, version(value, micros, 0));
        }
        assert_eq!(store.len(), 5);

        // Horizon at 25us: versions 5 and 4 survive as the two newest,
        // version 2 (20us) is the newest at the horizon, version 3 stays
        // because the cut happens below the horizon version, and version 1
        // is freed.
        let horizon = Duration::from_micros(25);
        store.gc(|v| v.update_time <= horizon);
        assert_eq!(store.len(), 4);
        let values: Vec<Value> = {
            let mut out = Vec::new();
            store.find(key, |v| {
                out.push(v.value);
                false
            });
            out
        };
        assert_eq!(values, vec![Value(5), Value(4), Value(3), Value(2)]);
    }

    #[test]
    fn test_gc_spares_chains_with_nothing_collectible() {
        let mut store = VersionStore::new();
        let key = Key(3);
        store.put(key, version(1, 10, 0));
        store.put(key, version(2, 20, 0));
        store.gc(|_| false);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut store = VersionStore::new();
        let key = Key(0);
        for micros in [10, 20, 30, 40] {
            store.put(key, version(0, micros, 0));
        }
        store.gc(|v| v.update_time <= Duration::from_micros(35));
        let len_after_gc = store.len();
        store.put(Key(1), version(9, 50, 0));
        assert_eq!(store.len(), len_after_gc + 1);
        assert_eq!(store.arena.len(), 4);
    }
}

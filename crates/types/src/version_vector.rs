//! Per-replica timestamp vectors.

use crate::{ReplicaId, SimTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A vector of timestamps, one slot per replica.
///
/// Used both as a node's version vector (latest update time seen from each
/// replica) and as the vector-variant GST. Every mutation is monotone: slots
/// only move forward in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionVector {
    slots: Box<[SimTime]>,
}

impl VersionVector {
    /// All-zero vector with one slot per replica.
    pub fn new(num_replicas: u32) -> Self {
        Self {
            slots: vec![SimTime::ZERO; num_replicas as usize].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, replica: ReplicaId) -> SimTime {
        self.slots[replica.index()]
    }

    /// Advance one slot to `time` if that moves it forward. Returns whether
    /// the slot changed.
    pub fn set_max(&mut self, replica: ReplicaId, time: SimTime) -> bool {
        let slot = &mut self.slots[replica.index()];
        if time > *slot {
            *slot = time;
            true
        } else {
            false
        }
    }

    /// Force one slot to `time`. Callers own the monotonicity argument.
    pub fn set(&mut self, replica: ReplicaId, time: SimTime) {
        self.slots[replica.index()] = time;
    }

    /// Component-wise maximum with `other`.
    pub fn merge_max(&mut self, other: &VersionVector) {
        debug_assert_eq!(self.len(), other.len());
        for (slot, &theirs) in self.slots.iter_mut().zip(other.slots.iter()) {
            if theirs > *slot {
                *slot = theirs;
            }
        }
    }

    /// Component-wise minimum with `other`.
    pub fn merge_min(&mut self, other: &VersionVector) {
        debug_assert_eq!(self.len(), other.len());
        for (slot, &theirs) in self.slots.iter_mut().zip(other.slots.iter()) {
            if theirs < *slot {
                *slot = theirs;
            }
        }
    }

    /// Minimum over all slots.
    pub fn min(&self) -> SimTime {
        self.slots.iter().copied().min().unwrap_or(SimTime::ZERO)
    }

    /// True when every slot of `self` is ≤ the matching slot of `other`,
    /// ignoring `skip` (a writer's own slot is exempt from GST checks).
    pub fn dominated_by_excluding(&self, other: &VersionVector, skip: ReplicaId) -> bool {
        debug_assert_eq!(self.len(), other.len());
        self.slots
            .iter()
            .zip(other.slots.iter())
            .enumerate()
            .all(|(i, (&mine, &theirs))| i == skip.index() || mine <= theirs)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReplicaId, SimTime)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, &t)| (ReplicaId(i as u32), t))
    }

    pub fn as_slice(&self) -> &[SimTime] {
        &self.slots
    }
}

impl fmt::Display for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, t) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}us", t.as_micros())?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn us(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    #[test]
    fn test_set_max_is_monotone() {
        let mut vv = VersionVector::new(3);
        assert!(vv.set_max(ReplicaId(1), us(10)));
        assert!(!vv.set_max(ReplicaId(1), us(5)));
        assert_eq!(vv.get(ReplicaId(1)), us(10));
        assert_eq!(vv.get(ReplicaId(0)), Duration::ZERO);
    }

    #[test]
    fn test_merge_min_max() {
        let mut a = VersionVector::new(2);
        a.set(ReplicaId(0), us(10));
        a.set(ReplicaId(1), us(3));
        let mut b = VersionVector::new(2);
        b.set(ReplicaId(0), us(4));
        b.set(ReplicaId(1), us(7));

        let mut lo = a.clone();
        lo.merge_min(&b);
        assert_eq!(lo.as_slice(), &[us(4), us(3)]);

        a.merge_max(&b);
        assert_eq!(a.as_slice(), &[us(10), us(7)]);
    }

    #[test]
    fn test_min_over_slots() {
        let mut vv = VersionVector::new(3);
        vv.set(ReplicaId(0), us(9));
        vv.set(ReplicaId(2), us(4));
        assert_eq!(vv.min(), Duration::ZERO);
        vv.set(ReplicaId(1), us(6));
        assert_eq!(vv.min(), us(4));
    }

    #[test]
    fn test_domination_skips_writer_slot() {
        let mut deps = VersionVector::new(3);
        deps.set(ReplicaId(0), us(5));
        deps.set(ReplicaId(1), us(100)); // writer's own slot, ignored
        deps.set(ReplicaId(2), us(2));

        let mut gst = VersionVector::new(3);
        gst.set(ReplicaId(0), us(5));
        gst.set(ReplicaId(2), us(3));

        assert!(deps.dominated_by_excluding(&gst, ReplicaId(1)));
        assert!(!deps.dominated_by_excluding(&gst, ReplicaId(0)));
    }
}

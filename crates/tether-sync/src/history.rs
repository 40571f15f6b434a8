//! Per-transfer speed history rings.
//!
//! Each transfer gets a fixed-length pair of rate buffers, created
//! zero-filled on first sighting and pruned when the transfer leaves the
//! canonical map. Appending drops the oldest sample, so a buffer is
//! always exactly `capacity` long.

use std::collections::{HashMap, HashSet, VecDeque};

use tether_core::TransferId;

/// Read-only copy of one transfer's history, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeedHistorySnapshot {
    /// Download rate samples in bytes per second.
    pub down: Vec<u64>,
    /// Upload rate samples in bytes per second.
    pub up: Vec<u64>,
}

#[derive(Debug)]
struct Ring {
    down: VecDeque<u64>,
    up: VecDeque<u64>,
}

impl Ring {
    fn zero_filled(capacity: usize) -> Self {
        Self {
            down: std::iter::repeat(0).take(capacity).collect(),
            up: std::iter::repeat(0).take(capacity).collect(),
        }
    }

    fn push(&mut self, down: u64, up: u64) {
        let _ = self.down.pop_front();
        let _ = self.up.pop_front();
        self.down.push_back(down);
        self.up.push_back(up);
    }
}

/// All history rings for one engine instance.
#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    rings: HashMap<TransferId, Ring>,
}

impl HistoryStore {
    /// Create a store with the given per-transfer buffer length.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rings: HashMap::new(),
        }
    }

    /// Append one sample for a transfer, creating its zero-filled ring on
    /// first sighting.
    pub fn record(&mut self, id: &TransferId, down: u64, up: u64) {
        let capacity = self.capacity;
        self.rings
            .entry(id.clone())
            .or_insert_with(|| Ring::zero_filled(capacity))
            .push(down, up);
    }

    /// Copy a transfer's history, oldest sample first.
    #[must_use]
    pub fn snapshot(&self, id: &TransferId) -> Option<SpeedHistorySnapshot> {
        self.rings.get(id).map(|ring| SpeedHistorySnapshot {
            down: ring.down.iter().copied().collect(),
            up: ring.up.iter().copied().collect(),
        })
    }

    /// Drop rings for transfers no longer present.
    pub fn prune(&mut self, live: &HashSet<TransferId>) {
        self.rings.retain(|id, _| live.contains(id));
    }

    /// Number of tracked transfers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    /// Whether no transfer is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TransferId {
        TransferId::from(s)
    }

    #[test]
    fn first_record_creates_zero_filled_ring() {
        let mut store = HistoryStore::new(4);
        store.record(&id("a"), 100, 50);

        let snap = store.snapshot(&id("a")).unwrap();
        assert_eq!(snap.down, vec![0, 0, 0, 100]);
        assert_eq!(snap.up, vec![0, 0, 0, 50]);
    }

    #[test]
    fn buffers_hold_exactly_capacity_samples() {
        let mut store = HistoryStore::new(3);
        for i in 1..=5u64 {
            store.record(&id("a"), i * 10, i);
        }
        let snap = store.snapshot(&id("a")).unwrap();
        assert_eq!(snap.down, vec![30, 40, 50]);
        assert_eq!(snap.up, vec![3, 4, 5]);
    }

    #[test]
    fn one_sample_appended_per_record() {
        let mut store = HistoryStore::new(4);
        store.record(&id("a"), 1, 1);
        store.record(&id("a"), 2, 2);
        let snap = store.snapshot(&id("a")).unwrap();
        assert_eq!(snap.down, vec![0, 0, 1, 2]);
    }

    #[test]
    fn unknown_transfer_has_no_snapshot() {
        let store = HistoryStore::new(4);
        assert!(store.snapshot(&id("ghost")).is_none());
    }

    #[test]
    fn prune_drops_absent_transfers() {
        let mut store = HistoryStore::new(4);
        store.record(&id("a"), 1, 1);
        store.record(&id("b"), 2, 2);
        assert_eq!(store.len(), 2);

        let live: HashSet<TransferId> = [id("a")].into_iter().collect();
        store.prune(&live);
        assert_eq!(store.len(), 1);
        assert!(store.snapshot(&id("a")).is_some());
        assert!(store.snapshot(&id("b")).is_none());
    }

    #[test]
    fn capacity_of_zero_is_clamped() {
        let mut store = HistoryStore::new(0);
        store.record(&id("a"), 9, 9);
        let snap = store.snapshot(&id("a")).unwrap();
        assert_eq!(snap.down, vec![9]);
    }

    #[test]
    fn rings_are_independent_per_transfer() {
        let mut store = HistoryStore::new(2);
        store.record(&id("a"), 1, 0);
        store.record(&id("b"), 2, 0);
        store.record(&id("a"), 3, 0);
        assert_eq!(store.snapshot(&id("a")).unwrap().down, vec![1, 3]);
        assert_eq!(store.snapshot(&id("b")).unwrap().down, vec![0, 2]);
    }
}

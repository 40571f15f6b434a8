//! Canonical transfer map and delta reconciliation.
//!
//! The map is the single authoritative copy of remote state on this side
//! of the wire. Full fetches replace it wholesale and are the only
//! operation that garbage-collects; delta fetches only add, update, and
//! remove named ids. Contradictory deltas (an id both removed and
//! updated in one response) are kept and flagged so the scheduler can
//! order a rate-limited full-fetch repair.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use tether_core::{Transfer, TransferId};

/// Result of applying one response to the canonical map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Ids that appeared for the first time.
    pub added: Vec<TransferId>,
    /// Ids that were already present and were overwritten.
    pub updated: Vec<TransferId>,
    /// Ids that left the map.
    pub removed: Vec<TransferId>,
    /// A delta reported the same id as both removed and live (daemon
    /// race); the entity was kept.
    pub contradiction: bool,
}

impl MergeOutcome {
    /// Whether the response changed map membership at all.
    #[must_use]
    pub fn membership_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// The canonical in-memory transfer map plus the transport-local id map.
#[derive(Debug, Default)]
pub struct CanonicalState {
    transfers: BTreeMap<TransferId, Transfer>,
    /// Transport-local numeric ref to stable id. Refreshed on every
    /// sighting; slot 0 means "not assigned" and is never mapped.
    slots: HashMap<u64, TransferId>,
}

impl CanonicalState {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the map wholesale. Anything absent from `transfers` is
    /// garbage-collected, including its slot mapping.
    pub fn apply_full(&mut self, transfers: Vec<Transfer>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut next: BTreeMap<TransferId, Transfer> = BTreeMap::new();
        let mut slots: HashMap<u64, TransferId> = HashMap::new();

        for transfer in transfers {
            if self.transfers.contains_key(&transfer.id) {
                outcome.updated.push(transfer.id.clone());
            } else {
                outcome.added.push(transfer.id.clone());
            }
            if transfer.slot != 0 {
                let _ = slots.insert(transfer.slot, transfer.id.clone());
            }
            let _ = next.insert(transfer.id.clone(), transfer);
        }

        outcome.removed = self
            .transfers
            .keys()
            .filter(|id| !next.contains_key(*id))
            .cloned()
            .collect();

        self.transfers = next;
        self.slots = slots;
        outcome
    }

    /// Apply a delta: add/update the named transfers, remove the named
    /// slots. Never garbage-collects.
    pub fn apply_delta(&mut self, transfers: Vec<Transfer>, removed_slots: &[u64]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        let incoming_ids: HashSet<TransferId> =
            transfers.iter().map(|t| t.id.clone()).collect();

        for transfer in transfers {
            if self.transfers.contains_key(&transfer.id) {
                outcome.updated.push(transfer.id.clone());
            } else {
                outcome.added.push(transfer.id.clone());
            }
            if transfer.slot != 0 {
                let _ = self.slots.insert(transfer.slot, transfer.id.clone());
            }
            let _ = self.transfers.insert(transfer.id.clone(), transfer);
        }

        for slot in removed_slots {
            let Some(id) = self.slots.get(slot).cloned() else {
                // Slot never seen on this connection; nothing to remove.
                debug!(slot, "removal for unknown transport ref ignored");
                continue;
            };
            if incoming_ids.contains(&id) {
                // Same response added and removed this id. Keep the
                // entity and let the scheduler order a repair fetch.
                warn!(id = %id, slot, "delta both updated and removed this transfer");
                outcome.contradiction = true;
                continue;
            }
            let _ = self.slots.remove(slot);
            if self.transfers.remove(&id).is_some() {
                outcome.removed.push(id);
            }
        }

        outcome
    }

    /// Look up one transfer.
    #[must_use]
    pub fn get(&self, id: &TransferId) -> Option<&Transfer> {
        self.transfers.get(id)
    }

    /// Mutable iterator over all transfers, id-ordered.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Transfer> {
        self.transfers.values_mut()
    }

    /// Iterator over all transfers, id-ordered.
    pub fn iter(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.values()
    }

    /// Clone the transfers into an id-ordered vector for broadcasting.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Transfer> {
        self.transfers.values().cloned().collect()
    }

    /// The set of live ids, for pruning collaborators.
    #[must_use]
    pub fn live_ids(&self) -> HashSet<TransferId> {
        self.transfers.keys().cloned().collect()
    }

    /// Number of transfers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Resolve a transport-local ref to a stable id.
    #[must_use]
    pub fn resolve_slot(&self, slot: u64) -> Option<&TransferId> {
        self.slots.get(&slot)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transfer(id: &str, slot: u64) -> Transfer {
        Transfer::from_value(&json!({"id": id, "slot": slot})).unwrap()
    }

    fn named(id: &str, slot: u64, name: &str) -> Transfer {
        Transfer::from_value(&json!({"id": id, "slot": slot, "name": name})).unwrap()
    }

    #[test]
    fn full_apply_populates_and_reports_added() {
        let mut state = CanonicalState::new();
        let outcome = state.apply_full(vec![transfer("1", 1), transfer("2", 2)]);
        assert_eq!(outcome.added.len(), 2);
        assert!(outcome.updated.is_empty());
        assert!(outcome.removed.is_empty());
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn full_apply_garbage_collects_absentees() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![transfer("1", 1), transfer("2", 2)]);

        let outcome = state.apply_full(vec![transfer("2", 2)]);
        assert_eq!(outcome.removed, vec![TransferId::from("1")]);
        assert!(state.get(&TransferId::from("1")).is_none());
        assert!(state.resolve_slot(1).is_none());
    }

    #[test]
    fn identical_full_apply_is_idempotent() {
        let mut state = CanonicalState::new();
        let batch = vec![transfer("1", 1), transfer("2", 2)];
        let _ = state.apply_full(batch.clone());
        let before = state.to_vec();

        let outcome = state.apply_full(batch);
        assert_eq!(state.to_vec(), before);
        assert!(outcome.added.is_empty());
        assert_eq!(outcome.updated.len(), 2);
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn delta_updates_named_ids_only() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![named("1", 1, "one"), named("2", 2, "two")]);

        let outcome = state.apply_delta(vec![named("2", 2, "new-name")], &[]);
        assert_eq!(outcome.updated, vec![TransferId::from("2")]);
        assert!(outcome.removed.is_empty());
        // "1" untouched: deltas never garbage-collect.
        assert_eq!(state.len(), 2);
        assert_eq!(state.get(&TransferId::from("2")).unwrap().name, "new-name");
        assert_eq!(state.get(&TransferId::from("1")).unwrap().name, "one");
    }

    #[test]
    fn delta_removes_by_slot() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![named("1", 1, "one"), named("2", 2, "two")]);

        let outcome = state.apply_delta(vec![named("2", 2, "new-name")], &[1]);
        assert_eq!(outcome.removed, vec![TransferId::from("1")]);
        assert_eq!(state.len(), 1);
        assert_eq!(state.get(&TransferId::from("2")).unwrap().name, "new-name");
    }

    #[test]
    fn delta_removal_of_unknown_slot_is_ignored() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![transfer("1", 1)]);
        let outcome = state.apply_delta(vec![], &[99]);
        assert!(outcome.removed.is_empty());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn contradictory_delta_keeps_entity_and_flags() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![transfer("1", 1)]);

        let outcome = state.apply_delta(vec![named("1", 1, "still-here")], &[1]);
        assert!(outcome.contradiction);
        assert!(outcome.removed.is_empty());
        assert_eq!(state.get(&TransferId::from("1")).unwrap().name, "still-here");
        // The slot mapping survives for the repair fetch.
        assert_eq!(state.resolve_slot(1), Some(&TransferId::from("1")));
    }

    #[test]
    fn delta_adds_new_ids() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![transfer("1", 1)]);
        let outcome = state.apply_delta(vec![transfer("3", 3)], &[]);
        assert_eq!(outcome.added, vec![TransferId::from("3")]);
        assert_eq!(state.len(), 2);
        assert_eq!(state.resolve_slot(3), Some(&TransferId::from("3")));
    }

    #[test]
    fn slot_zero_is_never_mapped() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![transfer("a", 0), transfer("b", 0)]);
        assert!(state.resolve_slot(0).is_none());
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn slot_reassignment_refreshes_mapping() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![transfer("a", 7)]);
        // New connection: the daemon reassigned slot 7 to another transfer.
        let _ = state.apply_delta(vec![transfer("b", 7)], &[]);
        assert_eq!(state.resolve_slot(7), Some(&TransferId::from("b")));
    }

    #[test]
    fn membership_change_detection() {
        let mut outcome = MergeOutcome::default();
        assert!(!outcome.membership_changed());
        outcome.updated.push(TransferId::from("x"));
        assert!(!outcome.membership_changed());
        outcome.added.push(TransferId::from("y"));
        assert!(outcome.membership_changed());
    }

    #[test]
    fn live_ids_matches_contents() {
        let mut state = CanonicalState::new();
        let _ = state.apply_full(vec![transfer("1", 1), transfer("2", 2)]);
        let live = state.live_ids();
        assert_eq!(live.len(), 2);
        assert!(live.contains(&TransferId::from("1")));
    }
}

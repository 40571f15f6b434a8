//! Local shadow of the daemon's transfer set.
//!
//! The push channel keeps its own copy of the full state so incremental
//! patch frames can be materialized into complete payloads before they
//! reach the reconciliation core. Patches arriving before the first
//! snapshot are dropped: there is nothing coherent to patch yet.

use std::collections::BTreeMap;

use tether_core::frames::{LivePayload, PushFrame};
use tether_core::{DaemonStats, Transfer, TransferId};
use tracing::{debug, warn};

/// Shadow state for one push session.
#[derive(Debug, Default)]
pub struct ShadowMap {
    transfers: BTreeMap<TransferId, Transfer>,
    /// Set once the first snapshot lands.
    hydrated: bool,
    last_stats: Option<DaemonStats>,
}

impl ShadowMap {
    /// Empty, un-hydrated shadow.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a snapshot has been applied since (re)connect.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Number of transfers currently shadowed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Whether the shadow holds no transfers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Reset on reconnect; the next frame must be a snapshot.
    pub fn clear(&mut self) {
        self.transfers.clear();
        self.hydrated = false;
        self.last_stats = None;
    }

    /// Apply a state frame, returning the materialized payload to forward
    /// to the reconciliation core. Event frames and pre-hydration patches
    /// return `None`.
    pub fn apply(&mut self, frame: &PushFrame) -> Option<LivePayload> {
        match frame {
            PushFrame::Snapshot { transfers, stats } => {
                self.transfers = transfers
                    .iter()
                    .map(|t| (t.id.clone(), t.clone()))
                    .collect();
                self.hydrated = true;
                if stats.is_some() {
                    self.last_stats = *stats;
                }
                debug!(count = self.transfers.len(), "applied push snapshot");
                Some(self.materialize())
            }
            PushFrame::Patch {
                updated,
                removed,
                stats,
            } => {
                if !self.hydrated {
                    warn!("patch frame before first snapshot, dropping");
                    return None;
                }
                for transfer in updated {
                    let _ = self.transfers.insert(transfer.id.clone(), transfer.clone());
                }
                for id in removed {
                    let _ = self.transfers.remove(id);
                }
                if stats.is_some() {
                    self.last_stats = *stats;
                }
                Some(self.materialize())
            }
            PushFrame::Event { .. } => None,
        }
    }

    fn materialize(&self) -> LivePayload {
        LivePayload {
            transfers: self.transfers.values().cloned().collect(),
            stats: self.last_stats,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

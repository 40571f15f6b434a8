//! Status derivation with per-transfer hysteresis.
//!
//! Maps the daemon's raw activity code into a stable lifecycle status.
//! The carried per-id state exists to keep the derived status from
//! flapping: grace windows after a download starts or a verification
//! completes suppress the stall heuristic, and a guarded transition table
//! rejects noisy upstream reports outright.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use tether_core::{ErrorClassifier, ErrorKind, RawStatus, Transfer, TransferId, TransferStatus};
use tether_settings::SyncSettings;

/// Timing knobs for the heuristics.
#[derive(Clone, Copy, Debug)]
pub struct StatusConfig {
    /// Sustained no-traffic time before an active transfer is stalled.
    pub stall_grace: Duration,
    /// Window after a download starts during which stall is suppressed.
    pub start_grace: Duration,
    /// Window after verification completes during which stall is
    /// suppressed.
    pub verify_grace: Duration,
}

impl StatusConfig {
    /// Derive from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            stall_grace: Duration::from_millis(settings.stall_grace_ms),
            start_grace: Duration::from_millis(settings.start_grace_ms),
            verify_grace: Duration::from_millis(settings.verify_grace_ms),
        }
    }
}

/// Carried hysteresis state for one transfer.
#[derive(Debug, Default)]
struct Hysteresis {
    was_checking: bool,
    verify_completed_at: Option<Instant>,
    download_started_at: Option<Instant>,
    no_traffic_since: Option<Instant>,
    confirmed: Option<TransferStatus>,
}

/// Status engine for one sync instance.
///
/// All carried state lives here, injected where it is needed — never a
/// process-wide map, so independent engines and tests cannot interfere.
pub struct StatusEngine {
    config: StatusConfig,
    classifier: Arc<dyn ErrorClassifier>,
    state: HashMap<TransferId, Hysteresis>,
}

impl StatusEngine {
    /// Create an engine with the given classifier collaborator.
    #[must_use]
    pub fn new(config: StatusConfig, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self {
            config,
            classifier,
            state: HashMap::new(),
        }
    }

    /// Derive the lifecycle status for a transfer as observed at `now`.
    pub fn derive(&mut self, transfer: &Transfer, now: Instant) -> TransferStatus {
        let entry = self.state.entry(transfer.id.clone()).or_default();

        // An explicit error code is authoritative over everything else.
        if transfer.has_error() {
            let status = match self
                .classifier
                .classify(transfer.error_code, &transfer.error_message)
            {
                ErrorKind::Failure => TransferStatus::Errored,
                ErrorKind::MissingData => TransferStatus::MissingData,
            };
            entry.confirmed = Some(status);
            entry.no_traffic_since = None;
            return status;
        }

        let raw = transfer.raw_status();

        // Track verification completion for its grace window.
        if raw == RawStatus::Checking {
            entry.was_checking = true;
        } else if entry.was_checking {
            entry.was_checking = false;
            entry.verify_completed_at = Some(now);
        }

        let mut candidate = baseline(raw);

        if candidate == TransferStatus::Downloading
            && !matches!(
                entry.confirmed,
                Some(TransferStatus::Downloading | TransferStatus::Stalled)
            )
        {
            entry.download_started_at = Some(now);
        }

        // 100% complete is never stalled; a daemon still reporting
        // "downloading" at completion is treated as seeding.
        if candidate == TransferStatus::Downloading && transfer.is_complete() {
            candidate = TransferStatus::Seeding;
        }

        if matches!(
            candidate,
            TransferStatus::Downloading | TransferStatus::Seeding
        ) {
            candidate = apply_stall_heuristic(self.config, entry, transfer, candidate, now);
        } else {
            // Sticky statuses are immune to the heuristic and reset it.
            entry.no_traffic_since = None;
        }

        match entry.confirmed {
            Some(previous) if !transition_allowed(previous, candidate, transfer.progress) => {
                debug!(
                    id = %transfer.id,
                    ?previous,
                    rejected = ?candidate,
                    "illegal status transition rejected"
                );
                previous
            }
            _ => {
                entry.confirmed = Some(candidate);
                candidate
            }
        }
    }

    /// Drop carried state for transfers no longer present.
    pub fn prune(&mut self, live: &HashSet<TransferId>) {
        self.state.retain(|id, _| live.contains(id));
    }

    /// Number of transfers with carried state.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.state.len()
    }
}

fn apply_stall_heuristic(
    config: StatusConfig,
    entry: &mut Hysteresis,
    transfer: &Transfer,
    candidate: TransferStatus,
    now: Instant,
) -> TransferStatus {
    let signs_of_life =
        transfer.rate_down > 0 || transfer.rate_up > 0 || transfer.peers_sending > 0;
    let in_grace = within(entry.download_started_at, config.start_grace, now)
        || within(entry.verify_completed_at, config.verify_grace, now);

    // Zero connected peers is "nobody to talk to", not a stall; 100%
    // complete is terminal-active by definition.
    if signs_of_life || in_grace || transfer.peers_connected == 0 || transfer.is_complete() {
        entry.no_traffic_since = None;
        return candidate;
    }

    let since = *entry.no_traffic_since.get_or_insert(now);
    if now.duration_since(since) >= config.stall_grace {
        TransferStatus::Stalled
    } else {
        candidate
    }
}

/// Raw-to-derived mapping before heuristics.
fn baseline(raw: RawStatus) -> TransferStatus {
    match raw {
        RawStatus::Stopped => TransferStatus::Paused,
        RawStatus::QueuedCheck | RawStatus::Queued | RawStatus::QueuedSeed => {
            TransferStatus::Queued
        }
        RawStatus::Checking => TransferStatus::Checking,
        RawStatus::Downloading | RawStatus::Unknown(_) => TransferStatus::Downloading,
        RawStatus::Seeding => TransferStatus::Seeding,
    }
}

fn within(mark: Option<Instant>, grace: Duration, now: Instant) -> bool {
    mark.is_some_and(|at| now.duration_since(at) < grace)
}

/// Whether a confirmed status may be replaced by a newly-reported one.
///
/// Error statuses pass in both directions (clearing an error re-derives a
/// baseline). Seeding and downloading may only swap when the reported
/// progress agrees: a complete transfer cannot regress to downloading and
/// an incomplete one cannot be seeding.
fn transition_allowed(previous: TransferStatus, next: TransferStatus, progress: f64) -> bool {
    if previous == next || previous.is_error() || next.is_error() {
        return true;
    }
    match next {
        TransferStatus::Downloading if previous == TransferStatus::Seeding => progress < 1.0,
        TransferStatus::Seeding => progress >= 1.0,
        _ => true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Lifecycle status vocabulary.
//!
//! [`RawStatus`] is the daemon's reported activity code; [`TransferStatus`]
//! is the derived lifecycle status the engine maintains after applying error
//! classification and stall heuristics (see `tether-sync::status`).

use serde::{Deserialize, Serialize};

/// Activity code as reported by the daemon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RawStatus {
    /// Transfer is stopped by the user.
    Stopped,
    /// Waiting in the verification queue.
    QueuedCheck,
    /// Local data is being verified.
    Checking,
    /// Waiting in the download queue.
    Queued,
    /// Actively downloading.
    Downloading,
    /// Waiting in the seed queue.
    QueuedSeed,
    /// Actively seeding.
    Seeding,
    /// Code not recognized by this client version.
    Unknown(u8),
}

impl RawStatus {
    /// Decode a daemon activity code.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Stopped,
            1 => Self::QueuedCheck,
            2 => Self::Checking,
            3 => Self::Queued,
            4 => Self::Downloading,
            5 => Self::QueuedSeed,
            6 => Self::Seeding,
            other => Self::Unknown(other),
        }
    }

    /// Whether the daemon considers this transfer active (moving data or
    /// eligible to).
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Downloading | Self::Seeding)
    }
}

/// Derived lifecycle status broadcast to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferStatus {
    /// Stopped by the user.
    Paused,
    /// Waiting in a daemon queue (download, seed, or verify).
    Queued,
    /// Verifying local data.
    Checking,
    /// Actively downloading.
    Downloading,
    /// Complete and uploading to peers.
    Seeding,
    /// Active but no traffic despite connected peers for longer than the
    /// stall grace window.
    Stalled,
    /// The daemon reported an error on this transfer.
    Errored,
    /// The daemon reported that local data for this transfer is missing.
    MissingData,
}

impl TransferStatus {
    /// Whether this status was produced by error classification.
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Self::Errored | Self::MissingData)
    }

    /// Statuses that are sticky against heuristics: once reported by the
    /// daemon they are never silently reclassified as stalled.
    #[must_use]
    pub fn is_sticky(self) -> bool {
        matches!(self, Self::Paused | Self::Queued | Self::Checking)
    }

    /// Stable discriminant used in change fingerprints.
    #[must_use]
    pub fn discriminant(self) -> u8 {
        match self {
            Self::Paused => 0,
            Self::Queued => 1,
            Self::Checking => 2,
            Self::Downloading => 3,
            Self::Seeding => 4,
            Self::Stalled => 5,
            Self::Errored => 6,
            Self::MissingData => 7,
        }
    }
}

/// Category of a daemon-reported transfer error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic failure (tracker error, I/O error, ...).
    Failure,
    /// The daemon can no longer find local data for the transfer.
    MissingData,
}

/// Maps a daemon error report to an [`ErrorKind`].
///
/// Injected into the status engine so callers can adapt to daemons with
/// different error vocabularies.
pub trait ErrorClassifier: Send + Sync {
    /// Classify a non-zero error code and its accompanying message.
    fn classify(&self, code: i64, message: &str) -> ErrorKind;
}

/// Classifier for the stock daemon error vocabulary.
///
/// Error code 3 is the daemon's "local error"; combined with its canonical
/// "no data found" message text it indicates missing local data.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorClassifier;

impl ErrorClassifier for DefaultErrorClassifier {
    fn classify(&self, code: i64, message: &str) -> ErrorKind {
        if code == 3 && message.to_ascii_lowercase().contains("no data found") {
            ErrorKind::MissingData
        } else {
            ErrorKind::Failure
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

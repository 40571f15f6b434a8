//! Transfer records as exchanged with the daemon.
//!
//! [`Transfer`] is the normalized summary record the sync engine keeps in
//! its canonical map. Parsing from daemon JSON is tolerant per field (see
//! [`crate::fields`]) with one exception: a record without a stable id is
//! unusable and is dropped with a diagnostic by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields;
use crate::ids::TransferId;
use crate::status::{RawStatus, TransferStatus};

/// Normalized summary record for one transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Stable identity, never changes for the lifetime of the transfer.
    pub id: TransferId,
    /// Transport-local numeric ref; may change per daemon connection.
    pub slot: u64,
    /// Display name.
    pub name: String,
    /// Total payload size in bytes.
    pub size_bytes: u64,
    /// When the transfer was added to the daemon.
    pub added_at: Option<DateTime<Utc>>,
    /// Raw daemon activity code (kept for re-derivation).
    pub raw_status_code: u8,
    /// Daemon error code; 0 means no error.
    pub error_code: i64,
    /// Daemon error message, empty when no error.
    pub error_message: String,
    /// Completion ratio in `[0.0, 1.0]`.
    pub progress: f64,
    /// Download rate in bytes per second.
    pub rate_down: u64,
    /// Upload rate in bytes per second.
    pub rate_up: u64,
    /// Peers currently connected.
    pub peers_connected: u64,
    /// Peers we are downloading from.
    pub peers_sending: u64,
    /// Peers we are uploading to.
    pub peers_receiving: u64,
    /// Derived lifecycle status; populated by the status engine during
    /// normalization, defaults to the raw mapping until then.
    pub status: TransferStatus,
}

impl Transfer {
    /// Parse a daemon transfer object.
    ///
    /// Returns `None` when the stable id is missing — every other field
    /// degrades to a recoverable default.
    #[must_use]
    pub fn from_value(obj: &Value) -> Option<Self> {
        let id = obj.get("id").and_then(Value::as_str)?;
        if id.is_empty() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let raw_code = fields::u64_or_zero(obj, "status").min(u64::from(u8::MAX)) as u8;
        let added_at = obj
            .get("addedAt")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        Some(Self {
            id: TransferId::from(id),
            slot: fields::u64_or_zero(obj, "slot"),
            name: fields::string_or_empty(obj, "name"),
            size_bytes: fields::u64_or_zero(obj, "sizeBytes"),
            added_at,
            raw_status_code: raw_code,
            error_code: fields::i64_or_zero(obj, "errorCode"),
            error_message: fields::string_or_empty(obj, "errorMessage"),
            progress: fields::ratio_or_zero(obj, "progress"),
            rate_down: fields::u64_or_zero(obj, "rateDown"),
            rate_up: fields::u64_or_zero(obj, "rateUp"),
            peers_connected: fields::u64_or_zero(obj, "peersConnected"),
            peers_sending: fields::u64_or_zero(obj, "peersSending"),
            peers_receiving: fields::u64_or_zero(obj, "peersReceiving"),
            status: default_status(raw_code),
        })
    }

    /// The decoded raw activity status.
    #[must_use]
    pub fn raw_status(&self) -> RawStatus {
        RawStatus::from_code(self.raw_status_code)
    }

    /// Whether the transfer has completed its payload.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    /// Whether the daemon reported an error on this transfer.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error_code != 0
    }
}

/// Direct raw-to-derived status mapping, before hysteresis and error
/// classification are applied.
fn default_status(raw_code: u8) -> TransferStatus {
    match RawStatus::from_code(raw_code) {
        RawStatus::Stopped => TransferStatus::Paused,
        RawStatus::QueuedCheck | RawStatus::Queued | RawStatus::QueuedSeed => {
            TransferStatus::Queued
        }
        RawStatus::Checking => TransferStatus::Checking,
        RawStatus::Downloading | RawStatus::Unknown(_) => TransferStatus::Downloading,
        RawStatus::Seeding => TransferStatus::Seeding,
    }
}

/// Extended record for one transfer, fetched on demand for detail
/// subscribers.
///
/// The extra fields (per-peer rows, tracker state, file lists) are passed
/// through opaquely; presentation is out of scope here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetail {
    /// Stable identity of the transfer this detail belongs to.
    pub id: TransferId,
    /// The full daemon record, untrimmed.
    pub record: Value,
}

impl TransferDetail {
    /// Parse a detail response for one id.
    ///
    /// Unlike summary parsing this fails hard: the caller asked for exactly
    /// this transfer and an empty or mismatched response is an error.
    pub fn from_response(id: &TransferId, transfers: &[Value]) -> Result<Self, DetailParseError> {
        let record = transfers
            .iter()
            .find(|t| t.get("id").and_then(Value::as_str) == Some(id.as_str()))
            .ok_or_else(|| DetailParseError::NotInResponse(id.clone()))?;
        Ok(Self {
            id: id.clone(),
            record: record.clone(),
        })
    }
}

/// Failure to extract a requested detail record.
#[derive(Debug, thiserror::Error)]
pub enum DetailParseError {
    /// The daemon response did not contain the requested transfer.
    #[error("transfer {0} not present in detail response")]
    NotInResponse(TransferId),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

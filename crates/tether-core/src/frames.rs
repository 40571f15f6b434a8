//! Push-channel wire frames.
//!
//! The push channel delivers three frame kinds: a full `snapshot` that
//! replaces the session's shadow map, an incremental `patch` against it,
//! and side-channel `event` frames routed independently of state sync.

use serde_json::Value;

use crate::ids::TransferId;
use crate::stats::DaemonStats;
use crate::transfer::Transfer;

/// Which transport produced an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateSource {
    /// Produced by a polling tick.
    Poll,
    /// Produced by a push-channel frame.
    Push,
}

/// Decoded push-channel frame.
#[derive(Clone, Debug, PartialEq)]
pub enum PushFrame {
    /// Authoritative full state; replaces the shadow map.
    Snapshot {
        /// Complete transfer set.
        transfers: Vec<Transfer>,
        /// Aggregate stats, when the frame carries them.
        stats: Option<DaemonStats>,
    },
    /// Incremental changes against the shadow map.
    Patch {
        /// New or updated transfers.
        updated: Vec<Transfer>,
        /// Stable ids removed from the daemon.
        removed: Vec<TransferId>,
        /// Aggregate stats, when the frame carries them.
        stats: Option<DaemonStats>,
    },
    /// Side-channel signal, not part of state sync.
    Event {
        /// Signal name (e.g. `transfer.finished`).
        name: String,
        /// Opaque signal payload.
        data: Value,
    },
}

/// A complete materialized state handed to the reconciliation core.
///
/// Built by the push session from its shadow map after each state frame;
/// applied with full-fetch semantics (absent entities are pruned).
#[derive(Clone, Debug, PartialEq)]
pub struct LivePayload {
    /// The complete transfer set.
    pub transfers: Vec<Transfer>,
    /// Aggregate stats, when the originating frame carried them.
    pub stats: Option<DaemonStats>,
}

/// Frame decode failure.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The text was not valid JSON.
    #[error("push frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame carried no recognized `type` tag.
    #[error("push frame has unknown type {0:?}")]
    UnknownType(String),
}

impl PushFrame {
    /// Decode a frame from websocket text.
    ///
    /// Transfer records inside state frames are parsed tolerantly: records
    /// without a stable id are dropped (the caller logs the count).
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "snapshot" => Ok(Self::Snapshot {
                transfers: parse_transfers(&value, "transfers"),
                stats: value.get("stats").map(DaemonStats::from_value),
            }),
            "patch" => Ok(Self::Patch {
                updated: parse_transfers(&value, "updated"),
                removed: crate::fields::array_or_empty(&value, "removed")
                    .iter()
                    .filter_map(Value::as_str)
                    .map(TransferId::from)
                    .collect(),
                stats: value.get("stats").map(DaemonStats::from_value),
            }),
            "event" => Ok(Self::Event {
                name: crate::fields::string_or_empty(&value, "name"),
                data: value.get("data").cloned().unwrap_or(Value::Null),
            }),
            other => Err(FrameError::UnknownType(other.to_owned())),
        }
    }
}

fn parse_transfers(value: &Value, key: &str) -> Vec<Transfer> {
    crate::fields::array_or_empty(value, key)
        .iter()
        .filter_map(Transfer::from_value)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn decodes_snapshot() {
        let text = json!({
            "type": "snapshot",
            "transfers": [{"id": "a"}, {"id": "b"}],
            "stats": {"transferCount": 2}
        })
        .to_string();
        let frame = PushFrame::from_json(&text).unwrap();
        assert_matches!(frame, PushFrame::Snapshot { transfers, stats } => {
            assert_eq!(transfers.len(), 2);
            assert_eq!(stats.unwrap().transfer_count, 2);
        });
    }

    #[test]
    fn decodes_patch_with_removals() {
        let text = json!({
            "type": "patch",
            "updated": [{"id": "a", "progress": 0.9}],
            "removed": ["b", "c"]
        })
        .to_string();
        let frame = PushFrame::from_json(&text).unwrap();
        assert_matches!(frame, PushFrame::Patch { updated, removed, stats } => {
            assert_eq!(updated.len(), 1);
            assert_eq!(removed, vec![TransferId::from("b"), TransferId::from("c")]);
            assert!(stats.is_none());
        });
    }

    #[test]
    fn decodes_event() {
        let text = json!({
            "type": "event",
            "name": "transfer.finished",
            "data": {"id": "a"}
        })
        .to_string();
        let frame = PushFrame::from_json(&text).unwrap();
        assert_matches!(frame, PushFrame::Event { name, data } => {
            assert_eq!(name, "transfer.finished");
            assert_eq!(data["id"], "a");
        });
    }

    #[test]
    fn idless_records_are_dropped_not_fatal() {
        let text = json!({
            "type": "snapshot",
            "transfers": [{"id": "a"}, {"name": "no-id"}]
        })
        .to_string();
        let frame = PushFrame::from_json(&text).unwrap();
        assert_matches!(frame, PushFrame::Snapshot { transfers, .. } => {
            assert_eq!(transfers.len(), 1);
        });
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err = PushFrame::from_json(r#"{"type":"wat"}"#).unwrap_err();
        assert_matches!(err, FrameError::UnknownType(t) => assert_eq!(t, "wat"));
    }

    #[test]
    fn missing_type_is_an_error() {
        let err = PushFrame::from_json(r#"{"transfers":[]}"#).unwrap_err();
        assert_matches!(err, FrameError::UnknownType(t) => assert!(t.is_empty()));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert_matches!(PushFrame::from_json("{nope"), Err(FrameError::Json(_)));
    }

    #[test]
    fn non_string_removed_entries_are_skipped() {
        let text = json!({"type": "patch", "removed": ["a", 5, null]}).to_string();
        let frame = PushFrame::from_json(&text).unwrap();
        assert_matches!(frame, PushFrame::Patch { removed, .. } => {
            assert_eq!(removed, vec![TransferId::from("a")]);
        });
    }
}

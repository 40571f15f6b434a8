//! Aggregate daemon statistics.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields;

/// Daemon-wide counters, replaced wholesale on every successful fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStats {
    /// Number of transfers known to the daemon.
    pub transfer_count: u64,
    /// Transfers currently moving data or eligible to.
    pub active_count: u64,
    /// Transfers stopped by the user.
    pub paused_count: u64,
    /// Aggregate download rate in bytes per second.
    pub rate_down: u64,
    /// Aggregate upload rate in bytes per second.
    pub rate_up: u64,
}

impl DaemonStats {
    /// Parse a stats payload, degrading malformed or missing fields to zero.
    ///
    /// A completely malformed payload yields the zeroed default — aggregate
    /// numbers are presentation sugar and never worth failing a tick over.
    #[must_use]
    pub fn from_value(obj: &Value) -> Self {
        Self {
            transfer_count: fields::u64_or_zero(obj, "transferCount"),
            active_count: fields::u64_or_zero(obj, "activeCount"),
            paused_count: fields::u64_or_zero(obj, "pausedCount"),
            rate_down: fields::u64_or_zero(obj, "rateDown"),
            rate_up: fields::u64_or_zero(obj, "rateUp"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_complete_payload() {
        let stats = DaemonStats::from_value(&json!({
            "transferCount": 10,
            "activeCount": 4,
            "pausedCount": 6,
            "rateDown": 1_000_000,
            "rateUp": 250_000
        }));
        assert_eq!(stats.transfer_count, 10);
        assert_eq!(stats.active_count, 4);
        assert_eq!(stats.rate_down, 1_000_000);
    }

    #[test]
    fn malformed_payload_degrades_to_zero() {
        let stats = DaemonStats::from_value(&json!({"transferCount": "ten", "rateDown": null}));
        assert_eq!(stats, DaemonStats::default());
    }

    #[test]
    fn non_object_payload_degrades_to_zero() {
        assert_eq!(DaemonStats::from_value(&json!(null)), DaemonStats::default());
        assert_eq!(DaemonStats::from_value(&json!([])), DaemonStats::default());
    }

    #[test]
    fn serde_roundtrip() {
        let stats = DaemonStats {
            transfer_count: 3,
            active_count: 1,
            paused_count: 2,
            rate_down: 99,
            rate_up: 11,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("transferCount"));
        let back: DaemonStats = serde_json::from_str(&json).unwrap();
        assert_eq!(stats, back);
    }
}

//! Settings types with compiled defaults.

use serde::{Deserialize, Serialize};
use tether_core::retry::BackoffConfig;

/// Top-level settings for one engine instance.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TetherSettings {
    /// Remote daemon endpoint.
    pub daemon: DaemonSettings,
    /// Reconciliation behavior.
    pub sync: SyncSettings,
    /// Request layer behavior.
    pub rpc: RpcSettings,
    /// Push channel behavior.
    pub push: PushSettings,
}

/// Remote daemon endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaemonSettings {
    /// Base URL of the daemon (e.g. `http://localhost:9091`).
    pub base_url: String,
    /// RPC endpoint path joined onto the base URL.
    pub rpc_path: String,
    /// Per-request timeout in ms.
    pub request_timeout_ms: u64,
    /// Optional basic-auth username.
    pub username: Option<String>,
    /// Optional basic-auth password.
    pub password: Option<String>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9091".to_string(),
            rpc_path: "/rpc".to_string(),
            request_timeout_ms: 15_000,
            username: None,
            password: None,
        }
    }
}

/// Reconciliation behavior settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Default polling interval in ms; the effective interval is the
    /// minimum desired interval across live subscribers.
    pub poll_interval_ms: u64,
    /// Delta fetches allowed between authoritative full fetches.
    pub max_delta_cycles: u32,
    /// Samples kept per transfer in the speed history ring.
    pub history_length: usize,
    /// How long an active transfer must show no traffic before it is
    /// classified stalled, in ms.
    pub stall_grace_ms: u64,
    /// Grace window after a transfer starts downloading, in ms.
    pub start_grace_ms: u64,
    /// Grace window after verification completes, in ms.
    pub verify_grace_ms: u64,
    /// Minimum spacing between leftover-repair full fetches, in ms.
    pub repair_cooldown_ms: u64,
    /// Default interval for detail subscribers, in ms.
    pub detail_interval_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            max_delta_cycles: 10,
            history_length: 60,
            stall_grace_ms: 60_000,
            start_grace_ms: 30_000,
            verify_grace_ms: 30_000,
            repair_cooldown_ms: 30_000,
            detail_interval_ms: 2000,
        }
    }
}

/// Request layer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcSettings {
    /// TTL for cached read-only results in ms.
    pub read_cache_ttl_ms: u64,
    /// Method used to establish a session.
    pub handshake_method: String,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            read_cache_ttl_ms: 500,
            handshake_method: "session.open".to_string(),
        }
    }
}

/// Push channel settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    /// Whether to attempt the push channel at all (also gated by the
    /// daemon capability probe).
    pub enabled: bool,
    /// Websocket URL; derived from the daemon base URL when absent.
    pub url: Option<String>,
    /// Reconnect backoff parameters.
    pub backoff: BackoffConfig,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            backoff: BackoffConfig::default(),
        }
    }
}

//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::TetherSettings;

/// Resolve the path to the settings file (`~/.tether/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tether").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TetherSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TetherSettings> {
    let defaults = serde_json::to_value(TetherSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TetherSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules; invalid values are silently
/// ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut TetherSettings) {
    // ── Daemon ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TETHER_DAEMON_URL") {
        settings.daemon.base_url = v;
    }
    if let Some(v) = read_env_string("TETHER_RPC_PATH") {
        settings.daemon.rpc_path = v;
    }
    if let Some(v) = read_env_u64("TETHER_REQUEST_TIMEOUT_MS", 100, 600_000) {
        settings.daemon.request_timeout_ms = v;
    }
    if let Some(v) = read_env_string("TETHER_USERNAME") {
        settings.daemon.username = Some(v);
    }
    if let Some(v) = read_env_string("TETHER_PASSWORD") {
        settings.daemon.password = Some(v);
    }

    // ── Sync ────────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("TETHER_POLL_INTERVAL_MS", 500, 3_600_000) {
        settings.sync.poll_interval_ms = v;
    }
    if let Some(v) = read_env_u32("TETHER_MAX_DELTA_CYCLES", 1, 1000) {
        settings.sync.max_delta_cycles = v;
    }
    if let Some(v) = read_env_u64("TETHER_STALL_GRACE_MS", 1000, 3_600_000) {
        settings.sync.stall_grace_ms = v;
    }
    if let Some(v) = read_env_u64("TETHER_REPAIR_COOLDOWN_MS", 1000, 3_600_000) {
        settings.sync.repair_cooldown_ms = v;
    }

    // ── Push ────────────────────────────────────────────────────────
    if let Some(v) = read_env_bool("TETHER_PUSH_ENABLED") {
        settings.push.enabled = v;
    }
    if let Some(v) = read_env_string("TETHER_PUSH_URL") {
        settings.push.url = Some(v);
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_bool(&v))
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_u64_range(&v, min, max))
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_u32_range(&v, min, max))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

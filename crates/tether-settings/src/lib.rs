//! # tether-settings
//!
//! Configuration for the sync engine. Loading flow:
//!
//! 1. Start with compiled [`TetherSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `TETHER_*` environment variable overrides (highest priority)

#![deny(unsafe_code)]

mod errors;
mod loader;
mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{DaemonSettings, PushSettings, RpcSettings, SyncSettings, TetherSettings};

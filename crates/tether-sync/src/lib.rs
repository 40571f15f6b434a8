//! # tether-sync
//!
//! The reconciliation core: keeps a canonical in-memory mirror of the
//! daemon's transfer collection consistent under pull polling and push
//! events, derives stable lifecycle statuses, maintains per-transfer
//! speed histories, and notifies subscribers only when their view
//! actually changed.

#![deny(unsafe_code)]

mod bootstrap;
mod errors;
mod fingerprint;
mod history;
mod merge;
mod scheduler;
mod source;
mod status;
mod subscription;

pub use bootstrap::SyncService;
pub use errors::{Result, SyncError, SyncErrorInfo};
pub use fingerprint::{entity_digest, fingerprint};
pub use history::{HistoryStore, SpeedHistorySnapshot};
pub use merge::{CanonicalState, MergeOutcome};
pub use scheduler::{SyncConfig, SyncEngine};
pub use source::{DaemonSource, FetchResponse, TransferSource, SUMMARY_FIELDS};
pub use status::{StatusConfig, StatusEngine};
pub use subscription::{
    SubscribeMode, SubscribeParams, SubscriptionHandle, SyncMessage, SyncUpdate,
};

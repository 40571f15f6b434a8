//! # tether-core
//!
//! Domain types shared by every tether crate: transfer records, aggregate
//! stats, lifecycle statuses, push frames, and the tolerant field parsing
//! used to absorb malformed daemon payloads.

#![deny(unsafe_code)]

pub mod fields;
pub mod frames;
pub mod ids;
pub mod retry;
pub mod stats;
pub mod status;
pub mod transfer;

pub use ids::{SubscriptionId, TransferId};
pub use stats::DaemonStats;
pub use status::{ErrorClassifier, ErrorKind, RawStatus, TransferStatus};
pub use transfer::{Transfer, TransferDetail};

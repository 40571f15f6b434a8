//! Sync engine error types.
//!
//! `SyncError` is `Clone` so one failure can be fanned out to every
//! subscriber's error channel.

use thiserror::Error;

use tether_core::TransferId;
use tether_rpc::RpcError;

/// Errors surfaced by the reconciliation engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The request layer failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// A detail fetch for one transfer failed.
    #[error("detail for {id} unavailable: {message}")]
    Detail {
        /// The transfer the detail was requested for.
        id: TransferId,
        /// Failure text.
        message: String,
    },
    /// The engine was destroyed.
    #[error("sync engine destroyed")]
    Destroyed,
}

/// Error report delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncErrorInfo {
    /// Human-readable failure text.
    pub message: String,
    /// Set when the failure concerned one subscriber's detail view.
    pub detail_id: Option<TransferId>,
}

impl SyncErrorInfo {
    /// Report for a whole-tick failure.
    #[must_use]
    pub fn tick(error: &SyncError) -> Self {
        Self {
            message: error.to_string(),
            detail_id: None,
        }
    }

    /// Report for a single subscriber's detail failure.
    #[must_use]
    pub fn detail(id: TransferId, error: &SyncError) -> Self {
        Self {
            message: error.to_string(),
            detail_id: Some(id),
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_convert() {
        let err: SyncError = RpcError::Timeout.into();
        assert_eq!(err, SyncError::Rpc(RpcError::Timeout));
        assert_eq!(err.to_string(), "request timed out");
    }

    #[test]
    fn detail_error_names_the_transfer() {
        let err = SyncError::Detail {
            id: TransferId::from("t9"),
            message: "gone".into(),
        };
        assert!(err.to_string().contains("t9"));
    }

    #[test]
    fn info_for_tick_has_no_detail_id() {
        let info = SyncErrorInfo::tick(&SyncError::Destroyed);
        assert!(info.detail_id.is_none());
        assert_eq!(info.message, "sync engine destroyed");
    }

    #[test]
    fn info_for_detail_carries_id() {
        let id = TransferId::from("t1");
        let info = SyncErrorInfo::detail(id.clone(), &SyncError::Rpc(RpcError::Timeout));
        assert_eq!(info.detail_id, Some(id));
    }
}

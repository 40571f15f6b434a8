//! RPC error types.
//!
//! Variants carry strings rather than source errors so results can be
//! shared across coalesced callers (the error must be `Clone`).

use thiserror::Error;

/// Errors surfaced by the request layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("transport error: {message}")]
    Transport {
        /// Underlying error text.
        message: String,
    },
    /// The daemon answered with a non-success result string.
    #[error("daemon error: {result}")]
    Daemon {
        /// The daemon's result string.
        result: String,
    },
    /// Unexpected HTTP status outside the session/auth protocol.
    #[error("unexpected HTTP status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },
    /// The response body was not a valid envelope.
    #[error("malformed response: {message}")]
    Malformed {
        /// Decode failure text.
        message: String,
    },
    /// A second session conflict in a row; the retry budget is one.
    #[error("session conflict persisted after token renewal")]
    SessionConflict,
    /// Credentials were rejected; session state has been invalidated.
    #[error("unauthorized by daemon")]
    Unauthorized,
    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,
    /// The client was destroyed while the request was in flight.
    #[error("request cancelled")]
    Cancelled,
}

impl RpcError {
    /// Whether this error indicates the caller should re-authenticate.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Whether the daemon rejected the method as unknown.
    ///
    /// Used to downgrade optional-capability probes to "disabled" instead
    /// of surfacing an error.
    #[must_use]
    pub fn is_method_unrecognized(&self) -> bool {
        match self {
            Self::Daemon { result } => {
                let lower = result.to_ascii_lowercase();
                lower.contains("method not recognized") || lower.contains("unknown method")
            }
            _ => false,
        }
    }

    /// Stable label for metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Daemon { .. } => "daemon",
            Self::Status { .. } => "status",
            Self::Malformed { .. } => "malformed",
            Self::SessionConflict => "conflict",
            Self::Unauthorized => "unauthorized",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport {
                message: err.to_string(),
            }
        }
    }
}

/// Result type for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_clone_and_eq() {
        let err = RpcError::Daemon {
            result: "boom".into(),
        };
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn unauthorized_detection() {
        assert!(RpcError::Unauthorized.is_unauthorized());
        assert!(!RpcError::Timeout.is_unauthorized());
    }

    #[test]
    fn method_unrecognized_detection() {
        let err = RpcError::Daemon {
            result: "Method not recognized: daemon.capabilities".into(),
        };
        assert!(err.is_method_unrecognized());

        let err = RpcError::Daemon {
            result: "unknown method".into(),
        };
        assert!(err.is_method_unrecognized());

        let err = RpcError::Daemon {
            result: "permission denied".into(),
        };
        assert!(!err.is_method_unrecognized());
        assert!(!RpcError::Timeout.is_method_unrecognized());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            RpcError::SessionConflict.to_string(),
            "session conflict persisted after token renewal"
        );
        assert!(RpcError::Status { status: 500 }.to_string().contains("500"));
    }

    #[test]
    fn categories_are_distinct() {
        use std::collections::HashSet;
        let all = [
            RpcError::Transport { message: String::new() }.category(),
            RpcError::Daemon { result: String::new() }.category(),
            RpcError::Status { status: 0 }.category(),
            RpcError::Malformed { message: String::new() }.category(),
            RpcError::SessionConflict.category(),
            RpcError::Unauthorized.category(),
            RpcError::Timeout.category(),
            RpcError::Cancelled.category(),
        ];
        let set: HashSet<&str> = all.iter().copied().collect();
        assert_eq!(set.len(), all.len());
    }
}

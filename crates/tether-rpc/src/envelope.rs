//! RPC wire envelope.
//!
//! Every call is a POST of `{method, arguments}`; the daemon answers with
//! `{result, arguments}` where `result` is the literal `"success"` or an
//! error string. Session renewal rides on a response header.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RpcError;

/// Header carrying the session token on conflict responses and outgoing
/// requests.
pub const SESSION_HEADER: &str = "X-Tether-Session-Id";

/// Outgoing request envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Method name (e.g. `transfer.list`).
    pub method: String,
    /// Method arguments object.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
}

impl RequestEnvelope {
    /// Build an envelope.
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Deterministic key for coalescing identical reads.
    ///
    /// `serde_json` maps are sorted, so serializing the arguments yields a
    /// canonical form regardless of construction order.
    #[must_use]
    pub fn coalesce_key(&self) -> String {
        format!("{}\u{1}{}", self.method, self.arguments)
    }
}

/// Incoming response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// `"success"` or an error string.
    pub result: String,
    /// Result payload.
    #[serde(default)]
    pub arguments: Value,
}

impl ResponseEnvelope {
    /// Whether the daemon reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == "success"
    }

    /// Convert into the payload, mapping a non-success result to
    /// [`RpcError::Daemon`].
    pub fn into_arguments(self) -> Result<Value, RpcError> {
        if self.is_success() {
            Ok(self.arguments)
        } else {
            Err(RpcError::Daemon {
                result: self.result,
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

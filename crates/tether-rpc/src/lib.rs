//! # tether-rpc
//!
//! The request layer beneath the sync engine: a session-aware RPC client
//! speaking `{method, arguments}` envelopes to the daemon, with a
//! handshake state machine, bounded conflict retry, read-request
//! coalescing, and a short-TTL read cache.

#![deny(unsafe_code)]

mod client;
mod coalesce;
mod envelope;
mod errors;
mod handshake;

pub use client::{Capabilities, DaemonClient, DaemonClientConfig};
pub use coalesce::ReadCache;
pub use envelope::{RequestEnvelope, ResponseEnvelope, SESSION_HEADER};
pub use errors::{Result, RpcError};
pub use handshake::{HandshakeState, SessionState};

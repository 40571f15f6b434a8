//! Session handshake state.
//!
//! The state machine gates regular requests: everything except the
//! handshake itself (and the capability probe) waits for `Ready`. The
//! token itself is adopted from conflict responses; see
//! [`crate::client::DaemonClient`] for the single-flight execution.

/// Phase of the session handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    /// No handshake attempted yet.
    Idle,
    /// A handshake is in flight.
    Handshaking,
    /// The session is established; requests may proceed.
    Ready,
    /// Credentials or session were rejected; a fresh handshake is required.
    Invalid,
}

impl HandshakeState {
    /// Whether requests that do not bypass the handshake may proceed.
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

/// Mutable session state guarded by the client.
#[derive(Clone, Debug)]
pub struct SessionState {
    /// Current handshake phase.
    pub state: HandshakeState,
    /// Session token adopted from the daemon, sent on every request.
    pub token: Option<String>,
}

impl SessionState {
    /// Fresh state with no token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Idle,
            token: None,
        }
    }

    /// Adopt a renewed token from a conflict response.
    pub fn adopt_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Invalidate after an unauthorized response: the token is cleared and
    /// non-bypass requests must await a fresh handshake.
    pub fn invalidate(&mut self) {
        self.state = HandshakeState::Invalid;
        self.token = None;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

//! Session-aware daemon client.
//!
//! One instance owns one RPC channel: the handshake state machine, the
//! adopted session token, the read cache, and the cancellation token for
//! in-flight work. All of that is instance state — two clients (or a test
//! and the real thing) never share a map.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use tether_settings::TetherSettings;

use crate::coalesce::ReadCache;
use crate::envelope::{RequestEnvelope, ResponseEnvelope, SESSION_HEADER};
use crate::errors::{Result, RpcError};
use crate::handshake::{HandshakeState, SessionState};

/// Connection parameters for one daemon.
#[derive(Clone, Debug)]
pub struct DaemonClientConfig {
    /// Full RPC endpoint URL.
    pub endpoint: Url,
    /// Method used to establish a session.
    pub handshake_method: String,
    /// Per-request deadline.
    pub request_timeout: Duration,
    /// TTL for cached read results.
    pub read_cache_ttl: Duration,
    /// Optional basic-auth username.
    pub username: Option<String>,
    /// Optional basic-auth password.
    pub password: Option<String>,
}

impl DaemonClientConfig {
    /// Derive a config from loaded settings.
    pub fn from_settings(settings: &TetherSettings) -> Result<Self> {
        let base = Url::parse(&settings.daemon.base_url).map_err(|e| RpcError::Transport {
            message: format!("invalid daemon base URL: {e}"),
        })?;
        let endpoint = base
            .join(&settings.daemon.rpc_path)
            .map_err(|e| RpcError::Transport {
                message: format!("invalid RPC path: {e}"),
            })?;
        Ok(Self {
            endpoint,
            handshake_method: settings.rpc.handshake_method.clone(),
            request_timeout: Duration::from_millis(settings.daemon.request_timeout_ms),
            read_cache_ttl: Duration::from_millis(settings.rpc.read_cache_ttl_ms),
            username: settings.daemon.username.clone(),
            password: settings.daemon.password.clone(),
        })
    }
}

/// Optional daemon features discovered by the capability probe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Capabilities {
    /// Whether the probe itself was recognized by the daemon.
    pub supported: bool,
    /// Whether the daemon offers a push channel.
    pub push_channel: bool,
    /// The raw capability payload for forward-compatible callers.
    pub raw: Value,
}

/// The request/response channel to the daemon.
#[derive(Clone)]
pub struct DaemonClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    config: DaemonClientConfig,
    session: Mutex<SessionState>,
    /// Serializes handshakes: exactly one may be in flight.
    handshake_gate: tokio::sync::Mutex<()>,
    reads: ReadCache,
    cancel: CancellationToken,
}

enum SendOutcome {
    Success(Value),
    Conflict(Option<String>),
    Unauthorized,
}

impl DaemonClient {
    /// Build a client. Fails only on HTTP client construction.
    pub fn new(config: DaemonClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(RpcError::from)?;
        let read_cache_ttl = config.read_cache_ttl;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                session: Mutex::new(SessionState::new()),
                handshake_gate: tokio::sync::Mutex::new(()),
                reads: ReadCache::new(read_cache_ttl),
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Current handshake phase.
    #[must_use]
    pub fn handshake_state(&self) -> HandshakeState {
        self.inner.session.lock().state
    }

    /// The adopted session token, if any.
    #[must_use]
    pub fn session_token(&self) -> Option<String> {
        self.inner.session.lock().token.clone()
    }

    /// Issue a mutating call. Awaits a ready handshake, then invalidates
    /// the read cache on success.
    pub async fn call(&self, method: &str, arguments: Value) -> Result<Value> {
        ensure_ready(&self.inner).await?;
        let value = execute(
            Arc::clone(&self.inner),
            RequestEnvelope::new(method, arguments),
        )
        .await?;
        self.inner.reads.invalidate_all();
        Ok(value)
    }

    /// Issue a read-only call. Identical concurrent reads coalesce and
    /// successes are cached for the configured TTL.
    pub async fn call_read(&self, method: &str, arguments: Value) -> Result<Value> {
        ensure_ready(&self.inner).await?;
        let envelope = RequestEnvelope::new(method, arguments);
        let key = envelope.coalesce_key();
        let inner = Arc::clone(&self.inner);
        self.inner
            .reads
            .get_or_fetch_with(key, move || execute(inner, envelope))
            .await
    }

    /// Probe optional daemon capabilities.
    ///
    /// Bypasses the handshake gate (like the handshake itself) and
    /// downgrades "method not recognized" to a disabled capability set —
    /// a daemon without the probe is not an error.
    pub async fn probe_capabilities(&self) -> Result<Capabilities> {
        let envelope = RequestEnvelope::new(CAPABILITIES_METHOD, Value::Null);
        match execute(Arc::clone(&self.inner), envelope).await {
            Ok(raw) => Ok(Capabilities {
                supported: true,
                push_channel: raw
                    .get("pushChannel")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                raw,
            }),
            Err(err) if err.is_method_unrecognized() => {
                info!("daemon does not support capability discovery, optional features disabled");
                Ok(Capabilities::default())
            }
            Err(err) => Err(err),
        }
    }

    /// Abort all in-flight requests. Subsequent calls fail with
    /// [`RpcError::Cancelled`].
    pub fn destroy(&self) {
        self.inner.cancel.cancel();
    }
}

/// Optional capability-discovery method.
const CAPABILITIES_METHOD: &str = "daemon.capabilities";

/// Await a ready handshake, performing one if needed.
///
/// The async gate serializes concurrent callers; the state is re-checked
/// after acquiring it so a storm of requests produces exactly one
/// handshake.
async fn ensure_ready(inner: &Arc<ClientInner>) -> Result<()> {
    if inner.session.lock().state.is_ready() {
        return Ok(());
    }

    let _guard = inner.handshake_gate.lock().await;
    if inner.session.lock().state.is_ready() {
        return Ok(());
    }

    inner.session.lock().state = HandshakeState::Handshaking;
    debug!(method = %inner.config.handshake_method, "starting session handshake");

    let envelope = RequestEnvelope::new(inner.config.handshake_method.clone(), Value::Null);
    match execute(Arc::clone(inner), envelope).await {
        Ok(_) => {
            inner.session.lock().state = HandshakeState::Ready;
            debug!("session handshake complete");
            Ok(())
        }
        Err(err) => {
            let mut session = inner.session.lock();
            session.state = if err.is_unauthorized() {
                HandshakeState::Invalid
            } else {
                HandshakeState::Idle
            };
            warn!(error = %err, "session handshake failed");
            Err(err)
        }
    }
}

/// Send an envelope, renewing the session token on conflict exactly once.
async fn execute(inner: Arc<ClientInner>, envelope: RequestEnvelope) -> Result<Value> {
    let mut conflict_retried = false;
    loop {
        match send_once(&inner, &envelope).await? {
            SendOutcome::Success(value) => return Ok(value),
            SendOutcome::Conflict(Some(token)) if !conflict_retried => {
                metrics::counter!("rpc_session_conflicts_total").increment(1);
                debug!(method = %envelope.method, "session conflict, adopting renewed token");
                inner.session.lock().adopt_token(token);
                conflict_retried = true;
            }
            SendOutcome::Conflict(_) => {
                warn!(method = %envelope.method, "session conflict persisted after renewal");
                return Err(RpcError::SessionConflict);
            }
            SendOutcome::Unauthorized => {
                metrics::counter!("rpc_unauthorized_total").increment(1);
                inner.session.lock().invalidate();
                return Err(RpcError::Unauthorized);
            }
        }
    }
}

async fn send_once(inner: &Arc<ClientInner>, envelope: &RequestEnvelope) -> Result<SendOutcome> {
    let mut request = inner
        .http
        .post(inner.config.endpoint.clone())
        .json(envelope);

    if let Some(token) = inner.session.lock().token.clone() {
        request = request.header(SESSION_HEADER, token);
    }
    if let Some(username) = &inner.config.username {
        request = request.basic_auth(username, inner.config.password.as_deref());
    }

    let response = tokio::select! {
        result = request.send() => result.map_err(RpcError::from)?,
        () = inner.cancel.cancelled() => return Err(RpcError::Cancelled),
    };

    let status = response.status().as_u16();
    match status {
        409 => {
            let token = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);
            Ok(SendOutcome::Conflict(token))
        }
        401 | 403 => Ok(SendOutcome::Unauthorized),
        s if !(200..300).contains(&s) => Err(RpcError::Status { status: s }),
        _ => {
            let body = tokio::select! {
                result = response.text() => result.map_err(RpcError::from)?,
                () = inner.cancel.cancelled() => return Err(RpcError::Cancelled),
            };
            let decoded: ResponseEnvelope =
                serde_json::from_str(&body).map_err(|e| RpcError::Malformed {
                    message: e.to_string(),
                })?;
            decoded.into_arguments().map(SendOutcome::Success)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Wiring for a complete sync service.
//!
//! Builds the RPC client, probes optional daemon capabilities, starts the
//! polling loop, and attaches the push channel when the daemon offers one.
//! The capability probe gates the push attempt; a daemon without the
//! probe simply runs on polling alone.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use tether_push::{PushSession, PushSessionConfig};
use tether_rpc::{DaemonClient, DaemonClientConfig};
use tether_settings::TetherSettings;

use crate::errors::Result;
use crate::scheduler::{SyncConfig, SyncEngine};
use crate::source::DaemonSource;

/// A running sync service: engine, transport, and background tasks.
pub struct SyncService {
    engine: SyncEngine,
    client: DaemonClient,
    push: Option<PushSession>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncService {
    /// Build and start a service from settings.
    pub async fn start(settings: &TetherSettings) -> Result<Self> {
        let client = DaemonClient::new(DaemonClientConfig::from_settings(settings)?)?;
        let source = Arc::new(DaemonSource::new(client.clone()));
        let engine = SyncEngine::new(source, SyncConfig::from_settings(&settings.sync));
        let mut tasks = vec![engine.start()];

        let mut push = None;
        if settings.push.enabled {
            let capabilities = match client.probe_capabilities().await {
                Ok(caps) => caps,
                Err(err) => {
                    warn!(error = %err, "capability probe failed, optional features disabled");
                    tether_rpc::Capabilities::default()
                }
            };
            if capabilities.push_channel {
                let url = settings
                    .push
                    .url
                    .clone()
                    .unwrap_or_else(|| derive_push_url(&settings.daemon.base_url));
                info!(url = %url, "daemon offers a push channel, attaching");
                let (session, events) = PushSession::spawn(PushSessionConfig {
                    url,
                    backoff: settings.push.backoff,
                });
                tasks.push(engine.attach_push(events));
                push = Some(session);
            }
        }

        Ok(Self {
            engine,
            client,
            push,
            tasks,
        })
    }

    /// The reconciliation engine.
    #[must_use]
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// The underlying RPC client, for issuing commands alongside sync.
    #[must_use]
    pub fn client(&self) -> &DaemonClient {
        &self.client
    }

    /// Stop everything deterministically: abort in-flight requests, stop
    /// timers, close subscriber channels, and wait for the tasks to exit.
    pub async fn shutdown(self) {
        self.engine.destroy();
        if let Some(push) = self.push {
            push.shutdown().await;
        }
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Derive a websocket endpoint from the daemon's HTTP base URL.
fn derive_push_url(base_url: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_owned()
    };
    format!("{}/events", ws_base.trim_end_matches('/'))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

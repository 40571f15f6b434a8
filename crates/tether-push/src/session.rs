//! Websocket session with reconnect.
//!
//! The session task connects, forwards decoded frames as [`PushEvent`]s,
//! and reconnects with exponential backoff when the daemon drops it. The
//! scheduler owns the receiving end and decides what connect/disconnect
//! mean for polling; this task never reaches into scheduler state.

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tether_core::frames::{LivePayload, PushFrame};
use tether_core::retry::{BackoffConfig, BackoffSchedule};

use crate::shadow::ShadowMap;

/// Default event channel capacity.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event emitted by the push session.
#[derive(Clone, Debug)]
pub enum PushEvent {
    /// The websocket connected; polling may be suspended.
    Connected,
    /// The websocket dropped; polling must resume.
    Disconnected {
        /// Human-readable cause.
        reason: String,
    },
    /// A materialized full state from a snapshot or patch frame.
    Live(LivePayload),
    /// A side-channel signal, independent of state sync.
    Signal {
        /// Signal name.
        name: String,
        /// Opaque payload.
        data: serde_json::Value,
    },
}

/// Parameters for one push session.
#[derive(Clone, Debug)]
pub struct PushSessionConfig {
    /// Websocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Reconnect backoff parameters.
    pub backoff: BackoffConfig,
}

/// Handle to a running push session task.
pub struct PushSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PushSession {
    /// Spawn the session task. Events arrive on the returned receiver;
    /// dropping it stops the task on its next send.
    #[must_use]
    pub fn spawn(config: PushSessionConfig) -> (Self, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run(config, tx, task_cancel).await;
        });
        (Self { cancel, handle }, rx)
    }

    /// Stop the session and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }

    /// Stop the session without waiting.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }
}

async fn run(config: PushSessionConfig, events: mpsc::Sender<PushEvent>, cancel: CancellationToken) {
    let mut backoff = BackoffSchedule::new(config.backoff);
    let mut shadow = ShadowMap::new();

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let connect = tokio::select! {
            result = connect_async(config.url.as_str()) => result,
            () = cancel.cancelled() => return,
        };

        match connect {
            Ok((stream, _response)) => {
                info!(url = %config.url, "push channel connected");
                metrics::counter!("push_connects_total").increment(1);
                backoff.reset();
                shadow.clear();
                if events.send(PushEvent::Connected).await.is_err() {
                    return;
                }

                let reason = read_frames(stream, &mut shadow, &events, &cancel).await;
                let Some(reason) = reason else {
                    // Cancelled or receiver gone.
                    return;
                };
                warn!(reason = %reason, "push channel disconnected");
                if events.send(PushEvent::Disconnected { reason }).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                debug!(url = %config.url, error = %err, "push channel connect failed");
            }
        }

        let delay = backoff.next_delay_ms();
        debug!(delay_ms = delay, "push channel reconnect backoff");
        tokio::select! {
            () = tokio::time::sleep(std::time::Duration::from_millis(delay)) => {}
            () = cancel.cancelled() => return,
        }
    }
}

/// Pump frames until the stream ends. Returns the disconnect reason, or
/// `None` when the session should stop entirely.
async fn read_frames<S>(
    mut stream: S,
    shadow: &mut ShadowMap,
    events: &mpsc::Sender<PushEvent>,
    cancel: &CancellationToken,
) -> Option<String>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Sink<Message>
        + Unpin,
{
    loop {
        let message = tokio::select! {
            msg = stream.next() => msg,
            () = cancel.cancelled() => return None,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                match PushFrame::from_json(text.as_str()) {
                    Ok(PushFrame::Event { name, data }) => {
                        if events.send(PushEvent::Signal { name, data }).await.is_err() {
                            return None;
                        }
                    }
                    Ok(frame) => {
                        if let Some(payload) = shadow.apply(&frame) {
                            if events.send(PushEvent::Live(payload)).await.is_err() {
                                return None;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "ignoring undecodable push frame");
                    }
                }
            }
            Some(Ok(Message::Ping(payload))) => {
                if stream.send(Message::Pong(payload)).await.is_err() {
                    return Some("failed to answer ping".to_owned());
                }
            }
            Some(Ok(Message::Close(_))) => return Some("closed by daemon".to_owned()),
            Some(Ok(_)) => {} // binary and pong frames are ignored
            Some(Err(err)) => return Some(err.to_string()),
            None => return Some("stream ended".to_owned()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

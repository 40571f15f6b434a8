//! Subscriber registry and broadcast messages.
//!
//! Each subscriber owns a bounded channel; the scheduler delivers with
//! `try_send` and drops messages for consumers that cannot keep up (the
//! next notified tick carries the fresh state anyway). A closed channel
//! unregisters the subscriber on the next delivery attempt.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use tether_core::frames::UpdateSource;
use tether_core::{DaemonStats, SubscriptionId, Transfer, TransferDetail, TransferId};

use crate::errors::SyncErrorInfo;

/// Per-subscriber channel capacity.
pub(crate) const SUBSCRIBER_CHANNEL_CAPACITY: usize = 32;

/// What a subscriber wants from the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeMode {
    /// Keep the mirror warm without a visible consumer.
    Background,
    /// The full list view.
    List,
    /// The list plus an extended record for one transfer.
    Detail,
}

/// Subscription request.
#[derive(Clone, Debug)]
pub struct SubscribeParams {
    /// Consumer mode.
    pub mode: SubscribeMode,
    /// Transfer whose detail to track (`Detail` mode).
    pub detail_id: Option<TransferId>,
    /// Desired polling interval; the engine default applies when absent.
    pub interval: Option<Duration>,
    /// Force every tick this subscriber influences to be a full fetch.
    pub prefer_full_fetch: bool,
}

impl SubscribeParams {
    /// A list subscriber with default interval.
    #[must_use]
    pub fn list() -> Self {
        Self {
            mode: SubscribeMode::List,
            detail_id: None,
            interval: None,
            prefer_full_fetch: false,
        }
    }

    /// A background subscriber with default interval.
    #[must_use]
    pub fn background() -> Self {
        Self {
            mode: SubscribeMode::Background,
            ..Self::list()
        }
    }

    /// A detail subscriber for one transfer.
    #[must_use]
    pub fn detail(id: TransferId) -> Self {
        Self {
            mode: SubscribeMode::Detail,
            detail_id: Some(id),
            interval: None,
            prefer_full_fetch: false,
        }
    }

    /// Set the desired interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Request authoritative full fetches on every tick.
    #[must_use]
    pub fn with_full_fetch(mut self) -> Self {
        self.prefer_full_fetch = true;
        self
    }
}

/// One broadcast state update.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncUpdate {
    /// Which transport produced this update.
    pub source: UpdateSource,
    /// The complete transfer set, id-ordered.
    pub transfers: Vec<Transfer>,
    /// Aggregate daemon stats.
    pub stats: DaemonStats,
}

/// Message delivered to a subscriber.
#[derive(Clone, Debug)]
pub enum SyncMessage {
    /// New canonical state.
    Update(Arc<SyncUpdate>),
    /// Extended record for the subscribed detail transfer.
    Detail(Arc<TransferDetail>),
    /// A refresh or detail fetch failed; previous state remains valid.
    Error(SyncErrorInfo),
    /// Side-channel signal from the push channel.
    Signal {
        /// Signal name.
        name: String,
        /// Opaque payload.
        data: Value,
    },
}

/// Receiving end of a subscription.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    rx: mpsc::Receiver<SyncMessage>,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: SubscriptionId, rx: mpsc::Receiver<SyncMessage>) -> Self {
        Self { id, rx }
    }

    /// This subscription's identity, for `unsubscribe`.
    #[must_use]
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Wait for the next message. `None` after the engine is destroyed.
    pub async fn recv(&mut self) -> Option<SyncMessage> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<SyncMessage> {
        self.rx.try_recv().ok()
    }
}

/// Delivery result for one send attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Channel full; message dropped for this slow consumer.
    Dropped,
    /// Receiver gone; the subscriber should be unregistered.
    Closed,
}

/// Registry-side record of one subscriber.
pub(crate) struct Subscriber {
    pub mode: SubscribeMode,
    pub detail_id: Option<TransferId>,
    pub interval: Duration,
    pub prefer_full_fetch: bool,
    pub tx: mpsc::Sender<SyncMessage>,
    /// Fingerprint of the last state this subscriber was notified with.
    pub last_fingerprint: Option<u64>,
    /// Entity digest of the detail transfer at its last detail fetch.
    pub last_detail_digest: Option<u64>,
}

impl Subscriber {
    pub(crate) fn send(&self, id: &SubscriptionId, message: SyncMessage) -> Delivery {
        match self.tx.try_send(message) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscription = %id, "subscriber channel full, dropping message");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

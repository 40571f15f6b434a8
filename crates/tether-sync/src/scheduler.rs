//! The reconciliation scheduler.
//!
//! One engine instance owns the canonical map, the status engine, the
//! speed histories, and the subscriber registry, all behind a single
//! short-held lock. At most one tick runs at a time; asynchronous
//! suspension happens only at the fetch boundaries, never while the lock
//! is held. Push delivery and poll delivery feed the same merge path —
//! push unconditionally, poll gated per subscriber by fingerprint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tether_core::frames::{LivePayload, UpdateSource};
use tether_core::status::DefaultErrorClassifier;
use tether_core::{DaemonStats, ErrorClassifier, SubscriptionId, TransferDetail, TransferId};
use tether_push::PushEvent;
use tether_settings::SyncSettings;

use crate::errors::{SyncError, SyncErrorInfo};
use crate::fingerprint::{entity_digest, fingerprint};
use crate::history::{HistoryStore, SpeedHistorySnapshot};
use crate::merge::CanonicalState;
use crate::source::TransferSource;
use crate::status::{StatusConfig, StatusEngine};
use crate::subscription::{
    Delivery, SubscribeMode, SubscribeParams, Subscriber, SubscriptionHandle, SyncMessage,
    SyncUpdate, SUBSCRIBER_CHANNEL_CAPACITY,
};

/// Scheduler tuning, derived from settings.
#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    /// Default polling interval for list/background subscribers.
    pub poll_interval: Duration,
    /// Default polling interval for detail subscribers.
    pub detail_interval: Duration,
    /// Delta fetches allowed between authoritative full fetches.
    pub max_delta_cycles: u32,
    /// Samples kept per transfer in the speed history.
    pub history_length: usize,
    /// Minimum spacing between leftover-repair full fetches.
    pub repair_cooldown: Duration,
    /// Status heuristic timing.
    pub status: StatusConfig,
}

impl SyncConfig {
    /// Derive from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            detail_interval: Duration::from_millis(settings.detail_interval_ms),
            max_delta_cycles: settings.max_delta_cycles,
            history_length: settings.history_length,
            repair_cooldown: Duration::from_millis(settings.repair_cooldown_ms),
            status: StatusConfig::from_settings(settings),
        }
    }
}

/// Everything the engine mutates, behind one lock.
struct EngineState {
    canonical: CanonicalState,
    status: StatusEngine,
    history: HistoryStore,
    subscribers: HashMap<SubscriptionId, Subscriber>,
    stats: DaemonStats,
    hydrated: bool,
    delta_cycles: u32,
    repair_pending: bool,
    last_repair_at: Option<Instant>,
    detail_cache: HashMap<TransferId, Arc<TransferDetail>>,
    last_update: Option<Arc<SyncUpdate>>,
    last_fingerprint: u64,
}

struct EngineInner {
    source: Arc<dyn TransferSource>,
    config: SyncConfig,
    state: Mutex<EngineState>,
    /// Re-entrancy guard: overlapping tick calls are dropped.
    tick_active: AtomicBool,
    /// Monotonic state version; bumped by push applies so a stale
    /// late-arriving poll result can be recognized and discarded.
    version: AtomicU64,
    tick_notify: Notify,
    interval_tx: watch::Sender<Duration>,
    polling_tx: watch::Sender<bool>,
    cancel: CancellationToken,
}

/// The reconciliation engine handle. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    /// Create an engine with the stock error classifier.
    #[must_use]
    pub fn new(source: Arc<dyn TransferSource>, config: SyncConfig) -> Self {
        Self::with_classifier(source, config, Arc::new(DefaultErrorClassifier))
    }

    /// Create an engine with a custom error classifier collaborator.
    #[must_use]
    pub fn with_classifier(
        source: Arc<dyn TransferSource>,
        config: SyncConfig,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        let (interval_tx, _) = watch::channel(config.poll_interval);
        let (polling_tx, _) = watch::channel(true);
        Self {
            inner: Arc::new(EngineInner {
                source,
                config,
                state: Mutex::new(EngineState {
                    canonical: CanonicalState::new(),
                    status: StatusEngine::new(config.status, classifier),
                    history: HistoryStore::new(config.history_length),
                    subscribers: HashMap::new(),
                    stats: DaemonStats::default(),
                    hydrated: false,
                    delta_cycles: 0,
                    repair_pending: false,
                    last_repair_at: None,
                    detail_cache: HashMap::new(),
                    last_update: None,
                    last_fingerprint: 0,
                }),
                tick_active: AtomicBool::new(false),
                version: AtomicU64::new(0),
                tick_notify: Notify::new(),
                interval_tx,
                polling_tx,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Spawn the polling loop.
    pub fn start(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            run_loop(engine).await;
        })
    }

    /// Register a subscriber.
    ///
    /// Emits the cached snapshot immediately when one exists; otherwise
    /// requests an out-of-band immediate tick. The shared polling
    /// interval is recomputed as the minimum desired interval across all
    /// subscribers.
    pub fn subscribe(&self, params: SubscribeParams) -> SubscriptionHandle {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let id = SubscriptionId::new();
        let interval = params.interval.unwrap_or(match params.mode {
            SubscribeMode::Detail => self.inner.config.detail_interval,
            SubscribeMode::List | SubscribeMode::Background => self.inner.config.poll_interval,
        });
        let mut sub = Subscriber {
            mode: params.mode,
            detail_id: params.detail_id,
            interval,
            prefer_full_fetch: params.prefer_full_fetch,
            tx,
            last_fingerprint: None,
            last_detail_digest: None,
        };

        let needs_tick = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let mut needs_tick = !state.hydrated;
            if let Some(update) = state.last_update.clone() {
                sub.last_fingerprint = Some(state.last_fingerprint);
                let _ = sub.send(&id, SyncMessage::Update(update));
                if sub.mode == SubscribeMode::Detail {
                    if let Some(detail_id) = sub.detail_id.clone() {
                        if let Some(detail) = state.detail_cache.get(&detail_id) {
                            sub.last_detail_digest =
                                state.canonical.get(&detail_id).map(entity_digest);
                            let _ = sub.send(&id, SyncMessage::Detail(Arc::clone(detail)));
                        } else {
                            needs_tick = true;
                        }
                    }
                }
            }
            let _ = state.subscribers.insert(id.clone(), sub);
            self.recompute_interval(state);
            needs_tick
        };

        if needs_tick {
            self.inner.tick_notify.notify_one();
        }
        debug!(subscription = %id, "subscriber registered");
        SubscriptionHandle::new(id, rx)
    }

    /// Remove a subscriber and recompute the shared interval.
    pub fn unsubscribe(&self, id: &SubscriptionId) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.subscribers.remove(id).is_some() {
            debug!(subscription = %id, "subscriber removed");
            self.recompute_interval(state);
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// Read-only copy of a transfer's speed history.
    #[must_use]
    pub fn get_speed_history(&self, id: &TransferId) -> Option<SpeedHistorySnapshot> {
        self.inner.state.lock().history.snapshot(id)
    }

    /// Whether the polling loop is currently enabled.
    #[must_use]
    pub fn is_polling_enabled(&self) -> bool {
        *self.inner.polling_tx.borrow()
    }

    /// Run one reconciliation tick. Overlapping calls are dropped by the
    /// re-entrancy guard.
    pub async fn tick(&self) {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return;
        }
        if inner.tick_active.swap(true, Ordering::SeqCst) {
            debug!("tick already in flight, dropping overlapping call");
            return;
        }
        let _guard = TickGuard(&inner.tick_active);
        let version_at_start = inner.version.load(Ordering::SeqCst);

        let use_full = {
            let state = inner.state.lock();
            !state.hydrated
                || state.repair_pending
                || state.delta_cycles >= inner.config.max_delta_cycles
                || state.subscribers.values().any(|s| s.prefer_full_fetch)
        };

        let fetched = if use_full {
            metrics::counter!("sync_fetches_total", "kind" => "full").increment(1);
            inner.source.fetch_all().await
        } else {
            metrics::counter!("sync_fetches_total", "kind" => "delta").increment(1);
            inner.source.fetch_recent().await
        };

        let response = match fetched {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "refresh failed, keeping last known-good snapshot");
                metrics::counter!("sync_fetch_failures_total").increment(1);
                self.broadcast_error(&SyncErrorInfo::tick(&err));
                return;
            }
        };

        // Phase one: merge under the lock, plan detail work.
        let now = Instant::now();
        let plan = {
            let mut guard = inner.state.lock();
            let state = &mut *guard;

            if inner.version.load(Ordering::SeqCst) != version_at_start {
                debug!("discarding stale poll result superseded by push update");
                metrics::counter!("sync_stale_polls_discarded_total").increment(1);
                return;
            }

            let outcome = if use_full {
                state.canonical.apply_full(response.transfers)
            } else {
                state
                    .canonical
                    .apply_delta(response.transfers, &response.removed_slots)
            };

            if outcome.contradiction {
                let off_cooldown = state
                    .last_repair_at
                    .is_none_or(|at| now.duration_since(at) >= inner.config.repair_cooldown);
                if off_cooldown && !state.repair_pending {
                    warn!("contradictory delta response, scheduling full-fetch repair");
                    metrics::counter!("sync_repairs_scheduled_total").increment(1);
                    state.repair_pending = true;
                }
            }

            if use_full {
                state.hydrated = true;
                state.delta_cycles = 0;
                if state.repair_pending {
                    state.repair_pending = false;
                    state.last_repair_at = Some(now);
                }
            } else {
                state.delta_cycles += 1;
            }

            normalize_and_account(state, use_full || !outcome.removed.is_empty(), now);
            if let Some(stats) = response.stats {
                state.stats = stats;
            }
            let _ = refresh_snapshot(state, UpdateSource::Poll);

            plan_detail_work(state)
        };

        // Phase two: detail fetches, outside the lock.
        let mut fetched_details: HashMap<TransferId, Result<Arc<TransferDetail>, SyncError>> =
            HashMap::new();
        for id in plan.vanished {
            let _ = fetched_details.insert(
                id.clone(),
                Err(SyncError::Detail {
                    id,
                    message: "transfer no longer present".into(),
                }),
            );
        }
        for id in plan.to_fetch {
            let result = inner.source.fetch_detail(&id).await.map(Arc::new);
            if let Err(err) = &result {
                debug!(id = %id, error = %err, "detail fetch failed");
            }
            let _ = fetched_details.insert(id, result);
        }

        // Phase three: deliver, gated per subscriber.
        self.deliver_poll_results(&fetched_details);
    }

    /// Apply an authoritative push payload: replace canonical state with
    /// full-fetch semantics and broadcast to every subscriber, bypassing
    /// the fingerprint gate.
    pub fn push_live_payload(&self, payload: LivePayload) {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return;
        }
        let _ = inner.version.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("sync_push_applies_total").increment(1);

        let now = Instant::now();
        let mut guard = inner.state.lock();
        let state = &mut *guard;

        let outcome = state.canonical.apply_full(payload.transfers);
        debug!(
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            "applied push payload"
        );
        state.hydrated = true;
        state.delta_cycles = 0;
        normalize_and_account(state, true, now);
        if let Some(stats) = payload.stats {
            state.stats = stats;
        }
        let update = refresh_snapshot(state, UpdateSource::Push);
        let fp = state.last_fingerprint;
        let mut closed = Vec::new();
        for (sid, sub) in &mut state.subscribers {
            sub.last_fingerprint = Some(fp);
            if sub.send(sid, SyncMessage::Update(Arc::clone(&update))) == Delivery::Closed {
                closed.push(sid.clone());
                continue;
            }
            if sub.mode == SubscribeMode::Detail {
                if let Some(detail) = sub
                    .detail_id
                    .as_ref()
                    .and_then(|did| state.detail_cache.get(did))
                {
                    let _ = sub.send(sid, SyncMessage::Detail(Arc::clone(detail)));
                }
            }
        }
        self.remove_closed(state, closed);
    }

    /// Toggle the polling loop. Re-enabling rebroadcasts the cached
    /// snapshot tagged with the poll source so consumers can observe the
    /// transport change.
    pub fn set_polling_enabled(&self, enabled: bool) {
        let inner = &self.inner;
        if *inner.polling_tx.borrow() == enabled {
            return;
        }
        let _ = inner.polling_tx.send_replace(enabled);
        info!(enabled, "polling toggled");

        if enabled {
            let mut guard = inner.state.lock();
            let state = &mut *guard;
            if !state.hydrated {
                return;
            }
            let update = refresh_snapshot(state, UpdateSource::Poll);
            let fp = state.last_fingerprint;
            let mut closed = Vec::new();
            for (sid, sub) in &mut state.subscribers {
                sub.last_fingerprint = Some(fp);
                if sub.send(sid, SyncMessage::Update(Arc::clone(&update))) == Delivery::Closed {
                    closed.push(sid.clone());
                }
            }
            self.remove_closed(state, closed);
        }
    }

    /// Bridge a push session's events into the engine.
    pub fn attach_push(&self, mut events: mpsc::Receiver<PushEvent>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = engine.inner.cancel.cancelled() => break,
                    event = events.recv() => match event {
                        None => break,
                        Some(PushEvent::Connected) => engine.set_polling_enabled(false),
                        Some(PushEvent::Disconnected { reason }) => {
                            debug!(reason = %reason, "push channel lost, resuming polls");
                            engine.set_polling_enabled(true);
                        }
                        Some(PushEvent::Live(payload)) => engine.push_live_payload(payload),
                        Some(PushEvent::Signal { name, data }) => {
                            engine.broadcast_signal(name, data);
                        }
                    },
                }
            }
        })
    }

    /// Tear the engine down: cancel the loop and bridge tasks, abort
    /// in-flight requests, and close every subscriber channel.
    pub fn destroy(&self) {
        info!("destroying sync engine");
        self.inner.cancel.cancel();
        self.inner.source.shutdown();
        let mut guard = self.inner.state.lock();
        guard.subscribers.clear();
        guard.detail_cache.clear();
    }

    // ── internals ───────────────────────────────────────────────────

    fn deliver_poll_results(
        &self,
        fetched_details: &HashMap<TransferId, Result<Arc<TransferDetail>, SyncError>>,
    ) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        for (id, result) in fetched_details {
            if let Ok(detail) = result {
                let _ = state.detail_cache.insert(id.clone(), Arc::clone(detail));
            }
        }

        let Some(update) = state.last_update.clone() else {
            return;
        };
        let fp = state.last_fingerprint;

        let mut closed = Vec::new();
        for (sid, sub) in &mut state.subscribers {
            let mut notify = sub.last_fingerprint != Some(fp);
            let mut detail_message = None;
            let mut error_message = None;

            if sub.mode == SubscribeMode::Detail {
                if let Some(did) = sub.detail_id.clone() {
                    let digest = state.canonical.get(&did).map(entity_digest);
                    match fetched_details.get(&did) {
                        Some(Ok(detail)) => {
                            sub.last_detail_digest = digest;
                            detail_message = Some(Arc::clone(detail));
                            notify = true;
                        }
                        Some(Err(err)) => {
                            sub.last_detail_digest = digest;
                            error_message = Some(SyncErrorInfo::detail(did, err));
                            notify = true;
                        }
                        None => {
                            if notify {
                                detail_message = state.detail_cache.get(&did).cloned();
                            }
                        }
                    }
                }
            }

            if notify {
                sub.last_fingerprint = Some(fp);
                if sub.send(sid, SyncMessage::Update(Arc::clone(&update))) == Delivery::Closed {
                    closed.push(sid.clone());
                    continue;
                }
                if let Some(detail) = detail_message {
                    let _ = sub.send(sid, SyncMessage::Detail(detail));
                }
            }
            if let Some(error) = error_message {
                if sub.send(sid, SyncMessage::Error(error)) == Delivery::Closed {
                    closed.push(sid.clone());
                }
            }
        }
        self.remove_closed(state, closed);
    }

    fn broadcast_error(&self, info: &SyncErrorInfo) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let mut closed = Vec::new();
        for (sid, sub) in &state.subscribers {
            if sub.send(sid, SyncMessage::Error(info.clone())) == Delivery::Closed {
                closed.push(sid.clone());
            }
        }
        self.remove_closed(state, closed);
    }

    fn broadcast_signal(&self, name: String, data: serde_json::Value) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let mut closed = Vec::new();
        for (sid, sub) in &state.subscribers {
            let message = SyncMessage::Signal {
                name: name.clone(),
                data: data.clone(),
            };
            if sub.send(sid, message) == Delivery::Closed {
                closed.push(sid.clone());
            }
        }
        self.remove_closed(state, closed);
    }

    fn remove_closed(&self, state: &mut EngineState, closed: Vec<SubscriptionId>) {
        if closed.is_empty() {
            return;
        }
        for sid in closed {
            debug!(subscription = %sid, "removing subscriber with closed channel");
            let _ = state.subscribers.remove(&sid);
        }
        self.recompute_interval(state);
    }

    fn recompute_interval(&self, state: &EngineState) {
        let interval = state
            .subscribers
            .values()
            .map(|s| s.interval)
            .min()
            .unwrap_or(self.inner.config.poll_interval);
        let _ = self.inner.interval_tx.send_if_modified(|current| {
            if *current == interval {
                false
            } else {
                *current = interval;
                true
            }
        });
    }
}

/// Re-derive statuses, append history samples, and prune departed state
/// when membership may have shrunk.
fn normalize_and_account(state: &mut EngineState, prune: bool, now: Instant) {
    for transfer in state.canonical.iter_mut() {
        transfer.status = state.status.derive(transfer, now);
        state
            .history
            .record(&transfer.id, transfer.rate_down, transfer.rate_up);
    }
    if prune {
        let live = state.canonical.live_ids();
        state.status.prune(&live);
        state.history.prune(&live);
        state.detail_cache.retain(|id, _| live.contains(id));
    }
}

/// Rebuild the cached broadcast snapshot and fingerprint.
fn refresh_snapshot(state: &mut EngineState, source: UpdateSource) -> Arc<SyncUpdate> {
    state.last_fingerprint = fingerprint(state.canonical.iter());
    let update = Arc::new(SyncUpdate {
        source,
        transfers: state.canonical.to_vec(),
        stats: state.stats,
    });
    state.last_update = Some(Arc::clone(&update));
    update
}

/// Detail work planned during the merge phase.
struct DetailPlan {
    /// Ids whose extended record must be re-fetched.
    to_fetch: Vec<TransferId>,
    /// Detail ids whose transfer vanished from the canonical set.
    vanished: Vec<TransferId>,
}

fn plan_detail_work(state: &EngineState) -> DetailPlan {
    let mut to_fetch = Vec::new();
    let mut vanished = Vec::new();
    for sub in state.subscribers.values() {
        if sub.mode != SubscribeMode::Detail {
            continue;
        }
        let Some(did) = sub.detail_id.clone() else {
            continue;
        };
        let digest = state.canonical.get(&did).map(entity_digest);
        let changed = digest != sub.last_detail_digest;
        match digest {
            Some(_) => {
                let cached = state.detail_cache.contains_key(&did);
                if (changed || !cached) && !to_fetch.contains(&did) {
                    to_fetch.push(did);
                }
            }
            None => {
                if changed && !vanished.contains(&did) {
                    vanished.push(did);
                }
            }
        }
    }
    DetailPlan { to_fetch, vanished }
}

async fn run_loop(engine: SyncEngine) {
    let inner = Arc::clone(&engine.inner);
    let mut interval_rx = inner.interval_tx.subscribe();
    let mut polling_rx = inner.polling_tx.subscribe();

    loop {
        if inner.cancel.is_cancelled() {
            break;
        }

        if !*polling_rx.borrow_and_update() {
            // Push transport is live; the loop halts until re-enabled.
            tokio::select! {
                () = inner.cancel.cancelled() => break,
                result = polling_rx.changed() => {
                    if result.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        let interval = *interval_rx.borrow_and_update();
        tokio::select! {
            () = inner.cancel.cancelled() => break,
            () = inner.tick_notify.notified() => engine.tick().await,
            () = tokio::time::sleep(interval) => engine.tick().await,
            result = interval_rx.changed() => {
                if result.is_err() {
                    break;
                }
            }
            result = polling_rx.changed() => {
                if result.is_err() {
                    break;
                }
            }
        }
    }
    debug!("polling loop stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::source::FetchResponse;

    struct EmptySource;

    #[async_trait]
    impl TransferSource for EmptySource {
        async fn fetch_all(&self) -> crate::errors::Result<FetchResponse> {
            Ok(FetchResponse::default())
        }
        async fn fetch_recent(&self) -> crate::errors::Result<FetchResponse> {
            Ok(FetchResponse::default())
        }
        async fn fetch_detail(
            &self,
            id: &TransferId,
        ) -> crate::errors::Result<TransferDetail> {
            Err(SyncError::Detail {
                id: id.clone(),
                message: "empty source".into(),
            })
        }
    }

    fn config() -> SyncConfig {
        SyncConfig::from_settings(&SyncSettings::default())
    }

    fn engine() -> SyncEngine {
        SyncEngine::new(Arc::new(EmptySource), config())
    }

    #[test]
    fn config_from_settings() {
        let c = config();
        assert_eq!(c.poll_interval, Duration::from_secs(5));
        assert_eq!(c.detail_interval, Duration::from_secs(2));
        assert_eq!(c.max_delta_cycles, 10);
        assert_eq!(c.history_length, 60);
        assert_eq!(c.repair_cooldown, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe_track_count() {
        let engine = engine();
        assert_eq!(engine.subscriber_count(), 0);

        let handle = engine.subscribe(SubscribeParams::list());
        assert_eq!(engine.subscriber_count(), 1);

        engine.unsubscribe(handle.id());
        assert_eq!(engine.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn shared_interval_is_minimum_across_subscribers() {
        let engine = engine();
        let a = engine.subscribe(
            SubscribeParams::list().with_interval(Duration::from_secs(10)),
        );
        assert_eq!(*engine.inner.interval_tx.borrow(), Duration::from_secs(10));

        let b = engine.subscribe(
            SubscribeParams::list().with_interval(Duration::from_secs(2)),
        );
        assert_eq!(*engine.inner.interval_tx.borrow(), Duration::from_secs(2));

        engine.unsubscribe(b.id());
        assert_eq!(*engine.inner.interval_tx.borrow(), Duration::from_secs(10));

        engine.unsubscribe(a.id());
        // Back to the configured default with no subscribers.
        assert_eq!(*engine.inner.interval_tx.borrow(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn detail_mode_defaults_to_detail_interval() {
        let engine = engine();
        let _h = engine.subscribe(SubscribeParams::detail(TransferId::from("a")));
        assert_eq!(*engine.inner.interval_tx.borrow(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn destroy_closes_subscriber_channels() {
        let engine = engine();
        let mut handle = engine.subscribe(SubscribeParams::list());
        engine.destroy();
        assert!(handle.recv().await.is_none());
        assert_eq!(engine.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let engine = engine();
        engine.destroy();
        engine.destroy();
        // Ticks after destruction are no-ops.
        engine.tick().await;
    }

    #[tokio::test]
    async fn polling_toggle_is_observable() {
        let engine = engine();
        assert!(engine.is_polling_enabled());
        engine.set_polling_enabled(false);
        assert!(!engine.is_polling_enabled());
        engine.set_polling_enabled(true);
        assert!(engine.is_polling_enabled());
    }
}

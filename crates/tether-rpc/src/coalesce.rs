//! Read-request coalescing and short-TTL result caching.
//!
//! Concurrent identical reads (same method + canonically-serialized
//! arguments) share a single in-flight future; completed successes are
//! kept for a short TTL to absorb near-simultaneous duplicate reads. Any
//! successful mutating request clears the cache.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::future::Shared;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::{Result, RpcError};

type FlightFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type SharedFlight = Shared<FlightFuture>;

struct CacheEntry {
    value: Value,
    inserted: Instant,
}

/// Coalescing read cache. One per client instance — never process-wide, so
/// independent engines (and tests) do not interfere.
pub struct ReadCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    flights: Mutex<HashMap<String, SharedFlight>>,
}

impl ReadCache {
    /// Create a cache with the given success TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Return a cached or coalesced result for `key`, running `fetch` only
    /// when neither exists.
    ///
    /// Errors are shared with every caller joined to the same flight but
    /// are never cached.
    pub async fn get_or_fetch<F>(&self, key: String, fetch: F) -> Result<Value>
    where
        F: FnOnce() -> FlightFuture,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let flight = {
            let mut flights = self.flights.lock();
            if let Some(existing) = flights.get(&key) {
                existing.clone()
            } else {
                let shared = fetch().shared();
                let _ = flights.insert(key.clone(), shared.clone());
                shared
            }
        };

        let result = flight.await;

        // Cleanup is performed by whichever joined caller finishes first;
        // the pointer check keeps a newer flight under the same key alive.
        {
            let mut flights = self.flights.lock();
            if flights.get(&key).is_some_and(|f| f.ptr_eq(&flight)) {
                let _ = flights.remove(&key);
            }
        }
        if let Ok(value) = &result {
            let _ = self.entries.lock().insert(
                key,
                CacheEntry {
                    value: value.clone(),
                    inserted: Instant::now(),
                },
            );
        }

        result
    }

    /// Drop every cached result. Called after any successful mutation.
    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    /// Number of live cache entries (stale entries included until lookup).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                let _ = entries.remove(key);
                None
            }
            None => None,
        }
    }
}

// Boxing helper so callers don't repeat the pin-box incantation.
impl ReadCache {
    /// Like [`ReadCache::get_or_fetch`] accepting any future.
    pub async fn get_or_fetch_with<Fut>(
        &self,
        key: String,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<Value>
    where
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.get_or_fetch(key, move || Box::pin(fetch()) as FlightFuture)
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn cache() -> Arc<ReadCache> {
        Arc::new(ReadCache::new(Duration::from_millis(200)))
    }

    #[tokio::test]
    async fn fetch_runs_once_within_ttl() {
        let cache = cache();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_fetch_with("k".into(), move || async move {
                    let _ = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"n": 1}))
                })
                .await
                .unwrap();
            assert_eq!(value["n"], 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_flight() {
        let cache = cache();
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch_with("k".into(), move || async move {
                        let _ = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(json!(42))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), json!(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_refetch() {
        let cache = Arc::new(ReadCache::new(Duration::from_millis(20)));
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let _ = cache
                .get_or_fetch_with("k".into(), move || async move {
                    let _ = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(1))
                })
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(40)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_all_clears_cache() {
        let cache = cache();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let _ = cache
                .get_or_fetch_with("k".into(), move || async move {
                    let _ = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(1))
                })
                .await
                .unwrap();
            cache.invalidate_all();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn errors_are_shared_but_not_cached() {
        let cache = cache();
        let calls = Arc::new(AtomicU32::new(0));

        let first = {
            let calls = calls.clone();
            cache
                .get_or_fetch_with("k".into(), move || async move {
                    let _ = calls.fetch_add(1, Ordering::SeqCst);
                    Err(RpcError::Timeout)
                })
                .await
        };
        assert_eq!(first.unwrap_err(), RpcError::Timeout);

        // A later call retries because failures are not cached.
        let second = {
            let calls = calls.clone();
            cache
                .get_or_fetch_with("k".into(), move || async move {
                    let _ = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(2))
                })
                .await
        };
        assert_eq!(second.unwrap(), json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let cache = cache();
        let calls = Arc::new(AtomicU32::new(0));

        for key in ["a", "b"] {
            let calls = calls.clone();
            let _ = cache
                .get_or_fetch_with(key.into(), move || async move {
                    let _ = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(key))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }
}

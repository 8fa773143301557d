//! TTL memoization of fetch results.
//!
//! One slot per key. A slot is guarded by an async mutex held across the
//! upstream call, so concurrent callers for the same key wait for the
//! in-flight request instead of issuing their own.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::FetchFailure;
use crate::logging::log_cache;

/// Time source for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.base + offset
    }
}

#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: Result<V, FetchFailure>,
    fetched_at: Instant,
    ttl: Duration,
}

impl<V> CachedEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

type Slot<V> = Arc<tokio::sync::Mutex<Option<CachedEntry<V>>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct TtlCache<K, V> {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<K, Slot<V>>>,
    /// Failures are remembered for at most this long.
    failure_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    pub fn new(clock: Arc<dyn Clock>, failure_ttl: Duration) -> Self {
        Self {
            clock,
            slots: Mutex::new(HashMap::new()),
            failure_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached result for `key` if still fresh, otherwise run
    /// `fetch` and remember its result (success or failure).
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: K,
        ttl: Duration,
        fetch: F,
    ) -> Result<V, FetchFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchFailure>>,
    {
        let slot = self.slot(&key);
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.as_ref() {
            if entry.is_fresh(self.clock.now()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log_cache("hit", &key.to_string());
                return entry.value.clone();
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log_cache("miss", &key.to_string());

        let value = fetch().await;
        let ttl = if value.is_ok() {
            ttl
        } else {
            ttl.min(self.failure_ttl)
        };
        *guard = Some(CachedEntry {
            value: value.clone(),
            fetched_at: self.clock.now(),
            ttl,
        });
        value
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn cache(clock: Arc<ManualClock>) -> TtlCache<String, u32> {
        TtlCache::new(clock, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(clock.clone());
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let ttl = Duration::from_secs(180);

        for _ in 0..3 {
            let v = cache
                .get_or_fetch("global".to_string(), ttl, move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(v, Ok(7));
            clock.advance(Duration::from_secs(60));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });
    }

    #[tokio::test]
    async fn test_refetch_after_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(clock.clone());
        let ttl = Duration::from_secs(180);

        let first = cache.get_or_fetch("k".to_string(), ttl, || async { Ok(1) }).await;
        clock.advance(Duration::from_secs(180));
        let second = cache.get_or_fetch("k".to_string(), ttl, || async { Ok(2) }).await;
        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_cached_for_failure_ttl_only() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(clock.clone());
        let ttl = Duration::from_secs(180);
        let boom = FetchFailure::Timeout { endpoint: "global".into() };

        let failure = boom.clone();
        let err = cache
            .get_or_fetch("k".to_string(), ttl, move || async move { Err(failure) })
            .await;
        assert_eq!(err, Err(boom.clone()));

        clock.advance(Duration::from_secs(10));
        let still = cache.get_or_fetch("k".to_string(), ttl, || async { Ok(5) }).await;
        assert_eq!(still, Err(boom));

        clock.advance(Duration::from_secs(25));
        let recovered = cache.get_or_fetch("k".to_string(), ttl, || async { Ok(5) }).await;
        assert_eq!(recovered, Ok(5));
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(clock);
        let ttl = Duration::from_secs(60);
        let a = cache.get_or_fetch("a".to_string(), ttl, || async { Ok(1) }).await;
        let b = cache.get_or_fetch("b".to_string(), ttl, || async { Ok(2) }).await;
        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(clock);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let ttl = Duration::from_secs(60);

        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(9)
        };
        let (a, b) = tokio::join!(
            cache.get_or_fetch("k".to_string(), ttl, fetch),
            cache.get_or_fetch("k".to_string(), ttl, fetch),
        );
        assert_eq!((a, b), (Ok(9), Ok(9)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! TTL read-through cache with single-flight fetches.
//!
//! # Tickets
//!
//! Every fetch is registered under its key with a ticket number. When the
//! fetch resolves it stores its result, but only if the key still carries
//! that ticket. `invalidate` and `clear` drop the ticket, so a fetch that
//! started before the invalidation still answers its own callers but never
//! writes its (possibly stale) result back.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, FetchError};
use crate::freshness::CacheRead;
use crate::stats::CacheStats;

type Erased = Arc<dyn Any + Send + Sync>;
type FlightOutput = Result<(Erased, DateTime<Utc>), FetchError>;
type Flight = Shared<BoxFuture<'static, FlightOutput>>;

struct Entry {
    value: Erased,
    cached_at: DateTime<Utc>,
    stored_at: Instant,
    ticket: u64,
}

struct InFlight {
    ticket: u64,
    future: Flight,
}

struct CacheState<K> {
    entries: HashMap<K, Entry>,
    in_flight: HashMap<K, InFlight>,
    next_ticket: u64,
    stats: CacheStats,
}

impl<K> Default for CacheState<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            next_ticket: 0,
            stats: CacheStats::default(),
        }
    }
}

impl<K> CacheState<K>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    fn live_entry(&mut self, key: &K, ttl: Duration) -> Option<(Erased, DateTime<Utc>)> {
        match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.stored_at.elapsed() < ttl => {
                return Some((Arc::clone(&entry.value), entry.cached_at));
            }
            Some(_) => {}
        }
        self.entries.remove(key);
        self.stats.entry_count = self.entries.len() as u64;
        debug!(key = %key, "Cache entry expired");
        None
    }

    /// Record a resolved fetch. Runs once per fetch, from inside the shared
    /// future, before any caller sees the outcome.
    fn settle(&mut self, config: &CacheConfig, key: &K, ticket: u64, outcome: &FlightOutput) {
        let registered = self
            .in_flight
            .get(key)
            .is_some_and(|flight| flight.ticket == ticket);
        if registered {
            self.in_flight.remove(key);
        }

        match outcome {
            Ok(_) if !registered => {
                self.stats.discarded += 1;
                debug!(
                    key = %key,
                    ticket = ticket,
                    "Fetch superseded or invalidated, result not stored"
                );
            }
            Ok((value, cached_at)) => {
                self.entries.insert(
                    key.clone(),
                    Entry {
                        value: Arc::clone(value),
                        cached_at: *cached_at,
                        stored_at: Instant::now(),
                        ticket,
                    },
                );
                self.evict_oldest(config.max_entries, key);
                self.stats.entry_count = self.entries.len() as u64;
                debug!(key = %key, ticket = ticket, "Cache entry stored");
            }
            Err(err) => {
                self.stats.fetch_failures += 1;
                warn!(key = %key, error = %err, "Fetch failed, nothing cached");
            }
        }
    }

    /// Drop the least recently stored entries, never the one just stored.
    fn evict_oldest(&mut self, max_entries: Option<usize>, stored: &K) {
        let Some(max_entries) = max_entries else {
            return;
        };
        while self.entries.len() > max_entries {
            let oldest = self
                .entries
                .iter()
                .filter(|(key, _)| *key != stored)
                .min_by_key(|(_, entry)| (entry.stored_at, entry.ticket))
                .map(|(key, _)| key.clone());
            let Some(oldest) = oldest else {
                break;
            };
            self.entries.remove(&oldest);
            self.stats.evictions += 1;
            debug!(key = %oldest, "Evicted oldest cache entry");
        }
    }
}

/// What to drop from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation<K> {
    Keys(Vec<K>),
    All,
}

/// Shared TTL cache. Clones refer to the same entries.
pub struct ResponseCache<K> {
    config: Arc<CacheConfig>,
    state: Arc<Mutex<CacheState<K>>>,
}

impl<K> Clone for ResponseCache<K> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
        }
    }
}

impl<K> fmt::Debug for ResponseCache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .field("stats", &lock(&self.state).stats)
            .finish()
    }
}

impl<K> ResponseCache<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read `key`, calling `fetch` when there is no live entry or when
    /// `force_refresh` is set.
    ///
    /// A miss joins a fetch already in flight for the same key instead of
    /// starting another. `force_refresh` always starts a new fetch and the
    /// newest fetch is the one that gets stored. A failing fetch stores
    /// nothing and its error is returned to every caller sharing it.
    pub async fn read<T, F, Fut, E>(
        &self,
        key: K,
        fetch: F,
        force_refresh: bool,
    ) -> Result<CacheRead<T>, CacheError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let flight = {
            let mut state = lock(&self.state);
            if !force_refresh {
                if let Some((value, cached_at)) = state.live_entry(&key, self.config.ttl()) {
                    state.stats.hits += 1;
                    debug!(key = %key, "Cache hit");
                    return downcast(&key, &value).map(|v| CacheRead::from_cache(v, cached_at));
                }
            }

            state.stats.misses += 1;
            match state.in_flight.get(&key).filter(|_| !force_refresh) {
                Some(flight) => {
                    debug!(key = %key, ticket = flight.ticket, "Joining in-flight fetch");
                    flight.future.clone()
                }
                None => {
                    state.next_ticket += 1;
                    let ticket = state.next_ticket;
                    state.stats.fetches += 1;
                    debug!(
                        key = %key,
                        ticket = ticket,
                        force_refresh = force_refresh,
                        "Cache miss, fetching"
                    );

                    let settle_state = Arc::downgrade(&self.state);
                    let config = Arc::clone(&self.config);
                    let settle_key = key.clone();
                    let future = async move {
                        let outcome = match fetch().await {
                            Ok(value) => Ok((Arc::new(value) as Erased, Utc::now())),
                            Err(err) => Err(Arc::new(err) as FetchError),
                        };
                        if let Some(state) = settle_state.upgrade() {
                            lock(&state).settle(&config, &settle_key, ticket, &outcome);
                        }
                        outcome
                    }
                    .boxed()
                    .shared();
                    state.in_flight.insert(
                        key.clone(),
                        InFlight {
                            ticket,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        match flight.await {
            Ok((value, cached_at)) => {
                downcast(&key, &value).map(|v| CacheRead::from_fetch(v, cached_at))
            }
            Err(source) => Err(CacheError::Fetch {
                key: key.to_string(),
                source,
            }),
        }
    }

    /// The live entry for `key`, without fetching.
    pub fn peek<T>(&self, key: &K) -> Result<Option<CacheRead<T>>, CacheError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut state = lock(&self.state);
        match state.live_entry(key, self.config.ttl()) {
            Some((value, cached_at)) => {
                downcast(key, &value).map(|v| Some(CacheRead::from_cache(v, cached_at)))
            }
            None => Ok(None),
        }
    }

    /// Whether `key` currently has a live entry.
    pub fn contains(&self, key: &K) -> bool {
        let mut state = lock(&self.state);
        state.live_entry(key, self.config.ttl()).is_some()
    }

    /// Drop the entry for `key` and detach any fetch in flight for it.
    /// Returns whether an entry was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut state = lock(&self.state);
        let detached = state.in_flight.remove(key).is_some();
        let removed = state.entries.remove(key).is_some();
        state.stats.entry_count = state.entries.len() as u64;
        debug!(
            key = %key,
            removed = removed,
            detached_fetch = detached,
            "Cache key invalidated"
        );
        removed
    }

    /// Drop several keys at once. Returns how many entries were removed.
    pub fn invalidate_many<'a, I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a K>,
    {
        keys.into_iter().filter(|key| self.invalidate(key)).count()
    }

    /// Drop every entry and detach every fetch in flight.
    pub fn clear(&self) -> usize {
        let mut state = lock(&self.state);
        let removed = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        state.stats.entry_count = 0;
        debug!(removed = removed, "Cache cleared");
        removed
    }

    pub fn apply(&self, invalidation: &Invalidation<K>) -> usize {
        match invalidation {
            Invalidation::Keys(keys) => self.invalidate_many(keys),
            Invalidation::All => self.clear(),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        lock(&self.state).stats.clone()
    }
}

fn downcast<K, T>(key: &K, value: &Erased) -> Result<T, CacheError>
where
    K: fmt::Display,
    T: Clone + 'static,
{
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| CacheError::TypeMismatch {
            key: key.to_string(),
        })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("backend down")]
    struct BackendDown;

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> futures_util::future::Ready<Result<u32, BackendDown>> + Send + 'static
    {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(value))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_then_hit() {
        let cache: ResponseCache<&'static str> = ResponseCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.read("k", counting(&calls, 1), false).await.expect("read");
        let second = cache.read("k", counting(&calls, 2), false).await.expect("read");

        assert!(first.was_cache_miss());
        assert!(second.was_cache_hit());
        assert_eq!(second.into_value(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.fetches), (1, 1, 1));
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_mismatch_is_reported() {
        let cache: ResponseCache<&'static str> = ResponseCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        cache.read("k", counting(&calls, 1), false).await.expect("read");

        let err = cache
            .read("k", || futures_util::future::ready(Ok::<_, BackendDown>("text")), false)
            .await
            .expect_err("mismatch");
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_drops_oldest() {
        let cache: ResponseCache<&'static str> =
            ResponseCache::new(CacheConfig::default().with_max_entries(2));
        let calls = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b", "c"] {
            cache.read(key, counting(&calls, 0), false).await.expect("read");
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&"a"));
        assert!(cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_does_not_fetch() {
        let cache: ResponseCache<&'static str> = ResponseCache::new(CacheConfig::default());
        assert!(cache.peek::<u32>(&"k").expect("peek").is_none());

        let calls = Arc::new(AtomicUsize::new(0));
        cache.read("k", counting(&calls, 9), false).await.expect("read");
        let peeked = cache.peek::<u32>(&"k").expect("peek").expect("entry");
        assert_eq!(peeked.value(), &9);
        assert!(peeked.was_cache_hit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_invalidation() {
        let cache: ResponseCache<&'static str> = ResponseCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        for key in ["a", "b", "c"] {
            cache.read(key, counting(&calls, 0), false).await.expect("read");
        }

        assert_eq!(cache.apply(&Invalidation::Keys(vec!["a", "missing"])), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.apply(&Invalidation::All), 2);
        assert!(cache.is_empty());
    }
}

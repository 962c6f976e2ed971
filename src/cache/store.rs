//! In-memory cache storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

use super::entry::{jittered_ttl, CacheEntry};
use super::key::CacheKey;

/// Bounded TTL cache with least-recently-used eviction.
///
/// All bookkeeping happens under one internal mutex, so concurrent
/// per-version check completions can read and write safely. The lock is
/// never held across an `.await`.
pub struct CacheStore<V> {
    inner: Mutex<StoreInner<V>>,
    capacity: usize,
    jitter: f64,
    clock: Arc<dyn Clock>,
}

struct StoreInner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    tick: u64,
}

impl<V> StoreInner<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) -> Option<CacheKey> {
        let victim = self
            .entries
            .values()
            .min_by_key(|e| e.last_access)
            .map(|e| e.key.clone())?;
        self.entries.remove(&victim);
        Some(victim)
    }
}

impl<V: Clone> CacheStore<V> {
    /// Create a store using the system clock.
    pub fn new(capacity: usize, jitter: f64) -> Self {
        Self::with_clock(capacity, jitter, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(capacity: usize, jitter: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
            jitter: jitter.clamp(0.0, 0.5),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jitter fraction applied to every TTL.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Look up a live entry, refreshing its LRU position.
    ///
    /// Expired entries are removed and reported as absent.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let expired = inner.entries.get(key)?.is_expired(now);
        if expired {
            inner.entries.remove(key);
            tracing::debug!("Cache entry '{}' expired", key);
            return None;
        }

        let tick = inner.next_tick();
        let entry = inner.entries.get_mut(key)?;
        entry.last_access = tick;
        Some(entry.value.clone())
    }

    /// Check for a live entry without touching its LRU position.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        self.lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Store a value for `ttl` (jittered).
    ///
    /// Inserting a new key into a full store evicts the least-recently-used
    /// entry first. Replacing an existing key never evicts.
    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        let now = self.clock.now();
        let ttl = jittered_ttl(ttl, self.jitter);
        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            inner.entries.retain(|_, e| !e.is_expired(now));
            while inner.entries.len() >= self.capacity {
                match inner.evict_lru() {
                    Some(victim) => tracing::debug!("Evicted cache entry '{}'", victim),
                    None => break,
                }
            }
        }

        let tick = inner.next_tick();
        let mut entry = CacheEntry::new(key.clone(), value, now, ttl);
        entry.last_access = tick;
        inner.entries.insert(key, entry);
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Remove every entry belonging to a prerequisite: the bare result,
    /// per-version results, and plugin results.
    pub fn invalidate_prerequisite(&self, id: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|key, _| key.prerequisite_id() != Some(id));
        before - inner.entries.len()
    }

    /// Remove everything.
    pub fn invalidate_all(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        count
    }

    /// Drop all expired entries.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired(now));
        before - inner.entries.len()
    }

    /// Number of stored entries, including any not yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store(capacity: usize) -> (CacheStore<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (
            CacheStore::with_clock(capacity, 0.1, clock.clone()),
            clock,
        )
    }

    fn key(id: &str) -> CacheKey {
        CacheKey::prerequisite(id).unwrap()
    }

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn set_then_get_returns_value() {
        let (store, _) = store(8);
        store.set(key("git"), "2.43.0".into(), TTL);
        assert_eq!(store.get(&key("git")), Some("2.43.0".to_string()));
    }

    #[test]
    fn missing_key_is_none() {
        let (store, _) = store(8);
        assert_eq!(store.get(&key("git")), None);
    }

    #[test]
    fn expires_after_jittered_ttl() {
        let (store, clock) = store(8);
        store.set(key("git"), "v".into(), TTL);

        clock.advance(TTL.mul_f64(0.89));
        assert!(store.get(&key("git")).is_some());

        clock.advance(TTL.mul_f64(0.22));
        assert!(store.get(&key("git")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn version_keys_do_not_collide() {
        let (store, _) = store(8);
        let a = CacheKey::version("id", "18").unwrap();
        let b = CacheKey::version("id", "20").unwrap();
        store.set(a.clone(), "a".into(), TTL);
        store.set(b.clone(), "b".into(), TTL);

        assert_eq!(store.get(&a), Some("a".to_string()));
        assert_eq!(store.get(&b), Some("b".to_string()));
        assert_eq!(store.get(&key("id")), None);
    }

    #[test]
    fn separator_adjacent_ids_do_not_collide() {
        let (store, _) = store(8);
        let a = CacheKey::version("id:x", "18").unwrap();
        let b = CacheKey::version("id", "x:18").unwrap();
        store.set(a.clone(), "a".into(), TTL);
        store.set(b.clone(), "b".into(), TTL);

        assert_eq!(store.get(&a), Some("a".to_string()));
        assert_eq!(store.get(&b), Some("b".to_string()));
    }

    #[test]
    fn evicts_least_recently_used() {
        let (store, _) = store(3);
        store.set(key("a"), "a".into(), TTL);
        store.set(key("b"), "b".into(), TTL);
        store.set(key("c"), "c".into(), TTL);

        // Touch "a" so "b" becomes the LRU entry.
        assert!(store.get(&key("a")).is_some());

        store.set(key("d"), "d".into(), TTL);

        assert_eq!(store.len(), 3);
        assert!(store.contains(&key("a")));
        assert!(!store.contains(&key("b")));
        assert!(store.contains(&key("c")));
        assert!(store.contains(&key("d")));
    }

    #[test]
    fn replacing_existing_key_does_not_evict() {
        let (store, _) = store(2);
        store.set(key("a"), "a".into(), TTL);
        store.set(key("b"), "b".into(), TTL);
        store.set(key("a"), "a2".into(), TTL);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&key("a")), Some("a2".to_string()));
        assert!(store.contains(&key("b")));
    }

    #[test]
    fn expired_entries_are_reclaimed_before_eviction() {
        let (store, clock) = store(2);
        store.set(key("old"), "old".into(), Duration::from_secs(1));
        store.set(key("live"), "live".into(), TTL);
        clock.advance(Duration::from_secs(5));

        store.set(key("new"), "new".into(), TTL);

        assert!(store.contains(&key("live")));
        assert!(store.contains(&key("new")));
    }

    #[test]
    fn contains_does_not_refresh_lru() {
        let (store, _) = store(2);
        store.set(key("a"), "a".into(), TTL);
        store.set(key("b"), "b".into(), TTL);
        assert!(store.contains(&key("a")));

        store.set(key("c"), "c".into(), TTL);
        assert!(!store.contains(&key("a")));
    }

    #[test]
    fn invalidate_prerequisite_removes_all_variants() {
        let (store, _) = store(16);
        store.set(key("aio"), "bare".into(), TTL);
        store.set(CacheKey::version("aio", "18").unwrap(), "18".into(), TTL);
        store.set(CacheKey::version("aio", "20").unwrap(), "20".into(), TTL);
        store.set(CacheKey::plugin("aio", "mesh").unwrap(), "p".into(), TTL);
        store.set(key("aio-extra"), "other".into(), TTL);

        assert_eq!(store.invalidate_prerequisite("aio"), 4);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&key("aio-extra")));
    }

    #[test]
    fn invalidate_single_key() {
        let (store, _) = store(4);
        store.set(key("a"), "a".into(), TTL);
        assert!(store.invalidate(&key("a")));
        assert!(!store.invalidate(&key("a")));
    }

    #[test]
    fn invalidate_all_clears() {
        let (store, _) = store(4);
        store.set(key("a"), "a".into(), TTL);
        store.set(key("b"), "b".into(), TTL);
        assert_eq!(store.invalidate_all(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn purge_expired_counts_removed() {
        let (store, clock) = store(4);
        store.set(key("short"), "s".into(), Duration::from_secs(1));
        store.set(key("long"), "l".into(), TTL);
        clock.advance(Duration::from_secs(2));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (store, _) = store(0);
        assert_eq!(store.capacity(), 1);
        store.set(key("a"), "a".into(), TTL);
        store.set(key("b"), "b".into(), TTL);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&key("b")));
    }

    #[test]
    fn concurrent_writers_respect_capacity() {
        let (store, _) = store(16);
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let k = CacheKey::version("node", &format!("{}.{}", t, i)).unwrap();
                        store.set(k.clone(), format!("{}", i), TTL);
                        let _ = store.get(&k);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 16);
    }
}

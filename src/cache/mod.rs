//! Check-result caching.
//!
//! Prerequisite checks shell out to slow tools (`npm`, `fnm exec`, plugin
//! listings), so their results are kept in a process-lifetime, in-memory
//! store with:
//!
//! - TTL-based expiry with random jitter, so entries written together do
//!   not all expire together
//! - a fixed capacity with least-recently-used eviction
//! - typed, validated keys that cannot collide across prerequisites,
//!   versions, and plugins
//!
//! Nothing is persisted; every process starts with an empty cache.

pub mod entry;
pub mod key;
pub mod store;

pub use entry::{jittered_ttl, CacheEntry};
pub use key::{validate_component, CacheKey, SEPARATOR};
pub use store::CacheStore;

/// Default time-to-live for check results.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Default maximum number of cached results.
pub const DEFAULT_CAPACITY: usize = 128;

/// Default jitter fraction applied to TTLs.
pub const DEFAULT_JITTER: f64 = 0.10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_jitter_within_band() {
        assert!((0.05..=0.15).contains(&DEFAULT_JITTER));
    }

    #[test]
    fn default_store_is_usable() {
        let store: CacheStore<u32> = CacheStore::new(DEFAULT_CAPACITY, DEFAULT_JITTER);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), DEFAULT_CAPACITY);
    }
}

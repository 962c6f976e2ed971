//! Cache entry type and TTL jitter.

use rand::Rng;
use std::time::{Duration, Instant};

use super::key::CacheKey;

/// A cached value with its expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Key this entry is stored under.
    pub key: CacheKey,
    /// Cached payload.
    pub value: V,
    /// When this entry was stored.
    pub created_at: Instant,
    /// First instant at which this entry is no longer visible.
    pub expires_at: Instant,
    /// Logical access time for LRU ordering.
    pub(crate) last_access: u64,
}

impl<V> CacheEntry<V> {
    /// Create a new entry that expires after `ttl`.
    pub fn new(key: CacheKey, value: V, now: Instant, ttl: Duration) -> Self {
        Self {
            key,
            value,
            created_at: now,
            expires_at: now + ttl,
            last_access: 0,
        }
    }

    /// Whether the entry has expired at `now`.
    ///
    /// Entries are visible only while `now` is strictly before expiry.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Age of the entry at `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Time left before expiry at `now`.
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Scale `ttl` by a random factor in `[1 - fraction, 1 + fraction]`.
pub fn jittered_ttl(ttl: Duration, fraction: f64) -> Duration {
    if fraction <= 0.0 || ttl.is_zero() {
        return ttl;
    }
    let factor = 1.0 + rand::rng().random_range(-fraction..=fraction);
    ttl.mul_f64(factor)
}

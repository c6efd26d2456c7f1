//! Bounded TTL cache for request results
//!
//! Entries are keyed by a canonical request signature. Reads use `peek` so the
//! LRU order of the underlying `LruCache` is exactly insertion order, and the
//! entry evicted at capacity is always the oldest-inserted one.
//!
//! Expiry is lazy: an expired entry is removed when a reader finds it.

use std::num::NonZeroUsize;
use std::time::Duration;

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::utils::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};

/// A cached value with its insertion time and time-to-live
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Visible iff `now - created_at <= min(ttl, max_age)`
    #[must_use]
    pub fn is_fresh(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.created_at) <= self.ttl.min(max_age)
    }
}

/// Capacity-bounded response cache shared by all executors
pub struct ResponseCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    #[must_use]
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
        }
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Get a value if present and not older than `ttl` (nor its own TTL)
    pub fn get(&self, key: &str, ttl: Duration) -> Option<V> {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        let fresh = entries.peek(key)?.is_fresh(now, ttl);
        if fresh {
            return entries.peek(key).map(|entry| entry.value.clone());
        }

        entries.pop(key);
        debug!("Response cache entry expired: {key}");
        None
    }

    /// Insert or overwrite with the default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or overwrite with an explicit TTL
    ///
    /// Overwriting counts as a fresh insertion. When the cache is full the
    /// oldest-inserted entry is evicted first.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut entries = self.entries.lock();
        entries.pop(&key);

        let entry = CacheEntry {
            key: key.clone(),
            value,
            created_at: Instant::now(),
            ttl,
        };
        if let Some((evicted, _)) = entries.push(key, entry) {
            debug!("Evicted oldest response cache entry {evicted}");
        }
    }

    /// Remove one entry; returns whether it existed
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Drop every entry past its own TTL; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now, entry.ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(
            DEFAULT_CACHE_CAPACITY,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn test_get_respects_ttl() {
        let cache = ResponseCache::new(10, Duration::from_secs(30));
        cache.set("a", 1);

        assert_eq!(cache.get("a", HOUR), Some(1));
        // The caller's TTL can be stricter than the entry's
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("a", Duration::from_secs(5)), None);
        assert!(cache.is_empty(), "expired entry is removed on read");
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_ttl_expires() {
        let cache = ResponseCache::new(10, Duration::from_secs(30));
        cache.set("a", 1);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get("a", HOUR), Some(1), "age == ttl is still visible");
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("a", HOUR), None);
    }

    #[test]
    fn test_capacity_evicts_oldest_inserted() {
        let cache = ResponseCache::new(2, HOUR);
        cache.set("a", 1);
        cache.set("b", 2);
        // Reads do not refresh insertion order
        assert_eq!(cache.get("a", HOUR), Some(1));
        cache.set("c", 3);

        assert_eq!(cache.get("a", HOUR), None);
        assert_eq!(cache.get("b", HOUR), Some(2));
        assert_eq!(cache.get("c", HOUR), Some(3));
    }

    #[test]
    fn test_overwrite_counts_as_new_insertion() {
        let cache = ResponseCache::new(2, HOUR);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        cache.set("c", 3);

        assert_eq!(cache.get("a", HOUR), Some(10));
        assert_eq!(cache.get("b", HOUR), None);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_and_purge() {
        let cache = ResponseCache::new(10, HOUR);
        cache.set("keep", 1);
        cache.set_with_ttl("short", 2, Duration::from_secs(1));
        assert!(cache.invalidate("keep"));
        assert!(!cache.invalidate("keep"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }
}

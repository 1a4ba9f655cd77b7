//! Bounded, recency-ordered local cache with per-entry TTL (component C2).
//! Ported from `mcp_db.cache.l1_cache.TTLCache`. Backed by the `lru` crate
//! rather than moka: the ordering invariants in §8 ("LRU under
//! max_size+1 insertions") require deterministic, synchronous eviction the
//! instant capacity is exceeded, which moka's async/weight-driven eviction
//! does not guarantee.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// An optional, per-node acceleration layer. Never authoritative: callers
/// requiring freshness must bypass it, and writers must repopulate after a
/// write lands in the store of record.
pub struct LocalCache<V> {
    inner: Mutex<LruCache<String, Entry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> LocalCache<V> {
    #[must_use]
    pub fn new(max_size: u64, default_ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_size.max(1) as usize).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(cap)), default_ttl }
    }

    /// Returns the cached value, or `None` on a miss. An expired entry is
    /// evicted and counted as a miss. A hit promotes recency.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.lock().await;
        let Some(entry) = guard.peek(key) else {
            return None;
        };
        if entry.expires_at <= Instant::now() {
            guard.pop(key);
            return None;
        }
        guard.get(key).map(|entry| entry.value.clone())
    }

    /// Upsert `key` with `value`, using the cache's default TTL.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    /// Upsert `key` with an explicit TTL. If this insert exceeds capacity,
    /// evicts the least-recently-used entry.
    pub async fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut guard = self.inner.lock().await;
        guard.put(key.into(), Entry { value, expires_at: Instant::now() + ttl });
    }

    pub async fn delete(&self, key: &str) {
        self.inner.lock().await.pop(key);
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    #[must_use]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

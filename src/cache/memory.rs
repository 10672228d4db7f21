//! In-process LRU tier.
//!
//! Holds encoded tiles keyed by [`TileCacheKey`], bounded by entry count.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;

use super::key::TileCacheKey;

/// Default number of tiles kept in memory.
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

/// LRU cache of encoded tiles.
///
/// # Thread Safety
///
/// The tier is thread-safe and can be shared across async tasks via `Arc`.
pub struct MemoryTier {
    cache: Mutex<LruCache<TileCacheKey, Bytes>>,
    capacity: NonZeroUsize,
}

impl MemoryTier {
    /// Create a tier holding [`DEFAULT_MEMORY_CAPACITY`] tiles.
    pub fn new() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_MEMORY_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }

    /// Create a tier holding at most `capacity` tiles.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    /// Get a tile, marking it recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Bytes> {
        let mut cache = self.cache.lock().await;
        cache.get(key).cloned()
    }

    /// Check for a tile without updating LRU order.
    pub async fn contains(&self, key: &TileCacheKey) -> bool {
        let cache = self.cache.lock().await;
        cache.contains(key)
    }

    /// Store a tile, evicting the least recently used one when full.
    pub async fn put(&self, key: TileCacheKey, data: Bytes) {
        let mut cache = self.cache.lock().await;
        cache.put(key, data);
    }

    /// Remove a tile, returning it if it was cached.
    pub async fn remove(&self, key: &TileCacheKey) -> Option<Bytes> {
        let mut cache = self.cache.lock().await;
        cache.pop(key)
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }

    /// Maximum number of tiles.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

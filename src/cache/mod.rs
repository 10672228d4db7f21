//! Two-tier cache of encoded tiles.
//!
//! ```text
//!  get ──► MemoryTier ──hit──► bytes
//!              │ miss
//!              ▼
//!          DiskTier ───hit──► promote to memory ──► bytes
//!              │ miss / error
//!              ▼
//!            None
//! ```
//!
//! Disk-tier failures are logged and treated as misses; the cache never
//! fails a request.

mod disk;
mod key;
mod memory;

pub use disk::{DiskTier, GcResult, DEFAULT_DISK_MAX_BYTES};
pub use key::TileCacheKey;
pub use memory::{MemoryTier, DEFAULT_MEMORY_CAPACITY};

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

/// Tier a cached tile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Memory,
    Disk,
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub disk_errors: u64,
    pub memory_entries: usize,
    pub disk_bytes: u64,
}

/// Memory tier in front of an optional disk tier.
pub struct TileCache {
    memory: MemoryTier,
    disk: Option<DiskTier>,
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    disk_errors: AtomicU64,
}

impl TileCache {
    pub fn new(memory: MemoryTier, disk: Option<DiskTier>) -> Self {
        Self {
            memory,
            disk,
            memory_hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            disk_errors: AtomicU64::new(0),
        }
    }

    /// Memory tier only.
    pub fn memory_only(memory: MemoryTier) -> Self {
        Self::new(memory, None)
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    pub fn disk(&self) -> Option<&DiskTier> {
        self.disk.as_ref()
    }

    /// Look a tile up in memory, then on disk.
    ///
    /// A disk hit is copied into the memory tier.
    pub async fn get(&self, key: &TileCacheKey) -> Option<(Bytes, CacheTier)> {
        if let Some(data) = self.memory.get(key).await {
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Memory cache hit");
            return Some((data, CacheTier::Memory));
        }

        if let Some(disk) = &self.disk {
            match disk.get(key).await {
                Ok(Some(data)) => {
                    self.disk_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "Disk cache hit");
                    self.memory.put(key.clone(), data.clone()).await;
                    return Some((data, CacheTier::Disk));
                }
                Ok(None) => {}
                Err(e) => {
                    self.disk_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "Disk cache read failed");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Cache miss");
        None
    }

    /// Store a tile in both tiers.
    pub async fn put(&self, key: TileCacheKey, data: Bytes) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.put(&key, &data).await {
                self.disk_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Disk cache write failed");
            }
        }
        self.memory.put(key, data).await;
    }

    /// Drop a tile from both tiers.
    pub async fn remove(&self, key: &TileCacheKey) {
        self.memory.remove(key).await;
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.remove(key).await {
                warn!(key = %key, error = %e, "Disk cache remove failed");
            }
        }
    }

    /// Hit/miss counters and current tier sizes.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            disk_errors: self.disk_errors.load(Ordering::Relaxed),
            memory_entries: self.memory.len().await,
            disk_bytes: self.disk.as_ref().map_or(0, DiskTier::size_bytes),
        }
    }
}

//! On-disk tier with a size ceiling.
//!
//! # File Layout
//!
//! ```text
//! {cache_dir}/{digest[0..2]}/{digest}.png
//! ```
//!
//! # Writes
//!
//! Each write goes to a temp file unique to the process and call, then is
//! renamed over the final path. Readers never see partial files, including
//! readers in other processes sharing the directory.
//!
//! # Eviction
//!
//! LRU approximation based on file modification time: reads refresh a
//! file's mtime, and when the tier grows past its ceiling the oldest files
//! are deleted until it is at 90% of the ceiling.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::CacheError;

use super::key::TileCacheKey;

/// Default size ceiling: 5 GiB.
pub const DEFAULT_DISK_MAX_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Target fraction of the ceiling after eviction.
const EVICTION_TARGET_PERCENTAGE: f64 = 0.9;

/// Extension of committed tiles.
const TILE_EXTENSION: &str = "png";

/// Distinguishes temp files written by the same process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcResult {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub size_before: u64,
    pub size_after: u64,
}

/// File-backed tile cache.
pub struct DiskTier {
    /// Cache directory path
    directory: PathBuf,

    /// Size ceiling in bytes
    max_bytes: u64,

    /// Current size (approximate between eviction passes)
    current_bytes: AtomicU64,

    /// Set while an eviction pass is running
    gc_running: AtomicBool,
}

impl DiskTier {
    /// Open (creating if needed) a tier rooted at `directory`.
    ///
    /// Existing files are counted towards the ceiling.
    pub async fn open(directory: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, CacheError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;

        let scan_dir = directory.clone();
        let initial = tokio::task::spawn_blocking(move || {
            collect_tile_files(&scan_dir)
                .iter()
                .map(|(_, _, size)| size)
                .sum::<u64>()
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?;

        info!(
            dir = %directory.display(),
            max_bytes,
            initial_bytes = initial,
            "Disk cache tier opened"
        );

        Ok(Self {
            directory,
            max_bytes,
            current_bytes: AtomicU64::new(initial),
            gc_running: AtomicBool::new(false),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Approximate bytes currently stored.
    pub fn size_bytes(&self) -> u64 {
        self.current_bytes.load(Ordering::Relaxed)
    }

    /// Path of the committed file for `key`.
    pub fn path_for(&self, key: &TileCacheKey) -> PathBuf {
        let digest = key.digest();
        self.directory
            .join(&digest[..2])
            .join(format!("{digest}.{TILE_EXTENSION}"))
    }

    /// Read a tile, refreshing its mtime.
    pub async fn get(&self, key: &TileCacheKey) -> Result<Option<Bytes>, CacheError> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || read_and_touch(&path))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
    }

    /// Store a tile, then evict if the tier is over its ceiling.
    pub async fn put(&self, key: &TileCacheKey, data: &Bytes) -> Result<(), CacheError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = temp_path_for(&path);
        if let Err(e) = tokio::fs::write(&temp, data).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        // Bytes of an entry this write replaces
        let replaced = tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        let added = data.len() as u64;
        let size = match self
            .current_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(replaced) + added)
            }) {
            Ok(previous) | Err(previous) => previous.saturating_sub(replaced) + added,
        };

        if size > self.max_bytes {
            self.gc().await?;
        }
        Ok(())
    }

    /// Remove a tile. Missing files are not an error.
    pub async fn remove(&self, key: &TileCacheKey) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.current_bytes
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                        Some(v.saturating_sub(size))
                    })
                    .ok();
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Evict oldest files until at 90% of the ceiling.
    ///
    /// Returns `None` when another pass is already running.
    pub async fn gc(&self) -> Result<Option<GcResult>, CacheError> {
        if self
            .gc_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }

        let directory = self.directory.clone();
        let target = (self.max_bytes as f64 * EVICTION_TARGET_PERCENTAGE) as u64;
        let result = tokio::task::spawn_blocking(move || evict_to_target(&directory, target)).await;
        self.gc_running.store(false, Ordering::Release);

        let result = result.map_err(|e| CacheError::Task(e.to_string()))?;
        self.current_bytes.store(result.size_after, Ordering::Relaxed);

        info!(
            files_deleted = result.files_deleted,
            bytes_freed = result.bytes_freed,
            size_before = result.size_before,
            size_after = result.size_after,
            "Disk cache eviction complete"
        );
        Ok(Some(result))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.{n}.tmp", std::process::id()));
    path.with_file_name(name)
}

fn read_and_touch(path: &Path) -> Result<Option<Bytes>, CacheError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    // Refresh mtime so eviction sees the file as recently used
    let touched = File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(SystemTime::now()));
    if let Err(e) = touched {
        debug!(path = %path.display(), error = %e, "Failed to refresh cache file mtime");
    }

    Ok(Some(Bytes::from(data)))
}

/// Blocking eviction of the oldest tiles down to `target` bytes.
fn evict_to_target(directory: &Path, target: u64) -> GcResult {
    let start = Instant::now();
    let mut files = collect_tile_files(directory);
    let size_before: u64 = files.iter().map(|(_, _, size)| size).sum();

    files.sort_by_key(|(_, mtime, _)| *mtime);

    let mut remaining = size_before;
    let mut files_deleted = 0;
    let mut bytes_freed = 0;

    for (path, _, size) in files {
        if remaining <= target {
            break;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                remaining = remaining.saturating_sub(size);
                bytes_freed += size;
                files_deleted += 1;
            }
            Err(e) => {
                // Another process may have evicted it first
                debug!(path = %path.display(), error = %e, "Failed to delete cache file");
            }
        }
    }

    if remaining > target {
        warn!(
            remaining,
            target,
            "Disk cache eviction could not reach target size"
        );
    }

    cleanup_empty_dirs(directory);
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Eviction pass finished");

    GcResult {
        files_deleted,
        bytes_freed,
        size_before,
        size_after: remaining,
    }
}

/// Committed tiles under `dir` with their mtime and size.
fn collect_tile_files(dir: &Path) -> Vec<(PathBuf, SystemTime, u64)> {
    let mut files = Vec::new();
    collect_files_recursive(dir, &mut files);
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<(PathBuf, SystemTime, u64)>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Failed to read cache directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().is_some_and(|ext| ext == TILE_EXTENSION) {
            if let Ok(metadata) = entry.metadata() {
                let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((path, mtime, metadata.len()));
            }
        }
    }
}

fn cleanup_empty_dirs(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            cleanup_empty_dirs(&path);
            // Fails while the directory still has files
            let _ = std::fs::remove_dir(&path);
        }
    }
}

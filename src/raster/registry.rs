//! Raster handle registry.
//!
//! The registry provides:
//! - One lazily opened [`RasterHandle`] per raster identity
//! - A coordinate transformer built once per handle, not per request
//! - Serialized use of each handle (datasets need not be thread-safe)
//! - Re-opening when the handle is stale, its path changed, or a read failed
//!
//! # Example
//!
//! ```ignore
//! let registry = RasterRegistry::new(Arc::new(MemoryOpener::new()));
//! let slot = registry.slot(&RasterId::Int(1)).await;
//!
//! // Inside spawn_blocking:
//! let size = slot.with_handle(&RasterId::Int(1), &path, registry.opener().as_ref(), |h| {
//!     Ok(h.dataset().size())
//! })?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ProjectionError, RasterError};
use crate::geo::{CoordinateMapper, CrsTransformer, GeoTransform, MappingError};

use super::dataset::{DatasetOpener, RasterDataset};
use super::locator::RasterId;

/// Failure while opening or using a raster handle.
#[derive(Debug, Clone, Error)]
pub enum HandleError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl From<MappingError> for HandleError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::Raster(e) => HandleError::Raster(e),
            MappingError::Projection(e) => HandleError::Projection(e),
        }
    }
}

// =============================================================================
// RasterHandle
// =============================================================================

/// An opened dataset together with everything derived from its metadata.
pub struct RasterHandle {
    raster_id: RasterId,
    path: PathBuf,
    dataset: Box<dyn RasterDataset>,
    transformer: CrsTransformer,
    geo_transform: GeoTransform,
    band_count: usize,
}

impl RasterHandle {
    /// Open the dataset at `path` and build its transformer.
    ///
    /// Fails with [`HandleError::Projection`] when the dataset has no CRS or
    /// one that cannot be parsed.
    pub fn open(
        raster_id: &RasterId,
        path: &Path,
        opener: &dyn DatasetOpener,
    ) -> Result<Self, HandleError> {
        let dataset = opener.open(path)?;
        let crs = dataset.crs().ok_or(ProjectionError::UndefinedCrs)?;
        let transformer = CrsTransformer::from_wgs84(&crs)?;
        let geo_transform = dataset.geo_transform()?;
        let band_count = dataset.band_count();

        debug!(
            raster_id = %raster_id,
            path = %path.display(),
            crs = %crs,
            bands = band_count,
            "Opened raster handle"
        );

        Ok(Self {
            raster_id: raster_id.clone(),
            path: path.to_path_buf(),
            dataset,
            transformer,
            geo_transform,
            band_count,
        })
    }

    pub fn raster_id(&self) -> &RasterId {
        &self.raster_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dataset(&self) -> &dyn RasterDataset {
        self.dataset.as_ref()
    }

    pub fn transformer(&self) -> &CrsTransformer {
        &self.transformer
    }

    pub fn geo_transform(&self) -> &GeoTransform {
        &self.geo_transform
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    /// Tile-to-window mapper borrowing this handle's transformer.
    pub fn mapper(&self) -> CoordinateMapper<'_> {
        CoordinateMapper::new(&self.transformer, &self.geo_transform)
    }

    /// Whether the handle can serve requests for `path`.
    fn is_usable_for(&self, path: &Path) -> bool {
        self.path == path && self.dataset.is_open()
    }
}

impl Drop for RasterHandle {
    fn drop(&mut self) {
        debug!(raster_id = %self.raster_id, "Closed raster handle");
    }
}

// =============================================================================
// HandleSlot
// =============================================================================

/// Holds at most one open handle for a raster identity.
///
/// All access goes through a blocking mutex; call
/// [`with_handle`](Self::with_handle) from a blocking context.
#[derive(Default)]
pub struct HandleSlot {
    handle: Mutex<Option<RasterHandle>>,
}

impl HandleSlot {
    /// Run `f` against the handle for `path`, opening it first if needed.
    ///
    /// The slot stays locked while `f` runs, so concurrent requests for the
    /// same raster are serialized. A handle that is stale or was opened for
    /// another path is replaced. If `f` fails with a raster error the handle
    /// is dropped and the next call re-opens it.
    pub fn with_handle<T>(
        &self,
        raster_id: &RasterId,
        path: &Path,
        opener: &dyn DatasetOpener,
        f: impl FnOnce(&RasterHandle) -> Result<T, HandleError>,
    ) -> Result<T, HandleError> {
        let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());

        if guard.as_ref().is_some_and(|h| !h.is_usable_for(path)) {
            debug!(raster_id = %raster_id, "Raster handle is stale, re-opening");
            guard.take();
        }

        let handle = match guard.take() {
            Some(handle) => handle,
            None => RasterHandle::open(raster_id, path, opener)?,
        };

        let result = f(&handle);
        if !matches!(result, Err(HandleError::Raster(_))) {
            *guard = Some(handle);
        }
        result
    }

    /// Whether a handle is currently open. Does not wait for a busy slot.
    pub fn is_open(&self) -> bool {
        match self.handle.try_lock() {
            Ok(guard) => guard.is_some(),
            Err(std::sync::TryLockError::Poisoned(e)) => e.into_inner().is_some(),
            Err(std::sync::TryLockError::WouldBlock) => true,
        }
    }

    /// Drop the handle if no request is using it.
    fn close(&self) {
        if let Ok(mut guard) = self.handle.try_lock() {
            guard.take();
        }
    }
}

// =============================================================================
// RasterRegistry
// =============================================================================

/// Registry of handle slots keyed by raster identity.
pub struct RasterRegistry {
    opener: Arc<dyn DatasetOpener>,
    slots: RwLock<HashMap<RasterId, Arc<HandleSlot>>>,
}

impl RasterRegistry {
    pub fn new(opener: Arc<dyn DatasetOpener>) -> Self {
        Self {
            opener,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// The opener used for new handles.
    pub fn opener(&self) -> &Arc<dyn DatasetOpener> {
        &self.opener
    }

    /// Get the slot for `raster_id`, creating an empty one on first use.
    pub async fn slot(&self, raster_id: &RasterId) -> Arc<HandleSlot> {
        // Fast path: slot exists
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(raster_id) {
                return slot.clone();
            }
        }

        let mut slots = self.slots.write().await;
        slots.entry(raster_id.clone()).or_default().clone()
    }

    /// Release the handle for `raster_id`.
    ///
    /// A request currently using the handle keeps it until it finishes;
    /// later requests open a fresh one.
    pub async fn release(&self, raster_id: &RasterId) -> bool {
        let removed = self.slots.write().await.remove(raster_id);
        match removed {
            Some(slot) => {
                slot.close();
                true
            }
            None => false,
        }
    }

    /// Release every handle.
    pub async fn clear(&self) {
        let drained: Vec<_> = self.slots.write().await.drain().collect();
        for (_, slot) in drained {
            slot.close();
        }
    }

    /// Number of identities with a slot.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

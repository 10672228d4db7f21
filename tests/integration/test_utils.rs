//! Test utilities for integration tests.
//!
//! Provides in-memory rasters in web mercator, an opener that counts opens
//! and reads, and helpers to stand up a [`TileEngine`] around them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use raster_tiler::error::RasterError;
use raster_tiler::geo::WEB_MERCATOR_EXTENT;
use raster_tiler::{
    BandStack, Crs, DatasetOpener, EngineConfig, GeoTransform, MemoryDataset, MemoryOpener,
    PixelWindow, RasterDataset, RasterId, RasterLocator, StaticLocator, StretchRange, TileCoord,
    TileEngine, TileRequest,
};

/// Identity every fixture raster is registered under.
pub const RASTER_ID: i64 = 1;

/// Path the fixture raster is registered at.
pub const RASTER_PATH: &str = "/rasters/1.tif";

// =============================================================================
// Rasters
// =============================================================================

/// A `size × size` raster covering the whole web-mercator square.
///
/// At zoom 0 with `tile_size == size` every output pixel lands exactly on a
/// source pixel centre, so rendered values are the raw values.
pub fn mercator_raster(size: usize, bands: Vec<Vec<f32>>) -> MemoryDataset {
    let pixel = WEB_MERCATOR_EXTENT * 2.0 / size as f64;
    MemoryDataset::new(
        size,
        size,
        bands,
        Some(Crs::WEB_MERCATOR),
        GeoTransform::north_up(-WEB_MERCATOR_EXTENT, WEB_MERCATOR_EXTENT, pixel, pixel),
    )
    .unwrap()
}

/// A raster covering only the north-west quadrant of the mercator square.
pub fn north_west_raster(size: usize, value: f32) -> MemoryDataset {
    let pixel = WEB_MERCATOR_EXTENT / size as f64;
    MemoryDataset::new(
        size,
        size,
        vec![vec![value; size * size]],
        Some(Crs::WEB_MERCATOR),
        GeoTransform::north_up(-WEB_MERCATOR_EXTENT, WEB_MERCATOR_EXTENT, pixel, pixel),
    )
    .unwrap()
}

/// One constant buffer per value.
pub fn constant_bands(size: usize, values: &[f32]) -> Vec<Vec<f32>> {
    values.iter().map(|&v| vec![v; size * size]).collect()
}

/// A 4x4 three-band raster with embedded `(0, 200)` statistics on every band.
pub fn rgb_raster() -> MemoryDataset {
    mercator_raster(4, constant_bands(4, &[100.0, 200.0, 50.0]))
        .with_statistics(1, StretchRange::new(0.0, 200.0))
        .with_statistics(2, StretchRange::new(0.0, 200.0))
        .with_statistics(3, StretchRange::new(0.0, 200.0))
}

// =============================================================================
// Counting Opener
// =============================================================================

/// Wraps a [`MemoryOpener`], counting opens and window reads.
pub struct CountingOpener {
    inner: MemoryOpener,
    opens: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    exists_threads: Mutex<Vec<ThreadId>>,
}

impl CountingOpener {
    pub fn new() -> Self {
        Self {
            inner: MemoryOpener::new(),
            opens: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
            exists_threads: Mutex::new(Vec::new()),
        }
    }

    pub fn with(self, path: impl Into<PathBuf>, dataset: MemoryDataset) -> Self {
        self.inner.insert(path, dataset);
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Threads that ran an existence check, in call order.
    pub fn exists_threads(&self) -> Vec<ThreadId> {
        self.exists_threads.lock().unwrap().clone()
    }
}

impl DatasetOpener for CountingOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterDataset>, RasterError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.open(path)?;
        Ok(Box::new(CountingDataset {
            inner,
            reads: Arc::clone(&self.reads),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_threads
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.inner.exists(path)
    }
}

struct CountingDataset {
    inner: Box<dyn RasterDataset>,
    reads: Arc<AtomicUsize>,
}

impl RasterDataset for CountingDataset {
    fn size(&self) -> (usize, usize) {
        self.inner.size()
    }

    fn band_count(&self) -> usize {
        self.inner.band_count()
    }

    fn crs(&self) -> Option<Crs> {
        self.inner.crs()
    }

    fn geo_transform(&self) -> Result<GeoTransform, RasterError> {
        self.inner.geo_transform()
    }

    fn band_statistics(&self, band: usize) -> Result<Option<StretchRange>, RasterError> {
        self.inner.band_statistics(band)
    }

    fn read_window(
        &self,
        bands: &[usize],
        window: &PixelWindow,
        out_width: usize,
        out_height: usize,
    ) -> Result<BandStack, RasterError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_window(bands, window, out_width, out_height)
    }
}

// =============================================================================
// Failing Collaborators
// =============================================================================

/// Opener whose datasets fail every read.
pub struct BrokenReadOpener {
    opens: AtomicUsize,
}

impl BrokenReadOpener {
    pub fn new() -> Self {
        Self {
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DatasetOpener for BrokenReadOpener {
    fn open(&self, _path: &Path) -> Result<Box<dyn RasterDataset>, RasterError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(BrokenReadDataset(rgb_raster())))
    }

    fn exists(&self, _path: &Path) -> bool {
        true
    }
}

struct BrokenReadDataset(MemoryDataset);

impl RasterDataset for BrokenReadDataset {
    fn size(&self) -> (usize, usize) {
        self.0.size()
    }

    fn band_count(&self) -> usize {
        self.0.band_count()
    }

    fn crs(&self) -> Option<Crs> {
        self.0.crs()
    }

    fn geo_transform(&self) -> Result<GeoTransform, RasterError> {
        self.0.geo_transform()
    }

    fn band_statistics(&self, band: usize) -> Result<Option<StretchRange>, RasterError> {
        self.0.band_statistics(band)
    }

    fn read_window(
        &self,
        _bands: &[usize],
        _window: &PixelWindow,
        _out_width: usize,
        _out_height: usize,
    ) -> Result<BandStack, RasterError> {
        Err(RasterError::Read {
            message: "simulated I/O failure".to_string(),
        })
    }
}

/// Locator whose backing store is down.
pub struct FailingLocator;

#[async_trait]
impl RasterLocator for FailingLocator {
    async fn resolve_path(&self, _raster_id: &RasterId) -> Result<Option<PathBuf>, String> {
        Err("metadata store unavailable".to_string())
    }
}

// =============================================================================
// Engine Helpers
// =============================================================================

/// Locator mapping [`RASTER_ID`] to [`RASTER_PATH`].
pub fn fixture_locator() -> Arc<StaticLocator> {
    Arc::new(StaticLocator::new().with(RASTER_ID, RASTER_PATH))
}

/// Config with a tile size matching the 4x4 fixture rasters.
pub fn small_tiles() -> EngineConfig {
    EngineConfig {
        tile_size: 4,
        ..EngineConfig::default()
    }
}

/// Engine over `dataset` registered as [`RASTER_ID`].
pub async fn engine_for(
    dataset: MemoryDataset,
    config: EngineConfig,
) -> (TileEngine, Arc<CountingOpener>) {
    let opener = Arc::new(CountingOpener::new().with(RASTER_PATH, dataset));
    let engine = TileEngine::builder(fixture_locator(), opener.clone())
        .config(config)
        .build()
        .await
        .unwrap();
    (engine, opener)
}

/// Request for the fixture raster.
pub fn request(z: u8, x: u32, y: u32) -> TileRequest {
    TileRequest::new(RASTER_ID, TileCoord::new(z, x, y).unwrap())
}

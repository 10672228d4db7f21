//! In-memory rasters.
//!
//! [`MemoryDataset`] holds its bands in shared buffers and implements the
//! same boundless bilinear read as the file-backed backends. It serves
//! embedders that already have pixels in memory, and the test suite.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::RasterError;
use crate::geo::{Crs, GeoTransform, PixelWindow};
use crate::stats::StretchRange;

use super::dataset::{BandStack, DatasetOpener, RasterDataset};
use super::resample::resample_bilinear;

/// Value written where a read falls outside the raster.
const FILL_VALUE: f32 = 0.0;

// =============================================================================
// MemoryDataset
// =============================================================================

/// A raster held entirely in memory.
///
/// Cloning is cheap: band buffers are shared.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    width: usize,
    height: usize,
    bands: Arc<Vec<Vec<f32>>>,
    crs: Option<Crs>,
    geo_transform: GeoTransform,
    statistics: HashMap<usize, StretchRange>,
}

impl MemoryDataset {
    /// Create a dataset from row-major band buffers.
    ///
    /// # Arguments
    /// * `width`, `height` - Raster size in pixels
    /// * `bands` - One buffer of `width * height` values per band
    /// * `crs` - Native CRS, or `None` for an ungeoreferenced raster
    /// * `geo_transform` - Pixel-to-native transform
    pub fn new(
        width: usize,
        height: usize,
        bands: Vec<Vec<f32>>,
        crs: Option<Crs>,
        geo_transform: GeoTransform,
    ) -> Result<Self, RasterError> {
        if bands.is_empty() {
            return Err(RasterError::Read {
                message: "raster has no bands".to_string(),
            });
        }
        if let Some((i, band)) = bands
            .iter()
            .enumerate()
            .find(|(_, b)| b.len() != width * height)
        {
            return Err(RasterError::Read {
                message: format!(
                    "band {} has {} pixels, expected {}",
                    i + 1,
                    band.len(),
                    width * height
                ),
            });
        }

        Ok(Self {
            width,
            height,
            bands: Arc::new(bands),
            crs,
            geo_transform,
            statistics: HashMap::new(),
        })
    }

    /// Attach embedded min/max statistics to a band (1-based).
    pub fn with_statistics(mut self, band: usize, range: StretchRange) -> Self {
        self.statistics.insert(band, range);
        self
    }

    fn check_band(&self, band: usize) -> Result<(), RasterError> {
        if band == 0 || band > self.bands.len() {
            return Err(RasterError::InvalidBand {
                band,
                count: self.bands.len(),
            });
        }
        Ok(())
    }
}

impl RasterDataset for MemoryDataset {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn crs(&self) -> Option<Crs> {
        self.crs.clone()
    }

    fn geo_transform(&self) -> Result<GeoTransform, RasterError> {
        Ok(self.geo_transform)
    }

    fn band_statistics(&self, band: usize) -> Result<Option<StretchRange>, RasterError> {
        self.check_band(band)?;
        Ok(self.statistics.get(&band).copied())
    }

    fn read_window(
        &self,
        bands: &[usize],
        window: &PixelWindow,
        out_width: usize,
        out_height: usize,
    ) -> Result<BandStack, RasterError> {
        let mut stack = BandStack::zeros(bands.len(), out_width, out_height);

        for (i, &band) in bands.iter().enumerate() {
            self.check_band(band)?;
            resample_bilinear(
                &self.bands[band - 1],
                self.width,
                self.height,
                window,
                stack.band_mut(i),
                out_width,
                out_height,
                FILL_VALUE,
            );
        }

        Ok(stack)
    }
}

// =============================================================================
// MemoryOpener
// =============================================================================

/// Opens [`MemoryDataset`]s registered under virtual paths.
#[derive(Debug, Default)]
pub struct MemoryOpener {
    datasets: RwLock<HashMap<PathBuf, MemoryDataset>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the dataset served at `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, dataset: MemoryDataset) {
        self.datasets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), dataset);
    }

    /// Remove the dataset at `path`.
    pub fn remove(&self, path: &Path) -> Option<MemoryDataset> {
        self.datasets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path)
    }
}

impl DatasetOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterDataset>, RasterError> {
        let datasets = self.datasets.read().unwrap_or_else(|e| e.into_inner());
        datasets
            .get(path)
            .cloned()
            .map(|d| Box::new(d) as Box<dyn RasterDataset>)
            .ok_or_else(|| RasterError::NotFound(path.display().to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.datasets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }
}

//! Dataset abstraction consumed by the tile pipeline.

use std::path::Path;

use crate::error::RasterError;
use crate::geo::{Crs, GeoTransform, PixelWindow};
use crate::stats::StretchRange;

// =============================================================================
// Band Stack
// =============================================================================

/// Pixels read for a set of bands, laid out band-major (`bands × height × width`).
#[derive(Debug, Clone, PartialEq)]
pub struct BandStack {
    bands: usize,
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl BandStack {
    /// Wrap raw band-major pixel data.
    ///
    /// Returns `None` if `data` does not hold exactly `bands * width * height` values.
    pub fn new(bands: usize, width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        if data.len() != bands * width * height {
            return None;
        }
        Some(Self {
            bands,
            width,
            height,
            data,
        })
    }

    /// A stack filled with zeros.
    pub fn zeros(bands: usize, width: usize, height: usize) -> Self {
        Self {
            bands,
            width,
            height,
            data: vec![0.0; bands * width * height],
        }
    }

    /// Build a stack from one buffer per band.
    pub fn from_bands(width: usize, height: usize, bands: Vec<Vec<f32>>) -> Option<Self> {
        let count = bands.len();
        let mut data = Vec::with_capacity(count * width * height);
        for band in bands {
            if band.len() != width * height {
                return None;
            }
            data.extend(band);
        }
        Self::new(count, width, height, data)
    }

    pub fn band_count(&self) -> usize {
        self.bands
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixels per band.
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Pixels of band `index` (0-based position in the stack).
    pub fn band(&self, index: usize) -> &[f32] {
        let n = self.pixel_count();
        &self.data[index * n..(index + 1) * n]
    }

    /// Mutable pixels of band `index`.
    pub fn band_mut(&mut self, index: usize) -> &mut [f32] {
        let n = self.pixel_count();
        &mut self.data[index * n..(index + 1) * n]
    }

    /// Every value in the stack.
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Whether any value in the stack is strictly positive.
    pub fn has_positive(&self) -> bool {
        self.data.iter().any(|&v| v > 0.0)
    }
}

// =============================================================================
// Dataset Traits
// =============================================================================

/// An opened raster dataset.
///
/// Implementations need not be `Sync`; the registry serializes access to
/// each opened dataset.
pub trait RasterDataset: Send {
    /// Raster size in pixels as `(width, height)`.
    fn size(&self) -> (usize, usize);

    /// Number of bands.
    fn band_count(&self) -> usize;

    /// Native coordinate reference system, if the dataset defines one.
    fn crs(&self) -> Option<Crs>;

    /// Pixel-to-native affine transform.
    fn geo_transform(&self) -> Result<GeoTransform, RasterError>;

    /// Minimum/maximum statistics embedded in the band's metadata
    /// (`STATISTICS_MINIMUM` / `STATISTICS_MAXIMUM` tags).
    fn band_statistics(&self, band: usize) -> Result<Option<StretchRange>, RasterError>;

    /// Read `bands` (1-based) over `window`, resampled bilinearly to
    /// `out_width × out_height`.
    ///
    /// The read is boundless: output pixels falling outside the raster
    /// extent are filled with 0.
    fn read_window(
        &self,
        bands: &[usize],
        window: &PixelWindow,
        out_width: usize,
        out_height: usize,
    ) -> Result<BandStack, RasterError>;

    /// Whether the underlying handle is still usable.
    fn is_open(&self) -> bool {
        true
    }
}

/// Opens datasets from paths.
pub trait DatasetOpener: Send + Sync {
    /// Open the dataset at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn RasterDataset>, RasterError>;

    /// Whether a dataset exists at `path`. May block; the engine calls it on
    /// the blocking pool.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

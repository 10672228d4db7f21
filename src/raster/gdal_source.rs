//! GDAL-backed datasets (cargo feature `gdal`).

use std::path::{Path, PathBuf};

use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, Metadata};

use crate::error::RasterError;
use crate::geo::{Crs, GeoTransform, PixelWindow};
use crate::stats::StretchRange;

use super::dataset::{BandStack, DatasetOpener, RasterDataset};
use super::resample::{resample_bilinear, SourceBlock};

/// Value written where a read falls outside the raster.
const FILL_VALUE: f32 = 0.0;

/// A raster opened through GDAL.
pub struct GdalDataset {
    path: PathBuf,
    dataset: Dataset,
}

impl GdalDataset {
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        if !path.exists() {
            return Err(RasterError::NotFound(path.display().to_string()));
        }
        let dataset = Dataset::open(path).map_err(|e| RasterError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            dataset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn band(&self, band: usize) -> Result<gdal::raster::RasterBand<'_>, RasterError> {
        let count = self.dataset.raster_count();
        if band == 0 || band > count {
            return Err(RasterError::InvalidBand { band, count });
        }
        self.dataset.rasterband(band).map_err(|e| RasterError::Read {
            message: format!("band {band}: {e}"),
        })
    }
}

impl RasterDataset for GdalDataset {
    fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    fn band_count(&self) -> usize {
        self.dataset.raster_count()
    }

    fn crs(&self) -> Option<Crs> {
        let wkt = self.dataset.projection();
        if wkt.trim().is_empty() {
            return None;
        }
        let srs = SpatialRef::from_wkt(&wkt).ok()?;

        let epsg = match (srs.auth_name(), srs.auth_code()) {
            (Ok(name), Ok(code)) if name.eq_ignore_ascii_case("EPSG") => u32::try_from(code).ok(),
            _ => None,
        };
        // Codes missing from the bundled database fall back to proj4
        if let Some(crs) = epsg
            .map(Crs::Epsg)
            .filter(|crs| crs.is_web_mercator() || crs.proj_string().is_ok())
        {
            return Some(crs);
        }
        srs.to_proj4().ok().map(|def| Crs::Proj4(def.trim().to_string()))
    }

    fn geo_transform(&self) -> Result<GeoTransform, RasterError> {
        self.dataset
            .geo_transform()
            .map(GeoTransform)
            .map_err(|e| RasterError::InvalidGeoTransform(e.to_string()))
    }

    fn band_statistics(&self, band: usize) -> Result<Option<StretchRange>, RasterError> {
        let band = self.band(band)?;
        let read = |key: &str| {
            band.metadata_item(key, "")
                .and_then(|s| s.trim().parse::<f64>().ok())
        };
        Ok(match (read("STATISTICS_MINIMUM"), read("STATISTICS_MAXIMUM")) {
            (Some(low), Some(high)) => Some(StretchRange::new(low, high)),
            _ => None,
        })
    }

    fn read_window(
        &self,
        bands: &[usize],
        window: &PixelWindow,
        out_width: usize,
        out_height: usize,
    ) -> Result<BandStack, RasterError> {
        let mut stack = BandStack::zeros(bands.len(), out_width, out_height);
        let (width, height) = self.size();

        let Some(block) = SourceBlock::enclosing(window, width, height) else {
            // Window lies entirely outside the raster
            return Ok(stack);
        };
        let local = block.local_window(window);

        for (i, &band_index) in bands.iter().enumerate() {
            let band = self.band(band_index)?;
            // Native resolution; the shared kernel does the resampling
            let buffer = band
                .read_as::<f32>(
                    (block.col as isize, block.row as isize),
                    (block.width, block.height),
                    (block.width, block.height),
                    None,
                )
                .map_err(|e| RasterError::Read {
                    message: format!("band {band_index}: {e}"),
                })?;

            resample_bilinear(
                buffer.data(),
                block.width,
                block.height,
                &local,
                stack.band_mut(i),
                out_width,
                out_height,
                FILL_VALUE,
            );
        }

        Ok(stack)
    }
}

/// Opens rasters with GDAL.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalOpener;

impl DatasetOpener for GdalOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterDataset>, RasterError> {
        Ok(Box::new(GdalDataset::open(path)?))
    }
}

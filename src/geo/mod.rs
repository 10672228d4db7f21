//! Tile geometry: from an XYZ address to a source-raster read window.
//!
//! ```text
//!  TileCoord (z/x/y)
//!        │  bounds()
//!        ▼
//!  LngLatBounds (EPSG:4326)
//!        │  CrsTransformer::transform_bounds()
//!        ▼
//!  [left, bottom, right, top] in native CRS
//!        │  PixelWindow::from_bounds(geotransform)
//!        ▼
//!  PixelWindow (fractional, possibly outside the raster)
//! ```

mod projection;
mod tile;
mod window;

pub use projection::{Crs, CrsTransformer, DENSIFY_POINTS};
pub use tile::{LngLatBounds, TileCoord, MAX_ZOOM, WEB_MERCATOR_EXTENT};
pub use window::{GeoTransform, PixelWindow};

use thiserror::Error;

use crate::error::{ProjectionError, RasterError};

/// Failure while mapping a tile to a read window.
#[derive(Debug, Clone, Error)]
pub enum MappingError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Maps tile coordinates to pixel windows for one raster.
///
/// Borrows the transformer owned by the raster's handle, so the projection
/// is parsed once per raster rather than once per request.
pub struct CoordinateMapper<'a> {
    transformer: &'a CrsTransformer,
    geo_transform: &'a GeoTransform,
}

impl<'a> CoordinateMapper<'a> {
    pub fn new(transformer: &'a CrsTransformer, geo_transform: &'a GeoTransform) -> Self {
        Self {
            transformer,
            geo_transform,
        }
    }

    /// Native-CRS bounds `[left, bottom, right, top]` of a tile.
    pub fn native_bounds(&self, tile: &TileCoord) -> Result<[f64; 4], ProjectionError> {
        if self.transformer.target_crs().is_web_mercator() {
            return Ok(tile.mercator_bounds());
        }
        self.transformer.transform_bounds(&tile.bounds())
    }

    /// The pixel window a tile covers in the raster.
    pub fn tile_window(&self, tile: &TileCoord) -> Result<PixelWindow, MappingError> {
        let bounds = self.native_bounds(tile)?;
        Ok(PixelWindow::from_bounds(bounds, self.geo_transform)?)
    }
}

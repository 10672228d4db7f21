//! Affine geotransforms and pixel-space read windows.

use crate::error::RasterError;

/// Affine transform from pixel space to native CRS, in GDAL coefficient order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`.
///
/// A georeferenced pixel `(col, row)` maps to
/// `x = c[0] + col * c[1] + row * c[2]`, `y = c[3] + col * c[4] + row * c[5]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform with square-ish pixels and no rotation.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height.abs()])
    }

    /// Map a pixel position to native coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let c = &self.0;
        (c[0] + col * c[1] + row * c[2], c[3] + col * c[4] + row * c[5])
    }

    /// Map native coordinates back to a fractional pixel position.
    pub fn invert(&self, x: f64, y: f64) -> Result<(f64, f64), RasterError> {
        let c = &self.0;
        let det = c[1] * c[5] - c[2] * c[4];
        if det == 0.0 || !det.is_finite() {
            return Err(RasterError::InvalidGeoTransform(format!(
                "singular transform {:?}",
                self.0
            )));
        }

        let dx = x - c[0];
        let dy = y - c[3];
        let col = (dx * c[5] - dy * c[2]) / det;
        let row = (dy * c[1] - dx * c[4]) / det;
        Ok((col, row))
    }
}

/// A fractional pixel window into a raster; may extend past its extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelWindow {
    pub col_off: f64,
    pub row_off: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelWindow {
    /// Compute the window covering native-CRS bounds `[left, bottom, right, top]`.
    ///
    /// All four corners are inverted so rotated transforms and south-up
    /// rasters produce the enclosing window.
    pub fn from_bounds(bounds: [f64; 4], transform: &GeoTransform) -> Result<Self, RasterError> {
        let [left, bottom, right, top] = bounds;

        let corners = [
            transform.invert(left, top)?,
            transform.invert(right, top)?,
            transform.invert(right, bottom)?,
            transform.invert(left, bottom)?,
        ];

        let min_col = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let max_col = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let min_row = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let max_row = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            col_off: min_col,
            row_off: min_row,
            width: max_col - min_col,
            height: max_row - min_row,
        })
    }

    /// Whether any part of the window overlaps a `width × height` raster.
    pub fn intersects(&self, width: usize, height: usize) -> bool {
        self.col_off < width as f64
            && self.row_off < height as f64
            && self.col_off + self.width > 0.0
            && self.row_off + self.height > 0.0
    }
}

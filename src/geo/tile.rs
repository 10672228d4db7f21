//! Slippy-map tile addressing.
//!
//! Tiles follow the standard XYZ scheme: zoom `z` splits the web-mercator
//! square into `2^z × 2^z` tiles, `x` grows eastwards and `y` grows
//! southwards from the north-west corner.

use std::f64::consts::PI;

use crate::error::TileError;

/// Half the side of the web-mercator square in meters (EPSG:3857).
pub const WEB_MERCATOR_EXTENT: f64 = 20037508.342789244;

/// Highest zoom level accepted.
pub const MAX_ZOOM: u8 = 30;

/// A tile address in the XYZ scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// Geographic bounds of a tile in degrees (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl TileCoord {
    /// Create a tile coordinate, rejecting positions outside the 2^z grid.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, TileError> {
        let coord = Self { z, x, y };
        if z > MAX_ZOOM || !coord.is_valid() {
            return Err(TileError::InvalidCoordinate { z, x, y });
        }
        Ok(coord)
    }

    /// Number of tiles along one axis at this zoom.
    pub fn tiles_per_axis(&self) -> u64 {
        1u64 << self.z
    }

    fn is_valid(&self) -> bool {
        let n = self.tiles_per_axis();
        u64::from(self.x) < n && u64::from(self.y) < n
    }

    /// Geographic bounds of the tile.
    pub fn bounds(&self) -> LngLatBounds {
        let n = self.tiles_per_axis() as f64;
        let x = f64::from(self.x);
        let y = f64::from(self.y);

        LngLatBounds {
            west: x / n * 360.0 - 180.0,
            east: (x + 1.0) / n * 360.0 - 180.0,
            north: tile_y_to_lat(y, n),
            south: tile_y_to_lat(y + 1.0, n),
        }
    }

    /// Bounds in web-mercator meters as `[min_x, min_y, max_x, max_y]`.
    pub fn mercator_bounds(&self) -> [f64; 4] {
        let n = self.tiles_per_axis() as f64;
        let tile_size = WEB_MERCATOR_EXTENT * 2.0 / n;

        let min_x = -WEB_MERCATOR_EXTENT + f64::from(self.x) * tile_size;
        let max_y = WEB_MERCATOR_EXTENT - f64::from(self.y) * tile_size;

        [min_x, max_y - tile_size, min_x + tile_size, max_y]
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

fn tile_y_to_lat(y: f64, n: f64) -> f64 {
    ((1.0 - 2.0 * y / n) * PI).sinh().atan().to_degrees()
}

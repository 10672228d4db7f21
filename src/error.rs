use thiserror::Error;

use crate::raster::RasterId;

/// Errors raised by raster datasets and their openers
#[derive(Debug, Clone, Error)]
pub enum RasterError {
    /// Backing file does not exist
    #[error("Raster file not found: {0}")]
    NotFound(String),

    /// Dataset could not be opened
    #[error("Failed to open raster {path}: {message}")]
    Open { path: String, message: String },

    /// Windowed read failed
    #[error("Raster read failed: {message}")]
    Read { message: String },

    /// Band index outside 1..=count
    #[error("Invalid band {band}: dataset has {count} band(s)")]
    InvalidBand { band: usize, count: usize },

    /// Affine transform cannot be inverted
    #[error("Invalid geotransform: {0}")]
    InvalidGeoTransform(String),

    /// Handle was closed or its file replaced underneath it
    #[error("Raster handle is stale")]
    Stale,
}

/// Errors building or applying a coordinate transformer
#[derive(Debug, Clone, Error)]
pub enum ProjectionError {
    /// Dataset carries no coordinate reference system
    #[error("Raster has no coordinate reference system")]
    UndefinedCrs,

    /// EPSG code missing from the bundled definitions database
    #[error("EPSG:{0} is not a supported coordinate reference system")]
    UnsupportedEpsg(u32),

    /// proj4 definition rejected by the projection engine
    #[error("Invalid projection definition '{definition}': {message}")]
    InvalidDefinition { definition: String, message: String },

    /// Point transformation failed
    #[error("Coordinate transform failed: {0}")]
    Transform(String),
}

/// Errors from either cache tier.
///
/// These never fail a render: the engine logs them and treats the lookup as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error in the disk tier
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tile could not be encoded for storage
    #[error("Tile encode error: {0}")]
    Encode(String),

    /// Stored bytes could not be decoded back into a tile
    #[error("Tile decode error: {0}")]
    Decode(String),

    /// Blocking task panicked or was cancelled
    #[error("Cache task failed: {0}")]
    Task(String),
}

/// Errors surfaced by [`TileEngine`](crate::tile::TileEngine).
///
/// Missing rasters and windows without data are not errors; they produce an
/// empty tile instead.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Tile coordinates outside the 2^z grid
    #[error("Invalid tile coordinate z={z} x={x} y={y}")]
    InvalidCoordinate { z: u8, x: u32, y: u32 },

    /// Raster CRS cannot be transformed; fatal for this raster
    #[error("Unsupported projection for raster {raster_id}: {source}")]
    UnsupportedProjection {
        raster_id: RasterId,
        #[source]
        source: ProjectionError,
    },

    /// Unexpected failure while reading, resolving stats or composing
    #[error("Failed to render tile {z}/{x}/{y} of raster {raster_id}: {message}")]
    Render {
        raster_id: RasterId,
        z: u8,
        x: u32,
        y: u32,
        message: String,
    },

    /// Identity lookup collaborator failed
    #[error("Failed to resolve raster {raster_id}: {message}")]
    Locator { raster_id: RasterId, message: String },

    /// Tile could not be encoded as PNG
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },
}

/// Invalid [`EngineConfig`](crate::config::EngineConfig)
#[derive(Debug, Clone, Error)]
#[error("Invalid engine configuration: {0}")]
pub struct ConfigError(pub String);

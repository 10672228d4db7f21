//! # Raster Tiler
//!
//! Renders web-map tiles (XYZ, RGBA) from large geospatial rasters.
//!
//! Each request maps a tile address to a read window in the raster's native
//! CRS, reads the requested bands with a boundless bilinear resample,
//! resolves a display range per band, stretches the bands to 8 bits and
//! composes them into an RGBA tile. Rendered tiles are cached as PNG in a
//! memory tier and an optional disk tier.
//!
//! ## Features
//!
//! - **Reprojection**: any CRS known to `proj4rs`, with a fast path for web mercator
//! - **Stretch statistics**: caller overrides, cached, embedded or sampled ranges,
//!   plus binary-mask and normalized-index detection
//! - **Two-tier caching**: LRU memory tier in front of a size-bounded disk tier
//! - **Handle reuse**: one open dataset and transformer per raster identity
//!
//! ## Architecture
//!
//! - [`geo`] - Tile coordinates, projections and pixel windows
//! - [`raster`] - Dataset abstraction, locators and the handle registry
//! - [`stats`] - Stretch ranges and their resolution
//! - [`render`] - Stretch, composition and PNG encoding
//! - [`cache`] - Memory and disk tiers
//! - [`tile`] - The [`TileEngine`] tying everything together
//! - [`config`] - Engine settings and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use raster_tiler::{
//!     Crs, GeoTransform, MemoryDataset, MemoryOpener, StaticLocator, TileCoord, TileEngine,
//!     TileRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let dataset = MemoryDataset::new(
//!         2,
//!         2,
//!         vec![vec![10.0, 20.0, 30.0, 40.0]],
//!         Some(Crs::WGS84),
//!         GeoTransform::north_up(-180.0, 90.0, 180.0, 90.0),
//!     )
//!     .unwrap();
//!
//!     let opener = MemoryOpener::new();
//!     opener.insert("/rasters/world.tif", dataset);
//!     let locator = StaticLocator::new().with("world", "/rasters/world.tif");
//!
//!     let engine = TileEngine::builder(Arc::new(locator), Arc::new(opener))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let request = TileRequest::new("world", TileCoord::new(0, 0, 0).unwrap());
//!     let png = engine.render_png(&request).await.unwrap();
//!     println!("{} bytes from {:?}", png.data.len(), png.source);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod raster;
pub mod render;
pub mod stats;
pub mod tile;

// Re-export commonly used types
pub use cache::{CacheStats, CacheTier, DiskTier, MemoryTier, TileCache, TileCacheKey};
pub use config::{Cli, Command, EngineConfig, RenderConfig, StatsConfig};
pub use error::{CacheError, ConfigError, ProjectionError, RasterError, TileError};
pub use geo::{CoordinateMapper, Crs, CrsTransformer, GeoTransform, PixelWindow, TileCoord};
#[cfg(feature = "gdal")]
pub use raster::{GdalDataset, GdalOpener};
pub use raster::{
    BandStack, DatasetOpener, DirectoryLocator, MemoryDataset, MemoryOpener, RasterDataset,
    RasterId, RasterLocator, RasterRegistry, StaticLocator,
};
pub use render::{PngTileEncoder, RenderedTile, Renderer, RendererKind};
pub use stats::{BandStats, BandStatsResolver, StatsCache, StatsOverride, StatsSource, StretchRange};
pub use tile::{BandSelection, EncodedTile, TileEngine, TileRequest, TileResponse, TileSource};

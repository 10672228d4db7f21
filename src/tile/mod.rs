//! Tile engine layer.
//!
//! The engine sits between a serving layer and the raster/render modules:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Serving layer / CLI             │
//! └────────────────────┬────────────────────┘
//!                      │ TileRequest
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileEngine                 │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │ Stats + Renderer│  │
//! │  │ (memory/disk)│  │  (stretch RGBA) │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   RasterLocator  →  RasterRegistry      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileEngine`]: entry point; renders, caches and owns raster handles
//! - [`TileRequest`]: raster identity, tile address, bands and stretch override
//! - [`TileResponse`] / [`EncodedTile`]: decoded or PNG output plus its [`TileSource`]
//! - [`BandSelection`]: requested bands validated against a dataset

mod engine;
mod request;

pub use engine::{TileEngine, TileEngineBuilder};
pub use request::{BandSelection, EncodedTile, TileRequest, TileResponse, TileSource};

//! Stretch, composition and encoding of rendered tiles.
//!
//! - [`stretch_value`] / [`compose_pixel`]: the per-pixel math shared by all backends
//! - [`Renderer`]: [`ScalarRenderer`] or [`ParallelRenderer`], chosen via [`RendererKind`]
//! - [`PngTileEncoder`]: PNG encoding for the cache and for callers

mod backend;
mod encoder;
mod stretch;
mod tile;

pub use backend::{ParallelRenderer, Renderer, RendererKind, ScalarRenderer};
pub use encoder::PngTileEncoder;
pub use stretch::{compose_pixel, stretch_value, STRETCH_EPSILON};
pub use tile::RenderedTile;

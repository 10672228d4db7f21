//! Interchangeable stretch/compose backends.
//!
//! Both backends call [`compose_pixel`] for every pixel, so their output is
//! bit-identical; the parallel one only splits rows across the rayon pool.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::raster::BandStack;
use crate::stats::StretchRange;

use super::stretch::compose_pixel;
use super::tile::RenderedTile;

/// Stretches a band stack into an RGBA tile.
pub trait Renderer: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Compose `stack` into a square RGBA tile.
    ///
    /// `ranges` holds one entry per band of `stack`. A stack without any
    /// positive value yields [`RenderedTile::Empty`].
    fn render(&self, stack: &BandStack, ranges: &[StretchRange]) -> RenderedTile;
}

/// Single-threaded backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalarRenderer;

impl Renderer for ScalarRenderer {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn render(&self, stack: &BandStack, ranges: &[StretchRange]) -> RenderedTile {
        let size = stack.width() as u32;
        if !stack.has_positive() {
            return RenderedTile::empty(size);
        }

        let mut pixels = vec![0u8; stack.pixel_count() * 4];
        for (index, px) in pixels.chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&compose_pixel(stack, ranges, index));
        }
        RenderedTile::Image { size, pixels }
    }
}

/// Row-parallel backend on the rayon global pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelRenderer;

impl Renderer for ParallelRenderer {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn render(&self, stack: &BandStack, ranges: &[StretchRange]) -> RenderedTile {
        let size = stack.width() as u32;
        if !stack.has_positive() {
            return RenderedTile::empty(size);
        }

        let width = stack.width();
        let mut pixels = vec![0u8; stack.pixel_count() * 4];
        pixels
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(row, line)| {
                for (col, px) in line.chunks_exact_mut(4).enumerate() {
                    px.copy_from_slice(&compose_pixel(stack, ranges, row * width + col));
                }
            });
        RenderedTile::Image { size, pixels }
    }
}

/// Which backend the engine uses.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Parallel when the rayon pool has more than one thread
    #[default]
    Auto,
    Scalar,
    Parallel,
}

impl RendererKind {
    /// Instantiate the backend.
    pub fn build(self) -> Arc<dyn Renderer> {
        match self {
            RendererKind::Scalar => Arc::new(ScalarRenderer),
            RendererKind::Parallel => Arc::new(ParallelRenderer),
            RendererKind::Auto if rayon::current_num_threads() > 1 => Arc::new(ParallelRenderer),
            RendererKind::Auto => Arc::new(ScalarRenderer),
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RendererKind::Auto => "auto",
            RendererKind::Scalar => "scalar",
            RendererKind::Parallel => "parallel",
        })
    }
}

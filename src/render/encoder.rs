//! PNG tile encoder.
//!
//! Tiles are stored and served as PNG. Decoding is used when a cached tile
//! has to be handed back as pixels; a PNG whose alpha is zero everywhere
//! decodes to [`RenderedTile::Empty`].

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};

use crate::error::{CacheError, TileError};

use super::tile::RenderedTile;

// =============================================================================
// PNG Encoder
// =============================================================================

/// Encodes rendered tiles to PNG and back.
#[derive(Debug, Clone, Default)]
pub struct PngTileEncoder {}

impl PngTileEncoder {
    pub fn new() -> Self {
        Self {}
    }

    /// Encode a tile as an RGBA PNG.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Encode`] if the PNG encoder rejects the buffer.
    pub fn encode(&self, tile: &RenderedTile) -> Result<Bytes, TileError> {
        let size = tile.size();
        let rgba = tile.to_rgba();

        let mut output = Vec::new();
        PngEncoder::new(&mut output)
            .write_image(&rgba, size, size, ExtendedColorType::Rgba8)
            .map_err(|e| TileError::Encode {
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output))
    }

    /// Decode a PNG produced by [`encode`](Self::encode).
    pub fn decode(&self, data: &[u8]) -> Result<RenderedTile, CacheError> {
        let reader = ImageReader::with_format(Cursor::new(data), ImageFormat::Png);
        let image = reader
            .decode()
            .map_err(|e| CacheError::Decode(e.to_string()))?
            .into_rgba8();

        let (width, height) = image.dimensions();
        if width != height {
            return Err(CacheError::Decode(format!(
                "tile is {width}x{height}, expected a square"
            )));
        }

        let pixels = image.into_raw();
        if pixels.chunks_exact(4).all(|px| px[3] == 0) {
            return Ok(RenderedTile::empty(width));
        }
        Ok(RenderedTile::Image {
            size: width,
            pixels,
        })
    }

    /// Read PNG dimensions without decoding pixels.
    pub fn dimensions(&self, data: &[u8]) -> Result<(u32, u32), CacheError> {
        ImageReader::with_format(Cursor::new(data), ImageFormat::Png)
            .into_dimensions()
            .map_err(|e| CacheError::Decode(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Rendered tile buffers.

/// Output of the render pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedTile {
    /// Fully transparent tile: no source data under it.
    Empty { size: u32 },
    /// `size × size` RGBA pixels, row-major.
    Image { size: u32, pixels: Vec<u8> },
}

impl RenderedTile {
    pub fn empty(size: u32) -> Self {
        RenderedTile::Empty { size }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RenderedTile::Empty { .. })
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        match self {
            RenderedTile::Empty { size } | RenderedTile::Image { size, .. } => *size,
        }
    }

    /// RGBA bytes, materializing zeros for an empty tile.
    pub fn to_rgba(&self) -> Vec<u8> {
        match self {
            RenderedTile::Empty { size } => vec![0; (*size as usize).pow(2) * 4],
            RenderedTile::Image { pixels, .. } => pixels.clone(),
        }
    }

    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let size = self.size();
        if x >= size || y >= size {
            return None;
        }
        match self {
            RenderedTile::Empty { .. } => Some([0; 4]),
            RenderedTile::Image { pixels, .. } => {
                let i = (y as usize * size as usize + x as usize) * 4;
                Some([pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]])
            }
        }
    }
}

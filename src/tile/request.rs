//! Request and response types for [`TileEngine`](super::TileEngine).

use bytes::Bytes;
use serde::Serialize;

use crate::cache::CacheTier;
use crate::geo::TileCoord;
use crate::raster::RasterId;
use crate::render::RenderedTile;
use crate::stats::StatsOverride;

// =============================================================================
// Tile Request
// =============================================================================

/// A request for one tile of one raster.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    /// Raster identity, resolved to a file by the engine's locator
    pub raster_id: RasterId,

    /// Tile address
    pub tile: TileCoord,

    /// 1-based bands to compose; `None` uses the engine's default bands
    pub bands: Option<Vec<usize>>,

    /// Caller stretch ranges per band
    pub stats_override: Option<StatsOverride>,
}

impl TileRequest {
    /// Request a tile with the default bands and no override.
    pub fn new(raster_id: impl Into<RasterId>, tile: TileCoord) -> Self {
        Self {
            raster_id: raster_id.into(),
            tile,
            bands: None,
            stats_override: None,
        }
    }

    pub fn with_bands(mut self, bands: impl Into<Vec<usize>>) -> Self {
        self.bands = Some(bands.into());
        self
    }

    pub fn with_stats(mut self, stats_override: StatsOverride) -> Self {
        self.stats_override = Some(stats_override);
        self
    }
}

// =============================================================================
// Band Selection
// =============================================================================

/// Validated band selection for an opened dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandSelection(Vec<usize>);

impl BandSelection {
    /// Keep the requested bands that exist in a dataset of `band_count` bands.
    ///
    /// Order and duplicates are preserved. If nothing survives, band 1 is used.
    pub fn resolve(requested: &[usize], band_count: usize) -> Self {
        let bands: Vec<usize> = requested
            .iter()
            .copied()
            .filter(|&b| b >= 1 && b <= band_count)
            .collect();
        if bands.is_empty() {
            Self(vec![1])
        } else {
            Self(bands)
        }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileSource {
    MemoryCache,
    DiskCache,
    /// Rendered for this request
    Rendered,
    /// Raster identity unresolved or its file absent; the tile is empty
    Missing,
}

impl TileSource {
    pub fn is_cache_hit(&self) -> bool {
        matches!(self, TileSource::MemoryCache | TileSource::DiskCache)
    }
}

impl From<CacheTier> for TileSource {
    fn from(tier: CacheTier) -> Self {
        match tier {
            CacheTier::Memory => TileSource::MemoryCache,
            CacheTier::Disk => TileSource::DiskCache,
        }
    }
}

/// Decoded tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileResponse {
    pub tile: RenderedTile,
    pub source: TileSource,
}

/// PNG-encoded tile.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTile {
    pub data: Bytes,
    pub source: TileSource,
}

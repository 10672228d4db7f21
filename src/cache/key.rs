//! Cache keys.
//!
//! A tile is identified by raster, tile address, band selection and, when
//! given, the caller's stretch override. The digest of those parts names
//! the entry in both tiers:
//!
//! ```text
//! sha256("{raster_id}:{z}:{x}:{y}:{bands}" + "|{band}={low}:{high}"...)
//! ```

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::geo::TileCoord;
use crate::raster::RasterId;
use crate::stats::StatsOverride;

/// Cache key for rendered tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Raster identity as text
    pub raster_id: Arc<str>,

    /// Tile address
    pub tile: TileCoord,

    /// Requested bands, comma separated
    pub bands: Arc<str>,

    /// Canonical override text, if an override was supplied
    pub stats: Option<Arc<str>>,

    digest: Arc<str>,
}

impl TileCacheKey {
    /// Build a key for a request.
    ///
    /// `bands` is the selection as requested, before validation against
    /// the dataset. An empty override is treated as no override.
    pub fn new(
        raster_id: &RasterId,
        tile: TileCoord,
        bands: &[usize],
        stats: Option<&StatsOverride>,
    ) -> Self {
        let raster_id: Arc<str> = raster_id.to_string().into();
        let bands: Arc<str> = bands
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(",")
            .into();
        let stats: Option<Arc<str>> = stats
            .filter(|s| !s.is_empty())
            .map(|s| s.fingerprint().into());

        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}:{}:{}", raster_id, tile.z, tile.x, tile.y, bands));
        if let Some(stats) = &stats {
            hasher.update(stats.as_bytes());
        }
        let digest = hex::encode(hasher.finalize()).into();

        Self {
            raster_id,
            tile,
            bands,
            stats,
            digest,
        }
    }

    /// Hex SHA-256 of the key parts; the disk tier's file stem.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for TileCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.raster_id, self.tile, self.bands)?;
        if let Some(stats) = &self.stats {
            write!(f, "{stats}")?;
        }
        Ok(())
    }
}

//! Process-wide per-band statistics cache.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::raster::RasterId;

use super::range::StretchRange;

/// Resolved stretch ranges keyed by `(raster identity, band)`.
///
/// Entries live until explicitly invalidated. Share one instance between
/// engines with an `Arc` to share statistics.
#[derive(Debug, Default)]
pub struct StatsCache {
    entries: RwLock<HashMap<(RasterId, usize), StretchRange>>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, raster_id: &RasterId, band: usize) -> Option<StretchRange> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(raster_id.clone(), band))
            .copied()
    }

    pub fn insert(&self, raster_id: &RasterId, band: usize, range: StretchRange) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((raster_id.clone(), band), range);
    }

    /// Drop every entry for `raster_id`. Returns how many were removed.
    pub fn invalidate(&self, raster_id: &RasterId) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(id, _), _| id != raster_id);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

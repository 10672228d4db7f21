//! Per-band stretch range resolution.
//!
//! Order of precedence for each band:
//!
//! ```text
//!  whole block is a binary mask ──────────► (0, 1)   for every band
//!  whole block is a normalized index ─────► (-1, 1)  for every band
//!  caller override for the band
//!  stats cache (raster, band)
//!  statistics embedded in the dataset ────► cached
//!  percentiles sampled from the block ────► cached
//!  (0, 1)
//! ```
//!
//! With `override_beats_special_cases` the caller override is checked
//! before the two whole-block special cases.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::raster::{BandStack, RasterDataset, RasterId};

use super::cache::StatsCache;
use super::range::{StatsOverride, StretchRange};

/// Valid-pixel count above which the band is subsampled for percentiles.
pub const SAMPLE_THRESHOLD: usize = 500;

/// Keep every n-th valid pixel when subsampling.
pub const SAMPLE_STRIDE: usize = 10;

/// Lower percentile used when sampling.
pub const LOW_PERCENTILE: f64 = 2.0;

/// Upper percentile used when sampling.
pub const HIGH_PERCENTILE: f64 = 98.0;

/// Bound (inclusive) for values of normalized-index rasters.
const NORMALIZED_LIMIT: f32 = 1.0001;

/// Where a band's stretch range came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    BinaryMask,
    NormalizedIndex,
    Override,
    Cached,
    Embedded,
    Sampled,
    Default,
}

/// Stretch range for one requested band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandStats {
    pub band: usize,
    pub range: StretchRange,
    pub source: StatsSource,
}

/// Resolves stretch ranges for a read block.
#[derive(Debug, Clone)]
pub struct BandStatsResolver {
    cache: Arc<StatsCache>,
    override_beats_special_cases: bool,
}

impl BandStatsResolver {
    pub fn new(cache: Arc<StatsCache>) -> Self {
        Self {
            cache,
            override_beats_special_cases: false,
        }
    }

    /// Let caller overrides take precedence over the whole-block special cases.
    pub fn with_override_precedence(mut self, enabled: bool) -> Self {
        self.override_beats_special_cases = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<StatsCache> {
        &self.cache
    }

    /// Resolve one range per band in `bands` (1-based; aligned with the
    /// layers of `stack`).
    ///
    /// Failures reading embedded statistics are logged and fall through to
    /// sampling; resolution itself never fails.
    pub fn resolve(
        &self,
        raster_id: &RasterId,
        bands: &[usize],
        stack: &BandStack,
        dataset: &dyn RasterDataset,
        overrides: Option<&StatsOverride>,
    ) -> Vec<BandStats> {
        let block_case = classify_block(stack.values());

        bands
            .iter()
            .enumerate()
            .map(|(i, &band)| {
                let (range, source) = self.resolve_band(
                    raster_id,
                    band,
                    stack.band(i),
                    dataset,
                    overrides,
                    block_case,
                );
                debug!(
                    raster_id = %raster_id,
                    band,
                    ?source,
                    low = range.low,
                    high = range.high,
                    "Resolved band stats"
                );
                BandStats {
                    band,
                    range,
                    source,
                }
            })
            .collect()
    }

    fn resolve_band(
        &self,
        raster_id: &RasterId,
        band: usize,
        values: &[f32],
        dataset: &dyn RasterDataset,
        overrides: Option<&StatsOverride>,
        block_case: Option<(StretchRange, StatsSource)>,
    ) -> (StretchRange, StatsSource) {
        let overridden = overrides.and_then(|o| o.get(band));

        if self.override_beats_special_cases {
            if let Some(range) = overridden {
                return (range, StatsSource::Override);
            }
        }
        if let Some(case) = block_case {
            return case;
        }
        if let Some(range) = overridden {
            return (range, StatsSource::Override);
        }
        if let Some(range) = self.cache.get(raster_id, band) {
            return (range, StatsSource::Cached);
        }

        match dataset.band_statistics(band) {
            Ok(Some(range)) => {
                self.cache.insert(raster_id, band, range);
                return (range, StatsSource::Embedded);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(raster_id = %raster_id, band, error = %e, "Failed to read embedded statistics");
            }
        }

        match sample_range(values) {
            Some(range) => {
                self.cache.insert(raster_id, band, range);
                (range, StatsSource::Sampled)
            }
            None => (StretchRange::UNIT, StatsSource::Default),
        }
    }
}

/// Detect blocks that are binary masks or normalized-index data.
fn classify_block(values: &[f32]) -> Option<(StretchRange, StatsSource)> {
    let mut unit_interval = true;
    let mut normalized = true;
    let mut distinct: Vec<f32> = Vec::with_capacity(3);

    for &v in values {
        if !(0.0..=1.0).contains(&v) {
            unit_interval = false;
        }
        if !(-NORMALIZED_LIMIT..=NORMALIZED_LIMIT).contains(&v) {
            normalized = false;
            break;
        }
        if unit_interval && distinct.len() < 3 && !distinct.contains(&v) {
            distinct.push(v);
        }
    }

    if unit_interval && distinct.len() <= 2 {
        Some((StretchRange::UNIT, StatsSource::BinaryMask))
    } else if normalized {
        Some((StretchRange::SIGNED_UNIT, StatsSource::NormalizedIndex))
    } else {
        None
    }
}

/// Range from the band's valid (> 0) pixels: 2nd/98th percentiles of every
/// tenth value when there are more than 500, otherwise min/max.
fn sample_range(values: &[f32]) -> Option<StretchRange> {
    let valid: Vec<f64> = values
        .iter()
        .filter(|&&v| v > 0.0)
        .map(|&v| f64::from(v))
        .collect();

    if valid.is_empty() {
        return None;
    }

    if valid.len() > SAMPLE_THRESHOLD {
        let mut sample: Vec<f64> = valid.iter().step_by(SAMPLE_STRIDE).copied().collect();
        sample.sort_by(f64::total_cmp);
        return Some(StretchRange::new(
            percentile(&sample, LOW_PERCENTILE),
            percentile(&sample, HIGH_PERCENTILE),
        ));
    }

    let (low, high) = valid
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    Some(StretchRange::new(low, high))
}

/// Percentile `p` (0..=100) of sorted values with linear interpolation
/// between closest ranks.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

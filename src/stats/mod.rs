//! Per-band display statistics.
//!
//! - [`StretchRange`] / [`StatsOverride`]: the `(low, high)` pairs a band is stretched by
//! - [`StatsCache`]: process-wide cache of resolved ranges per `(raster, band)`
//! - [`BandStatsResolver`]: picks a range per band from overrides, cache,
//!   embedded metadata or the pixels themselves

mod cache;
mod range;
mod resolver;

pub use cache::StatsCache;
pub use range::{StatsOverride, StretchRange, DEFAULT_OVERRIDE_HIGH, DEFAULT_OVERRIDE_LOW};
pub use resolver::{
    BandStats, BandStatsResolver, StatsSource, HIGH_PERCENTILE, LOW_PERCENTILE, SAMPLE_STRIDE,
    SAMPLE_THRESHOLD,
};

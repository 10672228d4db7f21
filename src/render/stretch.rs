//! Linear stretch and per-pixel band composition.

use crate::raster::BandStack;
use crate::stats::StretchRange;

/// Smallest span a stretch divides by.
pub const STRETCH_EPSILON: f64 = 1e-10;

/// Map `value` from `range` onto 0..=255, truncating.
///
/// A degenerate range (`high <= low`) maps every value to 0.
#[inline]
pub fn stretch_value(value: f32, range: &StretchRange) -> u8 {
    if range.is_degenerate() {
        return 0;
    }
    let span = (range.high - range.low).max(STRETCH_EPSILON);
    let normalized = ((f64::from(value) - range.low) / span).clamp(0.0, 1.0);
    // NaN saturates to 0
    (normalized * 255.0) as u8
}

/// RGBA for pixel `index` of `stack`.
///
/// Channels by band count: one band is gray, two bands fill R and G with
/// B = 0, three or more use the first three. Alpha is 255 wherever any raw
/// band value is positive.
#[inline]
pub fn compose_pixel(stack: &BandStack, ranges: &[StretchRange], index: usize) -> [u8; 4] {
    let channel = |band: usize| stretch_value(stack.band(band)[index], &ranges[band]);

    let alpha = if (0..stack.band_count()).any(|b| stack.band(b)[index] > 0.0) {
        255
    } else {
        0
    };

    match stack.band_count() {
        0 => [0, 0, 0, 0],
        1 => {
            let gray = channel(0);
            [gray, gray, gray, alpha]
        }
        2 => [channel(0), channel(1), 0, alpha],
        _ => [channel(0), channel(1), channel(2), alpha],
    }
}

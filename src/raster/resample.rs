//! Bilinear, boundless resampling of a single band.

use crate::geo::PixelWindow;

/// Integer-aligned region of a band touched by a bilinear read of a window.
///
/// Covers every source pixel the kernel samples, including the neighbours
/// used for interpolation, clipped to the band extent. Resampling the block
/// with [`local_window`](Self::local_window) gives the same result as
/// resampling the whole band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceBlock {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

impl SourceBlock {
    /// The block a read of `window` needs from a `width × height` band, or
    /// `None` when the window misses the band entirely.
    pub fn enclosing(window: &PixelWindow, width: usize, height: usize) -> Option<Self> {
        if width == 0 || height == 0 || !(window.width > 0.0) || !(window.height > 0.0) {
            return None;
        }
        let (col, block_width) = block_axis(window.col_off, window.width, width)?;
        let (row, block_height) = block_axis(window.row_off, window.height, height)?;
        Some(Self {
            col,
            row,
            width: block_width,
            height: block_height,
        })
    }

    /// `window` expressed relative to the block origin.
    pub fn local_window(&self, window: &PixelWindow) -> PixelWindow {
        PixelWindow {
            col_off: window.col_off - self.col as f64,
            row_off: window.row_off - self.row as f64,
            width: window.width,
            height: window.height,
        }
    }
}

/// First source index and length along one axis. Sample centres in
/// `[start, end)` interpolate between `floor(c - 0.5)` and the next index.
fn block_axis(off: f64, len: f64, size: usize) -> Option<(usize, usize)> {
    let start = off.max(0.0);
    let end = (off + len).min(size as f64);
    if end <= start {
        return None;
    }
    let first = (start - 0.5).floor().max(0.0) as usize;
    let last = ((end - 0.5).floor().max(0.0) as usize + 1).min(size - 1);
    Some((first, last - first + 1))
}

/// Resample `window` of a `width × height` band into `out`.
///
/// `out` has `out_width * out_height` entries. Output pixels whose centre
/// maps outside the band extent receive `fill`; inside the extent, samples
/// are interpolated from the four nearest source pixels with edge clamping.
pub fn resample_bilinear(
    src: &[f32],
    width: usize,
    height: usize,
    window: &PixelWindow,
    out: &mut [f32],
    out_width: usize,
    out_height: usize,
    fill: f32,
) {
    debug_assert_eq!(src.len(), width * height);
    debug_assert_eq!(out.len(), out_width * out_height);

    if width == 0 || height == 0 {
        out.fill(fill);
        return;
    }

    let scale_x = window.width / out_width as f64;
    let scale_y = window.height / out_height as f64;
    let max_col = (width - 1) as f64;
    let max_row = (height - 1) as f64;

    for oy in 0..out_height {
        let cy = window.row_off + (oy as f64 + 0.5) * scale_y;
        let row = &mut out[oy * out_width..(oy + 1) * out_width];

        if cy < 0.0 || cy >= height as f64 {
            row.fill(fill);
            continue;
        }

        let sy = (cy - 0.5).clamp(0.0, max_row);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = sy - y0 as f64;

        for (ox, slot) in row.iter_mut().enumerate() {
            let cx = window.col_off + (ox as f64 + 0.5) * scale_x;
            if cx < 0.0 || cx >= width as f64 {
                *slot = fill;
                continue;
            }

            let sx = (cx - 0.5).clamp(0.0, max_col);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = sx - x0 as f64;

            let p00 = f64::from(src[y0 * width + x0]);
            let p01 = f64::from(src[y0 * width + x1]);
            let p10 = f64::from(src[y1 * width + x0]);
            let p11 = f64::from(src[y1 * width + x1]);

            let top = p00 + (p01 - p00) * fx;
            let bottom = p10 + (p11 - p10) * fx;
            *slot = (top + (bottom - top) * fy) as f32;
        }
    }
}

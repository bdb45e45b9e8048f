//! Stroke adjustment: morphological dilation and erosion of the ink mask.
//!
//! Positive radii thicken strokes, negative radii thin them. The
//! structuring element is a `(2r+1) x (2r+1)` square, which is separable:
//! a horizontal 1-D pass followed by a vertical 1-D pass gives the same
//! result as the full 2-D window. Each 1-D pass counts foreground pixels
//! in the window with a running prefix sum, so the cost is `O(W*H)` for
//! every radius.
//!
//! Pixels outside the mask are background for both operations: dilation
//! never grows past the canvas, and erosion eats inward from the border.
//! `imageproc::morphology` is not used for that reason: its erosion
//! treats off-canvas pixels as foreground. It stays the dilation
//! reference in the tests.
//!
//! This is step 3 of the icon pipeline, between binarization and
//! compositing.

use std::cmp::Ordering;

use crate::types::Mask;

/// Largest stroke adjustment in either direction, in pixels.
pub const MAX_STROKE_RADIUS: i32 = 8;

/// Grow (`radius > 0`) or shrink (`radius < 0`) the foreground of `mask`.
///
/// `radius` is clamped to `-MAX_STROKE_RADIUS..=MAX_STROKE_RADIUS`;
/// zero returns an identical mask.
#[must_use = "returns the adjusted mask"]
pub fn adjust_stroke(mask: &Mask, radius: i32) -> Mask {
    let radius = radius.clamp(-MAX_STROKE_RADIUS, MAX_STROKE_RADIUS);
    let adjusted = match radius.cmp(&0) {
        Ordering::Equal => mask.clone(),
        Ordering::Greater => dilate(mask, radius.unsigned_abs()),
        Ordering::Less => erode(mask, radius.unsigned_abs()),
    };
    tracing::debug!(
        radius,
        before = mask.foreground_count(),
        after = adjusted.foreground_count(),
        "adjusted stroke"
    );
    adjusted
}

/// Set every pixel within `radius` (Chebyshev distance) of a foreground
/// pixel to foreground.
#[must_use = "returns the dilated mask"]
pub fn dilate(mask: &Mask, radius: u32) -> Mask {
    square_filter(mask, radius, Window::Any)
}

/// Keep a pixel foreground only if every pixel within `radius`
/// (Chebyshev distance) is foreground, counting off-canvas pixels as
/// background.
#[must_use = "returns the eroded mask"]
pub fn erode(mask: &Mask, radius: u32) -> Mask {
    square_filter(mask, radius, Window::All)
}

/// What a 1-D window needs to contain for its center to stay foreground.
#[derive(Debug, Clone, Copy)]
enum Window {
    /// At least one foreground pixel (max filter).
    Any,
    /// Only foreground pixels, none off-canvas (min filter).
    All,
}

fn square_filter(mask: &Mask, radius: u32, window: Window) -> Mask {
    if radius == 0 || mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }

    let w = mask.width() as usize;
    let h = mask.height() as usize;
    let r = radius as usize;
    let src = mask.as_slice();

    let mut prefix = Vec::with_capacity(w.max(h) + 1);
    let mut line = Vec::with_capacity(w.max(h));

    let mut horizontal = vec![false; w * h];
    for (src_row, dst_row) in src.chunks_exact(w).zip(horizontal.chunks_exact_mut(w)) {
        filter_line(src_row.iter().copied(), r, window, &mut prefix, &mut line);
        dst_row.copy_from_slice(&line);
    }

    let mut out = vec![false; w * h];
    for x in 0..w {
        let column = (0..h).map(|y| horizontal[y * w + x]);
        filter_line(column, r, window, &mut prefix, &mut line);
        for (y, &v) in line.iter().enumerate() {
            out[y * w + x] = v;
        }
    }

    Mask::from_raw(mask.width(), mask.height(), out)
}

/// Run a 1-D window of half-width `radius` along one row or column.
///
/// `prefix` and `output` are scratch buffers reused across lines.
fn filter_line(
    input: impl Iterator<Item = bool>,
    radius: usize,
    window: Window,
    prefix: &mut Vec<usize>,
    output: &mut Vec<bool>,
) {
    prefix.clear();
    prefix.push(0);
    let mut count = 0;
    for v in input {
        count += usize::from(v);
        prefix.push(count);
    }

    let len = prefix.len() - 1;
    let full = 2 * radius + 1;
    output.clear();
    output.extend((0..len).map(|i| {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius + 1).min(len);
        let inside = prefix[hi] - prefix[lo];
        match window {
            Window::Any => inside > 0,
            // A window clipped by the border holds fewer than `full`.
            Window::All => inside == full,
        }
    }));
}

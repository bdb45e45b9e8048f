//! Flat-color icon compositing.
//!
//! Paints the final mask with hard edges: ink pixels take the foreground
//! color, everything else takes the background color or becomes fully
//! transparent. There is no anti-aliasing.
//!
//! This is the last pixel stage of the icon pipeline.

use crate::types::{Mask, Rgb, RgbaImage};

/// Render `mask` as an opaque-ink RGBA raster.
///
/// Foreground pixels become `(fg, 255)`. Background pixels become
/// `(bg, 255)` when `bg` is `Some`, otherwise `(0, 0, 0, 0)`.
#[must_use = "returns the composited icon"]
pub fn compose_icon(mask: &Mask, fg: Rgb, bg: Option<Rgb>) -> RgbaImage {
    let ink = fg.with_alpha(255);
    let paper = bg.map_or(image::Rgba([0, 0, 0, 0]), |c| c.with_alpha(255));
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get(x, y) { ink } else { paper }
    })
}

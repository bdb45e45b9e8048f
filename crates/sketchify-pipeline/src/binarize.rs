//! Luminance thresholding: RGBA raster to ink mask.
//!
//! Sketches are dark ink on a light page, so a pixel is foreground when
//! its perceived brightness falls below the threshold. Fully transparent
//! pixels are always background; alpha is otherwise ignored.
//!
//! This is step 2 of the icon pipeline, between decoding and stroke
//! adjustment.

use crate::types::{Mask, Rgb, RgbaImage};

/// Perceptual luminance in thousandths: `299*R + 587*G + 114*B`.
///
/// Integer arithmetic keeps the threshold comparison exact.
const fn luminance_milli(color: Rgb) -> u32 {
    299 * color.r as u32 + 587 * color.g as u32 + 114 * color.b as u32
}

/// Perceptual luminance `0.299*R + 0.587*G + 0.114*B`, in `0.0..=255.0`.
#[must_use]
pub fn luminance(color: Rgb) -> f64 {
    f64::from(luminance_milli(color)) / 1000.0
}

/// Build the ink mask for `image`.
///
/// A pixel is foreground iff its alpha is non-zero and its luminance is
/// strictly below `threshold`. With `threshold == 0` nothing is ink.
#[must_use = "returns the binary mask"]
pub fn binarize(image: &RgbaImage, threshold: u8) -> Mask {
    let cutoff = u32::from(threshold) * 1000;
    let mask = Mask::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        pixel.0[3] != 0 && luminance_milli(Rgb::from_pixel(*pixel)) < cutoff
    });
    tracing::debug!(
        threshold,
        foreground = mask.foreground_count(),
        "binarized image"
    );
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba(rgba))
    }

    #[test]
    fn luminance_weights() {
        assert!((luminance(Rgb::WHITE) - 255.0).abs() < 1e-9);
        assert!(luminance(Rgb::BLACK).abs() < 1e-9);
        let r = luminance(Rgb::new(255, 0, 0));
        let g = luminance(Rgb::new(0, 255, 0));
        let b = luminance(Rgb::new(0, 0, 255));
        assert!(g > r && r > b, "expected green > red > blue, got R={r} G={g} B={b}");
        assert!((r - 76.245).abs() < 1e-9);
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = solid(17, 31, [0, 0, 0, 255]);
        let mask = binarize(&img, 128);
        assert_eq!(mask.width(), 17);
        assert_eq!(mask.height(), 31);
    }

    #[test]
    fn dark_pixels_are_foreground() {
        let mask = binarize(&solid(4, 4, [10, 10, 10, 255]), 200);
        assert_eq!(mask.foreground_count(), 16);
    }

    #[test]
    fn light_pixels_are_background() {
        let mask = binarize(&solid(4, 4, [250, 250, 250, 255]), 200);
        assert_eq!(mask.foreground_count(), 0);
    }

    #[test]
    fn threshold_is_strict() {
        // Gray 100 has luminance exactly 100.
        let img = solid(1, 1, [100, 100, 100, 255]);
        assert!(!binarize(&img, 100).get(0, 0));
        assert!(binarize(&img, 101).get(0, 0));
    }

    #[test]
    fn zero_threshold_selects_nothing() {
        let mask = binarize(&solid(3, 3, [0, 0, 0, 255]), 0);
        assert_eq!(mask.foreground_count(), 0);
    }

    #[test]
    fn transparent_pixels_are_background_for_any_threshold() {
        let img = RgbaImage::from_fn(8, 8, |x, y| {
            let alpha = if (x + y) % 2 == 0 { 0 } else { 255 };
            image::Rgba([0, 0, 0, alpha])
        });
        for threshold in [0, 1, 128, 200, 255] {
            let mask = binarize(&img, threshold);
            for y in 0..8 {
                for x in 0..8 {
                    if (x + y) % 2 == 0 {
                        assert!(!mask.get(x, y), "transparent ({x},{y}) at T={threshold}");
                    }
                }
            }
        }
    }

    #[test]
    fn partially_transparent_ink_still_counts() {
        let mask = binarize(&solid(1, 1, [0, 0, 0, 1]), 200);
        assert!(mask.get(0, 0));
    }

    #[test]
    fn alpha_does_not_affect_luminance() {
        let opaque = binarize(&solid(1, 1, [120, 130, 140, 255]), 131);
        let faint = binarize(&solid(1, 1, [120, 130, 140, 40]), 131);
        assert_eq!(opaque, faint);
    }
}

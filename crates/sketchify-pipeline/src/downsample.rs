//! Block downsampling and nearest-neighbor block replication.
//!
//! [`block_average`] reduces the image to a coarse grid where every cell
//! is the mean of one `P x P` block of source pixels. Blocks on the right
//! and bottom edges may be partial; they average only the pixels that
//! exist. This is the first processing step of the pixelate pipeline.
//!
//! [`upscale_nearest`] is the inverse blow-up used at the end of that
//! pipeline so the result keeps the canvas size with crisp blocks.

use crate::types::{Dimensions, RgbaImage};

/// Smallest accepted block edge in pixels.
pub const MIN_BLOCK_SIZE: u32 = 2;

/// Largest accepted block edge in pixels.
pub const MAX_BLOCK_SIZE: u32 = 32;

/// Average non-overlapping `block x block` tiles of `image`.
///
/// The output is `ceil(W/block) x ceil(H/block)`. Every RGBA channel is
/// the arithmetic mean of the pixels present in the tile, rounded to the
/// nearest integer (halves round up). A `block` of 0 is treated as 1.
#[must_use = "returns the downsampled image"]
pub fn block_average(image: &RgbaImage, block: u32) -> RgbaImage {
    let block = block.max(1);
    let (w, h) = image.dimensions();
    let out_w = w.div_ceil(block);
    let out_h = h.div_ceil(block);

    let mut sums = vec![[0u64; 4]; out_w as usize * out_h as usize];
    for (x, y, pixel) in image.enumerate_pixels() {
        let cell = (y / block) as usize * out_w as usize + (x / block) as usize;
        for (sum, &sample) in sums[cell].iter_mut().zip(&pixel.0) {
            *sum += u64::from(sample);
        }
    }

    let downsampled = RgbaImage::from_fn(out_w, out_h, |cx, cy| {
        let tile_w = block.min(w - cx * block);
        let tile_h = block.min(h - cy * block);
        let n = u64::from(tile_w) * u64::from(tile_h);
        let sum = sums[cy as usize * out_w as usize + cx as usize];
        image::Rgba(sum.map(|s| u8::try_from((s + n / 2) / n).unwrap_or(u8::MAX)))
    });
    tracing::debug!(block, width = out_w, height = out_h, "block-averaged image");
    downsampled
}

/// Blow `small` back up by replicating each cell into a `block x block`
/// tile, cropped to `target`.
///
/// With `small` produced by [`block_average`] from an image of size
/// `target`, every source pixel position gets the value of the tile it
/// was averaged into.
#[must_use = "returns the upscaled image"]
pub fn upscale_nearest(small: &RgbaImage, block: u32, target: Dimensions) -> RgbaImage {
    let block = block.max(1);
    let max_x = small.width().saturating_sub(1);
    let max_y = small.height().saturating_sub(1);
    RgbaImage::from_fn(target.width, target.height, |x, y| {
        *small.get_pixel((x / block).min(max_x), (y / block).min(max_y))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba(rgba))
    }

    #[test]
    fn output_dimensions_are_ceiling() {
        for (w, h, p) in [(400, 400, 8), (401, 399, 8), (10, 3, 4), (1, 1, 32), (33, 65, 32)] {
            let out = block_average(&uniform(w, h, [0, 0, 0, 255]), p);
            assert_eq!(out.width(), w.div_ceil(p), "{w}x{h} p={p}");
            assert_eq!(out.height(), h.div_ceil(p), "{w}x{h} p={p}");
        }
    }

    #[test]
    fn uniform_input_stays_uniform() {
        let color = [37, 141, 250, 99];
        for p in MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE {
            let out = block_average(&uniform(45, 23, color), p);
            assert!(out.pixels().all(|px| px.0 == color), "p={p}");
        }
    }

    #[test]
    fn averages_each_block() {
        // 4x2 image, left 2x2 block black/white checker, right block red.
        let img = RgbaImage::from_fn(4, 2, |x, y| {
            if x >= 2 {
                image::Rgba([255, 0, 0, 255])
            } else if (x + y) % 2 == 0 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let out = block_average(&img, 2);
        assert_eq!(out.dimensions(), (2, 1));
        // (0 + 255 + 255 + 0) / 4 = 127.5 -> 128
        assert_eq!(out.get_pixel(0, 0).0, [128, 128, 128, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn partial_edge_blocks_average_only_present_pixels() {
        // 3x1 image with block 2: second cell holds a single pixel.
        let img = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => image::Rgba([10, 10, 10, 255]),
            1 => image::Rgba([20, 20, 20, 255]),
            _ => image::Rgba([200, 100, 50, 0]),
        });
        let out = block_average(&img, 2);
        assert_eq!(out.dimensions(), (2, 1));
        assert_eq!(out.get_pixel(0, 0).0, [15, 15, 15, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [200, 100, 50, 0]);
    }

    #[test]
    fn alpha_is_averaged_too() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            image::Rgba([0, 0, 0, if x == 0 { 0 } else { 255 }])
        });
        let out = block_average(&img, 2);
        assert_eq!(out.get_pixel(0, 0).0[3], 128);
    }

    #[test]
    fn rounding_is_to_nearest() {
        // Mean of 1, 2, 2, 2 = 1.75 -> 2; mean of 1, 1, 1, 2 = 1.25 -> 1.
        let img = RgbaImage::from_fn(2, 2, |x, y| {
            let v = if x == 0 && y == 0 { 1 } else { 2 };
            let u = if x == 1 && y == 1 { 2 } else { 1 };
            image::Rgba([v, u, 0, 255])
        });
        let out = block_average(&img, 2);
        assert_eq!(out.get_pixel(0, 0).0, [2, 1, 0, 255]);
    }

    #[test]
    fn upscale_replicates_blocks_and_crops() {
        let small = RgbaImage::from_fn(2, 2, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let target = Dimensions {
            width: 5,
            height: 3,
        };
        let big = upscale_nearest(&small, 3, target);
        assert_eq!(big.dimensions(), (5, 3));
        assert_eq!(big.get_pixel(2, 2).0, [0, 0, 0, 255]);
        assert_eq!(big.get_pixel(3, 0).0, [1, 0, 0, 255]);
        assert_eq!(big.get_pixel(4, 2).0, [1, 0, 0, 255]);
    }

    #[test]
    fn downsample_then_upscale_restores_uniform_blocks() {
        let img = RgbaImage::from_fn(20, 12, |x, y| {
            image::Rgba([(x / 4) as u8 * 40, (y / 4) as u8 * 60, 9, 255])
        });
        let small = block_average(&img, 4);
        let big = upscale_nearest(&small, 4, Dimensions::of(&img));
        assert_eq!(big, img);
    }
}

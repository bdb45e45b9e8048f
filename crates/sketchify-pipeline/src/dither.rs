//! Error-diffusion dithering onto a fixed palette.
//!
//! Pixels are visited in row-major order, left to right, top to bottom.
//! Each pixel is replaced by its nearest palette entry and the rounding
//! error is pushed to not-yet-visited neighbors according to a
//! [`Kernel`]. The running values live in an `f32` buffer so pushed
//! error can overshoot `0..=255` without wrapping; values are clamped
//! only when a pixel is finally quantized.

use crate::quantize::Palette;
use crate::types::{Rgb, RgbaImage};

/// An error diffusion kernel.
///
/// Each entry is `(dx, dy, weight)`: the neighbor at that offset receives
/// `error * weight / divisor`. Taps that fall outside the image are
/// dropped.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    /// `(dx, dy, weight)` taps; `dy >= 0`, and `dx > 0` when `dy == 0`.
    pub entries: &'static [(i32, i32, u8)],
    /// Sum that the weights are normalized by.
    pub divisor: u8,
}

/// Floyd-Steinberg kernel.
///
/// ```text
///        X   7
///    3   5   1
/// ```
pub const FLOYD_STEINBERG: Kernel = Kernel {
    entries: &[
        (1, 0, 7),  // right
        (-1, 1, 3), // bottom-left
        (0, 1, 5),  // bottom
        (1, 1, 1),  // bottom-right
    ],
    divisor: 16,
};

/// Map `image` onto `palette` with Floyd-Steinberg error diffusion.
///
/// Alpha passes through unchanged. An empty palette leaves the image
/// unchanged.
#[must_use = "returns the dithered image"]
pub fn dither_to_palette(image: &RgbaImage, palette: &Palette) -> RgbaImage {
    dither_with_kernel(image, palette, &FLOYD_STEINBERG)
}

/// Map `image` onto `palette`, diffusing error with `kernel`.
#[must_use = "returns the dithered image"]
pub fn dither_with_kernel(image: &RgbaImage, palette: &Palette, kernel: &Kernel) -> RgbaImage {
    if palette.is_empty() {
        return image.clone();
    }

    let (w, h) = image.dimensions();
    let width = w as usize;
    let mut buffer: Vec<[f32; 3]> = image
        .pixels()
        .map(|p| [f32::from(p.0[0]), f32::from(p.0[1]), f32::from(p.0[2])])
        .collect();

    let divisor = f32::from(kernel.divisor);
    let mut out = image.clone();
    for y in 0..h {
        for x in 0..w {
            let i = y as usize * width + x as usize;
            let value = buffer[i].map(|v| v.clamp(0.0, 255.0));
            let chosen = nearest(palette, value);

            let pixel = out.get_pixel_mut(x, y);
            *pixel = chosen.with_alpha(pixel.0[3]);

            let chosen = chosen.channels();
            let error: [f32; 3] = std::array::from_fn(|c| value[c] - f32::from(chosen[c]));
            for &(dx, dy, weight) in kernel.entries {
                let (nx, ny) = (i64::from(x) + i64::from(dx), i64::from(y) + i64::from(dy));
                if nx < 0 || ny < 0 || nx >= i64::from(w) || ny >= i64::from(h) {
                    continue;
                }
                let share = f32::from(weight) / divisor;
                let target = &mut buffer[ny as usize * width + nx as usize];
                for (t, e) in target.iter_mut().zip(error) {
                    *t += e * share;
                }
            }
        }
    }
    out
}

/// Nearest palette entry to a fractional color, first entry on ties.
fn nearest(palette: &Palette, value: [f32; 3]) -> Rgb {
    let distance = |color: &Rgb| -> f32 {
        color
            .channels()
            .iter()
            .zip(value)
            .map(|(&c, v)| (f32::from(c) - v).powi(2))
            .sum()
    };
    let mut colors = palette.colors().iter();
    let Some(first) = colors.next() else {
        return Rgb::BLACK;
    };
    let mut best = (*first, distance(first));
    for color in colors {
        let d = distance(color);
        if d < best.1 {
            best = (*color, d);
        }
    }
    best.0
}

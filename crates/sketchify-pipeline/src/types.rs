//! Shared types for the sketchify image processing pipelines.

use std::fmt;

use image::error::{DecodingError, EncodingError, ImageFormatHint};
use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can hold rasters
/// without depending on `image` directly.
///
/// Every stage that produces pixels produces one of these: a row-major,
/// top-left-origin grid with four 8-bit samples per pixel.
pub use image::RgbaImage;

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a new color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The RGB part of an RGBA pixel, dropping alpha.
    #[must_use]
    pub const fn from_pixel(pixel: image::Rgba<u8>) -> Self {
        let [r, g, b, _] = pixel.0;
        Self { r, g, b }
    }

    /// This color as an RGBA pixel with the given alpha.
    #[must_use]
    pub const fn with_alpha(self, alpha: u8) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, alpha])
    }

    /// The channels as an array, in `[r, g, b]` order.
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Squared Euclidean distance to another color.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> u32 {
        self.channels()
            .iter()
            .zip(other.channels())
            .map(|(&a, b)| {
                let d = i32::from(a) - i32::from(b);
                d.unsigned_abs() * d.unsigned_abs()
            })
            .sum()
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing raster.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A binary foreground/background grid.
///
/// Row-major with the origin at the top-left, same as the raster it was
/// derived from. `true` is foreground (ink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// Create an all-background mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Create a mask by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let bits = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width,
            height,
            bits,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Width and height together.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Whether the pixel at `(x, y)` is foreground.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the mask.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[self.index(x, y)]
    }

    /// Set the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the mask.
    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        let i = self.index(x, y);
        self.bits[i] = foreground;
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn foreground_count(&self) -> u64 {
        self.bits.iter().map(|&b| u64::from(b)).sum()
    }

    /// Row-major view of all flags.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    /// Whether every foreground pixel of `self` is also foreground in
    /// `other`. Masks of different dimensions are never subsets.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.dimensions() == other.dimensions()
            && self
                .bits
                .iter()
                .zip(&other.bits)
                .all(|(&a, &b)| !a || b)
    }

    /// Wrap an existing row-major buffer. Callers guarantee the length.
    pub(crate) fn from_raw(width: u32, height: u32, bits: Vec<bool>) -> Self {
        debug_assert_eq!(
            u64::try_from(bits.len()).ok(),
            Some(Dimensions { width, height }.pixel_count())
        );
        Self {
            width,
            height,
            bits,
        }
    }

    const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Validated settings for the icon pipeline.
///
/// Produced by [`IconParams::resolve`](crate::params::IconParams::resolve);
/// the field types make out-of-range values unrepresentable except for
/// `stroke_px`, which the stroke stage clamps again on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconConfig {
    /// Luminance cutoff: pixels darker than this are ink.
    pub threshold: u8,
    /// Signed stroke adjustment in pixels, within
    /// `-MAX_STROKE_RADIUS..=MAX_STROKE_RADIUS`.
    pub stroke_px: i8,
    /// Ink color.
    pub fg: Rgb,
    /// Background color, or `None` for transparent.
    pub bg: Option<Rgb>,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            threshold: 200,
            stroke_px: 0,
            fg: Rgb::new(0x11, 0x11, 0x11),
            bg: None,
        }
    }
}

/// Validated settings for the pixelate pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelateConfig {
    /// Maximum number of palette entries, in `2..=32`.
    pub palette_size: u8,
    /// Edge length of one output block in source pixels, in `2..=32`.
    pub pixel_size: u32,
    /// Apply Floyd-Steinberg error diffusion while mapping to the palette.
    pub dither: bool,
    /// Replicate each block back to source resolution.
    pub upscale: bool,
}

impl Default for PixelateConfig {
    fn default() -> Self {
        Self {
            palette_size: 8,
            pixel_size: 8,
            dither: false,
            upscale: true,
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Everything except [`ImageEncode`](Self::ImageEncode) is a problem
/// with the upload and is reported back to the caller. An encode failure
/// on a raster the pipeline produced itself is a bug, so it gets its own
/// variant.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits; image errors are carried as their
/// `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image has zero width or height.
    #[error("decoded image has no pixels")]
    EmptyImage,

    /// The decoded image exceeds the pixel budget.
    #[error("image is {width}x{height}, exceeding the limit of {max_pixels} pixels")]
    ImageTooLarge {
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
        /// The configured pixel limit.
        max_pixels: u64,
    },

    /// Failed to encode an output raster.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),
}

impl PipelineError {
    /// Whether this error was caused by the uploaded bytes (as opposed to
    /// an internal encode failure).
    #[must_use]
    pub const fn is_decode_error(&self) -> bool {
        !matches!(self, Self::ImageEncode(_))
    }
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    EmptyImage,
    ImageTooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
    ImageEncode(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::EmptyImage => PipelineErrorProxy::EmptyImage,
            Self::ImageTooLarge {
                width,
                height,
                max_pixels,
            } => PipelineErrorProxy::ImageTooLarge {
                width: *width,
                height: *height,
                max_pixels: *max_pixels,
            },
            Self::ImageEncode(e) => PipelineErrorProxy::ImageEncode(e.to_string()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed source error is gone; keep its message.
            PipelineErrorProxy::ImageDecode(msg) => Self::ImageDecode(image::ImageError::Decoding(
                DecodingError::new(ImageFormatHint::Unknown, msg),
            )),
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::EmptyImage => Self::EmptyImage,
            PipelineErrorProxy::ImageTooLarge {
                width,
                height,
                max_pixels,
            } => Self::ImageTooLarge {
                width,
                height,
                max_pixels,
            },
            PipelineErrorProxy::ImageEncode(msg) => Self::ImageEncode(image::ImageError::Encoding(
                EncodingError::new(ImageFormatHint::Unknown, msg),
            )),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Rgb tests ---

    #[test]
    fn rgb_display_is_lowercase_hex() {
        assert_eq!(Rgb::new(0xAB, 0x01, 0xFF).to_string(), "#ab01ff");
    }

    #[test]
    fn rgb_distance_squared() {
        let a = Rgb::new(0, 0, 0);
        let b = Rgb::new(3, 4, 0);
        assert_eq!(a.distance_squared(b), 25);
        assert_eq!(b.distance_squared(a), 25);
        assert_eq!(Rgb::BLACK.distance_squared(Rgb::WHITE), 3 * 255 * 255);
    }

    #[test]
    fn rgb_pixel_conversion_drops_alpha() {
        let c = Rgb::from_pixel(image::Rgba([1, 2, 3, 4]));
        assert_eq!(c, Rgb::new(1, 2, 3));
        assert_eq!(c.with_alpha(255), image::Rgba([1, 2, 3, 255]));
    }

    // --- Mask tests ---

    #[test]
    fn new_mask_is_all_background() {
        let mask = Mask::new(7, 3);
        assert_eq!(mask.as_slice().len(), 21);
        assert_eq!(mask.foreground_count(), 0);
    }

    #[test]
    fn mask_from_fn_is_row_major() {
        let mask = Mask::from_fn(3, 2, |x, y| x == 2 && y == 1);
        assert_eq!(mask.as_slice(), &[false, false, false, false, false, true]);
        assert!(mask.get(2, 1));
        assert!(!mask.get(1, 1));
    }

    #[test]
    fn mask_set_and_count() {
        let mut mask = Mask::new(4, 4);
        mask.set(0, 0, true);
        mask.set(3, 3, true);
        mask.set(3, 3, true);
        assert_eq!(mask.foreground_count(), 2);
        mask.set(0, 0, false);
        assert_eq!(mask.foreground_count(), 1);
    }

    #[test]
    fn subset_requires_matching_dimensions() {
        let small = Mask::new(2, 2);
        let big = Mask::new(3, 3);
        assert!(!small.is_subset_of(&big));
        assert!(small.is_subset_of(&small.clone()));
    }

    #[test]
    fn subset_detects_extra_foreground() {
        let a = Mask::from_fn(3, 3, |x, y| x == 1 && y == 1);
        let b = Mask::from_fn(3, 3, |x, _| x == 1);
        assert!(a.is_subset_of(&b));
        assert!(!b.is_subset_of(&a));
    }

    // --- Config defaults ---

    #[test]
    fn icon_config_default_matches_boundary_defaults() {
        let config = IconConfig::default();
        assert_eq!(config.threshold, 200);
        assert_eq!(config.stroke_px, 0);
        assert_eq!(config.fg, Rgb::new(0x11, 0x11, 0x11));
        assert_eq!(config.bg, None);
    }

    #[test]
    fn pixelate_config_default() {
        let config = PixelateConfig::default();
        assert_eq!(config.palette_size, 8);
        assert_eq!(config.pixel_size, 8);
        assert!(!config.dither);
        assert!(config.upscale);
    }

    // --- PipelineError tests ---

    #[test]
    fn encode_error_is_not_a_decode_error() {
        let encode = PipelineError::ImageEncode(image::ImageError::Encoding(EncodingError::new(
            ImageFormatHint::Unknown,
            "boom",
        )));
        assert!(!encode.is_decode_error());
        assert!(PipelineError::EmptyInput.is_decode_error());
        assert!(
            PipelineError::ImageTooLarge {
                width: 1,
                height: 1,
                max_pixels: 0
            }
            .is_decode_error()
        );
    }

    #[test]
    fn error_serde_round_trip_keeps_message() {
        let err = PipelineError::ImageDecode(image::ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Unknown,
            "bad header",
        )));
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineError::ImageDecode(_)));
        assert!(back.to_string().contains("bad header"));
    }

    #[test]
    fn too_large_serde_round_trip() {
        let err = PipelineError::ImageTooLarge {
            width: 10,
            height: 20,
            max_pixels: 100,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            PipelineError::ImageTooLarge {
                width: 10,
                height: 20,
                max_pixels: 100
            }
        ));
    }
}

//! Image decoding and RGBA normalization.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an
//! 8-bit RGBA raster. This is the first step of both pipelines: raw
//! bytes in, `RgbaImage` out.
//!
//! The header is inspected before any pixel data is decoded, so an
//! oversized upload is rejected without allocating its pixel buffer.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageReader, Limits};

use crate::types::{Dimensions, PipelineError, RgbaImage};

/// Longest accepted image axis in pixels.
pub const MAX_DIMENSION: u32 = 8192;

/// Largest accepted `width * height` (4096²).
pub const MAX_PIXELS: u64 = 4096 * 4096;

/// Decode raw image bytes into an RGBA raster.
///
/// Sources without an alpha channel get alpha = 255 everywhere; grayscale
/// and 16-bit sources are converted to 8-bit RGBA.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the format is unrecognized,
/// the data is corrupt, or an axis exceeds [`MAX_DIMENSION`].
/// Returns [`PipelineError::ImageTooLarge`] if the pixel count exceeds
/// [`MAX_PIXELS`], and [`PipelineError::EmptyImage`] if it is zero.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::ImageDecode(image::ImageError::IoError(e)))?;
    reader.limits(limits);

    let decoder = reader.into_decoder().map_err(PipelineError::ImageDecode)?;
    let (width, height) = decoder.dimensions();
    check_pixel_budget(Dimensions { width, height }, MAX_PIXELS)?;

    let image = DynamicImage::from_decoder(decoder).map_err(PipelineError::ImageDecode)?;
    tracing::debug!(width, height, color = ?image.color(), "decoded image");
    Ok(image.to_rgba8())
}

/// Reject images with no pixels or more than `max_pixels` pixels.
fn check_pixel_budget(dimensions: Dimensions, max_pixels: u64) -> Result<(), PipelineError> {
    let count = dimensions.pixel_count();
    if count == 0 {
        return Err(PipelineError::EmptyImage);
    }
    if count > max_pixels {
        return Err(PipelineError::ImageTooLarge {
            width: dimensions.width,
            height: dimensions.height,
            max_pixels,
        });
    }
    Ok(())
}

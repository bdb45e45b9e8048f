//! PNG serialization of output rasters.
//!
//! PNG is lossless and stores straight (non-premultiplied) RGBA, so the
//! bytes decode back to exactly the raster that was encoded.

use image::ImageEncoder;
use image::codecs::png::PngEncoder;

use crate::types::{PipelineError, RgbaImage};

/// Encode an RGBA raster as PNG bytes.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the encoder rejects the
/// buffer. This does not happen for rasters built by the pipeline.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(PipelineError::ImageEncode)?;
    tracing::debug!(bytes = buf.len(), "encoded png");
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn output_is_png() {
        let img = RgbaImage::from_pixel(3, 3, image::Rgba([1, 2, 3, 4]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            image::ImageFormat::Png
        );
    }

    #[test]
    fn encoding_is_lossless() {
        // Transparent pixels keep their color channels too.
        let img = RgbaImage::from_fn(16, 9, |x, y| {
            image::Rgba([(x * 16) as u8, (y * 28) as u8, (x ^ y) as u8, (x * y) as u8])
        });
        let bytes = encode_png(&img).unwrap();
        let back = crate::decode::decode(&bytes).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn single_pixel_image_encodes() {
        let img = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 0]));
        assert!(!encode_png(&img).unwrap().is_empty());
    }
}

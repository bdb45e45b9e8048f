//! sketchify-pipeline: Pure image processing pipelines (sans-IO).
//!
//! Turns a hand-drawn sketch into one of two outputs:
//!
//! - **Icon**: decode -> binarize -> stroke adjust -> composite -> encode.
//!   Produces a flat two-color (or color-on-transparent) image.
//! - **Pixelate**: decode -> block downsample -> palette quantize
//!   (optionally dithered) -> optional block upscale -> encode.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and rasters and returns PNG bytes. Every call is an
//! independent pure function of its inputs, so calls may run on any
//! thread in parallel. Reading files and talking to users lives in the
//! `sketchify` binary.

pub mod binarize;
pub mod compose;
pub mod decode;
pub mod diagnostics;
pub mod dither;
pub mod downsample;
pub mod encode;
pub mod params;
pub mod quantize;
pub mod stroke;
pub mod types;

pub use params::{IconParams, InvalidColor, ParameterOutOfRange, PixelateParams};
pub use quantize::Palette;
pub use types::{
    Dimensions, IconConfig, Mask, PipelineError, PixelateConfig, Rgb, RgbaImage,
};

/// Run the icon pipeline on encoded image bytes.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and boundary parameters,
/// and returns PNG bytes of the same dimensions. Out-of-range parameters
/// are clamped and logged, never rejected.
///
/// # Pipeline steps
///
/// 1. Decode to RGBA
/// 2. Luminance threshold to an ink mask
/// 3. Dilate or erode the mask by `stroke_px`
/// 4. Paint ink and background colors
/// 5. Encode as PNG
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`], [`PipelineError::ImageDecode`],
/// [`PipelineError::EmptyImage`] or [`PipelineError::ImageTooLarge`] for
/// unusable uploads, and [`PipelineError::ImageEncode`] if encoding fails.
pub fn iconize(image_bytes: &[u8], params: &IconParams) -> Result<Vec<u8>, PipelineError> {
    let config = log_notices(params.resolve());
    let image = decode::decode(image_bytes)?;
    let icon = iconize_image(&image, &config);
    encode::encode_png(&icon)
}

/// Run the pixelate pipeline on encoded image bytes.
///
/// # Pipeline steps
///
/// 1. Decode to RGBA
/// 2. Average `pixel_size` blocks
/// 3. Build a palette of at most `palette_size` colors from the source
///    pixels and map every block to it, with Floyd-Steinberg dithering
///    if requested
/// 4. Optionally replicate blocks back to the source size
/// 5. Encode as PNG
///
/// # Errors
///
/// Same as [`iconize`].
pub fn pixelate(image_bytes: &[u8], params: &PixelateParams) -> Result<Vec<u8>, PipelineError> {
    let config = log_notices(params.resolve());
    let image = decode::decode(image_bytes)?;
    let pixelated = pixelate_image(&image, &config);
    encode::encode_png(&pixelated)
}

/// Icon pipeline on an already-decoded raster.
#[must_use = "returns the icon raster"]
pub fn iconize_image(image: &RgbaImage, config: &IconConfig) -> RgbaImage {
    let mask = binarize::binarize(image, config.threshold);
    let mask = stroke::adjust_stroke(&mask, i32::from(config.stroke_px));
    compose::compose_icon(&mask, config.fg, config.bg)
}

/// Pixelate pipeline on an already-decoded raster.
///
/// The output is `ceil(W/P) x ceil(H/P)`, or the source size when
/// `config.upscale` is set. The palette comes from the source pixels, so
/// blocks that straddle a color boundary snap to a source color instead
/// of adding their blend.
#[must_use = "returns the pixelated raster"]
pub fn pixelate_image(image: &RgbaImage, config: &PixelateConfig) -> RgbaImage {
    let small = downsample::block_average(image, config.pixel_size);
    let (quantized, _) = quantize_cells(image, &small, config);
    if config.upscale {
        downsample::upscale_nearest(&quantized, config.pixel_size, Dimensions::of(image))
    } else {
        quantized
    }
}

/// Build the palette from `source` and map the downsampled `cells` onto
/// it. Shared with the diagnostics runner.
pub(crate) fn quantize_cells(
    source: &RgbaImage,
    cells: &RgbaImage,
    config: &PixelateConfig,
) -> (RgbaImage, Palette) {
    let palette = quantize::build_palette(source, config.palette_size);
    let quantized = if config.dither {
        dither::dither_to_palette(cells, &palette)
    } else {
        quantize::map_to_palette(cells, &palette)
    };
    (quantized, palette)
}

/// Emit a warning per clamped parameter and hand back the config.
pub(crate) fn log_notices<C>((config, notices): (C, Vec<ParameterOutOfRange>)) -> C {
    for notice in &notices {
        tracing::warn!(
            parameter = notice.parameter,
            requested = %notice.requested,
            applied = %notice.applied,
            "parameter out of range, clamped"
        );
    }
    config
}

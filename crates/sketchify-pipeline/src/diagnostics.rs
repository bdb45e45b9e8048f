//! Pipeline diagnostics: timing and metrics for each stage.
//!
//! [`iconize_with_diagnostics`] and [`pixelate_with_diagnostics`] run
//! the same stages as [`crate::iconize`] and [`crate::pixelate`] while
//! recording how long each took and what it produced. They are intended
//! for parameter tuning and performance work.
//!
//! Time is read through the [`Clock`] trait so this crate never touches
//! a platform timer itself; the caller injects one.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::params::{IconParams, PixelateParams};
use crate::types::{Dimensions, PipelineError, Rgb, RgbaImage};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Which pipeline produced a set of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineKind {
    /// Binarize, stroke, composite.
    Icon,
    /// Downsample, quantize, upscale.
    Pixelate,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icon => f.write_str("Icon"),
            Self::Pixelate => f.write_str("Pixelate"),
        }
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Which pipeline ran.
    pub pipeline: PipelineKind,
    /// Stages in execution order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Input and output sizes.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
    },
    /// Luminance thresholding.
    Binarize {
        /// Threshold after clamping.
        threshold: u8,
        /// Ink pixels found.
        foreground_pixels: u64,
        /// Total pixels, for computing ink density.
        total_pixels: u64,
    },
    /// Dilation or erosion.
    Stroke {
        /// Signed radius after clamping.
        radius: i8,
        /// Ink pixels before adjustment.
        foreground_before: u64,
        /// Ink pixels after adjustment.
        foreground_after: u64,
    },
    /// Icon painting.
    Compose {
        /// Ink color.
        fg: Rgb,
        /// Background color, `None` for transparent.
        bg: Option<Rgb>,
    },
    /// Block averaging.
    Downsample {
        /// Block edge in pixels.
        block_size: u32,
        /// Output width in cells.
        width: u32,
        /// Output height in cells.
        height: u32,
    },
    /// Palette selection and mapping.
    Quantize {
        /// Palette size after clamping.
        requested: u8,
        /// Entries in the palette built from the source pixels.
        palette_entries: usize,
        /// Distinct colors in the quantized cells.
        distinct_colors: usize,
        /// Whether error diffusion was applied.
        dithered: bool,
    },
    /// Block replication back to source size.
    Upscale {
        /// Output width in pixels.
        width: u32,
        /// Output height in pixels.
        height: u32,
    },
    /// PNG encoding.
    Encode {
        /// Size of the PNG output.
        output_bytes: usize,
    },
}

impl StageMetrics {
    /// Human-readable stage name.
    #[must_use]
    pub const fn stage_name(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "Decode",
            Self::Binarize { .. } => "Binarize",
            Self::Stroke { .. } => "Stroke",
            Self::Compose { .. } => "Compose",
            Self::Downsample { .. } => "Downsample",
            Self::Quantize { .. } => "Quantize",
            Self::Upscale { .. } => "Upscale",
            Self::Encode { .. } => "Encode",
        }
    }
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Decoded source dimensions.
    pub input: Dimensions,
    /// Output raster dimensions.
    pub output: Dimensions,
    /// Size of the PNG output.
    pub output_bytes: usize,
}

/// Run the icon pipeline, returning PNG bytes and per-stage diagnostics.
///
/// # Errors
///
/// Same as [`crate::iconize`].
pub fn iconize_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    params: &IconParams,
    clock: &C,
) -> Result<(Vec<u8>, PipelineDiagnostics), PipelineError> {
    let config = crate::log_notices(params.resolve());
    let start = clock.now();
    let mut stages = Vec::with_capacity(5);

    let (image, duration) = timed(clock, || crate::decode::decode(image_bytes));
    let image = image?;
    let input = Dimensions::of(&image);
    stages.push(StageDiagnostics {
        duration,
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: input.width,
            height: input.height,
        },
    });

    let (mask, duration) = timed(clock, || crate::binarize::binarize(&image, config.threshold));
    let foreground_before = mask.foreground_count();
    stages.push(StageDiagnostics {
        duration,
        metrics: StageMetrics::Binarize {
            threshold: config.threshold,
            foreground_pixels: foreground_before,
            total_pixels: input.pixel_count(),
        },
    });

    let (mask, duration) = timed(clock, || {
        crate::stroke::adjust_stroke(&mask, i32::from(config.stroke_px))
    });
    stages.push(StageDiagnostics {
        duration,
        metrics: StageMetrics::Stroke {
            radius: config.stroke_px,
            foreground_before,
            foreground_after: mask.foreground_count(),
        },
    });

    let (icon, duration) = timed(clock, || {
        crate::compose::compose_icon(&mask, config.fg, config.bg)
    });
    stages.push(StageDiagnostics {
        duration,
        metrics: StageMetrics::Compose {
            fg: config.fg,
            bg: config.bg,
        },
    });

    finish(clock, &start, PipelineKind::Icon, stages, input, &icon)
}

/// Run the pixelate pipeline, returning PNG bytes and per-stage diagnostics.
///
/// # Errors
///
/// Same as [`crate::pixelate`].
pub fn pixelate_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    params: &PixelateParams,
    clock: &C,
) -> Result<(Vec<u8>, PipelineDiagnostics), PipelineError> {
    let config = crate::log_notices(params.resolve());
    let start = clock.now();
    let mut stages = Vec::with_capacity(5);

    let (image, duration) = timed(clock, || crate::decode::decode(image_bytes));
    let image = image?;
    let input = Dimensions::of(&image);
    stages.push(StageDiagnostics {
        duration,
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: input.width,
            height: input.height,
        },
    });

    let (small, duration) = timed(clock, || {
        crate::downsample::block_average(&image, config.pixel_size)
    });
    stages.push(StageDiagnostics {
        duration,
        metrics: StageMetrics::Downsample {
            block_size: config.pixel_size,
            width: small.width(),
            height: small.height(),
        },
    });

    let ((quantized, palette), duration) =
        timed(clock, || crate::quantize_cells(&image, &small, &config));
    stages.push(StageDiagnostics {
        duration,
        metrics: StageMetrics::Quantize {
            requested: config.palette_size,
            palette_entries: palette.len(),
            distinct_colors: count_distinct_rgb(&quantized),
            dithered: config.dither,
        },
    });

    let output = if config.upscale {
        let (big, duration) = timed(clock, || {
            crate::downsample::upscale_nearest(&quantized, config.pixel_size, input)
        });
        stages.push(StageDiagnostics {
            duration,
            metrics: StageMetrics::Upscale {
                width: big.width(),
                height: big.height(),
            },
        });
        big
    } else {
        quantized
    };

    finish(clock, &start, PipelineKind::Pixelate, stages, input, &output)
}

/// Encode the final raster and assemble the diagnostics.
fn finish<C: Clock>(
    clock: &C,
    start: &C::Instant,
    pipeline: PipelineKind,
    mut stages: Vec<StageDiagnostics>,
    input: Dimensions,
    output: &RgbaImage,
) -> Result<(Vec<u8>, PipelineDiagnostics), PipelineError> {
    let (bytes, duration) = timed(clock, || crate::encode::encode_png(output));
    let bytes = bytes?;
    stages.push(StageDiagnostics {
        duration,
        metrics: StageMetrics::Encode {
            output_bytes: bytes.len(),
        },
    });

    let diagnostics = PipelineDiagnostics {
        pipeline,
        stages,
        total_duration: clock.elapsed(start),
        summary: PipelineSummary {
            input,
            output: Dimensions::of(output),
            output_bytes: bytes.len(),
        },
    };
    Ok((bytes, diagnostics))
}

/// Run `f`, returning its result and how long it took.
fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

/// Number of distinct RGB triples in an image.
pub(crate) fn count_distinct_rgb(image: &RgbaImage) -> usize {
    image
        .pixels()
        .map(|p| Rgb::from_pixel(*p))
        .collect::<BTreeSet<_>>()
        .len()
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{} Pipeline Diagnostics\n{}",
            self.pipeline,
            "=".repeat(60)
        ));
        lines.push(format!(
            "Image: {} -> {} ({} bytes out)",
            self.summary.input, self.summary.output, self.summary.output_bytes,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        for stage in &self.stages {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let name = stage.metrics.stage_name();
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Binarize {
            threshold,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("T={threshold} ink={foreground_pixels} ({density:.1}%)")
        }
        StageMetrics::Stroke {
            radius,
            foreground_before,
            foreground_after,
        } => format!("r={radius:+} ink {foreground_before}->{foreground_after}"),
        StageMetrics::Compose { fg, bg } => match bg {
            Some(bg) => format!("fg={fg} bg={bg}"),
            None => format!("fg={fg} bg=transparent"),
        },
        StageMetrics::Downsample {
            block_size,
            width,
            height,
        } => format!("P={block_size} -> {width}x{height}"),
        StageMetrics::Quantize {
            requested,
            palette_entries,
            distinct_colors,
            dithered,
        } => {
            let mode = if *dithered { "dithered" } else { "nearest" };
            format!("K={requested} palette={palette_entries} used={distinct_colors} {mode}")
        }
        StageMetrics::Upscale { width, height } => format!("-> {width}x{height}"),
        StageMetrics::Encode { output_bytes } => format!("{output_bytes} bytes"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.0.get() - since)
        }
    }

    fn sketch_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(20, 20, |x, y| {
            if (5..15).contains(&x) && (5..15).contains(&y) {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        crate::encode::encode_png(&img).unwrap()
    }

    fn names(d: &PipelineDiagnostics) -> Vec<&'static str> {
        d.stages.iter().map(|s| s.metrics.stage_name()).collect()
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn icon_diagnostics_cover_every_stage() {
        let clock = TickClock(Cell::new(0));
        let params = IconParams {
            stroke_px: 1,
            ..IconParams::default()
        };
        let (bytes, diag) = iconize_with_diagnostics(&sketch_png(), &params, &clock).unwrap();
        assert_eq!(names(&diag), ["Decode", "Binarize", "Stroke", "Compose", "Encode"]);
        assert_eq!(diag.pipeline, PipelineKind::Icon);
        assert_eq!(diag.summary.output_bytes, bytes.len());
        assert!(diag.total_duration > Duration::ZERO);
        assert!(matches!(
            diag.stages[2].metrics,
            StageMetrics::Stroke {
                radius: 1,
                foreground_before: 100,
                foreground_after: 144,
            }
        ));
    }

    #[test]
    fn icon_diagnostics_match_plain_pipeline() {
        let clock = TickClock(Cell::new(0));
        let png = sketch_png();
        let params = IconParams::default();
        let (bytes, _) = iconize_with_diagnostics(&png, &params, &clock).unwrap();
        assert_eq!(bytes, crate::iconize(&png, &params).unwrap());
    }

    #[test]
    fn pixelate_diagnostics_skip_upscale_when_disabled() {
        let clock = TickClock(Cell::new(0));
        let params = PixelateParams {
            upscale: false,
            pixel_size: 4,
            ..PixelateParams::default()
        };
        let (_, diag) = pixelate_with_diagnostics(&sketch_png(), &params, &clock).unwrap();
        assert_eq!(names(&diag), ["Decode", "Downsample", "Quantize", "Encode"]);
        assert_eq!(
            diag.summary.output,
            Dimensions {
                width: 5,
                height: 5
            }
        );
    }

    #[test]
    fn quantize_reports_palette_built_from_source() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            pixelate_with_diagnostics(&sketch_png(), &PixelateParams::default(), &clock).unwrap();
        let quantize = diag
            .stages
            .iter()
            .find(|s| s.metrics.stage_name() == "Quantize")
            .unwrap();
        // Black and white only, even though 8px cells straddle the square.
        assert!(matches!(
            quantize.metrics,
            StageMetrics::Quantize {
                requested: 8,
                palette_entries: 2,
                distinct_colors: 2,
                dithered: false,
            }
        ));
        assert!(diag.report().contains("palette=2"));
    }

    #[test]
    fn pixelate_diagnostics_match_plain_pipeline() {
        let clock = TickClock(Cell::new(0));
        let png = sketch_png();
        let params = PixelateParams {
            dither: true,
            pixel_size: 3,
            ..PixelateParams::default()
        };
        let (bytes, diag) = pixelate_with_diagnostics(&png, &params, &clock).unwrap();
        assert_eq!(bytes, crate::pixelate(&png, &params).unwrap());
        assert!(names(&diag).contains(&"Upscale"));
    }

    #[test]
    fn decode_failure_propagates() {
        let clock = TickClock(Cell::new(0));
        let result = iconize_with_diagnostics(&[1, 2, 3], &IconParams::default(), &clock);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn report_lists_stages() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            pixelate_with_diagnostics(&sketch_png(), &PixelateParams::default(), &clock).unwrap();
        let report = diag.report();
        assert!(report.contains("Pixelate Pipeline Diagnostics"));
        assert!(report.contains("Downsample"));
        assert!(report.contains("K=8"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            iconize_with_diagnostics(&sketch_png(), &IconParams::default(), &clock).unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json["total_duration"].is_f64());
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.stages.len(), diag.stages.len());
    }

    #[test]
    fn count_distinct_rgb_ignores_alpha() {
        let img = RgbaImage::from_fn(3, 1, |x, _| image::Rgba([1, 2, 3, x as u8]));
        assert_eq!(count_distinct_rgb(&img), 1);
    }
}

//! sketchify: turn a hand-drawn sketch into an icon or pixel art.
//!
//! Reads an image file, runs one of the two pipelines from
//! `sketchify-pipeline` and writes the resulting PNG. Optionally prints
//! per-stage timing diagnostics.
//!
//! # Usage
//!
//! ```text
//! sketchify icon sketch.jpg -o icon.png --fg-color '#ff0000' --stroke-px 2
//! sketchify pixelate photo.png -o pixels.png --palette-size 16 --dither
//! ```
//!
//! Logging goes to stderr and honors `RUST_LOG`.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use sketchify_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use sketchify_pipeline::{IconParams, PipelineError, PixelateParams};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Turn sketches into flat icons or pixel art.
#[derive(Parser)]
#[command(name = "sketchify", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Threshold the sketch and repaint it as a two-color icon.
    Icon(IconArgs),
    /// Reduce the image to a coarse grid of palette colors.
    Pixelate(PixelateArgs),
}

/// Arguments shared by both subcommands.
#[derive(Args)]
struct Common {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Where to write the PNG result.
    #[arg(short, long)]
    output: PathBuf,

    /// Print per-stage timing diagnostics to stdout.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics and errors as JSON.
    #[arg(long)]
    json: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args)]
struct IconArgs {
    #[command(flatten)]
    common: Common,

    /// Luminance threshold (0-255); darker pixels become ink.
    #[arg(long, default_value_t = IconParams::DEFAULT_THRESHOLD, allow_negative_numbers = true)]
    threshold: i64,

    /// Grow (positive) or shrink (negative) strokes by this many pixels.
    #[arg(long, default_value_t = IconParams::DEFAULT_STROKE_PX, allow_negative_numbers = true)]
    stroke_px: i64,

    /// Ink color as #RGB or #RRGGBB.
    #[arg(long, default_value = IconParams::DEFAULT_FG_COLOR)]
    fg_color: String,

    /// Background color, or empty / `transparent` for none.
    #[arg(long, default_value = IconParams::DEFAULT_BG_COLOR)]
    bg_color: String,

    /// Full icon parameters as a JSON string.
    ///
    /// When provided, the individual parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    params_json: Option<String>,
}

#[derive(Args)]
struct PixelateArgs {
    #[command(flatten)]
    common: Common,

    /// Maximum number of palette colors (2-32).
    #[arg(
        long,
        default_value_t = PixelateParams::DEFAULT_PALETTE_SIZE,
        allow_negative_numbers = true
    )]
    palette_size: i64,

    /// Edge length of each output block in source pixels (2-32).
    #[arg(
        long,
        default_value_t = PixelateParams::DEFAULT_PIXEL_SIZE,
        allow_negative_numbers = true
    )]
    pixel_size: i64,

    /// Apply Floyd-Steinberg dithering.
    #[arg(long)]
    dither: bool,

    /// Keep the small block grid instead of scaling back to source size.
    #[arg(long)]
    no_upscale: bool,

    /// Full pixelate parameters as a JSON string.
    ///
    /// When provided, the individual parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    params_json: Option<String>,
}

impl IconArgs {
    /// Build [`IconParams`] from the flags or from `--params-json`.
    fn params(&self) -> Result<IconParams, String> {
        if let Some(ref json) = self.params_json {
            return serde_json::from_str(json).map_err(|e| format!("invalid --params-json: {e}"));
        }
        Ok(IconParams {
            threshold: self.threshold,
            stroke_px: self.stroke_px,
            fg_color: self.fg_color.clone(),
            bg_color: self.bg_color.clone(),
        })
    }
}

impl PixelateArgs {
    /// Build [`PixelateParams`] from the flags or from `--params-json`.
    fn params(&self) -> Result<PixelateParams, String> {
        if let Some(ref json) = self.params_json {
            return serde_json::from_str(json).map_err(|e| format!("invalid --params-json: {e}"));
        }
        Ok(PixelateParams {
            palette_size: self.palette_size,
            pixel_size: self.pixel_size,
            dither: self.dither,
            upscale: !self.no_upscale,
        })
    }
}

impl Command {
    const fn common(&self) -> &Common {
        match self {
            Self::Icon(args) => &args.common,
            Self::Pixelate(args) => &args.common,
        }
    }
}

/// Install the global tracing subscriber.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "sketchify=debug,sketchify_pipeline=debug"
    } else {
        "sketchify=info,sketchify_pipeline=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let common = cli.command.common();
    init_tracing(common.verbose);

    let image_bytes = match std::fs::read(&common.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(path = %common.input.display(), error = %e, "cannot read input");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        path = %common.input.display(),
        bytes = image_bytes.len(),
        "read input",
    );

    let result = match &cli.command {
        Command::Icon(args) => args.params().map(|params| {
            run(common, |clock| {
                if common.diagnostics {
                    sketchify_pipeline::diagnostics::iconize_with_diagnostics(
                        &image_bytes,
                        &params,
                        clock,
                    )
                    .map(|(png, d)| (png, Some(d)))
                } else {
                    sketchify_pipeline::iconize(&image_bytes, &params).map(|png| (png, None))
                }
            })
        }),
        Command::Pixelate(args) => args.params().map(|params| {
            run(common, |clock| {
                if common.diagnostics {
                    sketchify_pipeline::diagnostics::pixelate_with_diagnostics(
                        &image_bytes,
                        &params,
                        clock,
                    )
                    .map(|(png, d)| (png, Some(d)))
                } else {
                    sketchify_pipeline::pixelate(&image_bytes, &params).map(|png| (png, None))
                }
            })
        }),
    };

    match result {
        Ok(code) => code,
        Err(msg) => {
            tracing::error!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// Output of one pipeline invocation.
type PipelineOutput = Result<(Vec<u8>, Option<PipelineDiagnostics>), PipelineError>;

/// Run a pipeline, write its PNG and print diagnostics if requested.
fn run(common: &Common, pipeline: impl FnOnce(&StdClock) -> PipelineOutput) -> ExitCode {
    let (png, diagnostics) = match pipeline(&StdClock) {
        Ok(output) => output,
        Err(e) => {
            if common.json {
                match error_json(&e) {
                    Ok(json) => println!("{json}"),
                    Err(se) => tracing::error!(error = %se, "cannot serialize error"),
                }
            }
            tracing::error!(error = %e, decode = e.is_decode_error(), "pipeline failed");
            return ExitCode::FAILURE;
        }
    };

    if let Some(diagnostics) = diagnostics {
        if common.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    tracing::error!(error = %e, "cannot serialize diagnostics");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }
    }

    if let Err(e) = std::fs::write(&common.output, &png) {
        tracing::error!(path = %common.output.display(), error = %e, "cannot write output");
        return ExitCode::FAILURE;
    }
    tracing::info!(
        path = %common.output.display(),
        bytes = png.len(),
        "wrote output",
    );
    ExitCode::SUCCESS
}

/// Render a pipeline error as `{"error": ...}`.
fn error_json(error: &PipelineError) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({ "error": error }))
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

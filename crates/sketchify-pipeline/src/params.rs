//! Boundary parameters and their resolution into validated configs.
//!
//! The front end hands over whatever the user typed: wide integers and
//! color strings. Resolution is permissive. Out-of-range numbers are
//! clamped to the nearest bound and unparseable colors fall back to a
//! default; every such change is reported as a [`ParameterOutOfRange`]
//! notice instead of failing the request.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::downsample::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::quantize::{MAX_PALETTE_SIZE, MIN_PALETTE_SIZE};
use crate::stroke::MAX_STROKE_RADIUS;
use crate::types::{IconConfig, PixelateConfig, Rgb};

/// A parameter value that was clamped or replaced during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{parameter} = {requested:?} is out of range, using {applied}")]
pub struct ParameterOutOfRange {
    /// Boundary field name.
    pub parameter: &'static str,
    /// The value as supplied.
    pub requested: String,
    /// The value actually used.
    pub applied: String,
}

/// A string that is not a `#RGB` or `#RRGGBB` color.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}: expected #RGB or #RRGGBB")]
pub struct InvalidColor(pub String);

impl FromStr for Rgb {
    type Err = InvalidColor;

    /// Parse `#RRGGBB` or `#RGB`, case-insensitive, `#` optional,
    /// surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidColor(s.to_owned());
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            // Each short digit doubles: "f" -> "ff".
            3 => Ok(Self::new(
                channel(&hex[0..1])? * 17,
                channel(&hex[1..2])? * 17,
                channel(&hex[2..3])? * 17,
            )),
            _ => Err(invalid()),
        }
    }
}

/// Parse a foreground color.
///
/// # Errors
///
/// Returns [`InvalidColor`] if `s` is not `#RGB` or `#RRGGBB`.
pub fn parse_color(s: &str) -> Result<Rgb, InvalidColor> {
    s.parse()
}

/// Parse a background color. An empty string or `transparent` (any
/// case) means no background.
///
/// # Errors
///
/// Returns [`InvalidColor`] if the string is neither empty, `transparent`,
/// nor a valid color.
pub fn parse_background(s: &str) -> Result<Option<Rgb>, InvalidColor> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("transparent") {
        return Ok(None);
    }
    trimmed.parse().map(Some)
}

/// Raw parameters for the icon pipeline, as received from the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconParams {
    /// Luminance threshold, valid range `0..=255`.
    pub threshold: i64,
    /// Stroke adjustment in pixels, valid range `-8..=8`.
    pub stroke_px: i64,
    /// Foreground color as hex.
    pub fg_color: String,
    /// Background color as hex, or empty / `transparent`.
    pub bg_color: String,
}

impl IconParams {
    /// Default luminance threshold.
    pub const DEFAULT_THRESHOLD: i64 = 200;
    /// Default stroke adjustment.
    pub const DEFAULT_STROKE_PX: i64 = 0;
    /// Default foreground color.
    pub const DEFAULT_FG_COLOR: &'static str = "#111111";
    /// Default background (transparent).
    pub const DEFAULT_BG_COLOR: &'static str = "";

    /// Clamp and parse into an [`IconConfig`], reporting every value
    /// that had to change.
    #[must_use]
    pub fn resolve(&self) -> (IconConfig, Vec<ParameterOutOfRange>) {
        let mut notices = Vec::new();
        let defaults = IconConfig::default();

        let threshold = clamp_reported("threshold", self.threshold, 0, 255, &mut notices);
        let stroke_px = clamp_reported(
            "stroke_px",
            self.stroke_px,
            -i64::from(MAX_STROKE_RADIUS),
            i64::from(MAX_STROKE_RADIUS),
            &mut notices,
        );

        let fg = parse_color(&self.fg_color).unwrap_or_else(|_| {
            notices.push(ParameterOutOfRange {
                parameter: "fg_color",
                requested: self.fg_color.clone(),
                applied: defaults.fg.to_string(),
            });
            defaults.fg
        });

        let bg = parse_background(&self.bg_color).unwrap_or_else(|_| {
            notices.push(ParameterOutOfRange {
                parameter: "bg_color",
                requested: self.bg_color.clone(),
                applied: "transparent".to_owned(),
            });
            None
        });

        let config = IconConfig {
            threshold: u8::try_from(threshold).unwrap_or(defaults.threshold),
            stroke_px: i8::try_from(stroke_px).unwrap_or(defaults.stroke_px),
            fg,
            bg,
        };
        (config, notices)
    }
}

impl Default for IconParams {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            stroke_px: Self::DEFAULT_STROKE_PX,
            fg_color: Self::DEFAULT_FG_COLOR.to_owned(),
            bg_color: Self::DEFAULT_BG_COLOR.to_owned(),
        }
    }
}

/// Raw parameters for the pixelate pipeline, as received from the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelateParams {
    /// Palette size, valid range `2..=32`.
    pub palette_size: i64,
    /// Block edge in pixels, valid range `2..=32`.
    pub pixel_size: i64,
    /// Apply Floyd-Steinberg dithering.
    pub dither: bool,
    /// Blow the result back up to the source size.
    pub upscale: bool,
}

impl PixelateParams {
    /// Default palette size.
    pub const DEFAULT_PALETTE_SIZE: i64 = 8;
    /// Default block edge.
    pub const DEFAULT_PIXEL_SIZE: i64 = 8;
    /// Dithering is off by default.
    pub const DEFAULT_DITHER: bool = false;
    /// Upscaling is on by default.
    pub const DEFAULT_UPSCALE: bool = true;

    /// Clamp into a [`PixelateConfig`], reporting every value that had to
    /// change.
    #[must_use]
    pub fn resolve(&self) -> (PixelateConfig, Vec<ParameterOutOfRange>) {
        let mut notices = Vec::new();
        let defaults = PixelateConfig::default();

        let palette_size = clamp_reported(
            "palette_size",
            self.palette_size,
            i64::from(MIN_PALETTE_SIZE),
            i64::from(MAX_PALETTE_SIZE),
            &mut notices,
        );
        let pixel_size = clamp_reported(
            "pixel_size",
            self.pixel_size,
            i64::from(MIN_BLOCK_SIZE),
            i64::from(MAX_BLOCK_SIZE),
            &mut notices,
        );

        let config = PixelateConfig {
            palette_size: u8::try_from(palette_size).unwrap_or(defaults.palette_size),
            pixel_size: u32::try_from(pixel_size).unwrap_or(defaults.pixel_size),
            dither: self.dither,
            upscale: self.upscale,
        };
        (config, notices)
    }
}

impl Default for PixelateParams {
    fn default() -> Self {
        Self {
            palette_size: Self::DEFAULT_PALETTE_SIZE,
            pixel_size: Self::DEFAULT_PIXEL_SIZE,
            dither: Self::DEFAULT_DITHER,
            upscale: Self::DEFAULT_UPSCALE,
        }
    }
}

fn clamp_reported(
    parameter: &'static str,
    value: i64,
    min: i64,
    max: i64,
    notices: &mut Vec<ParameterOutOfRange>,
) -> i64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        notices.push(ParameterOutOfRange {
            parameter,
            requested: value.to_string(),
            applied: clamped.to_string(),
        });
    }
    clamped
}

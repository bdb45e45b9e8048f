//! Palette selection (weighted median cut) and nearest-color mapping.
//!
//! The palette is built from an RGB histogram of the image. When the
//! image already has at most `K` distinct colors those colors are the
//! palette, so quantization is lossless. Otherwise the color cube is cut
//! repeatedly:
//!
//! 1. Pick the box whose widest channel range is largest (ties: larger
//!    pixel population, then earlier box).
//! 2. Sort its colors along that channel and split at the weighted
//!    median, so both halves hold about the same number of pixels.
//! 3. Stop at `K` boxes or when no box has two distinct colors left.
//!
//! Each box contributes its population-weighted mean color. The histogram
//! is a `BTreeMap`, so the same image always yields the same palette.
//!
//! Fully transparent pixels do not vote: a drawing on a transparent
//! canvas would otherwise spend an entry on the invisible `(0, 0, 0)`.

use std::collections::BTreeMap;

use crate::types::{Rgb, RgbaImage};

/// Smallest accepted palette size.
pub const MIN_PALETTE_SIZE: u8 = 2;

/// Largest accepted palette size.
pub const MAX_PALETTE_SIZE: u8 = 32;

/// An ordered set of distinct colors.
///
/// Order matters: when two entries are equally close to a color, the
/// earlier one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette(Vec<Rgb>);

impl Palette {
    /// Create a palette, dropping repeated colors (the first occurrence
    /// keeps its position).
    #[must_use]
    pub fn new(colors: impl IntoIterator<Item = Rgb>) -> Self {
        let mut distinct: Vec<Rgb> = Vec::new();
        for color in colors {
            if !distinct.contains(&color) {
                distinct.push(color);
            }
        }
        Self(distinct)
    }

    /// The entries in insertion order.
    #[must_use]
    pub fn colors(&self) -> &[Rgb] {
        &self.0
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the palette has no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The entry closest to `color` by Euclidean RGB distance, first entry
    /// on ties. `None` only for an empty palette.
    #[must_use]
    pub fn nearest(&self, color: Rgb) -> Option<Rgb> {
        let mut best: Option<(Rgb, u32)> = None;
        for &entry in &self.0 {
            let d = entry.distance_squared(color);
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((entry, d));
            }
        }
        best.map(|(entry, _)| entry)
    }
}

/// Choose at most `palette_size` representative colors for `image`.
///
/// `palette_size` is clamped to `MIN_PALETTE_SIZE..=MAX_PALETTE_SIZE`.
/// An image without pixels yields an empty palette.
#[must_use = "returns the palette"]
pub fn build_palette(image: &RgbaImage, palette_size: u8) -> Palette {
    let k = usize::from(palette_size.clamp(MIN_PALETTE_SIZE, MAX_PALETTE_SIZE));
    let histogram = histogram(image);

    let palette = if histogram.len() <= k {
        let mut by_frequency = histogram;
        // Stable sort keeps the BTreeMap order among equal counts.
        by_frequency.sort_by(|a, b| b.1.cmp(&a.1));
        Palette::new(by_frequency.into_iter().map(|(color, _)| color))
    } else {
        median_cut(histogram, k)
    };
    tracing::debug!(
        requested = k,
        entries = palette.len(),
        "built palette"
    );
    palette
}

/// Replace every pixel's RGB with its nearest palette entry. Alpha is
/// kept as is. An empty palette leaves the image unchanged.
#[must_use = "returns the quantized image"]
pub fn map_to_palette(image: &RgbaImage, palette: &Palette) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        if let Some(entry) = palette.nearest(Rgb::from_pixel(*pixel)) {
            *pixel = entry.with_alpha(pixel.0[3]);
        }
    }
    out
}

/// Count the pixels of each RGB color, ignoring fully transparent pixels
/// unless nothing else is left.
fn histogram(image: &RgbaImage) -> Vec<(Rgb, u64)> {
    let count = |visible_only: bool| {
        let mut counts: BTreeMap<Rgb, u64> = BTreeMap::new();
        for pixel in image.pixels().filter(|p| !visible_only || p.0[3] != 0) {
            *counts.entry(Rgb::from_pixel(*pixel)).or_insert(0) += 1;
        }
        counts
    };

    let mut counts = count(true);
    if counts.is_empty() {
        counts = count(false);
    }
    counts.into_iter().collect()
}

fn median_cut(histogram: Vec<(Rgb, u64)>, k: usize) -> Palette {
    let mut boxes = vec![ColorBox::new(histogram)];

    while boxes.len() < k {
        let mut pick: Option<(usize, (u8, u64))> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.entries.len() < 2 {
                continue;
            }
            let key = (b.widest_channel().1, b.population);
            if pick.is_none_or(|(_, best)| key > best) {
                pick = Some((i, key));
            }
        }
        let Some((i, _)) = pick else {
            break;
        };

        let (low, high) = boxes.remove(i).split();
        boxes.insert(i, high);
        boxes.insert(i, low);
    }

    Palette::new(boxes.iter().map(ColorBox::mean))
}

/// A region of color space, holding the histogram entries inside it.
#[derive(Debug)]
struct ColorBox {
    entries: Vec<(Rgb, u64)>,
    population: u64,
}

impl ColorBox {
    fn new(entries: Vec<(Rgb, u64)>) -> Self {
        let population = entries.iter().map(|&(_, n)| n).sum();
        Self {
            entries,
            population,
        }
    }

    /// The channel with the largest spread, and that spread.
    ///
    /// Channels are compared in R, G, B order; the first maximum wins.
    fn widest_channel(&self) -> (usize, u8) {
        let mut widest = (0, 0);
        for channel in 0..3 {
            let values = self.entries.iter().map(|(c, _)| c.channels()[channel]);
            let lo = values.clone().min().unwrap_or(0);
            let hi = values.max().unwrap_or(0);
            if hi - lo > widest.1 {
                widest = (channel, hi - lo);
            }
        }
        widest
    }

    /// Split at the weighted median of the widest channel. Both halves
    /// are non-empty; callers only split boxes with two or more entries.
    fn split(mut self) -> (Self, Self) {
        let (channel, _) = self.widest_channel();
        self.entries
            .sort_by_key(|&(color, _)| (color.channels()[channel], color));

        let half = self.population.div_ceil(2);
        let mut running = 0;
        let mut at = self.entries.len();
        for (i, &(_, n)) in self.entries.iter().enumerate() {
            running += n;
            if running >= half {
                at = i + 1;
                break;
            }
        }
        let at = at.clamp(1, self.entries.len() - 1);

        let high = self.entries.split_off(at);
        (Self::new(self.entries), Self::new(high))
    }

    /// Population-weighted mean color, rounded to nearest.
    fn mean(&self) -> Rgb {
        let mut sums = [0u64; 3];
        for &(color, n) in &self.entries {
            for (sum, value) in sums.iter_mut().zip(color.channels()) {
                *sum += u64::from(value) * n;
            }
        }
        let total = self.population.max(1);
        Rgb::from(sums.map(|s| u8::try_from((s + total / 2) / total).unwrap_or(u8::MAX)))
    }
}

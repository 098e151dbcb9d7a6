//! Color sampling: walks an image at an adaptive stride and builds a
//! frequency histogram over a reduced color space.

use crate::types::pack_srgb;
use image::{imageops, RgbImage};
use palette::Srgb;
use std::collections::HashMap;
use tracing::debug;

/// The default number of quantization levels per channel used when sampling.
pub const DEFAULT_LEVELS: u32 = 8;

/// A frequency histogram over quantized colors.
///
/// Entries keep the order in which their colors were first seen. That order
/// is load-bearing: the naive generator uses it to break frequency ties and
/// the k-means generator takes its point cap in it, so two identical sampling
/// walks always produce identical downstream palettes.
///
/// Built once by a sampling pass and treated as immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct ColorHistogram {
    /// Distinct quantized colors in first-seen order.
    colors: Vec<Srgb<u8>>,
    /// Occurrence count per color, parallel to `colors`.
    counts: Vec<u32>,
    /// Packed color key → index into the parallel vectors.
    index: HashMap<u32, u32>,
}

impl ColorHistogram {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a histogram by counting the given colors as-is
    /// (no quantization), preserving first-seen order.
    pub fn from_colors(colors: impl IntoIterator<Item = Srgb<u8>>) -> Self {
        let mut histogram = Self::new();
        for color in colors {
            histogram.bump(color);
        }
        histogram
    }

    /// Increments the bucket for `color`, creating it if needed.
    fn bump(&mut self, color: Srgb<u8>) {
        #[allow(clippy::cast_possible_truncation)]
        let next = self.colors.len() as u32;
        let slot = *self.index.entry(pack_srgb(color)).or_insert(next);
        if slot == next {
            self.colors.push(color);
            self.counts.push(1);
        } else {
            self.counts[slot as usize] += 1;
        }
    }

    /// The number of distinct colors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether the histogram has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// The distinct colors in first-seen order.
    #[must_use]
    pub fn colors(&self) -> &[Srgb<u8>] {
        &self.colors
    }

    /// The occurrence counts, parallel to [`ColorHistogram::colors`].
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// The sum of all occurrence counts.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.counts.iter().copied().map(u64::from).sum()
    }

    /// Iterates over `(color, count)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (Srgb<u8>, u32)> + '_ {
        self.colors.iter().copied().zip(self.counts.iter().copied())
    }
}

/// Floors each channel to a multiple of `256 / levels`, grouping nearby
/// shades into one bucket. For the default 8 levels every channel lands in
/// `{0, 32, 64, ..., 224}`.
#[must_use]
pub fn quantize_color(color: Srgb<u8>, levels: u32) -> Srgb<u8> {
    let factor = (256 / levels.max(1)).max(1);
    let floor = |c: u8| {
        #[allow(clippy::cast_possible_truncation)]
        {
            ((u32::from(c) / factor) * factor) as u8
        }
    };
    Srgb::new(floor(color.red), floor(color.green), floor(color.blue))
}

/// The sampling stride for an image of the given dimensions.
///
/// Larger images are sampled more sparsely, keeping the total number of
/// visited pixels roughly constant across resolutions.
fn sampling_stride(width: u32, height: u32) -> u32 {
    let area = f64::from(width) * f64::from(height);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        ((area.sqrt() / 100.0).floor() as u32).max(1)
    }
}

/// Samples `image` with the default [`DEFAULT_LEVELS`] quantization.
#[must_use]
pub fn sample(image: &RgbImage) -> ColorHistogram {
    sample_with_levels(image, DEFAULT_LEVELS)
}

/// Walks `image` at an adaptive stride, quantizes each visited pixel to
/// `levels` per channel, and counts the results.
#[must_use]
pub fn sample_with_levels(image: &RgbImage, levels: u32) -> ColorHistogram {
    let (width, height) = image.dimensions();
    let stride = sampling_stride(width, height);
    debug!(width, height, stride, levels, "sampling image colors");

    let mut histogram = ColorHistogram::new();
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let pixel = image.get_pixel(x, y).0;
            let color = quantize_color(Srgb::new(pixel[0], pixel[1], pixel[2]), levels);
            histogram.bump(color);
            x += stride;
        }
        y += stride;
    }
    histogram
}

/// Downsamples `image` so neither dimension exceeds `max_dim`, preserving
/// aspect ratio (scaled dimension rounded to the nearest pixel). Images that
/// already fit are returned unchanged.
///
/// A purely geometric resampling helper for cheaper color analysis; the
/// recolorer still runs at full resolution.
#[must_use]
pub fn resize_for_analysis(image: &RgbImage, max_dim: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width <= max_dim && height <= max_dim {
        return image.clone();
    }

    let scaled = |side: u32, other: u32| {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            ((f64::from(side) * f64::from(max_dim) / f64::from(other)).round() as u32).max(1)
        }
    };
    let (new_width, new_height) = if width > height {
        (max_dim, scaled(height, width))
    } else {
        (scaled(width, height), max_dim)
    };

    debug!(width, height, new_width, new_height, "resizing for analysis");
    imageops::resize(image, new_width, new_height, imageops::FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn quantized_channels_are_bucket_multiples() {
        for color in test_colors_256() {
            let q = quantize_color(color, 8);
            for c in [q.red, q.green, q.blue] {
                assert_eq!(c % 32, 0);
                assert!(c <= 224);
            }
        }
    }

    #[test]
    fn flat_image_collapses_to_one_bucket() {
        let histogram = sample(&flat_image(40, 30, [200, 100, 50]));
        assert_eq!(histogram.len(), 1);
        assert_eq!(histogram.colors()[0], quantize_color(Srgb::new(200, 100, 50), 8));
        assert_eq!(histogram.total_count(), 40 * 30);
    }

    #[test]
    fn stride_bounds_sample_count() {
        // 500x500 => stride 5 => 100x100 visited pixels.
        let histogram = sample(&flat_image(500, 500, [0, 0, 0]));
        assert_eq!(histogram.total_count(), 100 * 100);
    }

    #[test]
    fn small_images_are_sampled_exhaustively() {
        let img = test_image(64, 64, 7);
        let histogram = sample(&img);
        assert_eq!(histogram.total_count(), 64 * 64);
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, image::Rgb([250, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([0, 250, 0]));
        img.put_pixel(2, 0, image::Rgb([255, 0, 0])); // same bucket as pixel 0

        let histogram = sample(&img);
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram.colors()[0], Srgb::new(224, 0, 0));
        assert_eq!(histogram.colors()[1], Srgb::new(0, 224, 0));
        assert_eq!(histogram.counts(), &[2, 1]);
    }

    #[test]
    fn from_colors_counts_duplicates() {
        let histogram = ColorHistogram::from_colors([
            Srgb::new(1, 2, 3),
            Srgb::new(4, 5, 6),
            Srgb::new(1, 2, 3),
        ]);
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram.counts(), &[2, 1]);
    }

    #[test]
    fn empty_image_yields_empty_histogram() {
        let histogram = sample(&RgbImage::new(0, 0));
        assert!(histogram.is_empty());
        assert_eq!(histogram.total_count(), 0);
    }

    #[test]
    fn resize_caps_the_longest_side() {
        let resized = resize_for_analysis(&flat_image(800, 400, [1, 2, 3]), 400);
        assert_eq!(resized.dimensions(), (400, 200));

        let resized = resize_for_analysis(&flat_image(300, 500, [1, 2, 3]), 400);
        assert_eq!(resized.dimensions(), (240, 400));
    }

    #[test]
    fn resize_leaves_small_images_untouched() {
        let img = test_image(100, 80, 3);
        let resized = resize_for_analysis(&img, 400);
        assert_eq!(resized, img);
    }
}

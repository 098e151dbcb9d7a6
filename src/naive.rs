//! The naive palette generator: take the most frequent histogram colors.

use crate::{ColorHistogram, PaletteSize};
use palette::Srgb;
use std::cmp::Reverse;

/// Builds a palette from the `k` most frequent colors in `histogram`.
///
/// Colors are returned in non-increasing frequency order. Frequency ties keep
/// the histogram's first-seen order (the sort is stable), which makes the
/// result deterministic for a given sampling walk without implying any
/// canonical ordering. An empty histogram yields an empty palette; a
/// histogram with fewer than `k` distinct colors yields all of them.
#[must_use]
pub fn palette(histogram: &ColorHistogram, k: PaletteSize) -> Vec<Srgb<u8>> {
    let mut entries: Vec<(Srgb<u8>, u32)> = histogram.iter().collect();
    entries.sort_by_key(|&(_, count)| Reverse(count));
    entries.truncate(k.into());
    entries.into_iter().map(|(color, _)| color).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram;
    use crate::tests::*;

    #[test]
    fn empty_histogram_yields_empty_palette() {
        let result = palette(&ColorHistogram::new(), PaletteSize::from(16));
        assert!(result.is_empty());
    }

    #[test]
    fn short_histogram_yields_all_colors() {
        let histogram = ColorHistogram::from_colors([
            Srgb::new(10, 20, 30),
            Srgb::new(40, 50, 60),
        ]);
        let result = palette(&histogram, PaletteSize::from(16));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn colors_come_out_most_frequent_first() {
        let mut colors = Vec::new();
        colors.extend(std::iter::repeat(Srgb::new(0, 0, 0)).take(2));
        colors.extend(std::iter::repeat(Srgb::new(32, 0, 0)).take(5));
        colors.extend(std::iter::repeat(Srgb::new(0, 32, 0)).take(3));
        let histogram = ColorHistogram::from_colors(colors);

        let result = palette(&histogram, PaletteSize::from(2));
        assert_eq!(result, vec![Srgb::new(32, 0, 0), Srgb::new(0, 32, 0)]);
    }

    #[test]
    fn frequency_ties_keep_first_seen_order() {
        let histogram = ColorHistogram::from_colors([
            Srgb::new(3, 3, 3),
            Srgb::new(1, 1, 1),
            Srgb::new(2, 2, 2),
        ]);
        let result = palette(&histogram, PaletteSize::from(3));
        assert_eq!(
            result,
            vec![Srgb::new(3, 3, 3), Srgb::new(1, 1, 1), Srgb::new(2, 2, 2)]
        );
    }

    #[test]
    fn every_palette_color_is_in_the_histogram() {
        let histogram = histogram::sample(&test_image(64, 64, 11));
        let result = palette(&histogram, PaletteSize::from(16));
        assert_eq!(result.len(), 16.min(histogram.len()));
        for color in result {
            assert!(histogram.colors().contains(&color));
        }
    }

    #[test]
    fn four_color_scenario_recovers_exact_colors() {
        let histogram = histogram::sample(&four_color_image());
        let result = palette(&histogram, PaletteSize::from(4));
        assert_eq!(result.len(), 4);
        for color in [
            histogram::quantize_color(Srgb::new(255, 0, 0), 8),
            histogram::quantize_color(Srgb::new(0, 255, 0), 8),
            histogram::quantize_color(Srgb::new(0, 0, 255), 8),
            histogram::quantize_color(Srgb::new(255, 255, 255), 8),
        ] {
            assert!(result.contains(&color));
        }
    }
}

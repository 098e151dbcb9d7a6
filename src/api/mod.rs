//! Contains the types and functions for the high level pipeline API.

#[cfg(feature = "imagequant")]
mod external;

use crate::colorspace::LabCache;
use crate::{histogram, kmeans, metrics, naive, remap};
use crate::{ColorHistogram, KmeansOptions, PaletteSize, RecolorOptions, StrategyError};
use image::RgbImage;
use palette::Srgb;
use tracing::debug;

/// The set of supported palette generation strategies.
///
/// All strategies share the same downstream machinery: the resulting palette
/// recolors the image and both error metrics score the result. See the
/// descriptions on each enum variant for more information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeMethod {
    /// Take the most frequent sampled colors as the palette.
    ///
    /// This method is quick and gives decent results on images dominated by
    /// a few hues, but wastes palette slots on near-duplicates.
    Naive,
    /// Weighted k-means clustering over the sampled colors.
    ///
    /// Slower than [`QuantizeMethod::Naive`] but spreads the palette over
    /// the image's perceptual color range. See the [`kmeans`](crate::kmeans)
    /// module for more details.
    Kmeans(KmeansOptions),
    /// Delegate palette and remapping to libimagequant.
    ///
    /// The library is a black box: it produces a palette and a remapped
    /// image on success, and a [`StrategyError`] on failure. A failure does
    /// not abort a [`QuantizePipeline::compare`] run; the slot is reported
    /// as failed instead.
    #[cfg(feature = "imagequant")]
    Imagequant,
}

/// The outcome of running one quantization strategy over an image.
#[derive(Debug, Clone)]
pub struct StrategyReport {
    /// The generated palette. May be shorter than requested when the image
    /// has fewer distinct colors.
    pub palette: Vec<Srgb<u8>>,
    /// The input image repainted with `palette`.
    pub image: RgbImage,
    /// Normalized root-mean-square error against the input, in `[0, 1]`.
    pub rmse: f64,
    /// Average perceptual (Delta-E) error against the input, `>= 0`.
    pub delta_e: f64,
}

/// The reports of every available strategy over one image, generated from a
/// single shared histogram and Lab cache.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// The naive most-frequent-colors strategy.
    pub naive: StrategyReport,
    /// The k-means strategy.
    pub kmeans: StrategyReport,
    /// The libimagequant strategy, or the reason it failed. A failed slot
    /// leaves the other reports intact.
    #[cfg(feature = "imagequant")]
    pub imagequant: Result<StrategyReport, StrategyError>,
}

/// A builder struct that runs the full quantization flow over one image:
/// sample colors, generate a palette, recolor, and score the loss.
///
/// # Examples
/// ```
/// # use palettier::{QuantizeMethod, QuantizePipeline};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let img = image::RgbImage::from_pixel(64, 64, image::Rgb([200, 40, 40]));
///
/// let report = QuantizePipeline::new(&img)
///     .palette_size(8.into())
///     .run(&QuantizeMethod::Naive)?;
/// assert!(report.rmse <= 1.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QuantizePipeline<'a> {
    /// The image to quantize.
    image: &'a RgbImage,
    /// The (maximum) number of palette colors.
    palette_size: PaletteSize,
    /// Quantization levels per channel for color sampling.
    levels: u32,
    /// Maximum dimension of the analysis copy used for sampling, if any.
    analysis_max: Option<u32>,
    /// Nearest-color cache bound override; sized from the image when `None`.
    cache_size: Option<usize>,
}

impl<'a> QuantizePipeline<'a> {
    /// Creates a new [`QuantizePipeline`] over the given image with default
    /// settings: a 16 color palette, 8 sampling levels, a 400 pixel analysis
    /// copy, and an image-sized recolor cache.
    #[must_use]
    pub fn new(image: &'a RgbImage) -> Self {
        Self {
            image,
            palette_size: PaletteSize::from(16),
            levels: histogram::DEFAULT_LEVELS,
            analysis_max: Some(400),
            cache_size: None,
        }
    }

    /// Sets the (maximum) number of colors in the palette.
    #[must_use]
    pub const fn palette_size(mut self, size: PaletteSize) -> Self {
        self.palette_size = size;
        self
    }

    /// Sets the number of quantization levels per channel used when
    /// sampling colors. The default is `8`; `256` disables the reduction
    /// entirely so palettes are built from exact pixel colors.
    #[must_use]
    pub const fn levels(mut self, levels: u32) -> Self {
        self.levels = levels;
        self
    }

    /// Sets the maximum dimension of the downscaled copy that color
    /// sampling runs on. The default is `400`.
    #[must_use]
    pub const fn analysis_max(mut self, max_dim: u32) -> Self {
        self.analysis_max = Some(max_dim);
        self
    }

    /// Samples colors from the full-resolution image instead of a
    /// downscaled analysis copy.
    #[must_use]
    pub const fn full_resolution_analysis(mut self) -> Self {
        self.analysis_max = None;
        self
    }

    /// Sets the nearest-color cache bound used while recoloring,
    /// floor-clamped to `100`.
    ///
    /// By default the bound scales with the image,
    /// `clamp(pixels / 100, 1000, 5000)`.
    #[must_use]
    pub fn cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = Some(cache_size.max(100));
        self
    }

    /// The recolor options for this pipeline's image.
    fn recolor_options(&self) -> RecolorOptions {
        let cache_size = self.cache_size.unwrap_or_else(|| {
            let pixels = self.image.as_raw().len() / 3;
            (pixels / 100).clamp(1000, 5000)
        });
        RecolorOptions::new().cache_size(cache_size)
    }

    /// The histogram this pipeline samples palettes from.
    fn sample(&self) -> ColorHistogram {
        match self.analysis_max {
            Some(max_dim) => histogram::sample_with_levels(
                &histogram::resize_for_analysis(self.image, max_dim),
                self.levels,
            ),
            None => histogram::sample_with_levels(self.image, self.levels),
        }
    }

    /// Recolors the full-resolution image with `palette` and scores the
    /// result against the original.
    fn score(
        &self,
        palette: Vec<Srgb<u8>>,
        lab: &LabCache,
        recolored: Option<RgbImage>,
    ) -> Result<StrategyReport, StrategyError> {
        let recolored = recolored.unwrap_or_else(|| {
            self.recolor(&palette, lab)
        });

        // Dimensions are equal by construction, so the metric preconditions
        // cannot fail here.
        let rmse = metrics::rmse(self.image, &recolored).unwrap_or(0.0);
        let delta_e = self.mean_delta_e(&recolored, lab).unwrap_or(0.0);

        Ok(StrategyReport { palette, image: recolored, rmse, delta_e })
    }

    #[cfg(feature = "threads")]
    fn recolor(&self, palette: &[Srgb<u8>], lab: &LabCache) -> RgbImage {
        remap::recolor_par(self.image, palette, lab, &self.recolor_options())
    }

    #[cfg(not(feature = "threads"))]
    fn recolor(&self, palette: &[Srgb<u8>], lab: &LabCache) -> RgbImage {
        remap::recolor(self.image, palette, lab, &self.recolor_options())
    }

    #[cfg(feature = "threads")]
    fn mean_delta_e(
        &self,
        recolored: &RgbImage,
        lab: &LabCache,
    ) -> Result<f64, crate::DimensionMismatch> {
        metrics::mean_delta_e_par(self.image, recolored, lab)
    }

    #[cfg(not(feature = "threads"))]
    fn mean_delta_e(
        &self,
        recolored: &RgbImage,
        lab: &LabCache,
    ) -> Result<f64, crate::DimensionMismatch> {
        metrics::mean_delta_e(self.image, recolored, lab)
    }

    /// Runs a single strategy end to end.
    ///
    /// # Errors
    /// Only the [`QuantizeMethod::Imagequant`] strategy can fail; the
    /// in-crate strategies handle degenerate inputs with short palettes
    /// instead of errors.
    pub fn run(&self, method: &QuantizeMethod) -> Result<StrategyReport, StrategyError> {
        let lab = LabCache::new();
        self.run_with(method, &self.sample(), &lab)
    }

    /// Runs a single strategy against an already-sampled histogram and a
    /// shared Lab cache.
    fn run_with(
        &self,
        method: &QuantizeMethod,
        histogram: &ColorHistogram,
        lab: &LabCache,
    ) -> Result<StrategyReport, StrategyError> {
        match method {
            QuantizeMethod::Naive => {
                let palette = naive::palette(histogram, self.palette_size);
                debug!(colors = palette.len(), "naive palette generated");
                self.score(palette, lab, None)
            }
            QuantizeMethod::Kmeans(options) => {
                let palette = kmeans::palette(histogram, self.palette_size, lab, options);
                debug!(colors = palette.len(), "k-means palette generated");
                self.score(palette, lab, None)
            }
            #[cfg(feature = "imagequant")]
            QuantizeMethod::Imagequant => {
                let (palette, recolored) = external::quantize(self.image, self.palette_size)?;
                debug!(colors = palette.len(), "imagequant palette generated");
                self.score(palette, lab, Some(recolored))
            }
        }
    }

    /// Runs every available strategy over one shared histogram and Lab
    /// cache and collects the reports.
    ///
    /// A failing external strategy lands in its slot as an `Err`; the
    /// remaining strategies always complete.
    #[must_use]
    pub fn compare(&self) -> Comparison {
        let lab = LabCache::new();
        let histogram = self.sample();

        // The in-crate strategies are infallible.
        #[allow(clippy::unwrap_used)]
        let naive = self.run_with(&QuantizeMethod::Naive, &histogram, &lab).unwrap();
        #[allow(clippy::unwrap_used)]
        let kmeans = self
            .run_with(&QuantizeMethod::Kmeans(KmeansOptions::new()), &histogram, &lab)
            .unwrap();

        #[cfg(feature = "imagequant")]
        let imagequant = self.run_with(&QuantizeMethod::Imagequant, &histogram, &lab);

        Comparison {
            naive,
            kmeans,
            #[cfg(feature = "imagequant")]
            imagequant,
        }
    }
}

/// Renders a palette as a horizontal strip of square swatches, one
/// `swatch_size` x `swatch_size` block per color, in palette order.
///
/// Returns an empty 0x0 image for an empty palette.
#[must_use]
pub fn swatch_image(palette: &[Srgb<u8>], swatch_size: u32) -> RgbImage {
    if palette.is_empty() || swatch_size == 0 {
        return RgbImage::new(0, 0);
    }

    #[allow(clippy::cast_possible_truncation)]
    let width = palette.len() as u32 * swatch_size;
    RgbImage::from_fn(width, swatch_size, |x, _| {
        let color = palette[(x / swatch_size) as usize];
        image::Rgb([color.red, color.green, color.blue])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn four_color_image_reproduces_exactly() {
        // Sampling at 256 levels keeps exact pixel colors, so a 4 color
        // palette must reproduce the 4 color image losslessly.
        let img = four_color_image();
        let pipeline = QuantizePipeline::new(&img)
            .palette_size(4.into())
            .levels(256)
            .full_resolution_analysis();

        let report = pipeline.run(&QuantizeMethod::Naive).unwrap();
        assert_eq!(report.palette.len(), 4);
        for color in [
            Srgb::new(255, 0, 0),
            Srgb::new(0, 255, 0),
            Srgb::new(0, 0, 255),
            Srgb::new(255, 255, 255),
        ] {
            assert!(report.palette.contains(&color));
        }
        assert_eq!(report.image, img);
        assert_eq!(report.rmse, 0.0);
        assert_eq!(report.delta_e, 0.0);
    }

    #[test]
    fn all_black_image_is_unchanged_by_both_strategies() {
        let img = flat_image(16, 16, [0, 0, 0]);
        let pipeline = QuantizePipeline::new(&img).palette_size(PaletteSize::MIN);

        for method in [QuantizeMethod::Naive, QuantizeMethod::Kmeans(KmeansOptions::new())] {
            let report = pipeline.run(&method).unwrap();
            assert!(!report.palette.is_empty() && report.palette.len() <= 2);
            assert!(report.palette.contains(&Srgb::new(0, 0, 0)));
            assert_eq!(report.image, img);
            assert_eq!(report.rmse, 0.0);
            assert_eq!(report.delta_e, 0.0);
        }
    }

    #[test]
    fn reports_stay_within_metric_ranges() {
        let img = test_image(80, 60, 61);
        let comparison = QuantizePipeline::new(&img).palette_size(8.into()).compare();

        for report in [&comparison.naive, &comparison.kmeans] {
            assert!(!report.palette.is_empty());
            assert!(report.palette.len() <= 8);
            assert!((0.0..=1.0).contains(&report.rmse));
            assert!(report.delta_e >= 0.0);
            assert_eq!(report.image.dimensions(), img.dimensions());
        }

        #[cfg(feature = "imagequant")]
        if let Ok(report) = &comparison.imagequant {
            assert!(!report.palette.is_empty());
            assert!((0.0..=1.0).contains(&report.rmse));
            assert_eq!(report.image.dimensions(), img.dimensions());
        }
    }

    #[test]
    fn analysis_copy_does_not_change_output_dimensions() {
        let img = test_image(500, 300, 67);
        let report = QuantizePipeline::new(&img)
            .palette_size(8.into())
            .analysis_max(100)
            .run(&QuantizeMethod::Naive)
            .unwrap();
        assert_eq!(report.image.dimensions(), (500, 300));
    }

    #[test]
    fn swatch_strip_has_one_block_per_color() {
        let palette = [
            Srgb::new(255, 0, 0),
            Srgb::new(0, 255, 0),
            Srgb::new(0, 0, 255),
        ];
        let strip = swatch_image(&palette, 10);
        assert_eq!(strip.dimensions(), (30, 10));
        assert_eq!(strip.get_pixel(5, 5).0, [255, 0, 0]);
        assert_eq!(strip.get_pixel(15, 5).0, [0, 255, 0]);
        assert_eq!(strip.get_pixel(25, 5).0, [0, 0, 255]);
    }

    #[test]
    fn empty_palette_swatch_is_empty() {
        assert_eq!(swatch_image(&[], 10).dimensions(), (0, 0));
    }
}

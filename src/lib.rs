//! A library that reduces an image to a fixed-size color palette and measures
//! the perceptual fidelity lost in the process.
//!
//! `palettier` builds a frequency histogram from a sampled walk over the
//! image, generates a palette with one of several strategies, recolors the
//! image with the nearest palette color under a CIE94-style Delta-E metric,
//! and scores the result with normalized RMSE and average Delta-E.
//!
//! # Features
//! To reduce dependencies and compile times, `palettier` has `cargo` features
//! that can be turned off or on:
//! - `threads`: exposes parallel versions of recoloring and error sampling via [`rayon`].
//! - `imagequant`: adds the libimagequant-backed strategy to the comparison API.
//!
//! # High-Level API
//! To get started, see [`QuantizePipeline`]. It runs the full
//! sample → palette → recolor → score flow for a single strategy or for all
//! of them at once:
//! ```no_run
//! # use palettier::{KmeansOptions, QuantizeMethod, QuantizePipeline};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("some image")?.into_rgb8();
//!
//! let pipeline = QuantizePipeline::new(&img)
//!     .palette_size(16.into()) // reduce the image to at most 16 colors
//!     .analysis_max(400); // sample colors from a downscaled copy
//!
//! let report = pipeline.run(&QuantizeMethod::Kmeans(KmeansOptions::new().seed(42)))?;
//! println!("rmse = {}, delta-e = {}", report.rmse, report.delta_e);
//! # Ok(())
//! # }
//! ```
//!
//! The lower-level pieces ([`histogram`], [`naive`], [`kmeans`], [`remap`],
//! [`metrics`], [`colorspace`]) are exposed for callers that want to drive
//! individual stages themselves.

#![deny(unsafe_code)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    missing_docs,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal
)]

mod api;
mod types;

pub mod colorspace;
pub mod histogram;
pub mod kmeans;
pub mod metrics;
pub mod naive;
pub mod remap;

pub use api::*;
pub use colorspace::LabCache;
pub use histogram::ColorHistogram;
pub use kmeans::KmeansOptions;
pub use remap::RecolorOptions;
pub use types::*;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// The minimum supported number of palette colors is `2`.
pub const MIN_COLORS: u16 = 2;

#[cfg(test)]
pub(crate) mod tests {
    use image::RgbImage;
    use palette::Srgb;
    use rand::Rng as _;
    use rand::SeedableRng as _;
    use rand_xoshiro::Xoroshiro128PlusPlus;

    /// 256 pseudo-random colors, deterministic across runs.
    pub fn test_colors_256() -> Vec<Srgb<u8>> {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(42);
        (0..256)
            .map(|_| Srgb::new(rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()))
            .collect()
    }

    /// An image filled with pseudo-random pixels, deterministic for a given seed.
    pub fn test_image(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
        RgbImage::from_fn(width, height, |_, _| {
            image::Rgb([rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()])
        })
    }

    /// An image filled with a single color.
    pub fn flat_image(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb(color))
    }

    /// The four-color 2x2 scenario image: red, green, blue, white.
    pub fn four_color_image() -> RgbImage {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([0, 255, 0]));
        img.put_pixel(0, 1, image::Rgb([0, 0, 255]));
        img.put_pixel(1, 1, image::Rgb([255, 255, 255]));
        img
    }
}

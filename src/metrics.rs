//! Error metrics between an original and a recolored image: sampled,
//! normalized RMSE and sampled average perceptual distance.

use crate::colorspace::{delta_e, LabCache};
use crate::DimensionMismatch;
use image::RgbImage;
use palette::Srgb;
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The largest possible Euclidean distance between two RGB triples,
/// `255 * sqrt(3)`; the RMSE normalizer.
const MAX_RGB_DISTANCE: f64 = 441.67295593006372;

/// The sampling stride for an error sweep: `max(1, floor(sqrt(area) / divisor))`.
///
/// The perceptual metric uses a smaller divisor than RMSE, i.e. finer
/// sampling, since it is the headline number.
fn error_stride(width: u32, height: u32, divisor: f64) -> u32 {
    let area = f64::from(width) * f64::from(height);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        ((area.sqrt() / divisor).floor() as u32).max(1)
    }
}

/// Checks the pixel-pair precondition: both images must share dimensions.
fn check_dimensions(a: &RgbImage, b: &RgbImage) -> Result<(), DimensionMismatch> {
    if a.dimensions() == b.dimensions() {
        Ok(())
    } else {
        Err(DimensionMismatch {
            expected: a.dimensions(),
            actual: b.dimensions(),
        })
    }
}

/// The sampled `(x, y)` coordinates of an error sweep.
fn sample_coords(width: u32, height: u32, stride: u32) -> Vec<(u32, u32)> {
    let mut coords = Vec::new();
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            coords.push((x, y));
            x += stride;
        }
        y += stride;
    }
    coords
}

/// Normalized root-mean-square error between two same-sized images.
///
/// Pixels are sampled at a `sqrt(area)/50` stride; per pair, the squared
/// Euclidean RGB distance is accumulated, then the root of the mean is
/// normalized by the maximum possible RGB distance. The result is in
/// `[0, 1]`, `0` meaning the sampled pixels are identical.
///
/// # Errors
/// Returns [`DimensionMismatch`] if the images differ in size.
pub fn rmse(original: &RgbImage, recolored: &RgbImage) -> Result<f64, DimensionMismatch> {
    check_dimensions(original, recolored)?;
    let (width, height) = original.dimensions();
    let stride = error_stride(width, height, 50.0);

    let mut sum = 0.0f64;
    let mut samples = 0u64;
    for (x, y) in sample_coords(width, height, stride) {
        sum += squared_rgb_distance(original.get_pixel(x, y).0, recolored.get_pixel(x, y).0);
        samples += 1;
    }
    Ok(normalize_rmse(sum, samples))
}

/// Average perceptual (Delta-E) error between two same-sized images.
///
/// Pixels are sampled at a `sqrt(area)/30` stride and compared with
/// [`delta_e`] through the shared Lab cache. The result is an unbounded
/// non-negative average, not normalized.
///
/// # Errors
/// Returns [`DimensionMismatch`] if the images differ in size.
pub fn mean_delta_e(
    original: &RgbImage,
    recolored: &RgbImage,
    lab: &LabCache,
) -> Result<f64, DimensionMismatch> {
    check_dimensions(original, recolored)?;
    let (width, height) = original.dimensions();
    let stride = error_stride(width, height, 30.0);

    let mut sum = 0.0f64;
    let mut samples = 0u64;
    for (x, y) in sample_coords(width, height, stride) {
        sum += f64::from(pixel_delta_e(lab, original.get_pixel(x, y).0, recolored.get_pixel(x, y).0));
        samples += 1;
    }
    Ok(mean(sum, samples))
}

/// Parallel version of [`rmse`].
///
/// # Errors
/// Returns [`DimensionMismatch`] if the images differ in size.
#[cfg(feature = "threads")]
pub fn rmse_par(original: &RgbImage, recolored: &RgbImage) -> Result<f64, DimensionMismatch> {
    check_dimensions(original, recolored)?;
    let (width, height) = original.dimensions();
    let stride = error_stride(width, height, 50.0);

    let coords = sample_coords(width, height, stride);
    let samples = coords.len() as u64;
    let sum: f64 = coords
        .into_par_iter()
        .map(|(x, y)| squared_rgb_distance(original.get_pixel(x, y).0, recolored.get_pixel(x, y).0))
        .sum();
    Ok(normalize_rmse(sum, samples))
}

/// Parallel version of [`mean_delta_e`]; workers share the read-only Lab cache.
///
/// # Errors
/// Returns [`DimensionMismatch`] if the images differ in size.
#[cfg(feature = "threads")]
pub fn mean_delta_e_par(
    original: &RgbImage,
    recolored: &RgbImage,
    lab: &LabCache,
) -> Result<f64, DimensionMismatch> {
    check_dimensions(original, recolored)?;
    let (width, height) = original.dimensions();
    let stride = error_stride(width, height, 30.0);

    let coords = sample_coords(width, height, stride);
    let samples = coords.len() as u64;
    let sum: f64 = coords
        .into_par_iter()
        .map(|(x, y)| {
            f64::from(pixel_delta_e(lab, original.get_pixel(x, y).0, recolored.get_pixel(x, y).0))
        })
        .sum();
    Ok(mean(sum, samples))
}

#[inline]
fn squared_rgb_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    let mut sum = 0.0;
    for c in 0..3 {
        let d = f64::from(a[c]) - f64::from(b[c]);
        sum += d * d;
    }
    sum
}

#[inline]
fn pixel_delta_e(lab: &LabCache, a: [u8; 3], b: [u8; 3]) -> f32 {
    delta_e(lab, Srgb::new(a[0], a[1], a[2]), Srgb::new(b[0], b[1], b[2]))
}

/// Root of the mean, normalized to `[0, 1]`. Zero samples count as no error.
fn normalize_rmse(sum: f64, samples: u64) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        (sum / samples as f64).sqrt() / MAX_RGB_DISTANCE
    }
}

/// Plain mean. Zero samples count as no error.
fn mean(sum: f64, samples: u64) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        sum / samples as f64
    }
}

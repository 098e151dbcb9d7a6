//! sRGB to CIELAB conversion, the quantized Lab lookup cache, and the
//! perceptual color distance built on top of them.
//!
//! The conversion follows the D65-referenced sRGB → XYZ → Lab pipeline. The
//! distance is a CIE94-inspired Delta-E; see [`delta_e_lab`] for the exact
//! formula and its (intentional) asymmetry.

use crate::types::pack_srgb;
use palette::{white_point::D65, Lab, Srgb};

/// D65 reference white.
const WHITE: [f32; 3] = [0.95047, 1.0, 1.08883];

/// Grid step of the [`LabCache`]: one entry per 8 RGB levels per channel.
const GRID_STEP: u32 = 8;

/// Entries per channel in the [`LabCache`] grid (`0, 8, ..., 248`).
const GRID_SIZE: usize = 32;

/// Converts a gamma-encoded sRGB color to linear CIE XYZ.
///
/// Each channel is normalized to `[0, 1]`, gamma-decoded with the standard
/// sRGB piecewise curve, and run through the D65 sRGB → XYZ matrix.
#[must_use]
pub fn srgb_to_xyz(rgb: Srgb<u8>) -> [f32; 3] {
    fn linearize(c: u8) -> f32 {
        let c = f32::from(c) / 255.0;
        if c > 0.04045 {
            ((c + 0.055) / 1.055).powf(2.4)
        } else {
            c / 12.92
        }
    }

    let r = linearize(rgb.red);
    let g = linearize(rgb.green);
    let b = linearize(rgb.blue);

    [
        0.4124 * r + 0.3576 * g + 0.1805 * b,
        0.2126 * r + 0.7152 * g + 0.0722 * b,
        0.0193 * r + 0.1192 * g + 0.9505 * b,
    ]
}

/// Converts a CIE XYZ color to CIELAB (D65 reference white).
#[must_use]
pub fn xyz_to_lab(xyz: [f32; 3]) -> Lab<D65, f32> {
    fn f(t: f32) -> f32 {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    }

    let x = f(xyz[0] / WHITE[0]);
    let y = f(xyz[1] / WHITE[1]);
    let z = f(xyz[2] / WHITE[2]);

    Lab::new(116.0 * y - 16.0, 500.0 * (x - y), 200.0 * (y - z))
}

/// Converts a gamma-encoded sRGB color to CIELAB.
///
/// Pure and total; [`LabCache`] should be preferred wherever the same colors
/// are converted repeatedly.
#[must_use]
pub fn srgb_to_lab(rgb: Srgb<u8>) -> Lab<D65, f32> {
    xyz_to_lab(srgb_to_xyz(rgb))
}

/// A precomputed RGB → Lab lookup table over a coarse color grid.
///
/// The table holds one Lab value for every RGB triple whose channels are
/// multiples of 8 (`32x32x32` entries). Lookups snap each channel to the
/// nearest grid point, so the returned value is exact only for on-grid
/// colors; everything else carries a bounded quantization error of at most
/// half a grid step per channel. The cache is a memoization layer, never an
/// authority — [`srgb_to_lab`] remains the reference conversion.
///
/// Construction is the warm-up: the table is filled eagerly and immutable
/// afterwards, so a single instance can be shared by reference across
/// parallel workers.
#[derive(Debug, Clone)]
pub struct LabCache {
    table: Box<[Lab<D65, f32>]>,
}

impl LabCache {
    /// Builds the full grid table.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Vec::with_capacity(GRID_SIZE * GRID_SIZE * GRID_SIZE);
        for r in 0..GRID_SIZE {
            for g in 0..GRID_SIZE {
                for b in 0..GRID_SIZE {
                    #[allow(clippy::cast_possible_truncation)]
                    let rgb = Srgb::new(
                        (r as u32 * GRID_STEP) as u8,
                        (g as u32 * GRID_STEP) as u8,
                        (b as u32 * GRID_STEP) as u8,
                    );
                    table.push(srgb_to_lab(rgb));
                }
            }
        }
        Self { table: table.into_boxed_slice() }
    }

    /// Rounds a channel to the nearest multiple of 8, clamped to `[0, 248]`.
    #[inline]
    fn snap(c: u8) -> u32 {
        (((u32::from(c) + GRID_STEP / 2) / GRID_STEP) * GRID_STEP).min(248)
    }

    /// The on-grid color a lookup for `rgb` resolves to.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn grid_color(rgb: Srgb<u8>) -> Srgb<u8> {
        Srgb::new(
            Self::snap(rgb.red) as u8,
            Self::snap(rgb.green) as u8,
            Self::snap(rgb.blue) as u8,
        )
    }

    /// Looks up the Lab value for `rgb`, snapped to the cache grid.
    #[inline]
    #[must_use]
    pub fn lab(&self, rgb: Srgb<u8>) -> Lab<D65, f32> {
        let r = Self::snap(rgb.red) / GRID_STEP;
        let g = Self::snap(rgb.green) / GRID_STEP;
        let b = Self::snap(rgb.blue) / GRID_STEP;
        let index = (r as usize) * GRID_SIZE * GRID_SIZE + (g as usize) * GRID_SIZE + b as usize;
        self.table[index]
    }
}

impl Default for LabCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The perceptual distance between two sRGB colors.
///
/// Equal colors short-circuit to `0`; everything else is converted through
/// `cache` and measured with [`delta_e_lab`]. This function is the single
/// source of truth for "how different are two colors" across palette
/// generation, recoloring, and error measurement.
#[inline]
#[must_use]
pub fn delta_e(cache: &LabCache, a: Srgb<u8>, b: Srgb<u8>) -> f32 {
    if pack_srgb(a) == pack_srgb(b) {
        return 0.0;
    }
    delta_e_lab(cache.lab(a), cache.lab(b))
}

/// A CIE94-inspired Delta-E between two Lab colors.
///
/// The chroma weighting terms `SC` and `SH` are derived from the chroma of
/// the *first* argument only, so `delta_e_lab(a, b)` and `delta_e_lab(b, a)`
/// can differ slightly. This asymmetry is part of the metric's contract and
/// must not be "fixed" to the averaged-chroma variant.
#[must_use]
pub fn delta_e_lab(lab1: Lab<D65, f32>, lab2: Lab<D65, f32>) -> f32 {
    let dl = lab1.l - lab2.l;
    let da = lab1.a - lab2.a;
    let db = lab1.b - lab2.b;

    let c1 = (lab1.a * lab1.a + lab1.b * lab1.b).sqrt();
    let c2 = (lab2.a * lab2.a + lab2.b * lab2.b).sqrt();
    let dc = c1 - c2;

    // Guard against a negative root from floating-point round-off.
    let dh_squared = da * da + db * db - dc * dc;
    let dh = dh_squared.max(0.0).sqrt();

    const KL: f32 = 1.0;
    const KC: f32 = 1.0;
    const KH: f32 = 1.0;
    const K1: f32 = 0.045;
    const K2: f32 = 0.015;

    let sl = 1.0;
    let sc = 1.0 + K1 * c1;
    let sh = 1.0 + K2 * c1;

    let l_term = dl / (KL * sl);
    let c_term = dc / (KC * sc);
    let h_term = dh / (KH * sh);

    (l_term * l_term + c_term * c_term + h_term * h_term).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn black_and_white_endpoints() {
        let black = srgb_to_lab(Srgb::new(0, 0, 0));
        assert!(black.l.abs() < 1e-4);
        assert!(black.a.abs() < 1e-4);
        assert!(black.b.abs() < 1e-4);

        // The truncated matrix leaves white a hair off the exact reference.
        let white = srgb_to_lab(Srgb::new(255, 255, 255));
        assert!((white.l - 100.0).abs() < 0.1);
        assert!(white.a.abs() < 0.1);
        assert!(white.b.abs() < 0.1);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let cache = LabCache::new();
        for color in test_colors_256() {
            assert_eq!(delta_e(&cache, color, color), 0.0);
        }
    }

    #[test]
    fn distance_is_non_negative() {
        let cache = LabCache::new();
        let colors = test_colors_256();
        for pair in colors.chunks_exact(2) {
            assert!(delta_e(&cache, pair[0], pair[1]) >= 0.0);
        }
    }

    #[test]
    fn cache_matches_direct_conversion_on_grid() {
        let cache = LabCache::new();
        for color in test_colors_256() {
            let snapped = LabCache::grid_color(color);
            assert_eq!(snapped.red % 8, 0);
            assert!(snapped.red <= 248);

            let cached = cache.lab(color);
            let direct = srgb_to_lab(snapped);
            assert_eq!(cached.l, direct.l);
            assert_eq!(cached.a, direct.a);
            assert_eq!(cached.b, direct.b);
        }
    }

    #[test]
    fn cache_error_is_bounded_by_grid_step() {
        let cache = LabCache::new();
        for color in test_colors_256() {
            let err = delta_e_lab(cache.lab(color), srgb_to_lab(color));
            // Each channel is off by at most half a grid step (4 levels).
            assert!(err < 5.0, "cache error {err} too large for {color:?}");
        }
    }

    #[test]
    fn weighting_follows_first_argument_chroma() {
        let red = srgb_to_lab(Srgb::new(255, 0, 0));
        let gray = srgb_to_lab(Srgb::new(128, 128, 128));

        let forward = delta_e_lab(red, gray);
        let backward = delta_e_lab(gray, red);
        assert!(forward > 0.0 && backward > 0.0);
        // Red's large chroma inflates SC/SH only when red comes first.
        assert!((forward - backward).abs() > 1e-3);
        assert!(forward < backward);
    }

    #[test]
    fn negative_root_clamp() {
        // Collinear chroma vectors make dH^2 exactly zero on paper, which
        // round-off can push slightly negative.
        let a = Lab::<D65, f32>::new(50.0, 3.0, 4.0);
        let b = Lab::<D65, f32>::new(50.0, 6.0, 8.0);
        let d = delta_e_lab(a, b);
        assert!(d.is_finite() && d >= 0.0);

        let c = Lab::<D65, f32>::new(50.0, 0.3000001, 0.4000002);
        let d2 = delta_e_lab(a, c);
        assert!(d2.is_finite() && d2 >= 0.0);
    }
}

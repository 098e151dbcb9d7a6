//! The k-means palette generator: weighted Lloyd clustering over the
//! histogram's quantized colors under the perceptual distance.

use crate::colorspace::{delta_e, LabCache};
use crate::types::pack_srgb;
use crate::{ColorHistogram, PaletteSize};
use palette::Srgb;
use rand::{Rng as _, SeedableRng as _};
use rand_xoshiro::Xoroshiro128PlusPlus;
use std::collections::HashMap;
use tracing::{debug, trace};

/// The maximum number of distinct histogram entries fed to clustering,
/// taken in first-seen order. Accuracy/speed tradeoff.
const MAX_POINTS: usize = 2000;

/// A builder struct to specify the parameters for k-means.
///
/// # Examples
/// ```
/// # use palettier::KmeansOptions;
/// let options = KmeansOptions::new()
///     .max_iterations(8)
///     .seed(42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmeansOptions {
    /// The maximum number of assignment/update passes.
    pub(crate) max_iterations: u32,
    /// The seed value for the random number generator.
    pub(crate) seed: u64,
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl KmeansOptions {
    /// Creates a new [`KmeansOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_iterations: 5, seed: 0 }
    }

    /// Sets the iteration cap. The run also stops early as soon as an
    /// assignment pass moves no point between clusters.
    ///
    /// The default is `5`.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the seed value for the random number generator.
    ///
    /// The default seed is `0`; a fixed seed makes the run deterministic.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Per-iteration memo of perceptual distances, keyed by the packed
/// `(point, centroid)` color pair. Centroids move between iterations, so the
/// memo is rebuilt empty at the top of every pass.
struct DistanceCache(HashMap<u64, f32>);

impl DistanceCache {
    fn new() -> Self {
        Self(HashMap::new())
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    #[inline]
    fn distance(&mut self, lab: &LabCache, point: Srgb<u8>, centroid: Srgb<u8>) -> f32 {
        let key = (u64::from(pack_srgb(point)) << 24) | u64::from(pack_srgb(centroid));
        *self
            .0
            .entry(key)
            .or_insert_with(|| delta_e(lab, point, centroid))
    }
}

/// Clusters the histogram into `k` centroids and returns them as a palette.
///
/// Initial centroids are drawn by weighted sampling without replacement
/// (frequency-weighted), then refined by at most `options.max_iterations`
/// assignment/update passes. The result has exactly `k` colors whenever the
/// histogram holds at least `k` distinct points (coincident centroids are
/// possible on degenerate data); with fewer points, all of them are returned
/// as-is and callers must handle the short palette.
#[must_use]
pub fn palette(
    histogram: &ColorHistogram,
    k: PaletteSize,
    lab: &LabCache,
    options: &KmeansOptions,
) -> Vec<Srgb<u8>> {
    let k = usize::from(k);

    let mut points = Vec::with_capacity(histogram.len().min(MAX_POINTS));
    let mut weights = Vec::with_capacity(points.capacity());
    for (color, count) in histogram.iter().take(MAX_POINTS) {
        points.push(color);
        weights.push(count);
    }

    if points.len() < k {
        return points;
    }

    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(options.seed);

    // Weighted sampling without replacement: draw into the cumulative weight
    // of the remaining pool, remove the hit.
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut centroids: Vec<Srgb<u8>> = Vec::with_capacity(k);
    for _ in 0..k {
        let total: u64 = remaining.iter().map(|&i| u64::from(weights[i])).sum();
        if total == 0 {
            break;
        }
        let draw = rng.gen_range(0..total);
        let mut cumulative = 0u64;
        let mut chosen = remaining.len() - 1;
        for (slot, &i) in remaining.iter().enumerate() {
            cumulative += u64::from(weights[i]);
            if cumulative > draw {
                chosen = slot;
                break;
            }
        }
        centroids.push(points[remaining.remove(chosen)]);
    }

    // Top up with uniformly random leftovers if the weighted pass came up short.
    while centroids.len() < k && !remaining.is_empty() {
        let slot = rng.gen_range(0..remaining.len());
        centroids.push(points[remaining.remove(slot)]);
    }

    let mut clusters = vec![0usize; points.len()];
    let mut cache = DistanceCache::new();
    let mut iterations = 0;

    for iteration in 0..options.max_iterations {
        iterations = iteration + 1;
        cache.clear();
        let mut changed = false;

        for (i, &point) in points.iter().enumerate() {
            let mut best = 0;
            let mut best_distance = f32::INFINITY;
            for (j, &centroid) in centroids.iter().enumerate() {
                let distance = cache.distance(lab, point, centroid);
                if distance < best_distance {
                    best_distance = distance;
                    best = j;
                }
            }
            if clusters[i] != best {
                clusters[i] = best;
                changed = true;
            }
        }

        // The update runs even on the pass that detects stability, matching
        // the termination order of the assignment/update loop: the returned
        // centroids are always post-update.
        let mut sums = vec![[0u64; 3]; k];
        let mut cluster_weights = vec![0u64; k];
        for (i, &point) in points.iter().enumerate() {
            let c = clusters[i];
            let w = u64::from(weights[i]);
            sums[c][0] += u64::from(point.red) * w;
            sums[c][1] += u64::from(point.green) * w;
            sums[c][2] += u64::from(point.blue) * w;
            cluster_weights[c] += w;
        }

        for j in 0..k {
            if cluster_weights[j] > 0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
                let mean = |sum: u64| ((sum as f64 / cluster_weights[j] as f64).round()) as u8;
                centroids[j] = Srgb::new(mean(sums[j][0]), mean(sums[j][1]), mean(sums[j][2]));
            } else if !remaining.is_empty() {
                // Empty cluster: reseed from an unused pool point.
                let slot = rng.gen_range(0..remaining.len());
                centroids[j] = points[remaining.remove(slot)];
                trace!(centroid = j, "reseeded empty cluster");
            }
            // No points left over: the centroid keeps its previous value.
        }

        if !changed {
            break;
        }
    }

    debug!(k, points = points.len(), iterations, "k-means finished");
    centroids
}

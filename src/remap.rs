//! Recolors an image by mapping every pixel to its nearest palette color
//! under the perceptual distance, with a bounded nearest-color cache.

use crate::colorspace::{delta_e, LabCache};
use crate::types::pack_srgb;
use image::RgbImage;
use ordered_float::OrderedFloat;
use palette::Srgb;
#[cfg(feature = "threads")]
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::trace;

/// Rows are painted in blocks of this many for memory locality; the value
/// has no effect on the output.
const ROW_BLOCK: u32 = 16;

/// The smallest allowed nearest-color cache bound.
const MIN_CACHE_SIZE: usize = 100;

/// A builder struct to specify the parameters for recoloring.
///
/// # Examples
/// ```
/// # use palettier::RecolorOptions;
/// let options = RecolorOptions::new().cache_size(5000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecolorOptions {
    /// Upper bound on nearest-color cache entries.
    pub(crate) cache_size: usize,
}

impl Default for RecolorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RecolorOptions {
    /// Creates a new [`RecolorOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self { cache_size: 1000 }
    }

    /// Sets the maximum number of entries in the nearest-color cache,
    /// floor-clamped to `100`.
    ///
    /// The default is `1000`.
    #[must_use]
    pub fn cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size.max(MIN_CACHE_SIZE);
        self
    }
}

/// A bounded memo from exact source colors to palette indices.
///
/// Valid only for the palette it was built against; owned by a single
/// recolor run and never shared. When the cache grows past its bound the
/// lowest-indexed (oldest) half is discarded wholesale — an approximate
/// stand-in for LRU, not the real thing.
struct NearestColorCache {
    /// Packed source color → palette index.
    map: HashMap<u32, u8>,
    /// Keys in insertion order, oldest first.
    order: Vec<u32>,
    /// Maximum number of entries before truncation.
    max_size: usize,
}

impl NearestColorCache {
    fn new(max_size: usize) -> Self {
        Self {
            map: HashMap::with_capacity(max_size.min(4096)),
            order: Vec::new(),
            max_size,
        }
    }

    #[inline]
    fn get(&self, key: u32) -> Option<u8> {
        self.map.get(&key).copied()
    }

    fn insert(&mut self, key: u32, index: u8) {
        if self.map.len() >= self.max_size {
            let keep_from = self.max_size / 2;
            for old in self.order.drain(..keep_from) {
                self.map.remove(&old);
            }
            trace!(dropped = keep_from, "truncated nearest-color cache");
        }
        self.map.insert(key, index);
        self.order.push(key);
    }
}

/// Index of the palette color nearest to `color`: a linear Delta-E scan,
/// first minimum wins.
#[inline]
fn nearest_index(lab: &LabCache, palette: &[Srgb<u8>], color: Srgb<u8>) -> u8 {
    #[allow(clippy::unwrap_used)] // callers guarantee a non-empty palette
    let (index, _) = palette
        .iter()
        .enumerate()
        .min_by_key(|&(_, &entry)| OrderedFloat(delta_e(lab, color, entry)))
        .unwrap();
    #[allow(clippy::cast_possible_truncation)]
    {
        index as u8
    }
}

/// The nearest palette index for `color`, memoized in `cache`.
#[inline]
fn nearest_cached(
    lab: &LabCache,
    palette: &[Srgb<u8>],
    cache: &mut NearestColorCache,
    color: Srgb<u8>,
) -> u8 {
    let key = pack_srgb(color);
    if let Some(index) = cache.get(key) {
        return index;
    }
    let index = nearest_index(lab, palette, color);
    cache.insert(key, index);
    index
}

/// Paints a block of raw RGB rows into `out`, replacing each pixel with its
/// nearest pre-registered palette color.
fn recolor_rows(
    lab: &LabCache,
    palette: &[Srgb<u8>],
    registered: &[[u8; 3]],
    cache: &mut NearestColorCache,
    src: &[u8],
    out: &mut [u8],
) {
    for (src_pixel, out_pixel) in src.chunks_exact(3).zip(out.chunks_exact_mut(3)) {
        let color = Srgb::new(src_pixel[0], src_pixel[1], src_pixel[2]);
        let index = nearest_cached(lab, palette, cache, color);
        out_pixel.copy_from_slice(&registered[usize::from(index)]);
    }
}

/// Registers every palette color as an output pixel value up front, so the
/// paint loop only ever copies precomputed triples.
fn register_palette(palette: &[Srgb<u8>]) -> Vec<[u8; 3]> {
    palette
        .iter()
        .map(|&c| [c.red, c.green, c.blue])
        .collect()
}

/// Recolors `image` with the given palette.
///
/// Every pixel is replaced by the palette color nearest under the
/// perceptual distance (see [`delta_e`](crate::colorspace::delta_e)); ties
/// keep the lowest palette index. An empty palette returns the image
/// unchanged. The returned image always has the input's dimensions.
#[must_use]
pub fn recolor(
    image: &RgbImage,
    palette: &[Srgb<u8>],
    lab: &LabCache,
    options: &RecolorOptions,
) -> RgbImage {
    if palette.is_empty() {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let registered = register_palette(palette);
    let mut cache = NearestColorCache::new(options.cache_size);

    let row_len = width as usize * 3;
    let src = image.as_raw();
    let mut out = vec![0u8; src.len()];

    let block_len = row_len * ROW_BLOCK as usize;
    if block_len > 0 {
        for (src_block, out_block) in src.chunks(block_len).zip(out.chunks_mut(block_len)) {
            recolor_rows(lab, palette, &registered, &mut cache, src_block, out_block);
        }
    }

    // The buffer length is width * height * 3 by construction.
    #[allow(clippy::unwrap_used)]
    let recolored = RgbImage::from_raw(width, height, out).unwrap();
    recolored
}

/// Parallel version of [`recolor`]: row blocks are painted concurrently,
/// each worker owning a private nearest-color cache over the shared
/// read-only Lab table.
#[cfg(feature = "threads")]
#[must_use]
pub fn recolor_par(
    image: &RgbImage,
    palette: &[Srgb<u8>],
    lab: &LabCache,
    options: &RecolorOptions,
) -> RgbImage {
    if palette.is_empty() {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let registered = register_palette(palette);

    let row_len = width as usize * 3;
    let src = image.as_raw();
    let mut out = vec![0u8; src.len()];

    let block_len = row_len * ROW_BLOCK as usize;
    if block_len > 0 {
        src.par_chunks(block_len)
            .zip(out.par_chunks_mut(block_len))
            .for_each(|(src_block, out_block)| {
                let mut cache = NearestColorCache::new(options.cache_size);
                recolor_rows(lab, palette, &registered, &mut cache, src_block, out_block);
            });
    }

    // The buffer length is width * height * 3 by construction.
    #[allow(clippy::unwrap_used)]
    let recolored = RgbImage::from_raw(width, height, out).unwrap();
    recolored
}

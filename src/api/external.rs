//! The libimagequant-backed strategy.
//!
//! The library is consumed strictly as a black box: pixels and a color
//! budget go in, a palette and a remapped image come out. Any library
//! error is surfaced as a [`StrategyError`] for the caller's strategy slot;
//! nothing here panics.

use crate::{PaletteSize, StrategyError};
use image::RgbImage;
use palette::Srgb;
use tracing::debug;

/// Converts any libimagequant error into the structured strategy failure.
fn external(err: imagequant::Error) -> StrategyError {
    StrategyError::External(err.to_string())
}

/// Quantizes `image` down to at most `k` colors with libimagequant and
/// returns the palette together with the library's own remapped image.
///
/// Remapping is done without dithering so the result is comparable to the
/// in-crate nearest-color recoloring.
///
/// # Errors
/// Any failure inside the library is returned as
/// [`StrategyError::External`] with the library's message.
pub(crate) fn quantize(
    image: &RgbImage,
    k: PaletteSize,
) -> Result<(Vec<Srgb<u8>>, RgbImage), StrategyError> {
    let (width, height) = image.dimensions();

    let pixels: Vec<imagequant::RGBA> = image
        .pixels()
        .map(|p| imagequant::RGBA { r: p.0[0], g: p.0[1], b: p.0[2], a: 255 })
        .collect();

    let mut attr = imagequant::new();
    attr.set_max_colors(u32::from(k.into_inner())).map_err(external)?;

    let mut img = attr
        .new_image(pixels, width as usize, height as usize, 0.0)
        .map_err(external)?;

    let mut result = attr.quantize(&mut img).map_err(external)?;
    result.set_dithering_level(0.0).map_err(external)?;

    let (palette, indices) = result.remapped(&mut img).map_err(external)?;
    debug!(colors = palette.len(), "libimagequant remap complete");

    let mut out = Vec::with_capacity(indices.len() * 3);
    for index in indices {
        let color = palette[usize::from(index)];
        out.extend_from_slice(&[color.r, color.g, color.b]);
    }

    let recolored = RgbImage::from_raw(width, height, out)
        .ok_or_else(|| StrategyError::External("remapped buffer size mismatch".into()))?;

    let palette = palette
        .into_iter()
        .map(|c| Srgb::new(c.r, c.g, c.b))
        .collect();

    Ok((palette, recolored))
}

//! Contains various types needed across the crate.

use crate::{MAX_COLORS, MIN_COLORS};
use palette::Srgb;
use std::fmt::Display;
use thiserror::Error;

/// An error type for when a requested palette size falls outside the
/// supported `[2, 256]` range.
///
/// The inner value is the rejected size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("palette size {0} is outside the supported range {MIN_COLORS}..={MAX_COLORS}")]
pub struct SizeOutOfRange(pub u16);

/// An error type for when the two images given to an error metric do not
/// share the same dimensions.
///
/// Matching dimensions are a caller precondition for every pixel-pair metric;
/// the mismatch is reported rather than silently sampling out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("image dimensions {expected:?} do not match {actual:?}")]
pub struct DimensionMismatch {
    /// Width and height of the first image.
    pub expected: (u32, u32),
    /// Width and height of the second image.
    pub actual: (u32, u32),
}

/// An error produced by a quantization strategy.
///
/// A failing strategy does not abort a comparison run; its slot is reported
/// as failed while the remaining strategies complete normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// The external quantization library rejected the input or failed mid-run.
    #[error("external quantizer failed: {0}")]
    External(String),
}

/// This type is used to specify the number of colors to include in a palette.
///
/// This is a simple new type wrapper around `u16` with the invariant that it
/// must lie in `[`[`MIN_COLORS`]`, `[`MAX_COLORS`]`]`. Constructing one is the
/// boundary validation for the whole engine; the palette generators do not
/// re-validate.
///
/// Note that a generator may still return *fewer* colors than requested when
/// the input has fewer distinct colors — callers must handle short palettes.
///
/// # Examples
/// Use `into` to create [`PaletteSize`]s from `u8`s (values below the minimum
/// are clamped up). For `u16`s, use `try_into` or [`PaletteSize::from_clamped`].
///
/// ```
/// # use palettier::{PaletteSize, SizeOutOfRange};
/// let size = PaletteSize::from(16);
/// let size: PaletteSize = PaletteSize::try_from(128u16)?;
/// let size = PaletteSize::from_clamped(1024);
/// assert_eq!(size, PaletteSize::MAX);
/// # Ok::<(), SizeOutOfRange>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PaletteSize(u16);

impl PaletteSize {
    /// The maximum supported palette size (given by [`MAX_COLORS`]).
    pub const MAX: Self = Self(MAX_COLORS);

    /// The minimum supported palette size (given by [`MIN_COLORS`]).
    pub const MIN: Self = Self(MIN_COLORS);

    /// Gets the inner `u16` value.
    #[must_use]
    pub const fn into_inner(self) -> u16 {
        self.0
    }

    /// Creates a [`PaletteSize`] by clamping the given `u16` into
    /// `[`[`MIN_COLORS`]`, `[`MAX_COLORS`]`]`.
    #[must_use]
    pub const fn from_clamped(value: u16) -> Self {
        if value < MIN_COLORS {
            Self(MIN_COLORS)
        } else if value > MAX_COLORS {
            Self(MAX_COLORS)
        } else {
            Self(value)
        }
    }
}

impl Default for PaletteSize {
    fn default() -> Self {
        Self::MAX
    }
}

impl From<PaletteSize> for u16 {
    fn from(val: PaletteSize) -> Self {
        val.into_inner()
    }
}

impl From<PaletteSize> for usize {
    fn from(val: PaletteSize) -> Self {
        usize::from(val.into_inner())
    }
}

impl From<u8> for PaletteSize {
    fn from(value: u8) -> Self {
        Self::from_clamped(u16::from(value))
    }
}

impl TryFrom<u16> for PaletteSize {
    type Error = SizeOutOfRange;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (MIN_COLORS..=MAX_COLORS).contains(&value) {
            Ok(PaletteSize(value))
        } else {
            Err(SizeOutOfRange(value))
        }
    }
}

impl Display for PaletteSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_inner())
    }
}

/// Packs an RGB triple into a single 24-bit integer key.
///
/// Used as the composite key for every color-keyed map in the crate.
#[inline]
pub(crate) const fn pack_srgb(color: Srgb<u8>) -> u32 {
    ((color.red as u32) << 16) | ((color.green as u32) << 8) | (color.blue as u32)
}

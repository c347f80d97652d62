//! Safe numeric casting utilities for raster geometry and TIFF encoding.
//!
//! # Design Decisions
//!
//! ## Raster Dimensions (`usize` ↔ `f64`)
//! `usize` to `f64` conversions are allowed without checks: no practical
//! mosaic approaches 2^53 pixels per side.
//!
//! ## Continuous Coordinates (`f64` → `usize`)
//! Float-to-index conversions require bounds checking because resampling
//! produces coordinates that may be negative, NaN or past the last pixel.
//!
//! ## TIFF Fields (`usize`/`u64` → `u32`)
//! Classic TIFF stores dimensions and offsets as 32-bit values. These go
//! through `TryFrom` so that an oversized chunk fails to encode instead of
//! wrapping.

use std::convert::TryFrom;

/// Convert a `usize` to `u32`, failing on 64-bit overflow.
///
/// # Errors
/// Returns an error string if the value exceeds `u32::MAX`.
#[inline]
pub fn usize_to_u32(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("Value {value} exceeds u32 maximum"))
}

/// Convert a `u64` file offset to `u32`, failing beyond the classic TIFF 4 GiB limit.
///
/// # Errors
/// Returns an error string if the value exceeds `u32::MAX`.
#[inline]
pub fn u64_to_u32(value: u64) -> Result<u32, String> {
    u32::try_from(value)
        .map_err(|_| format!("File offset {value} exceeds the 4 GiB classic TIFF limit"))
}

/// Convert a float to a pixel index, returning `None` if out of bounds.
///
/// This function handles:
/// - Negative values (returns `None`)
/// - Values at or beyond `max_value` (returns `None`)
/// - NaN values (returns `None`)
#[inline]
#[must_use]
pub fn f64_to_pixel_index(value: f64, max_value: usize) -> Option<usize> {
    if value.is_nan() || value < 0.0 {
        return None;
    }
    // Safety: we've already checked value >= 0 and is not NaN above
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = value as usize;
    if index >= max_value {
        None
    } else {
        Some(index)
    }
}

/// Clamp a continuous coordinate into `0..=max_value` and truncate it.
///
/// Used for pixel spans (begin/end bounds) rather than pixel lookups.
#[inline]
#[must_use]
pub fn f64_to_clamped_bound(value: f64, max_value: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    // Allow cast precision loss: dimensions fit comfortably in f64
    #[allow(clippy::cast_precision_loss)]
    let max = max_value as f64;
    if value >= max {
        return max_value;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        value as usize
    }
}

/// Number of whole pixels needed to cover `length` world units at `pixel_size`.
///
/// A tiny tolerance keeps an exact multiple from rounding up to an extra
/// pixel because of floating point noise. Never returns less than 1.
#[inline]
#[must_use]
pub fn pixels_to_cover(length: f64, pixel_size: f64) -> usize {
    const TOLERANCE: f64 = 1e-9;
    let count = (length / pixel_size.abs() - TOLERANCE).ceil();
    if count.is_nan() || count < 1.0 {
        return 1;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usize_to_u32() {
        assert_eq!(usize_to_u32(0), Ok(0));
        assert_eq!(usize_to_u32(65_536), Ok(65_536));
        #[cfg(target_pointer_width = "64")]
        assert!(usize_to_u32(usize::MAX).is_err());
    }

    #[test]
    fn test_u64_to_u32() {
        assert_eq!(u64_to_u32(4096), Ok(4096));
        assert!(u64_to_u32(u64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_f64_to_pixel_index() {
        assert_eq!(f64_to_pixel_index(0.0, 100), Some(0));
        assert_eq!(f64_to_pixel_index(50.5, 100), Some(50));
        assert_eq!(f64_to_pixel_index(99.9, 100), Some(99));
        assert_eq!(f64_to_pixel_index(100.0, 100), None);
        assert_eq!(f64_to_pixel_index(-1.0, 100), None);
        assert_eq!(f64_to_pixel_index(f64::NAN, 100), None);
    }

    #[test]
    fn test_f64_to_clamped_bound() {
        assert_eq!(f64_to_clamped_bound(-3.0, 10), 0);
        assert_eq!(f64_to_clamped_bound(4.7, 10), 4);
        assert_eq!(f64_to_clamped_bound(12.0, 10), 10);
        assert_eq!(f64_to_clamped_bound(f64::NAN, 10), 0);
    }

    #[test]
    fn test_pixels_to_cover() {
        assert_eq!(pixels_to_cover(2.0, 0.5), 4);
        assert_eq!(pixels_to_cover(2.0, -0.5), 4);
        assert_eq!(pixels_to_cover(2.1, 0.5), 5);
        assert_eq!(pixels_to_cover(0.0, 1.0), 1);
        // 0.3 / 0.1 is 2.9999999999999996 in binary floating point
        assert_eq!(pixels_to_cover(0.3, 0.1), 3);
    }
}

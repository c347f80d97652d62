//! Rescaling the mosaic canvas to the 8-bit display range.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MosaicError, Result};
use crate::mosaic::extrema::Extrema;
use crate::mosaic::log_scale::{compress, LogCompression};
use crate::raster::{BalancedCanvas, MosaicCanvas, Raster};

/// Output value of uncovered canvas pixels.
///
/// Valid samples at the global minimum also map here, so the balanced canvas
/// declares no no-data value.
pub const BALANCED_FILL: u8 = 0;

/// Output value of every valid sample when `min == max` under
/// [`DegenerateRangePolicy::Midpoint`].
pub const MIDPOINT: u8 = 128;

/// What to do when the global extrema coincide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DegenerateRangePolicy {
    /// Abort with [`MosaicError::DegenerateRange`]
    Fail,
    /// Map every valid sample to [`MIDPOINT`]
    #[default]
    Midpoint,
}

/// `out = round(scale * in + offset)`, clamped to `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRescale {
    pub scale: f64,
    pub offset: f64,
}

impl LinearRescale {
    /// Map `[min, max]` onto `[0, 255]`; `None` when the range is empty.
    #[must_use]
    pub fn from_range(min: f64, max: f64) -> Option<Self> {
        let range = max - min;
        if !(range.is_finite() && range > 0.0) {
            return None;
        }
        Some(Self {
            scale: 255.0 / range,
            offset: 255.0 * min / (min - max),
        })
    }

    #[inline]
    #[must_use]
    pub fn apply(&self, value: f64) -> u8 {
        let scaled = (self.scale * value + self.offset).round().clamp(0.0, 255.0);
        // Safety: rounded and clamped into the u8 range above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            scaled as u8
        }
    }
}

/// Rescale `canvas` to 8 bits using the global `extrema`.
///
/// `law` must be the same log law used to collect `extrema`. Canvas no-data
/// pixels, and samples the law cannot compress, become [`BALANCED_FILL`].
///
/// # Errors
/// Returns [`MosaicError::DegenerateRange`] when `min == max` and the policy
/// is [`DegenerateRangePolicy::Fail`], and [`MosaicError::NoValidData`] for
/// empty extrema.
pub fn normalize(
    canvas: &MosaicCanvas,
    extrema: &Extrema,
    law: Option<&LogCompression>,
    policy: DegenerateRangePolicy,
) -> Result<BalancedCanvas> {
    if extrema.is_empty() {
        return Err(MosaicError::NoValidData);
    }

    let rescale = LinearRescale::from_range(extrema.min, extrema.max);
    if rescale.is_none() && policy == DegenerateRangePolicy::Fail {
        return Err(MosaicError::DegenerateRange { value: extrema.min });
    }
    if let Some(r) = rescale {
        tracing::debug!(scale = r.scale, offset = r.offset, "Rescaling canvas");
    }

    let pixels = canvas
        .pixels
        .par_iter()
        .map(|&value| {
            if canvas.is_nodata(value) {
                return BALANCED_FILL;
            }
            match (compress(law, f64::from(value)), rescale) {
                (None, _) => BALANCED_FILL,
                (Some(v), Some(r)) => r.apply(v),
                (Some(_), None) => MIDPOINT,
            }
        })
        .collect();

    Ok(Raster {
        width: canvas.width,
        height: canvas.height,
        pixels,
        transform: canvas.transform,
        nodata: None,
        crs: canvas.crs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoTransform;

    fn canvas(pixels: Vec<f32>) -> MosaicCanvas {
        Raster {
            width: pixels.len(),
            height: 1,
            pixels,
            transform: GeoTransform::IDENTITY,
            nodata: Some(f32::NAN),
            crs: None,
        }
    }

    fn extrema(min: f64, max: f64) -> Extrema {
        Extrema { min, max, samples: 2 }
    }

    #[test]
    fn test_linear_scenario() {
        let out = normalize(
            &canvas(vec![10.0, 200.0, 105.0]),
            &extrema(10.0, 200.0),
            None,
            DegenerateRangePolicy::Fail,
        )
        .unwrap();
        assert_eq!(out.pixels[0], 0);
        assert_eq!(out.pixels[1], 255);
        assert!((127..=128).contains(&out.pixels[2]));
    }

    #[test]
    fn test_minimum_stays_a_valid_sample() {
        let out = normalize(
            &canvas(vec![10.0, 200.0]),
            &extrema(10.0, 200.0),
            None,
            DegenerateRangePolicy::Fail,
        )
        .unwrap();
        assert_eq!(out.pixels, vec![0, 255]);
        assert!(!out.is_nodata(out.pixels[0]));

        let level = crate::pyramid::downsample(&out, 2, crate::codec::OverviewInterpolation::Average);
        assert_eq!(level.pixels, vec![128]);
    }

    #[test]
    fn test_full_range_is_identity() {
        let r = LinearRescale::from_range(0.0, 255.0).unwrap();
        assert_eq!(r.scale, 1.0);
        assert_eq!(r.offset, 0.0);

        let values: Vec<f32> = (0..=255u8).map(f32::from).collect();
        let out = normalize(&canvas(values), &extrema(0.0, 255.0), None, DegenerateRangePolicy::Fail).unwrap();
        assert!(out.pixels.iter().enumerate().all(|(i, &p)| usize::from(p) == i));
    }

    #[test]
    fn test_clamps_out_of_range() {
        let r = LinearRescale::from_range(10.0, 20.0).unwrap();
        assert_eq!(r.apply(-100.0), 0);
        assert_eq!(r.apply(1e9), 255);
    }

    #[test]
    fn test_nodata_maps_to_fill_value() {
        let out = normalize(
            &canvas(vec![f32::NAN, 20.0]),
            &extrema(10.0, 20.0),
            None,
            DegenerateRangePolicy::Fail,
        )
        .unwrap();
        assert_eq!(out.pixels, vec![BALANCED_FILL, 255]);
        assert_eq!(out.nodata, None);
    }

    #[test]
    fn test_degenerate_range_policies() {
        let flat = canvas(vec![7.0, f32::NAN]);
        let result = normalize(&flat, &extrema(7.0, 7.0), None, DegenerateRangePolicy::Fail);
        assert!(matches!(result, Err(MosaicError::DegenerateRange { .. })));

        let out = normalize(&flat, &extrema(7.0, 7.0), None, DegenerateRangePolicy::Midpoint).unwrap();
        assert_eq!(out.pixels, vec![MIDPOINT, BALANCED_FILL]);
    }

    #[test]
    fn test_log_law_consistent_with_extrema() {
        let law = LogCompression::default();
        let tile = crate::raster::RasterTile::new("t", 3, 1, vec![0.0, 2.162_277_7, 99.0], GeoTransform::IDENTITY);
        let ext = crate::mosaic::extrema::scan(std::slice::from_ref(&tile), Some(&law)).unwrap();
        let out = normalize(&canvas(tile.pixels.clone()), &ext, Some(&law), DegenerateRangePolicy::Fail).unwrap();
        // 0 dB, 10 dB, 40 dB
        assert_eq!(out.pixels, vec![0, 64, 255]);
    }
}

//! Reduced-resolution levels for overview building.
//!
//! Each level is `ceil(previous / step)` pixels on a side and covers the same
//! ground area as the base raster.

use crate::codec::OverviewInterpolation;
use crate::raster::{Raster, Sample};

/// Downsample `source` by an integer `step`.
///
/// Edge blocks that run past the source are clipped. With
/// [`OverviewInterpolation::Average`] no-data samples are ignored, and a block
/// without any valid sample becomes no-data.
#[must_use]
pub fn downsample<T: Sample>(
    source: &Raster<T>,
    step: usize,
    interpolation: OverviewInterpolation,
) -> Raster<T> {
    let step = step.max(1);
    let width = source.width.div_ceil(step);
    let height = source.height.div_ceil(step);
    let empty = source.nodata.unwrap_or_else(|| T::from_f64(f64::NAN));

    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let value = match interpolation {
                OverviewInterpolation::Nearest => source.pixels[(y * step) * source.width + x * step],
                OverviewInterpolation::Average => block_mean(source, x * step, y * step, step).unwrap_or(empty),
            };
            pixels.push(value);
        }
    }

    // Allow cast precision loss: step factors are tiny
    #[allow(clippy::cast_precision_loss)]
    let transform = source.transform.scaled(step as f64);

    Raster {
        width,
        height,
        pixels,
        transform,
        nodata: source.nodata,
        crs: source.crs,
    }
}

fn block_mean<T: Sample>(source: &Raster<T>, x0: usize, y0: usize, step: usize) -> Option<T> {
    let x1 = (x0 + step).min(source.width);
    let y1 = (y0 + step).min(source.height);

    let mut sum = 0.0;
    let mut count = 0u32;
    for row in y0..y1 {
        for &value in &source.pixels[row * source.width + x0..row * source.width + x1] {
            if !source.is_nodata(value) {
                sum += value.to_f64();
                count += 1;
            }
        }
    }
    (count > 0).then(|| T::from_f64(sum / f64::from(count)))
}

/// Build up to `num_steps` successively reduced levels below `base`.
///
/// Stops early once a level has shrunk to a single pixel, or when a level
/// would be no smaller than the one above it (`step` of 1). The base itself
/// is not part of the result.
#[must_use]
pub fn build_pyramid<T: Sample>(
    base: &Raster<T>,
    step: usize,
    num_steps: usize,
    interpolation: OverviewInterpolation,
) -> Vec<Raster<T>> {
    let mut levels: Vec<Raster<T>> = Vec::new();
    for _ in 0..num_steps {
        let previous = levels.last().unwrap_or(base);
        if previous.width <= 1 && previous.height <= 1 {
            break;
        }
        let next = downsample(previous, step, interpolation);
        if next.width == previous.width && next.height == previous.height {
            break;
        }
        levels.push(next);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoTransform;

    fn ramp(width: usize, height: usize) -> Raster<f32> {
        let mut raster = Raster::filled(width, height, 0.0f32, GeoTransform::from_origin(0.0, 10.0, 1.0, -1.0));
        for (i, p) in raster.pixels.iter_mut().enumerate() {
            *p = u16::try_from(i).map(f32::from).unwrap();
        }
        raster
    }

    #[test]
    fn test_level_dimensions_round_up() {
        let level = downsample(&ramp(5, 3), 2, OverviewInterpolation::Nearest);
        assert_eq!((level.width, level.height), (3, 2));
        assert_eq!(level.pixels, vec![0.0, 2.0, 4.0, 10.0, 12.0, 14.0]);
        assert_eq!(level.transform.a, 2.0);
        assert_eq!(level.transform.e, -2.0);
        assert_eq!(level.envelope().min_x, 0.0);
    }

    #[test]
    fn test_average_skips_nodata() {
        let mut raster = ramp(2, 2).with_nodata(Some(-1.0));
        raster.pixels = vec![2.0, -1.0, 4.0, f32::NAN];
        let level = downsample(&raster, 2, OverviewInterpolation::Average);
        assert_eq!(level.pixels, vec![3.0]);

        raster.pixels = vec![-1.0; 4];
        let level = downsample(&raster, 2, OverviewInterpolation::Average);
        assert_eq!(level.pixels, vec![-1.0]);
    }

    #[test]
    fn test_average_u8_rounds() {
        let raster = Raster {
            width: 2,
            height: 1,
            pixels: vec![1u8, 2],
            transform: GeoTransform::IDENTITY,
            nodata: None,
            crs: None,
        };
        let level = downsample(&raster, 2, OverviewInterpolation::Average);
        assert_eq!(level.pixels, vec![2]);
    }

    #[test]
    fn test_pyramid_stops_at_single_pixel() {
        let levels = build_pyramid(&ramp(8, 8), 2, 10, OverviewInterpolation::Nearest);
        let sizes: Vec<_> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(4, 4), (2, 2), (1, 1)]);
    }

    #[test]
    fn test_unit_step_adds_no_levels() {
        let levels = build_pyramid(&ramp(64, 64), 1, 50, OverviewInterpolation::Nearest);
        assert!(levels.is_empty());

        let levels = build_pyramid(&ramp(64, 64), 2, usize::MAX, OverviewInterpolation::Nearest);
        assert_eq!(levels.len(), 6);
    }

    #[test]
    fn test_pyramid_honours_step_count() {
        let levels = build_pyramid(&ramp(100, 60), 3, 2, OverviewInterpolation::Average);
        let sizes: Vec<_> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(34, 20), (12, 7)]);
    }
}

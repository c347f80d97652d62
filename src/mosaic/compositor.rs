//! Resampling input tiles onto the global canvas.
//!
//! Every canvas pixel centre is mapped back into each tile through the
//! inverse of the tile-to-canvas transform (tile grid-to-world followed by the
//! global world-to-grid). Rows are filled in parallel; within a row, tiles are
//! visited in input order, so the result does not depend on scheduling.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::casting::{f64_to_clamped_bound, f64_to_pixel_index};
use crate::error::Result;
use crate::geometry::GeoTransform;
use crate::mosaic::grid::GlobalGrid;
use crate::raster::{MosaicCanvas, Raster, RasterTile};

/// Interpolation kernel, applied uniformly to every tile of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resampling {
    #[default]
    Nearest,
    /// Weighted mean of the four surrounding valid samples
    Bilinear,
}

/// How overlapping tiles combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BlendPolicy {
    /// The last tile in input order covering a pixel wins
    Overlay,
    /// Weighted average of every covering tile
    #[default]
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeOptions {
    pub resampling: Resampling,
    pub blend: BlendPolicy,
    /// Distance from a tile edge, in source pixels, over which its weight
    /// ramps up to 1. Zero gives every covering tile the same weight.
    pub blend_margin: f64,
    /// Value of canvas pixels no tile covers
    pub nodata: f32,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            resampling: Resampling::default(),
            blend: BlendPolicy::default(),
            blend_margin: 0.0,
            nodata: f32::NAN,
        }
    }
}

/// A tile with its canvas-to-tile mapping and canvas footprint.
struct Placement<'a> {
    tile: &'a RasterTile,
    to_tile: GeoTransform,
    cols: (usize, usize),
    rows: (usize, usize),
}

impl<'a> Placement<'a> {
    fn new(tile: &'a RasterTile, grid: &GlobalGrid) -> Result<Self> {
        let to_tile = grid.forward.then(&tile.transform.inverse()?);

        let env = tile.envelope;
        let corners = [
            grid.inverse.apply(env.min_x, env.min_y),
            grid.inverse.apply(env.min_x, env.max_y),
            grid.inverse.apply(env.max_x, env.min_y),
            grid.inverse.apply(env.max_x, env.max_y),
        ];
        let (min_c, max_c, min_r, max_r) = corners.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(a, b, c, d), &(col, row)| (a.min(col), b.max(col), c.min(row), d.max(row)),
        );

        Ok(Self {
            tile,
            to_tile,
            cols: (
                f64_to_clamped_bound(min_c.floor(), grid.width),
                f64_to_clamped_bound(max_c.ceil(), grid.width),
            ),
            rows: (
                f64_to_clamped_bound(min_r.floor(), grid.height),
                f64_to_clamped_bound(max_r.ceil(), grid.height),
            ),
        })
    }

    #[inline]
    fn covers_row(&self, row: usize) -> bool {
        (self.rows.0..self.rows.1).contains(&row)
    }

    /// Resampled value and blend weight at canvas pixel `(col, row)`.
    fn sample(&self, col: usize, row: usize, options: &CompositeOptions) -> Option<(f64, f64)> {
        if !(self.cols.0..self.cols.1).contains(&col) {
            return None;
        }
        // Allow cast precision loss: canvas indices fit comfortably in f64
        #[allow(clippy::cast_precision_loss)]
        let (u, v) = self.to_tile.apply(col as f64 + 0.5, row as f64 + 0.5);

        let value = match options.resampling {
            Resampling::Nearest => nearest(self.tile, u, v),
            Resampling::Bilinear => bilinear(self.tile, u, v),
        }?;

        let weight = if options.blend_margin > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let (w, h) = (self.tile.width as f64, self.tile.height as f64);
            let edge = u.min(w - u).min(v).min(h - v);
            (edge / options.blend_margin).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Some((value, weight))
    }
}

fn nearest(tile: &RasterTile, u: f64, v: f64) -> Option<f64> {
    let col = f64_to_pixel_index(u, tile.width)?;
    let row = f64_to_pixel_index(v, tile.height)?;
    tile.sample(col, row).map(f64::from)
}

/// Bilinear interpolation over pixel centres, renormalized over the valid
/// neighbours. Points outside the tile footprint are not sampled.
fn bilinear(tile: &RasterTile, u: f64, v: f64) -> Option<f64> {
    #[allow(clippy::cast_precision_loss)]
    let (w, h) = (tile.width as f64, tile.height as f64);
    if !(0.0..w).contains(&u) || !(0.0..h).contains(&v) {
        return None;
    }

    let x = u - 0.5;
    let y = v - 0.5;
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);

    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    for (dx, dy, weight) in [
        (0.0, 0.0, (1.0 - fx) * (1.0 - fy)),
        (1.0, 0.0, fx * (1.0 - fy)),
        (0.0, 1.0, (1.0 - fx) * fy),
        (1.0, 1.0, fx * fy),
    ] {
        if weight <= 0.0 {
            continue;
        }
        let (Some(col), Some(row)) = (
            f64_to_pixel_index(x0 + dx, tile.width),
            f64_to_pixel_index(y0 + dy, tile.height),
        ) else {
            continue;
        };
        if let Some(value) = tile.sample(col, row) {
            sum += weight * f64::from(value);
            weight_sum += weight;
        }
    }

    (weight_sum > 0.0).then(|| sum / weight_sum)
}

/// Composite `tiles` onto the canvas described by `grid`.
///
/// # Errors
/// Returns [`crate::error::MosaicError::DegenerateTransform`] if a tile's own
/// transform cannot be inverted.
pub fn composite(tiles: &[RasterTile], grid: &GlobalGrid, options: &CompositeOptions) -> Result<MosaicCanvas> {
    let placements = tiles
        .iter()
        .map(|tile| Placement::new(tile, grid))
        .collect::<Result<Vec<_>>>()?;

    let mut pixels = vec![options.nodata; grid.width * grid.height];
    pixels
        .par_chunks_mut(grid.width)
        .enumerate()
        .for_each(|(row, out)| {
            let active: Vec<&Placement<'_>> = placements.iter().filter(|p| p.covers_row(row)).collect();
            if active.is_empty() {
                return;
            }
            for (col, pixel) in out.iter_mut().enumerate() {
                if let Some(value) = blend_pixel(&active, col, row, options) {
                    // Allow truncation: f32 is the canvas precision
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        *pixel = value as f32;
                    }
                }
            }
        });

    Ok(Raster {
        width: grid.width,
        height: grid.height,
        pixels,
        transform: grid.forward,
        nodata: Some(options.nodata),
        crs: tiles.iter().find_map(|t| t.crs),
    })
}

fn blend_pixel(active: &[&Placement<'_>], col: usize, row: usize, options: &CompositeOptions) -> Option<f64> {
    let mut last = None;
    let mut sum = 0.0;
    let mut weight_sum = 0.0;

    for placement in active {
        let Some((value, weight)) = placement.sample(col, row, options) else {
            continue;
        };
        last = Some(value);
        sum += weight * value;
        weight_sum += weight;
    }

    match options.blend {
        BlendPolicy::Overlay => last,
        // Every covering sample sat exactly on a tile edge: fall back to overlay
        BlendPolicy::Blend if weight_sum <= 0.0 => last,
        BlendPolicy::Blend => Some(sum / weight_sum),
    }
}

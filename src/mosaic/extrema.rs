//! Global minimum and maximum over every valid input sample.

use rayon::prelude::*;

use crate::error::{MosaicError, Result};
use crate::mosaic::log_scale::{compress, LogCompression};
use crate::raster::RasterTile;

/// Running extrema. `min` only decreases and `max` only increases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub min: f64,
    pub max: f64,
    /// Number of samples observed
    pub samples: u64,
}

impl Extrema {
    /// Identity of [`Extrema::merge`].
    pub const EMPTY: Self = Self {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        samples: 0,
    };

    #[inline]
    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.samples += 1;
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            samples: self.samples + other.samples,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    #[must_use]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

impl Default for Extrema {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Extrema of one tile's valid samples, after the optional log law.
///
/// A tile without valid samples yields [`Extrema::EMPTY`].
#[must_use]
pub fn scan_tile(tile: &RasterTile, law: Option<&LogCompression>) -> Extrema {
    tile.valid_samples()
        .filter_map(|raw| compress(law, f64::from(raw)))
        .fold(Extrema::EMPTY, |mut acc, value| {
            acc.observe(value);
            acc
        })
}

/// Global extrema over all tiles.
///
/// # Errors
/// Returns [`MosaicError::NoValidData`] if no tile has a single valid sample.
pub fn scan(tiles: &[RasterTile], law: Option<&LogCompression>) -> Result<Extrema> {
    let extrema = tiles
        .par_iter()
        .map(|tile| scan_tile(tile, law))
        .reduce(|| Extrema::EMPTY, Extrema::merge);

    if extrema.is_empty() {
        return Err(MosaicError::NoValidData);
    }
    tracing::debug!(min = extrema.min, max = extrema.max, samples = extrema.samples, "Collected extrema");
    Ok(extrema)
}

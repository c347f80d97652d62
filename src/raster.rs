//! Single-band raster buffers.
//!
//! [`RasterTile`] is one decoded input file; [`Raster`] is the generic
//! georeferenced buffer used for the mosaic canvas, the balanced canvas,
//! written chunks and overview levels.

use std::fmt::Debug;
use std::path::PathBuf;

use crate::geometry::{Envelope, GeoTransform};

/// A pixel sample type that can be stored in a [`Raster`] and encoded to TIFF.
pub trait Sample: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// TIFF `BitsPerSample`
    const BITS_PER_SAMPLE: u16;
    /// TIFF `SampleFormat` (1 = unsigned integer, 3 = IEEE float)
    const SAMPLE_FORMAT: u16;
    const ZERO: Self;

    fn to_f64(self) -> f64;

    /// Convert back from `f64`, rounding and saturating for integer types.
    fn from_f64(value: f64) -> Self;

    fn extend_le_bytes(self, out: &mut Vec<u8>);
}

impl Sample for u8 {
    const BITS_PER_SAMPLE: u16 = 8;
    const SAMPLE_FORMAT: u16 = 1;
    const ZERO: Self = 0;

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        // Safety: clamped to the u8 range first; NaN saturates to 0
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            value.round().clamp(0.0, 255.0) as u8
        }
    }

    #[inline]
    fn extend_le_bytes(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

impl Sample for f32 {
    const BITS_PER_SAMPLE: u16 = 32;
    const SAMPLE_FORMAT: u16 = 3;
    const ZERO: Self = 0.0;

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        {
            value as f32
        }
    }

    #[inline]
    fn extend_le_bytes(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// Rectangular pixel window inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    #[must_use]
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Georeferenced single-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    pub width: usize,
    pub height: usize,
    /// Row-major samples, `width * height` long
    pub pixels: Vec<T>,
    /// Grid-to-world transform
    pub transform: GeoTransform,
    pub nodata: Option<T>,
    /// EPSG code of the reference system, if known
    pub crs: Option<u16>,
}

/// Composited mosaic at the global resolution.
pub type MosaicCanvas = Raster<f32>;

/// Mosaic rescaled to the 8-bit display range.
pub type BalancedCanvas = Raster<u8>;

impl<T: Sample> Raster<T> {
    /// Raster with every pixel set to `value`.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: T, transform: GeoTransform) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width * height],
            transform,
            nodata: None,
            crs: None,
        }
    }

    #[must_use]
    pub fn with_nodata(mut self, nodata: Option<T>) -> Self {
        self.nodata = nodata;
        self
    }

    #[must_use]
    pub fn with_crs(mut self, crs: Option<u16>) -> Self {
        self.crs = crs;
        self
    }

    #[inline]
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<T> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.pixels.get(row * self.width + col).copied()
    }

    /// Whether `value` is this raster's no-data marker (NaN always is).
    #[inline]
    #[must_use]
    pub fn is_nodata(&self, value: T) -> bool {
        let v = value.to_f64();
        if v.is_nan() {
            return true;
        }
        self.nodata.is_some_and(|n| n.to_f64() == v)
    }

    #[must_use]
    pub fn envelope(&self) -> Envelope {
        self.transform.grid_envelope(self.width, self.height)
    }

    /// Copy of the pixels inside `window`, georeferenced at the window origin.
    ///
    /// The window is clipped to the raster bounds.
    #[must_use]
    pub fn window(&self, window: &PixelWindow) -> Self {
        let x0 = window.x.min(self.width);
        let y0 = window.y.min(self.height);
        let width = window.width.min(self.width - x0);
        let height = window.height.min(self.height - y0);

        let mut pixels = Vec::with_capacity(width * height);
        for row in y0..y0 + height {
            let start = row * self.width + x0;
            pixels.extend_from_slice(&self.pixels[start..start + width]);
        }

        // Allow cast precision loss: pixel offsets fit comfortably in f64
        #[allow(clippy::cast_precision_loss)]
        let transform = self.transform.shifted(x0 as f64, y0 as f64);

        Self {
            width,
            height,
            pixels,
            transform,
            nodata: self.nodata,
            crs: self.crs,
        }
    }
}

/// A decoded input file: samples, georeferencing and its valid-data region.
///
/// Tiles are immutable once loaded; the builder-style `with_*` methods are
/// part of loading.
#[derive(Debug, Clone)]
pub struct RasterTile {
    /// Display name (usually the file stem)
    pub name: String,
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    /// Row-major samples, `width * height` long
    pub pixels: Vec<f32>,
    pub transform: GeoTransform,
    /// Ground envelope covered by the pixel grid
    pub envelope: Envelope,
    pub nodata: Option<f64>,
    /// Per-pixel valid flags; `None` means every non-nodata pixel is valid
    pub mask: Option<Vec<bool>>,
    pub crs: Option<u16>,
}

impl RasterTile {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        pixels: Vec<f32>,
        transform: GeoTransform,
    ) -> Self {
        Self {
            name: name.into(),
            path: PathBuf::new(),
            width,
            height,
            pixels,
            transform,
            envelope: transform.grid_envelope(width, height),
            nodata: None,
            mask: None,
            crs: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    #[must_use]
    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    #[must_use]
    pub fn with_crs(mut self, crs: Option<u16>) -> Self {
        self.crs = crs;
        self
    }

    /// Restrict the valid region to samples at or above `threshold`.
    #[must_use]
    pub fn with_valid_threshold(self, threshold: f64) -> Self {
        let mask = (0..self.pixels.len())
            .map(|idx| self.is_valid(idx) && f64::from(self.pixels[idx]) >= threshold)
            .collect();
        self.with_mask(mask)
    }

    /// Whether the sample at flat index `idx` is inside the valid-data region.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, idx: usize) -> bool {
        let Some(&value) = self.pixels.get(idx) else {
            return false;
        };
        if value.is_nan() {
            return false;
        }
        if self.nodata.is_some_and(|n| f64::from(value) == n) {
            return false;
        }
        self.mask.as_ref().map_or(true, |mask| mask.get(idx).copied().unwrap_or(false))
    }

    /// Valid sample at `(col, row)`, or `None` when outside or masked.
    #[inline]
    #[must_use]
    pub fn sample(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let idx = row * self.width + col;
        self.is_valid(idx).then(|| self.pixels[idx])
    }

    /// Iterate the valid samples in row-major order.
    pub fn valid_samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.pixels
            .iter()
            .enumerate()
            .filter(|&(idx, _)| self.is_valid(idx))
            .map(|(_, &v)| v)
    }
}

//! Six-coefficient affine transforms between pixel grids and world coordinates.

use crate::error::{MosaicError, Result};
use crate::geometry::Envelope;

/// Affine map from grid `(col, row)` to world `(x, y)`:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Pixel `(0, 0)` covers the square between grid coordinates `(0, 0)` and
/// `(1, 1)`, so the pixel centre is at `(col + 0.5, row + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
        e: 1.0,
        f: 0.0,
    };

    #[must_use]
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform anchored at the top-left corner `(origin_x, origin_y)`.
    ///
    /// `pixel_size_y` is conventionally negative so that row numbers grow
    /// southwards.
    #[must_use]
    pub const fn from_origin(origin_x: f64, origin_y: f64, pixel_size_x: f64, pixel_size_y: f64) -> Self {
        Self::new(pixel_size_x, 0.0, origin_x, 0.0, pixel_size_y, origin_y)
    }

    /// Build from GeoTIFF `ModelTiepoint` and `ModelPixelScale` tags.
    ///
    /// The tiepoint `(i, j, k, x, y, z)` pins raster point `(i, j)` to world
    /// `(x, y)`; the scale is stored positive with y implicitly flipped.
    #[must_use]
    pub fn from_tiepoint(tiepoint: &[f64], pixel_scale: &[f64]) -> Option<Self> {
        if tiepoint.len() < 6 || pixel_scale.len() < 2 {
            return None;
        }
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        let (sx, sy) = (pixel_scale[0], pixel_scale[1]);
        Some(Self::from_origin(x - i * sx, y + j * sy, sx, -sy))
    }

    /// Build from a GeoTIFF `ModelTransformation` tag (4x4 row-major matrix).
    #[must_use]
    pub fn from_model_transformation(matrix: &[f64]) -> Option<Self> {
        if matrix.len() < 16 {
            return None;
        }
        Some(Self::new(
            matrix[0], matrix[1], matrix[3], matrix[4], matrix[5], matrix[7],
        ))
    }

    /// Map grid coordinates to world coordinates.
    #[inline]
    #[must_use]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    #[inline]
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Whether the transform has no rotation or shear terms.
    #[must_use]
    pub fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }

    /// Matrix inverse.
    ///
    /// # Errors
    /// Returns [`MosaicError::DegenerateTransform`] when the determinant is
    /// zero or not finite.
    pub fn inverse(&self) -> Result<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(MosaicError::DegenerateTransform { determinant: det });
        }
        Ok(Self {
            a: self.e / det,
            b: -self.b / det,
            c: (self.b * self.f - self.e * self.c) / det,
            d: -self.d / det,
            e: self.a / det,
            f: (self.d * self.c - self.a * self.f) / det,
        })
    }

    /// Compose: apply `self` first, then `next`.
    #[must_use]
    pub fn then(&self, next: &Self) -> Self {
        Self {
            a: next.a * self.a + next.b * self.d,
            b: next.a * self.b + next.b * self.e,
            c: next.a * self.c + next.b * self.f + next.c,
            d: next.d * self.a + next.e * self.d,
            e: next.d * self.b + next.e * self.e,
            f: next.d * self.c + next.e * self.f + next.f,
        }
    }

    /// Transform of a sub-grid whose pixel `(0, 0)` is this grid's `(col, row)`.
    #[must_use]
    pub fn shifted(&self, col: f64, row: f64) -> Self {
        let (c, f) = self.apply(col, row);
        Self { c, f, ..*self }
    }

    /// Transform of the same area sampled `factor` times more coarsely.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            a: self.a * factor,
            b: self.b * factor,
            d: self.d * factor,
            e: self.e * factor,
            ..*self
        }
    }

    /// Bounding envelope of a `width` x `height` grid under this transform.
    #[must_use]
    pub fn grid_envelope(&self, width: usize, height: usize) -> Envelope {
        // Allow cast precision loss: dimensions fit comfortably in f64
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(0.0, h),
            self.apply(w, h),
        ];
        Envelope::from_points(&corners)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

//! The mosaic's global pixel grid.

use crate::casting::pixels_to_cover;
use crate::error::{MosaicError, Result};
use crate::geometry::{Envelope, GeoTransform};

/// Grid-to-world transform of the canvas, its inverse and the canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalGrid {
    pub forward: GeoTransform,
    pub inverse: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl GlobalGrid {
    /// World envelope actually covered by the canvas pixels.
    ///
    /// This may extend past the aggregated envelope by less than one pixel on
    /// the trailing edges.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        self.forward.grid_envelope(self.width, self.height)
    }
}

/// Derive the canvas grid for `envelope` at a fixed resolution.
///
/// `x = min_x + col * pixel_size_x` and `y = max_y + row * pixel_size_y`; the
/// sign of `pixel_size_y` is kept as given (conventionally negative).
///
/// # Errors
/// Returns [`MosaicError::DegenerateTransform`] if either pixel size is zero
/// or not finite, and [`MosaicError::CanvasTooLarge`] when the canvas buffer
/// size would overflow.
pub fn build_transform(envelope: &Envelope, pixel_size_x: f64, pixel_size_y: f64) -> Result<GlobalGrid> {
    if !pixel_size_x.is_finite() || !pixel_size_y.is_finite() {
        return Err(MosaicError::DegenerateTransform {
            determinant: pixel_size_x * pixel_size_y,
        });
    }

    let forward = GeoTransform::from_origin(envelope.min_x, envelope.max_y, pixel_size_x, pixel_size_y);
    let inverse = forward.inverse()?;

    let width = pixels_to_cover(envelope.width(), pixel_size_x);
    let height = pixels_to_cover(envelope.height(), pixel_size_y);
    let fits = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
        .is_some_and(|bytes| isize::try_from(bytes).is_ok());
    if !fits {
        return Err(MosaicError::CanvasTooLarge { width, height });
    }

    Ok(GlobalGrid {
        forward,
        inverse,
        width,
        height,
    })
}

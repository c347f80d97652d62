//! Global envelope aggregation.

use rayon::prelude::*;

use crate::error::{MosaicError, Result};
use crate::geometry::Envelope;
use crate::raster::RasterTile;

/// Union of every tile envelope.
///
/// The first tile initializes the result and the rest expand it. Union is
/// commutative and associative, so the fold runs as a parallel reduction.
///
/// # Errors
/// Returns [`MosaicError::EmptyInput`] for an empty tile set.
pub fn aggregate(tiles: &[RasterTile]) -> Result<Envelope> {
    tiles
        .par_iter()
        .map(|tile| tile.envelope)
        .reduce_with(Envelope::union)
        .ok_or(MosaicError::EmptyInput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoTransform;

    fn unit_tile(x: f64, y: f64) -> RasterTile {
        // 2x2 pixels of 0.5 units, top-left corner at (x, y + 1)
        RasterTile::new("t", 2, 2, vec![0.0; 4], GeoTransform::from_origin(x, y + 1.0, 0.5, -0.5))
    }

    #[test]
    fn test_three_tiles() {
        let tiles = [unit_tile(0.0, 0.0), unit_tile(1.0, 0.0), unit_tile(0.0, 1.0)];
        assert_eq!(aggregate(&tiles).unwrap(), Envelope::new(0.0, 0.0, 2.0, 2.0));
    }

    #[test]
    fn test_contains_every_tile() {
        let tiles: Vec<_> = (0..40)
            .map(|i| unit_tile(f64::from(i % 7) * 0.3 - 1.0, f64::from(i / 7) * 1.7))
            .collect();
        let envelope = aggregate(&tiles).unwrap();
        assert!(tiles.iter().all(|t| envelope.contains(&t.envelope)));
    }

    #[test]
    fn test_single_tile() {
        let tile = unit_tile(3.0, 4.0);
        assert_eq!(aggregate(std::slice::from_ref(&tile)).unwrap(), tile.envelope);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(aggregate(&[]), Err(MosaicError::EmptyInput)));
    }
}

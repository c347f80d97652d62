//! Input tile discovery and loading.
//!
//! This module provides the [`TileLoader`] seam used to decode input rasters
//! and the [`TileSource`] trait for enumerating eligible input files.
//!
//! # Example
//!
//! ```rust,no_run
//! use geomosaic::geotiff_reader::GeoTiffTileLoader;
//! use geomosaic::source::{load_all, LocalScanOptions, LocalTileSource, TileSource};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let source = LocalTileSource::scan("/data/leg01/channel_a", &LocalScanOptions::default())?;
//!     let tiles = load_all(&GeoTiffTileLoader, source.entries())?;
//!     println!("Loaded {} tiles", tiles.len());
//!     Ok(())
//! }
//! ```

pub mod local;

pub use local::{LocalScanOptions, LocalSourceStats, LocalTileSource};

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::error::DecodeError;
use crate::raster::RasterTile;

/// Decodes one raster file into a [`RasterTile`].
pub trait TileLoader: Send + Sync {
    /// # Errors
    /// Returns [`DecodeError`] if the file cannot be read or decoded.
    fn load(&self, path: &Path) -> Result<RasterTile, DecodeError>;
}

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileEntry {
    /// File stem, used for logging
    pub name: String,
    pub path: PathBuf,
    /// File size in bytes (if known)
    pub size_bytes: Option<u64>,
}

/// Enumerates the eligible input files of one run.
pub trait TileSource: Send + Sync {
    /// Entries in a stable order; compositing order follows it.
    fn entries(&self) -> &[TileEntry];

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Load every entry, in parallel, preserving entry order.
///
/// # Errors
/// Returns the first [`DecodeError`] in entry order.
pub fn load_all<L: TileLoader + ?Sized>(
    loader: &L,
    entries: &[TileEntry],
) -> Result<Vec<RasterTile>, DecodeError> {
    entries
        .par_iter()
        .map(|entry| {
            let tile = loader.load(&entry.path)?;
            debug!(
                tile = %entry.name,
                width = tile.width,
                height = tile.height,
                "Loaded tile"
            );
            Ok(tile)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoTransform;

    struct FakeLoader;

    impl TileLoader for FakeLoader {
        fn load(&self, path: &Path) -> Result<RasterTile, DecodeError> {
            if path.ends_with("broken.tif") {
                return Err(DecodeError::MissingGeoreference {
                    path: path.to_path_buf(),
                });
            }
            Ok(RasterTile::new("t", 1, 1, vec![1.0], GeoTransform::IDENTITY).with_path(path))
        }
    }

    fn entry(path: &str) -> TileEntry {
        TileEntry {
            name: path.to_string(),
            path: PathBuf::from(path),
            size_bytes: None,
        }
    }

    #[test]
    fn test_load_all_preserves_order() {
        let entries: Vec<_> = (0..16).map(|i| entry(&format!("/in/{i:02}.tif"))).collect();
        let tiles = load_all(&FakeLoader, &entries).unwrap();
        let paths: Vec<_> = tiles.iter().map(|t| t.path.clone()).collect();
        let expected: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_load_all_fails_on_decode_error() {
        let entries = vec![entry("/in/a.tif"), entry("/in/broken.tif")];
        assert!(load_all(&FakeLoader, &entries).is_err());
    }
}

//! Local filesystem tile source.
//!
//! Scans a working directory for raster files by extension.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{MosaicError, Result};

use super::{TileEntry, TileSource};

/// Options for scanning local directories.
#[derive(Debug, Clone)]
pub struct LocalScanOptions {
    /// Minimum directory depth to scan (1 = files directly in the root)
    pub min_depth: usize,
    /// Maximum directory depth to scan (None = unlimited)
    pub max_depth: Option<usize>,
    /// File extensions to consider as rasters (case-insensitive)
    pub extensions: Vec<String>,
    /// Whether to follow symbolic links
    pub follow_links: bool,
}

impl Default for LocalScanOptions {
    fn default() -> Self {
        Self {
            min_depth: 1,
            max_depth: Some(1),
            extensions: default_extensions(),
            follow_links: false,
        }
    }
}

/// Extensions recognised as GeoTIFF inputs.
#[must_use]
pub fn default_extensions() -> Vec<String> {
    vec![
        "tif".to_string(),
        "tiff".to_string(),
        "geotiff".to_string(),
        "geotif".to_string(),
    ]
}

impl LocalScanOptions {
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    fn is_eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

/// Tile source backed by a local directory.
///
/// Entries are sorted by path so that compositing order, and therefore the
/// blended output, does not depend on directory iteration order.
pub struct LocalTileSource {
    entries: Vec<TileEntry>,
}

impl LocalTileSource {
    /// Scan a directory for raster files.
    ///
    /// Files without a recognised extension are skipped silently.
    ///
    /// # Errors
    /// Returns [`MosaicError::Io`] if the root is not a readable directory.
    pub fn scan<P: AsRef<Path>>(root: P, options: &LocalScanOptions) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(MosaicError::Io {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "working directory does not exist or is not a directory",
                ),
            });
        }

        let mut walker = WalkDir::new(root)
            .min_depth(options.min_depth)
            .follow_links(options.follow_links);

        if let Some(max) = options.max_depth {
            walker = walker.max_depth(max);
        }

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !options.is_eligible(entry.path()) {
                continue;
            }

            let path = entry.path();
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            let size_bytes = entry.metadata().ok().map(|m| m.len());

            debug!(path = %path.display(), "Discovered tile");
            entries.push(TileEntry {
                name,
                path: path.to_path_buf(),
                size_bytes,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self { entries })
    }

    /// Get statistics about discovered tiles.
    #[must_use]
    pub fn stats(&self) -> LocalSourceStats {
        LocalSourceStats {
            file_count: self.entries.len(),
            total_size_bytes: self.entries.iter().filter_map(|e| e.size_bytes).sum(),
        }
    }
}

impl TileSource for LocalTileSource {
    fn entries(&self) -> &[TileEntry] {
        &self.entries
    }
}

/// Statistics about a local tile source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSourceStats {
    /// Number of raster files discovered
    pub file_count: usize,
    /// Total size of all files in bytes
    pub total_size_bytes: u64,
}

impl LocalSourceStats {
    /// Get total size in megabytes
    #[must_use]
    pub fn total_size_mb(&self) -> f64 {
        // Allow cast precision loss: file sizes in MB don't need exact precision
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_size_bytes as f64 / 1024.0 / 1024.0
        }
    }
}

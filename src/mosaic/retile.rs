//! Partitioning a canvas into bounded-size chunk files.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::codec::{ChunkEncoder, EncodeOptions};
use crate::error::{EncodeError, MosaicError, Result};
use crate::raster::{PixelWindow, Raster, Sample};

/// Chunk grid over a canvas.
///
/// Chunk sizes are clamped to the canvas, and an axis whose length equals the
/// clamped chunk size holds exactly one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub canvas_width: usize,
    pub canvas_height: usize,
    pub chunk_width: usize,
    pub chunk_height: usize,
    pub chunks_x: usize,
    pub chunks_y: usize,
}

impl ChunkLayout {
    /// # Errors
    /// Returns [`MosaicError::InvalidParameter`] for zero sizes, or when the
    /// chunk naming scheme would give two chunks the same file name.
    pub fn plan(canvas_width: usize, canvas_height: usize, chunk_width: usize, chunk_height: usize) -> Result<Self> {
        if canvas_width == 0 || canvas_height == 0 {
            return Err(MosaicError::InvalidParameter(format!(
                "canvas {canvas_width}x{canvas_height} is empty"
            )));
        }
        if chunk_width == 0 || chunk_height == 0 {
            return Err(MosaicError::InvalidParameter(format!(
                "chunk size {chunk_width}x{chunk_height} must be positive"
            )));
        }

        let chunk_width = chunk_width.min(canvas_width);
        let chunk_height = chunk_height.min(canvas_height);
        let chunks_x = canvas_width.div_ceil(chunk_width);
        let chunks_y = canvas_height.div_ceil(chunk_height);

        if chunks_y > chunk_width {
            return Err(MosaicError::InvalidParameter(format!(
                "{chunks_y} chunk rows exceed chunk width {chunk_width}; file names would collide"
            )));
        }

        Ok(Self {
            canvas_width,
            canvas_height,
            chunk_width,
            chunk_height,
            chunks_x,
            chunks_y,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks_x * self.chunks_y
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunk `(i, j)`, clipped at the trailing canvas edges.
    #[must_use]
    pub fn rect(&self, i: usize, j: usize) -> ChunkRect {
        let x = i * self.chunk_width;
        let y = j * self.chunk_height;
        ChunkRect {
            col: i,
            row: j,
            x,
            y,
            width: self.chunk_width.min(self.canvas_width - x),
            height: self.chunk_height.min(self.canvas_height - y),
        }
    }

    /// Every chunk, ordered by `i` then `j`.
    #[must_use]
    pub fn rects(&self) -> Vec<ChunkRect> {
        (0..self.chunks_x)
            .flat_map(|i| (0..self.chunks_y).map(move |j| self.rect(i, j)))
            .collect()
    }

    /// File name of chunk `(i, j)`.
    #[must_use]
    pub fn file_name(&self, rect: &ChunkRect) -> String {
        chunk_file_name(rect.col, rect.row, self.chunk_width)
    }
}

/// Source sub-rectangle of one chunk; `col`/`row` index the chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRect {
    pub col: usize,
    pub row: usize,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl ChunkRect {
    #[must_use]
    pub fn window(&self) -> PixelWindow {
        PixelWindow::new(self.x, self.y, self.width, self.height)
    }
}

/// `m_{i * chunk_width + j}.tif`
#[must_use]
pub fn chunk_file_name(i: usize, j: usize, chunk_width: usize) -> String {
    format!("m_{}.tif", i * chunk_width + j)
}

/// A chunk that was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub rect: ChunkRect,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetileOptions {
    pub chunk_width: usize,
    pub chunk_height: usize,
    pub encode: EncodeOptions,
}

impl Default for RetileOptions {
    fn default() -> Self {
        Self {
            chunk_width: 2048,
            chunk_height: 2048,
            encode: EncodeOptions::default(),
        }
    }
}

/// Outcome of a retiling pass.
#[derive(Debug, Default)]
pub struct RetileReport {
    /// Written chunks in `(i, j)` order
    pub written: Vec<OutputChunk>,
    /// One [`MosaicError::ChunkWrite`] per skipped chunk
    pub failed: Vec<MosaicError>,
}

impl RetileReport {
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.written.iter().map(|c| c.path.clone()).collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Write every chunk of `canvas` into `out_dir`.
///
/// Chunks are written in parallel. Existing files at a chunk's path are
/// removed first, and each chunk is encoded to a `.part` sibling that is
/// renamed into place once complete. A chunk that fails is recorded in the
/// report and skipped, leaving no file at its path.
///
/// # Errors
/// Only layout errors are returned; write failures go to the report.
pub fn retile<T: Sample, E: ChunkEncoder>(
    canvas: &Raster<T>,
    options: &RetileOptions,
    encoder: &E,
    out_dir: &Path,
) -> Result<RetileReport> {
    let layout = ChunkLayout::plan(canvas.width, canvas.height, options.chunk_width, options.chunk_height)?;
    info!(
        chunks = layout.len(),
        chunks_x = layout.chunks_x,
        chunks_y = layout.chunks_y,
        dir = %out_dir.display(),
        "Retiling canvas"
    );

    let results: Vec<Result<OutputChunk>> = layout
        .rects()
        .into_par_iter()
        .map(|rect| {
            let path = out_dir.join(layout.file_name(&rect));
            write_chunk(canvas, &rect, &path, &options.encode, encoder).map_err(|source| {
                MosaicError::ChunkWrite {
                    col: rect.col,
                    row: rect.row,
                    path: path.clone(),
                    source,
                }
            })?;
            Ok(OutputChunk { rect, path })
        })
        .collect();

    let mut report = RetileReport::default();
    for result in results {
        match result {
            Ok(chunk) => report.written.push(chunk),
            Err(e) => {
                warn!(error = %e, "Skipping chunk");
                report.failed.push(e);
            }
        }
    }
    Ok(report)
}

fn write_chunk<T: Sample, E: ChunkEncoder>(
    canvas: &Raster<T>,
    rect: &ChunkRect,
    path: &Path,
    options: &EncodeOptions,
    encoder: &E,
) -> std::result::Result<PathBuf, EncodeError> {
    if path.exists() {
        fs::remove_file(path)?;
        debug!(path = %path.display(), "Removed stale chunk");
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let chunk = canvas.window(&rect.window());
    match encoder.write(&partial, &chunk, options) {
        Ok(written) => {
            fs::rename(&written, path)?;
            Ok(path.to_path_buf())
        }
        Err(e) => {
            // Best effort: a truncated chunk must not be left behind
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

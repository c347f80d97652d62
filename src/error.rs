//! Error types for the mosaic pipeline and its codec collaborators.
//!
//! Codec failures have their own enums ([`DecodeError`], [`EncodeError`],
//! [`BuildError`]) so that a collaborator can be swapped without touching the
//! pipeline. [`MosaicError`] wraps them and adds the pipeline's own failure
//! modes.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Failure while decoding an input raster.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be opened or read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The TIFF structure could not be decoded
    #[error("TIFF decoding error in {path}: {message}")]
    Tiff { path: PathBuf, message: String },
    /// No ModelPixelScale/ModelTiepoint or ModelTransformation tags
    #[error("{path} carries no georeferencing tags")]
    MissingGeoreference { path: PathBuf },
    /// A layout this crate does not handle (multiband, odd sample types)
    #[error("unsupported raster in {path}: {message}")]
    Unsupported { path: PathBuf, message: String },
}

/// Failure while encoding a raster to a file.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TIFF encoding error
    #[error("TIFF encoding error: {0}")]
    TiffEncode(String),
    /// Invalid raster data or encoding parameters
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<tiff::TiffError> for EncodeError {
    fn from(e: tiff::TiffError) -> Self {
        Self::TiffEncode(e.to_string())
    }
}

/// Failure while embedding overviews into an already written file.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("reading base image: {0}")]
    Decode(#[from] DecodeError),
    #[error("writing overview levels: {0}")]
    Encode(#[from] EncodeError),
    #[error("replacing {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the mosaic pipeline.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// No input tiles to aggregate
    #[error("no input tiles to mosaic")]
    EmptyInput,

    /// An affine transform with a zero (or non-finite) determinant
    #[error("degenerate transform (determinant {determinant})")]
    DegenerateTransform { determinant: f64 },

    /// The canvas at the requested resolution cannot be held in memory
    #[error("canvas of {width}x{height} pixels is too large")]
    CanvasTooLarge { width: usize, height: usize },

    /// Every sample of every tile was masked out
    #[error("no valid samples in any input tile")]
    NoValidData,

    /// Global minimum equals global maximum, so no rescale can be derived
    #[error("degenerate intensity range: min == max == {value}")]
    DegenerateRange { value: f64 },

    /// One chunk could not be written; the run continues without it
    #[error("failed to write chunk ({col}, {row}) to {path}: {source}")]
    ChunkWrite {
        col: usize,
        row: usize,
        path: PathBuf,
        #[source]
        source: EncodeError,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MosaicError {
    /// Whether this error aborts a run, as opposed to degrading its output.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ChunkWrite { .. } | Self::Build(_))
    }
}

pub type Result<T, E = MosaicError> = std::result::Result<T, E>;

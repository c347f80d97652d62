//! Codec collaborators used by the retiling and overview phases.
//!
//! The pipeline only talks to [`ChunkEncoder`] and [`OverviewBuilder`]; the
//! GeoTIFF implementations live in [`crate::geotiff_writer`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, EncodeError};
use crate::raster::{Raster, Sample};

/// Internal tiling of an encoded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiling {
    pub width: u32,
    pub height: u32,
}

impl Tiling {
    /// TIFF requires tile dimensions to be multiples of 16.
    pub const ALIGNMENT: u32 = 16;

    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.width % Self::ALIGNMENT == 0
            && self.height % Self::ALIGNMENT == 0
    }
}

impl Default for Tiling {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

/// Compression method for encoded chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompressionScheme {
    /// No compression - fastest but largest files
    None,
    /// LZW compression - good balance of speed and size
    Lzw,
    /// Deflate (zlib) compression - better compression, slower
    #[default]
    Deflate,
}

impl CompressionScheme {
    /// TIFF `Compression` tag value
    #[must_use]
    pub fn tag_value(self) -> u16 {
        match self {
            Self::None => 1,
            Self::Lzw => 5,
            Self::Deflate => 8,
        }
    }
}

/// Compression scheme plus its quality ratio.
///
/// `ratio` is a quality in `[0, 1]`: for Deflate, lower quality selects a
/// higher compression level. A NaN ratio disables compression entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    pub scheme: CompressionScheme,
    pub ratio: f64,
}

impl CompressionSettings {
    #[must_use]
    pub fn new(scheme: CompressionScheme, ratio: f64) -> Self {
        Self { scheme, ratio }
    }

    #[must_use]
    pub fn none() -> Self {
        Self::new(CompressionScheme::None, f64::NAN)
    }

    /// Scheme actually applied to the data.
    #[must_use]
    pub fn effective_scheme(&self) -> CompressionScheme {
        if self.ratio.is_nan() {
            CompressionScheme::None
        } else {
            self.scheme
        }
    }

    /// zlib level in `1..=9` derived from the quality ratio.
    #[must_use]
    pub fn deflate_level(&self) -> u32 {
        let quality = if self.ratio.is_finite() {
            self.ratio.clamp(0.0, 1.0)
        } else {
            1.0
        };
        // Safety: the value is within 0.0..=9.0 after clamping
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let level = ((1.0 - quality) * 9.0).round() as u32;
        level.clamp(1, 9)
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self::new(CompressionScheme::Deflate, 0.75)
    }
}

/// Everything an encoder needs besides the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EncodeOptions {
    pub tiling: Tiling,
    pub compression: CompressionSettings,
}

/// Downsampling kernel used for overview levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OverviewInterpolation {
    /// Pick one source sample per output pixel
    #[default]
    Nearest,
    /// Mean of the valid samples in each block
    Average,
}

/// Parameters of one overview build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverviewRequest {
    /// Size ratio between consecutive levels
    pub downsample_step: u32,
    /// Number of levels below full resolution
    pub num_steps: u32,
    pub interpolation: OverviewInterpolation,
    pub encode: EncodeOptions,
}

impl Default for OverviewRequest {
    fn default() -> Self {
        Self {
            downsample_step: 2,
            num_steps: 4,
            interpolation: OverviewInterpolation::default(),
            encode: EncodeOptions::default(),
        }
    }
}

/// Writes one raster to one file.
pub trait ChunkEncoder: Send + Sync {
    /// Encode `raster` to `path`, returning the path actually written.
    ///
    /// # Errors
    /// Returns [`EncodeError`] if the data is invalid or the file cannot be written.
    fn write<T: Sample>(
        &self,
        path: &Path,
        raster: &Raster<T>,
        options: &EncodeOptions,
    ) -> Result<PathBuf, EncodeError>;
}

/// Embeds reduced-resolution copies into an already written file.
pub trait OverviewBuilder: Send + Sync {
    /// Build overviews for `path`, returning the number of levels added.
    ///
    /// # Errors
    /// Returns [`BuildError`] if the file cannot be read back or rewritten.
    fn build(&self, path: &Path, request: &OverviewRequest) -> Result<usize, BuildError>;
}

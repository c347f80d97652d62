//! Run configuration.
//!
//! A [`MosaicConfig`] is read from a TOML file; every key has a default so a
//! file only needs to name what differs. Policy choices are plain strings in
//! the file and resolve to statically declared enums, with an explicit error
//! for unknown keys.
//!
//! ```toml
//! working_directory = "/data/leg01/channel_a"
//! pixel_size_x = 0.025
//! pixel_size_y = -0.015
//! chunk_width = 2048
//! chunk_height = 2048
//! compression_scheme = "lzw"
//! blend = "overlay"
//!
//! [log_compression]
//! enabled = true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{
    CompressionScheme, CompressionSettings, EncodeOptions, OverviewInterpolation, OverviewRequest, Tiling,
};
use crate::mosaic::compositor::{BlendPolicy, CompositeOptions, Resampling};
use crate::mosaic::log_scale::LogCompression;
use crate::mosaic::normalize::DegenerateRangePolicy;
use crate::mosaic::retile::RetileOptions;
use crate::source::local::{default_extensions, LocalScanOptions};

/// Errors that can occur while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML text is malformed or names an unknown field
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A string-keyed choice names no known variant
    #[error("unknown {kind} '{key}' (expected one of: {expected})")]
    UnknownKey {
        kind: &'static str,
        key: String,
        expected: String,
    },

    /// Validation failed for the value
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Declare the string keys of a policy enum.
///
/// Generates `key()`, `KEYS`, `Display`, case-insensitive `FromStr` and the
/// `String` conversions serde uses through `#[serde(try_from, into)]`.
macro_rules! string_keyed {
    ($ty:ident, $kind:literal, { $($variant:ident => $key:literal),+ $(,)? }) => {
        impl $ty {
            /// Every accepted key, in declaration order.
            pub const KEYS: &'static [&'static str] = &[$($key),+];

            /// Canonical key of this variant.
            #[must_use]
            pub fn key(self) -> &'static str {
                match self {
                    $(Self::$variant => $key),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.key())
            }
        }

        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($key => Ok(Self::$variant),)+
                    _ => Err(ConfigError::UnknownKey {
                        kind: $kind,
                        key: s.to_string(),
                        expected: Self::KEYS.join(", "),
                    }),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ConfigError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.key().to_string()
            }
        }
    };
}

string_keyed!(CompressionScheme, "compression scheme", {
    None => "none",
    Lzw => "lzw",
    Deflate => "deflate",
});

string_keyed!(OverviewInterpolation, "overview interpolation", {
    Nearest => "nearest",
    Average => "average",
});

string_keyed!(Resampling, "resampling kernel", {
    Nearest => "nearest",
    Bilinear => "bilinear",
});

string_keyed!(BlendPolicy, "blend mode", {
    Overlay => "overlay",
    Blend => "blend",
});

string_keyed!(DegenerateRangePolicy, "degenerate range policy", {
    Fail => "fail",
    Midpoint => "midpoint",
});

/// Log-compression section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogCompressionConfig {
    pub enabled: bool,
    pub scale: f64,
    pub correction: f64,
}

impl Default for LogCompressionConfig {
    fn default() -> Self {
        let law = LogCompression::default();
        Self {
            enabled: false,
            scale: law.scale,
            correction: law.correction,
        }
    }
}

/// Everything one mosaic run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MosaicConfig {
    /// Directory holding the input tiles; outputs are created inside it
    pub working_directory: PathBuf,
    /// Timestamp used in output directory names (defaults to the run time)
    pub time: Option<String>,
    /// Output resolution in world units per pixel
    pub pixel_size_x: f64,
    /// Conventionally negative so that rows grow southwards
    pub pixel_size_y: f64,
    pub chunk_width: usize,
    pub chunk_height: usize,
    /// Internal TIFF tile size of every written file
    pub tile_width: u32,
    pub tile_height: u32,
    pub compression_scheme: CompressionScheme,
    /// Quality in `[0, 1]`; NaN disables compression
    pub compression_ratio: f64,
    pub downsample_step: u32,
    pub num_steps: u32,
    pub overview_interpolation: OverviewInterpolation,
    pub resampling: Resampling,
    pub blend: BlendPolicy,
    /// Cross-fade width in source pixels (0 = equal weights)
    pub blend_margin: f64,
    /// Canvas value of uncovered pixels
    pub nodata: f32,
    /// Samples below this value are outside the region of interest
    pub valid_threshold: Option<f64>,
    pub log_compression: LogCompressionConfig,
    pub degenerate_range: DegenerateRangePolicy,
    /// Eligible input extensions (case-insensitive)
    pub extensions: Vec<String>,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        let overview = OverviewRequest::default();
        let compression = CompressionSettings::default();
        let tiling = Tiling::default();
        Self {
            working_directory: PathBuf::from("."),
            time: None,
            pixel_size_x: 0.025,
            pixel_size_y: -0.015,
            chunk_width: 2048,
            chunk_height: 2048,
            tile_width: tiling.width,
            tile_height: tiling.height,
            compression_scheme: compression.scheme,
            compression_ratio: compression.ratio,
            downsample_step: overview.downsample_step,
            num_steps: overview.num_steps,
            overview_interpolation: overview.interpolation,
            resampling: Resampling::default(),
            blend: BlendPolicy::default(),
            blend_margin: 0.0,
            nodata: f32::NAN,
            valid_threshold: None,
            log_compression: LogCompressionConfig::default(),
            degenerate_range: DegenerateRangePolicy::default(),
            extensions: default_extensions(),
        }
    }
}

impl MosaicConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = text.parse()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// `downsample_step` and `num_steps` are not checked here: zero values
    /// only abort the overview phase of a run. Pixel sizes are checked when
    /// the global grid is built, which reports a zero size as
    /// [`crate::MosaicError::DegenerateTransform`].
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key, reason: &str| {
            Err(ConfigError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };

        if self.chunk_width == 0 {
            return invalid("chunk_width", "must be positive");
        }
        if self.chunk_height == 0 {
            return invalid("chunk_height", "must be positive");
        }
        if !self.tiling().is_valid() {
            return invalid("tile_width/tile_height", "must be positive multiples of 16");
        }
        if self.compression_ratio.is_finite() && !(0.0..=1.0).contains(&self.compression_ratio) {
            return invalid("compression_ratio", "must be within [0, 1] or nan");
        }
        if !self.blend_margin.is_finite() || self.blend_margin < 0.0 {
            return invalid("blend_margin", "must be finite and not negative");
        }
        if self.log_compression.enabled {
            let law = self.log_compression;
            if !(law.scale.is_finite() && law.scale > 0.0) {
                return invalid("log_compression.scale", "must be finite and positive");
            }
            if !(law.correction.is_finite() && law.correction > 0.0) {
                return invalid("log_compression.correction", "must be finite and positive");
            }
        }
        if self.extensions.is_empty() {
            return invalid("extensions", "at least one extension is required");
        }
        Ok(())
    }

    #[must_use]
    pub fn tiling(&self) -> Tiling {
        Tiling::new(self.tile_width, self.tile_height)
    }

    #[must_use]
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            tiling: self.tiling(),
            compression: CompressionSettings::new(self.compression_scheme, self.compression_ratio),
        }
    }

    #[must_use]
    pub fn log_law(&self) -> Option<LogCompression> {
        self.log_compression
            .enabled
            .then(|| LogCompression::new(self.log_compression.scale, self.log_compression.correction))
    }

    #[must_use]
    pub fn composite_options(&self) -> CompositeOptions {
        CompositeOptions {
            resampling: self.resampling,
            blend: self.blend,
            blend_margin: self.blend_margin,
            nodata: self.nodata,
        }
    }

    #[must_use]
    pub fn retile_options(&self) -> RetileOptions {
        RetileOptions {
            chunk_width: self.chunk_width,
            chunk_height: self.chunk_height,
            encode: self.encode_options(),
        }
    }

    #[must_use]
    pub fn overview_request(&self) -> OverviewRequest {
        OverviewRequest {
            downsample_step: self.downsample_step,
            num_steps: self.num_steps,
            interpolation: self.overview_interpolation,
            encode: self.encode_options(),
        }
    }

    #[must_use]
    pub fn scan_options(&self) -> LocalScanOptions {
        LocalScanOptions::default().with_extensions(self.extensions.clone())
    }
}

impl FromStr for MosaicConfig {
    type Err = ConfigError;

    /// Parse and validate TOML text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: MosaicConfig = "".parse().unwrap();
        assert_eq!(config.pixel_size_x, 0.025);
        assert_eq!(config.pixel_size_y, -0.015);
        assert_eq!(config.compression_scheme, CompressionScheme::Deflate);
        assert_eq!(config.blend, BlendPolicy::Blend);
        assert!(config.nodata.is_nan());
        assert!(config.log_law().is_none());
    }

    #[test]
    fn test_full_file() {
        let text = r#"
            working_directory = "/data/leg01"
            time = "20090612T101500"
            chunk_width = 100
            chunk_height = 50
            tile_width = 64
            tile_height = 32
            compression_scheme = "LZW"
            compression_ratio = 0.5
            downsample_step = 3
            num_steps = 2
            overview_interpolation = "average"
            resampling = "bilinear"
            blend = "overlay"
            degenerate_range = "fail"
            extensions = ["tif"]

            [log_compression]
            enabled = true
            scale = 10.0
        "#;
        let config: MosaicConfig = text.parse().unwrap();
        assert_eq!(config.compression_scheme, CompressionScheme::Lzw);
        assert_eq!(config.overview_interpolation, OverviewInterpolation::Average);
        assert_eq!(config.resampling, Resampling::Bilinear);
        assert_eq!(config.blend, BlendPolicy::Overlay);
        assert_eq!(config.degenerate_range, DegenerateRangePolicy::Fail);
        assert_eq!(config.tiling(), Tiling::new(64, 32));

        let law = config.log_law().unwrap();
        assert_eq!(law.scale, 10.0);
        assert_eq!(law.correction, LogCompression::default().correction);

        let request = config.overview_request();
        assert_eq!((request.downsample_step, request.num_steps), (3, 2));
        assert_eq!(config.retile_options().chunk_height, 50);
    }

    #[test]
    fn test_unknown_policy_key() {
        let err = "blend = \"feather\"".parse::<MosaicConfig>().unwrap_err();
        assert!(err.to_string().contains("feather"), "{err}");

        let err = "zstd".parse::<CompressionScheme>().unwrap_err();
        match err {
            ConfigError::UnknownKey { kind, expected, .. } => {
                assert_eq!(kind, "compression scheme");
                assert_eq!(expected, "none, lzw, deflate");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            "chunk_widht = 10".parse::<MosaicConfig>(),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation() {
        let cases = [
            ("chunk_width = 0", "chunk_width"),
            ("tile_width = 250", "tile_width/tile_height"),
            ("compression_ratio = 1.5", "compression_ratio"),
            ("blend_margin = -1.0", "blend_margin"),
            ("[log_compression]\nenabled = true\nscale = 0.0", "log_compression.scale"),
        ];
        for (text, expected_key) in cases {
            match text.parse::<MosaicConfig>() {
                Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("{text}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_zero_pixel_size_left_to_grid() {
        let config: MosaicConfig = "pixel_size_x = 0.0".parse().unwrap();
        assert_eq!(config.pixel_size_x, 0.0);
    }

    #[test]
    fn test_nan_ratio_accepted() {
        let config: MosaicConfig = "compression_ratio = nan".parse().unwrap();
        assert!(config.encode_options().compression.effective_scheme() == CompressionScheme::None);
    }

    #[test]
    fn test_policy_display_roundtrip() {
        for key in Resampling::KEYS {
            let parsed: Resampling = key.parse().unwrap();
            assert_eq!(parsed.to_string(), *key);
        }
    }

    #[test]
    fn test_load_missing_file() {
        let result = MosaicConfig::load(Path::new("/nonexistent/mosaic.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}

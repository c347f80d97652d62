#![doc = include_str!("../README.md")]
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`source`]: Input tile discovery via [`LocalTileSource`] and the [`TileLoader`] seam
//! - [`geotiff_reader`]: Decode single-band GeoTIFF tiles and chunks
//! - [`geometry`]: Affine transforms ([`GeoTransform`]), envelopes and CRS lookups
//! - [`raster`]: Tile and canvas buffers
//! - [`mosaic`]: Envelope, grid, extrema, compositing, normalization, retiling and overviews
//! - [`codec`]: Encoder and overview-builder contracts with their parameters
//! - [`geotiff_writer`]: Tiled GeoTIFF output with embedded overviews
//! - [`pyramid`]: Reduced-resolution levels
//! - [`config`]: TOML run configuration
//! - [`logging`]: Subscriber setup for binaries

// ============================================================================
// Public modules
// ============================================================================

pub mod casting;
pub mod codec;
pub mod config;
pub mod error;
pub mod geometry;
pub mod geotiff_reader;
pub mod geotiff_writer;
pub mod logging;
pub mod mosaic;
pub mod pyramid;
pub mod raster;
pub mod source;

// ============================================================================
// Errors
// ============================================================================

pub use error::{
    BuildError,
    DecodeError,
    EncodeError,
    MosaicError,
    Result,
};

// ============================================================================
// Pipeline
// ============================================================================
// Primary API: MosaicPipeline::geotiff(config).run()

pub use mosaic::{
    MosaicPipeline,
    RunReport,
    OverviewOutcome,
    Extrema,
    GlobalGrid,
    LogCompression,
    BlendPolicy,
    CompositeOptions,
    Resampling,
    DegenerateRangePolicy,
    ChunkLayout,
    ChunkRect,
    OutputChunk,
    RetileOptions,
    RetileReport,
    OverviewReport,
};

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    ConfigError,
    MosaicConfig,
};

// ============================================================================
// Geometry & Rasters
// ============================================================================

pub use geometry::{Envelope, GeoTransform};
pub use geometry::projection::{
    get_proj_string,
    is_geographic_crs,
};
pub use raster::{
    BalancedCanvas,
    MosaicCanvas,
    PixelWindow,
    Raster,
    RasterTile,
    Sample,
};

// ============================================================================
// Source Discovery
// ============================================================================

pub use source::{
    TileEntry,
    TileLoader,
    TileSource,
    LocalTileSource,
    LocalScanOptions,
    LocalSourceStats,
};

// ============================================================================
// Codecs
// ============================================================================

pub use codec::{
    ChunkEncoder,
    CompressionScheme,
    CompressionSettings,
    EncodeOptions,
    OverviewBuilder,
    OverviewInterpolation,
    OverviewRequest,
    Tiling,
};

pub use geotiff_reader::{
    DecodedRaster,
    GeoTiffTileLoader,
    read_geotiff,
};

pub use geotiff_writer::{
    GeoTiffChunkEncoder,
    GeoTiffOverviewBuilder,
    GeoTiffWriter,
};

//! The mosaic pipeline stages.
//!
//! Each stage is a free function over plain data so it can be tested and
//! benchmarked on its own; [`pipeline::MosaicPipeline`] chains them for one
//! working directory.

pub mod compositor;
pub mod envelope;
pub mod extrema;
pub mod grid;
pub mod log_scale;
pub mod normalize;
pub mod overview;
pub mod pipeline;
pub mod retile;

pub use compositor::{composite, BlendPolicy, CompositeOptions, Resampling};
pub use envelope::aggregate;
pub use extrema::Extrema;
pub use grid::{build_transform, GlobalGrid};
pub use log_scale::LogCompression;
pub use normalize::{normalize, DegenerateRangePolicy, LinearRescale};
pub use overview::{build_overviews, OverviewReport};
pub use pipeline::{MosaicPipeline, OverviewOutcome, RunReport};
pub use retile::{chunk_file_name, retile, ChunkLayout, ChunkRect, OutputChunk, RetileOptions, RetileReport};

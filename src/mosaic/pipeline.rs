//! One mosaic run over a working directory.
//!
//! Load -> envelope -> grid -> {extrema, composite} -> normalize -> retile
//! (balanced, then raw) -> overviews. Extrema and compositing run
//! concurrently and both finish before normalization starts.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, info_span, instrument, warn};

use crate::codec::{ChunkEncoder, OverviewBuilder};
use crate::config::MosaicConfig;
use crate::error::{MosaicError, Result};
use crate::geometry::Envelope;
use crate::geotiff_reader::GeoTiffTileLoader;
use crate::geotiff_writer::{GeoTiffChunkEncoder, GeoTiffOverviewBuilder};
use crate::mosaic::compositor::composite;
use crate::mosaic::envelope::aggregate;
use crate::mosaic::extrema::{self, Extrema};
use crate::mosaic::grid::build_transform;
use crate::mosaic::normalize::normalize;
use crate::mosaic::overview::{build_overviews, OverviewReport};
use crate::mosaic::retile::{retile, RetileReport};
use crate::source::{load_all, LocalTileSource, TileLoader, TileSource};

/// Prefix of the raw (float) mosaic directory.
pub const RAW_PREFIX: &str = "rawm_";
/// Prefix of the balanced (8-bit) mosaic directory.
pub const BALANCED_PREFIX: &str = "balm_";

const TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// `(rawm_<time>_<name>, balm_<time>_<name>)` under `working_dir`.
///
/// `<name>` is the last component of the working directory.
#[must_use]
pub fn output_dir_names(working_dir: &Path, time: &str) -> (PathBuf, PathBuf) {
    let name = working_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            fs::canonicalize(working_dir)
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "mosaic".to_string());

    (
        working_dir.join(format!("{RAW_PREFIX}{time}_{name}")),
        working_dir.join(format!("{BALANCED_PREFIX}{time}_{name}")),
    )
}

/// Result of the overview phase.
#[derive(Debug)]
pub enum OverviewOutcome {
    Built(OverviewReport),
    /// The phase was not run; chunks are valid but have no overviews
    Skipped(MosaicError),
}

/// Summary of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub tiles: usize,
    pub envelope: Envelope,
    pub canvas_width: usize,
    pub canvas_height: usize,
    pub extrema: Extrema,
    pub raw_dir: PathBuf,
    pub balanced_dir: PathBuf,
    pub raw: RetileReport,
    pub balanced: RetileReport,
    pub overviews: OverviewOutcome,
}

impl RunReport {
    /// Whether every chunk and every overview was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.raw.is_complete()
            && self.balanced.is_complete()
            && matches!(&self.overviews, OverviewOutcome::Built(r) if r.is_complete())
    }
}

/// The mosaic pipeline with its codec collaborators.
pub struct MosaicPipeline<L, E, B> {
    config: MosaicConfig,
    loader: L,
    encoder: E,
    overviews: B,
}

impl MosaicPipeline<GeoTiffTileLoader, GeoTiffChunkEncoder, GeoTiffOverviewBuilder> {
    /// Pipeline reading and writing GeoTIFF files.
    #[must_use]
    pub fn geotiff(config: MosaicConfig) -> Self {
        Self::new(config, GeoTiffTileLoader, GeoTiffChunkEncoder, GeoTiffOverviewBuilder)
    }
}

impl<L: TileLoader, E: ChunkEncoder, B: OverviewBuilder> MosaicPipeline<L, E, B> {
    #[must_use]
    pub fn new(config: MosaicConfig, loader: L, encoder: E, overviews: B) -> Self {
        Self {
            config,
            loader,
            encoder,
            overviews,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    /// Run with the configured time, or the current UTC time.
    ///
    /// # Errors
    /// See [`MosaicPipeline::run_at`].
    pub fn run(&self) -> Result<RunReport> {
        self.run_at(Utc::now())
    }

    /// Run, naming outputs after `now` unless the configuration sets `time`.
    ///
    /// Output directories are created only once statistics and normalization
    /// have succeeded, so a failed run leaves the working directory as it was.
    ///
    /// # Errors
    /// Returns the fatal [`MosaicError`]s: invalid configuration, unreadable
    /// inputs, empty input, degenerate transform or range, no valid data, and
    /// failure to create the output directories. Chunk and overview failures
    /// are reported in the [`RunReport`] instead.
    #[instrument(skip(self, now), fields(dir = %self.config.working_directory.display()))]
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let config = &self.config;
        config.validate()?;
        let law = config.log_law();

        let source = LocalTileSource::scan(&config.working_directory, &config.scan_options())?;
        if source.is_empty() {
            return Err(MosaicError::EmptyInput);
        }
        let stats = source.stats();
        info!(tiles = stats.file_count, size_mb = stats.total_size_mb(), "Found tiles");

        let mut tiles = info_span!("load").in_scope(|| load_all(&self.loader, source.entries()))?;
        if let Some(threshold) = config.valid_threshold {
            tiles = tiles.into_iter().map(|t| t.with_valid_threshold(threshold)).collect();
        }

        let envelope = aggregate(&tiles)?;
        let grid = build_transform(&envelope, config.pixel_size_x, config.pixel_size_y)?;
        info!(
            width = grid.width,
            height = grid.height,
            min_x = envelope.min_x,
            max_y = envelope.max_y,
            "Global grid"
        );

        let composite_options = config.composite_options();
        let (extrema, canvas) = rayon::join(
            || info_span!("extrema").in_scope(|| extrema::scan(&tiles, law.as_ref())),
            || info_span!("composite").in_scope(|| composite(&tiles, &grid, &composite_options)),
        );
        let (extrema, canvas) = (extrema?, canvas?);
        drop(tiles);
        info!(min = extrema.min, max = extrema.max, "Extrema");

        let balanced = info_span!("normalize")
            .in_scope(|| normalize(&canvas, &extrema, law.as_ref(), config.degenerate_range))?;

        let time = config
            .time
            .clone()
            .unwrap_or_else(|| now.format(TIME_FORMAT).to_string());
        let (raw_dir, balanced_dir) = output_dir_names(&config.working_directory, &time);
        for dir in [&raw_dir, &balanced_dir] {
            fs::create_dir_all(dir).map_err(|source| MosaicError::Io {
                path: dir.clone(),
                source,
            })?;
        }

        let retile_options = config.retile_options();
        let balanced_report = info_span!("retile", kind = "balanced")
            .in_scope(|| retile(&balanced, &retile_options, &self.encoder, &balanced_dir))?;
        drop(balanced);
        let raw_report =
            info_span!("retile", kind = "raw").in_scope(|| retile(&canvas, &retile_options, &self.encoder, &raw_dir))?;
        let (canvas_width, canvas_height) = (canvas.width, canvas.height);
        drop(canvas);

        let files: Vec<PathBuf> = balanced_report
            .written
            .iter()
            .chain(&raw_report.written)
            .map(|c| c.path.clone())
            .collect();
        let overviews = match info_span!("overviews")
            .in_scope(|| build_overviews(&files, &config.overview_request(), &self.overviews))
        {
            Ok(report) => OverviewOutcome::Built(report),
            Err(e) => {
                warn!(error = %e, "Skipping overview phase");
                OverviewOutcome::Skipped(e)
            }
        };

        let report = RunReport {
            tiles: source.len(),
            envelope,
            canvas_width,
            canvas_height,
            extrema,
            raw_dir,
            balanced_dir,
            raw: raw_report,
            balanced: balanced_report,
            overviews,
        };
        info!(
            raw_chunks = report.raw.written.len(),
            balanced_chunks = report.balanced.written.len(),
            complete = report.is_complete(),
            "Mosaic finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_names() {
        let (raw, balanced) = output_dir_names(Path::new("/data/leg01"), "20090612T101500");
        assert_eq!(raw, PathBuf::from("/data/leg01/rawm_20090612T101500_leg01"));
        assert_eq!(balanced, PathBuf::from("/data/leg01/balm_20090612T101500_leg01"));
    }

    #[test]
    fn test_time_format() {
        let now = DateTime::parse_from_rfc3339("2009-06-12T10:15:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(now.format(TIME_FORMAT).to_string(), "20090612T101500");
    }

    #[test]
    fn test_missing_working_directory() {
        let config = MosaicConfig {
            working_directory: PathBuf::from("/nonexistent/leg"),
            ..MosaicConfig::default()
        };
        let result = MosaicPipeline::geotiff(config).run();
        assert!(matches!(result, Err(MosaicError::Io { .. })));
    }
}

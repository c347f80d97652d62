//! geomosaic - command-line interface
//!
//! `run` mosaics one working directory; `plan` prints the chunk layout a
//! canvas would be split into.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use geomosaic::mosaic::pipeline::OverviewOutcome;
use geomosaic::{
    BlendPolicy, ChunkLayout, CompressionScheme, DegenerateRangePolicy, MosaicConfig, MosaicPipeline,
    OverviewInterpolation, Resampling,
};

#[derive(Parser)]
#[command(name = "geomosaic")]
#[command(about = "Mosaic georeferenced tiles and retile them into GeoTIFF chunks", long_about = None)]
struct Cli {
    /// Log filter directive (overrides RUST_LOG), e.g. "geomosaic=debug"
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the raw and balanced mosaics for one working directory
    Run(RunArgs),
    /// Print the chunk layout for a canvas size without writing anything
    Plan {
        #[arg(long)]
        width: usize,
        #[arg(long)]
        height: usize,
        #[arg(long, default_value = "2048")]
        chunk_width: usize,
        #[arg(long, default_value = "2048")]
        chunk_height: usize,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// TOML configuration file; omitted keys take their defaults
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Working directory holding the input tiles
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Timestamp used in the output directory names
    #[arg(long)]
    time: Option<String>,

    #[arg(long)]
    pixel_size_x: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pixel_size_y: Option<f64>,

    #[arg(long)]
    chunk_width: Option<usize>,

    #[arg(long)]
    chunk_height: Option<usize>,

    #[arg(long)]
    tile_width: Option<u32>,

    #[arg(long)]
    tile_height: Option<u32>,

    /// none, lzw or deflate
    #[arg(long)]
    compression: Option<CompressionScheme>,

    /// Compression quality in [0, 1]; "nan" disables compression
    #[arg(long)]
    compression_ratio: Option<f64>,

    #[arg(long)]
    downsample_step: Option<u32>,

    #[arg(long)]
    num_steps: Option<u32>,

    /// nearest or average
    #[arg(long)]
    overview_interpolation: Option<OverviewInterpolation>,

    /// nearest or bilinear
    #[arg(long)]
    resampling: Option<Resampling>,

    /// overlay or blend
    #[arg(long)]
    blend: Option<BlendPolicy>,

    #[arg(long)]
    blend_margin: Option<f64>,

    /// fail or midpoint
    #[arg(long)]
    degenerate_range: Option<DegenerateRangePolicy>,

    /// Log-compress intensities before balancing
    #[arg(long)]
    log_compression: bool,
}

impl RunArgs {
    fn into_config(self) -> Result<MosaicConfig> {
        let mut config = match &self.config {
            Some(path) => MosaicConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => MosaicConfig::default(),
        };

        if let Some(v) = self.input {
            config.working_directory = v;
        }
        if self.time.is_some() {
            config.time = self.time;
        }
        if let Some(v) = self.pixel_size_x {
            config.pixel_size_x = v;
        }
        if let Some(v) = self.pixel_size_y {
            config.pixel_size_y = v;
        }
        if let Some(v) = self.chunk_width {
            config.chunk_width = v;
        }
        if let Some(v) = self.chunk_height {
            config.chunk_height = v;
        }
        if let Some(v) = self.tile_width {
            config.tile_width = v;
        }
        if let Some(v) = self.tile_height {
            config.tile_height = v;
        }
        if let Some(v) = self.compression {
            config.compression_scheme = v;
        }
        if let Some(v) = self.compression_ratio {
            config.compression_ratio = v;
        }
        if let Some(v) = self.downsample_step {
            config.downsample_step = v;
        }
        if let Some(v) = self.num_steps {
            config.num_steps = v;
        }
        if let Some(v) = self.overview_interpolation {
            config.overview_interpolation = v;
        }
        if let Some(v) = self.resampling {
            config.resampling = v;
        }
        if let Some(v) = self.blend {
            config.blend = v;
        }
        if let Some(v) = self.blend_margin {
            config.blend_margin = v;
        }
        if let Some(v) = self.degenerate_range {
            config.degenerate_range = v;
        }
        if self.log_compression {
            config.log_compression.enabled = true;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn run(args: RunArgs) -> Result<bool> {
    let config = args.into_config()?;
    let report = MosaicPipeline::geotiff(config).run().context("mosaic run failed")?;

    info!(
        raw = %report.raw_dir.display(),
        balanced = %report.balanced_dir.display(),
        canvas_width = report.canvas_width,
        canvas_height = report.canvas_height,
        "Outputs written"
    );
    for failure in report.raw.failed.iter().chain(&report.balanced.failed) {
        warn!(error = %failure, "Chunk missing from output");
    }
    match &report.overviews {
        OverviewOutcome::Built(overviews) => {
            for (path, e) in &overviews.failed {
                warn!(path = %path.display(), error = %e, "Chunk has no overviews");
            }
        }
        OverviewOutcome::Skipped(e) => warn!(error = %e, "No overviews were built"),
    }
    Ok(report.is_complete())
}

fn plan(width: usize, height: usize, chunk_width: usize, chunk_height: usize) -> Result<()> {
    let layout = ChunkLayout::plan(width, height, chunk_width, chunk_height)?;
    println!(
        "{} x {} chunks of {} x {} over a {} x {} canvas",
        layout.chunks_x, layout.chunks_y, layout.chunk_width, layout.chunk_height, width, height
    );
    for rect in layout.rects() {
        println!(
            "{:<12} col {:>3} row {:>3}  x {:>6} y {:>6}  {:>5} x {:<5}",
            layout.file_name(&rect),
            rect.col,
            rect.row,
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = geomosaic::logging::init_logging(cli.log.as_deref()) {
        eprintln!("warning: logging unavailable: {e}");
    }

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Plan {
            width,
            height,
            chunk_width,
            chunk_height,
        } => plan(width, height, chunk_width, chunk_height).map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        // Partial output: some chunks or overviews are missing
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

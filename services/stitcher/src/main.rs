//! Target pixel file stitcher service.
//!
//! Batch tool that stitches a directory of gzipped Kepler/K2 target
//! pixel files into one Zarr image cube plus a calibration FITS image.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cube_builder::{CubeCompression, CubeDtype, CubeStoreConfig};
use ingestion::{StitchConfig, Stitcher, DEFAULT_PATTERN, DEFAULT_PIXEL_COLUMN};

#[derive(Parser, Debug)]
#[command(name = "stitcher")]
#[command(about = "Stitch K2 target pixel files into a Zarr image cube")]
struct Args {
    /// Directory holding gzipped target pixel files
    #[arg(short, long)]
    input_dir: PathBuf,

    /// Root of the Zarr store to create
    #[arg(short, long)]
    output: PathBuf,

    /// Wildcard pattern matched against input file names
    #[arg(short, long, default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Bintable column holding the pixel samples
    #[arg(long, default_value = DEFAULT_PIXEL_COLUMN)]
    pixel_column: String,

    /// Calibration FITS path (default: derived from the output path)
    #[arg(long)]
    calibration_image: Option<PathBuf>,

    /// Cube element type: f32 or i32
    #[arg(long)]
    dtype: Option<String>,

    /// Chunk length along the time axis
    #[arg(long)]
    chunk_frames: Option<usize>,

    /// Chunk length along each spatial axis
    #[arg(long)]
    chunk_pixels: Option<usize>,

    /// Compression codec: none, blosc_lz4, or blosc_zstd
    #[arg(long)]
    compression: Option<String>,

    /// Blosc compression level, 0-9
    #[arg(long)]
    compression_level: Option<u8>,

    /// Replace existing outputs instead of failing
    #[arg(long)]
    overwrite: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Store settings come from STITCH_* environment variables, with
    // command-line flags taking precedence.
    let mut store = CubeStoreConfig::from_env();
    if let Some(dtype) = &args.dtype {
        store.dtype = CubeDtype::from_str(dtype);
    }
    if let Some(frames) = args.chunk_frames {
        store.chunk_frames = frames;
    }
    if let Some(pixels) = args.chunk_pixels {
        store.chunk_pixels = pixels;
    }
    if let Some(compression) = &args.compression {
        store.compression = CubeCompression::from_str(compression);
    }
    if let Some(level) = args.compression_level {
        store.compression_level = level;
    }

    let mut config = StitchConfig::new(args.input_dir, args.output);
    config.pattern = args.pattern;
    config.pixel_column = args.pixel_column;
    config.calibration_path = args.calibration_image;
    config.overwrite = args.overwrite;
    config.store = store;

    info!(
        input = %config.input_dir.display(),
        output = %config.output_path.display(),
        pattern = %config.pattern,
        dtype = %config.store.dtype,
        "starting stitch run"
    );

    let report = Stitcher::new(config)?.run()?;

    info!(
        files = report.files,
        frames = report.frames,
        width = report.width,
        height = report.height,
        dtype = %report.dtype,
        covered_pixels = report.covered_pixels,
        fully_covered = report.fully_covered,
        quality_merged = report.quality_merged,
        bytes_written = report.bytes_written,
        output = %report.output_path.display(),
        calibration = %report.calibration_path.display(),
        "stitch run complete"
    );

    Ok(())
}

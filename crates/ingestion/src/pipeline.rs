//! Two-pass stitch pipeline.
//!
//! Pass 1 reads every file's headers to lay the patches out on a common
//! zero-based footprint and to validate cadence counts against the
//! first file. Pass 2 re-reads each file and scatters its samples into
//! the cube, merging quality flags along the way. The finished cube is
//! persisted as a Zarr store plus a calibration FITS image of the last
//! frame.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zarrs_filesystem::FilesystemStore;

use cube_builder::{
    normalize_bounds, CoverageMask, CubeAttrs, CubeBuilderError, CubeDtype, CubeWriteSummary,
    CubeWriter, FramePixels, MosaicCube, PatchBounds, QualityAccumulator,
};
use fits_parser::{BinTable, FitsFile};

use crate::config::StitchConfig;
use crate::discovery::discover_inputs;
use crate::error::{Result, StitchError};
use crate::metadata::{read_fits_bytes, read_target_meta, TargetMeta, TABLE_HDU};

/// Column holding the per-cadence timestamps.
const TIME_COLUMN: &str = "TIME";

/// Column holding the per-cadence quality flags, when present.
const QUALITY_COLUMN: &str = "QUALITY";

/// Largest time-axis drift against the first file, in days, that passes
/// without a warning. Timestamps are barycentric-corrected per target,
/// so sub-second offsets between files of one campaign are expected.
const TIME_DRIFT_WARN: f64 = 1e-3;

/// Summary of one completed stitch run.
#[derive(Debug, Clone)]
pub struct StitchReport {
    /// Input files stitched.
    pub files: usize,
    /// Cadences in the output cube.
    pub frames: usize,
    /// Cube footprint width (CCD columns).
    pub width: usize,
    /// Cube footprint height (CCD rows).
    pub height: usize,
    /// Element type of the flux cube.
    pub dtype: CubeDtype,
    /// Footprint pixels that received data.
    pub covered_pixels: usize,
    /// Whether every footprint pixel received data.
    pub fully_covered: bool,
    /// Whether any input carried quality flags.
    pub quality_merged: bool,
    /// Uncompressed element bytes written to the store.
    pub bytes_written: u64,
    /// Root of the Zarr store.
    pub output_path: PathBuf,
    /// Path of the calibration FITS image.
    pub calibration_path: PathBuf,
}

/// Two-pass batch stitcher for a directory of target pixel files.
pub struct Stitcher {
    config: StitchConfig,
}

impl Stitcher {
    /// Create a stitcher, validating the configuration up front.
    pub fn new(config: StitchConfig) -> Result<Self> {
        config.validate().map_err(StitchError::InvalidConfig)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Run the full pipeline: discover, size, stitch, persist.
    pub fn run(&self) -> Result<StitchReport> {
        let config = &self.config;

        let files = discover_inputs(&config.input_dir, &config.pattern)?;
        info!(
            files = files.len(),
            dir = %config.input_dir.display(),
            pattern = %config.pattern,
            "discovered target pixel files"
        );

        // Pass 1: footprints and cadence counts from every header.
        info!(files = files.len(), "scanning headers");
        let mut metas = Vec::with_capacity(files.len());
        for path in &files {
            metas.push(read_target_meta(path)?);
        }
        let reference = &metas[0];
        for meta in &metas[1..] {
            if meta.cadences != reference.cadences {
                return Err(StitchError::CadenceCountMismatch {
                    file: meta.path.display().to_string(),
                    reference: reference.path.display().to_string(),
                    expected: reference.cadences,
                    actual: meta.cadences,
                });
            }
        }

        let mut bounds: Vec<PatchBounds> = metas.iter().map(|m| m.bounds).collect();
        let (width, height) = normalize_bounds(&mut bounds);

        // The first file fixes the time axis.
        let time = self.read_time_axis(&files[0])?;
        let frames = time.len();
        info!(
            frames,
            width,
            height,
            dtype = %config.store.dtype,
            bytes = frames * width * height * config.store.dtype.size(),
            "sized output cube"
        );

        // Inputs are validated, safe to clear prior outputs.
        self.prepare_output()?;

        let mut cube = MosaicCube::new(frames, width, height, config.store.dtype)?;
        let mut mask = CoverageMask::new(width, height);
        let mut quality = QualityAccumulator::new(frames);

        // Pass 2: scatter each file's samples into the cube.
        info!(files = files.len(), "stitching pixel data");
        for (meta, bounds) in metas.iter().zip(&bounds) {
            self.stitch_file(meta, bounds, &time, &mut cube, &mut mask, &mut quality)?;
        }

        if !mask.is_complete() {
            warn!(
                covered = mask.covered_pixels(),
                total = width * height,
                "cube footprint has uncovered pixels"
            );
        }

        let attrs = provenance_attrs(&metas);

        info!("saving outputs");
        let calibration_path = self.write_calibration(&cube)?;
        let summary = self.write_store(&cube, &mask, &time, &quality, &attrs)?;

        info!(
            files = files.len(),
            frames,
            width,
            height,
            bytes_written = summary.bytes_written,
            output = %config.output_path.display(),
            "stitch complete"
        );

        Ok(StitchReport {
            files: files.len(),
            frames,
            width,
            height,
            dtype: config.store.dtype,
            covered_pixels: mask.covered_pixels(),
            fully_covered: mask.is_complete(),
            quality_merged: quality.merged_any(),
            bytes_written: summary.bytes_written,
            output_path: config.output_path.clone(),
            calibration_path,
        })
    }

    /// Fail when output targets exist, or clear them when overwriting
    /// is allowed.
    fn prepare_output(&self) -> Result<()> {
        let output = &self.config.output_path;
        if output.exists() {
            if !self.config.overwrite {
                return Err(StitchError::OutputExists(output.display().to_string()));
            }
            info!(path = %output.display(), "removing existing cube store");
            if output.is_dir() {
                std::fs::remove_dir_all(output)?;
            } else {
                std::fs::remove_file(output)?;
            }
        }

        let calibration = self.config.calibration_path();
        if calibration.exists() && !self.config.overwrite {
            return Err(StitchError::OutputExists(calibration.display().to_string()));
        }

        std::fs::create_dir_all(output)?;
        Ok(())
    }

    /// Read the reference time axis from the first file's table.
    fn read_time_axis(&self, path: &Path) -> Result<Vec<f64>> {
        let wrap = |e| StitchError::fits(path, e);

        let bytes = read_fits_bytes(path)?;
        let fits = FitsFile::parse(bytes).map_err(wrap)?;
        let table = BinTable::from_hdu(fits.hdu(TABLE_HDU).map_err(wrap)?).map_err(wrap)?;
        table.read_f64(TIME_COLUMN).map_err(wrap)
    }

    /// Scatter one file into the cube and merge its quality flags.
    fn stitch_file(
        &self,
        meta: &TargetMeta,
        bounds: &PatchBounds,
        reference_time: &[f64],
        cube: &mut MosaicCube,
        mask: &mut CoverageMask,
        quality: &mut QualityAccumulator,
    ) -> Result<()> {
        let path = &meta.path;
        let wrap = |e| StitchError::fits(path, e);

        let bytes = read_fits_bytes(path)?;
        let fits = FitsFile::parse(bytes).map_err(wrap)?;
        let table = BinTable::from_hdu(fits.hdu(TABLE_HDU).map_err(wrap)?).map_err(wrap)?;

        let time = table.read_f64(TIME_COLUMN).map_err(wrap)?;
        let drift = max_time_drift(reference_time, &time);
        if drift > TIME_DRIFT_WARN {
            warn!(
                file = %path.display(),
                max_drift_days = drift,
                "time axis drifts from the first file"
            );
        }

        let column = table.column(&self.config.pixel_column).map_err(wrap)?;
        if column.tform.repeat != bounds.pixels() {
            return Err(StitchError::PixelCountMismatch {
                file: path.display().to_string(),
                column: self.config.pixel_column.clone(),
                expected: bounds.pixels(),
                actual: column.tform.repeat,
            });
        }
        if let Some(dims) = &column.dims {
            if *dims != [bounds.width(), bounds.height()] {
                warn!(
                    file = %path.display(),
                    tdim = ?dims,
                    width = bounds.width(),
                    height = bounds.height(),
                    "TDIM disagrees with aperture extents, using the aperture"
                );
            }
        }

        let flux = table.read_f32(&self.config.pixel_column).map_err(wrap)?;
        cube.write_patch(bounds, &flux)?;
        mask.mark(bounds)?;

        if table.column(QUALITY_COLUMN).is_ok() {
            let flags = table.read_i32(QUALITY_COLUMN).map_err(wrap)?;
            quality.or_flags(&flags)?;
        } else {
            warn!(file = %path.display(), "no QUALITY column, skipping flag merge");
        }

        debug!(file = %path.display(), bounds = %bounds, "stitched patch");
        Ok(())
    }

    /// Persist the cube and its companion arrays under the output path.
    fn write_store(
        &self,
        cube: &MosaicCube,
        mask: &CoverageMask,
        time: &[f64],
        quality: &QualityAccumulator,
        attrs: &CubeAttrs,
    ) -> Result<CubeWriteSummary> {
        let store = FilesystemStore::new(&self.config.output_path)
            .map_err(|e| CubeBuilderError::storage_error(e.to_string()))?;
        let writer = CubeWriter::new(self.config.store.clone());
        let quality = quality.merged_any().then_some(quality);
        Ok(writer.write(store, cube, mask, time, quality, attrs)?)
    }

    /// Write the last frame as a single-HDU FITS image.
    ///
    /// The cube's frames are contiguous `[x][y]` slices with y fastest,
    /// so the frame maps onto an image with NAXIS1 equal to the cube's
    /// y extent and NAXIS2 equal to its x extent without reshuffling.
    fn write_calibration(&self, cube: &MosaicCube) -> Result<PathBuf> {
        let path = self.config.calibration_path();
        let bytes = match cube.last_frame()? {
            FramePixels::F32(px) => fits_parser::encode_primary_f32(cube.height(), cube.width(), px),
            FramePixels::I32(px) => fits_parser::encode_primary_i32(cube.height(), cube.width(), px),
        }
        .map_err(|e| StitchError::fits(&path, e))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, bytes)?;
        info!(path = %path.display(), "wrote calibration image");
        Ok(path)
    }
}

/// Sky coverage and source names recorded on the cube's root group.
fn provenance_attrs(metas: &[TargetMeta]) -> CubeAttrs {
    let mut ra_range = [metas[0].ra_obj, metas[0].ra_obj];
    let mut dec_range = [metas[0].dec_obj, metas[0].dec_obj];
    for meta in &metas[1..] {
        ra_range[0] = ra_range[0].min(meta.ra_obj);
        ra_range[1] = ra_range[1].max(meta.ra_obj);
        dec_range[0] = dec_range[0].min(meta.dec_obj);
        dec_range[1] = dec_range[1].max(meta.dec_obj);
    }
    let source_names = metas
        .iter()
        .map(|m| {
            m.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| m.path.display().to_string())
        })
        .collect();
    CubeAttrs {
        ra_range,
        dec_range,
        source_names,
    }
}

/// Largest absolute timestamp difference between two time axes. NaN
/// cadences on either side are skipped.
fn max_time_drift(reference: &[f64], time: &[f64]) -> f64 {
    let mut max_drift = 0.0f64;
    for (&a, &b) in reference.iter().zip(time) {
        if a.is_nan() || b.is_nan() {
            continue;
        }
        max_drift = max_drift.max((a - b).abs());
    }
    max_drift
}

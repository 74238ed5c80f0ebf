//! Target pixel file stitching library.
//!
//! Provides core logic for stitching a directory of gzipped Kepler/K2
//! target pixel files into one Zarr image cube.
//!
//! # Architecture
//!
//! The pipeline makes two passes over the inputs:
//!
//! - Pass 1 reads every file's extension headers, validates cadence
//!   counts against the first file, and lays the patch footprints out
//!   on a common zero-based grid.
//! - Pass 2 re-reads each file, scatters its flux samples into the
//!   cube, tracks pixel coverage, and ORs per-cadence quality flags.
//!
//! The finished cube is persisted as a Zarr V3 store (`frames`, `mask`,
//! `time`, and optionally `quality` arrays under one root group) plus a
//! calibration FITS image holding the final frame.

pub mod config;
pub mod error;
pub mod metadata;
mod discovery;
mod pipeline;

// Re-exports
pub use config::{derived_calibration_path, StitchConfig, DEFAULT_PATTERN, DEFAULT_PIXEL_COLUMN};
pub use discovery::{discover_inputs, wildcard_match};
pub use error::{Result, StitchError};
pub use metadata::{
    decompress_gzip, is_gzip, read_fits_bytes, read_target_meta, TargetMeta, APERTURE_HDU,
    TABLE_HDU,
};
pub use pipeline::{StitchReport, Stitcher};

//! Cube Assembly with Zarr V3 Persistence
//!
//! This crate assembles per-target pixel patches into one dense image
//! cube and persists it as a Zarr V3 hierarchy. It provides:
//!
//! - **Bounds normalization**: shift raw CCD footprints to a zero-based
//!   frame and derive the union cube shape
//! - **Scatter writes**: place each patch at its normalized bounds, one
//!   cadence per frame, with everything else left as the fill sentinel
//! - **Companion arrays**: per-pixel coverage mask, time axis, and
//!   bitwise-OR merged quality flags
//!
//! # Architecture
//!
//! ```text
//! per-file patches
//!      │
//!      ▼
//! normalize_bounds(&mut bounds) ──► cube footprint (width, height)
//!      │
//!      ▼
//! MosaicCube::write_patch ──► [frame, x, y] dense cube
//! CoverageMask::mark      ──► [x, y] coverage
//! QualityAccumulator      ──► [frame] merged flags
//!      │
//!      ▼
//! CubeWriter::write ──► Zarr store: /frames /mask /time /quality
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cube_builder::{CubeDtype, CubeStoreConfig, CubeWriter, MosaicCube};
//!
//! let mut cube = MosaicCube::new(frames, width, height, CubeDtype::F32)?;
//! cube.write_patch(&bounds, &flux)?;
//!
//! let writer = CubeWriter::new(CubeStoreConfig::default());
//! writer.write(store, &cube, &mask, &time, None, &attrs)?;
//! ```

pub mod config;
pub mod cube;
pub mod error;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use config::{CubeCompression, CubeStoreConfig};
pub use cube::{CoverageMask, CubePixels, FramePixels, MosaicCube, QualityAccumulator};
pub use error::{CubeBuilderError, Result};
pub use types::{normalize_bounds, CubeDtype, PatchBounds};
pub use writer::{CubeAttrs, CubeWriteSummary, CubeWriter};

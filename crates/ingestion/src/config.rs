//! Stitch job configuration.
//!
//! Defines which files to read, where the cube store and calibration
//! image land, and how the cube itself is chunked and compressed.

use std::path::{Path, PathBuf};

use cube_builder::CubeStoreConfig;
use serde::{Deserialize, Serialize};

/// Default wildcard pattern for target pixel file discovery.
pub const DEFAULT_PATTERN: &str = "*.fits.gz";

/// Default bintable column holding the pixel samples.
pub const DEFAULT_PIXEL_COLUMN: &str = "FLUX";

/// Configuration for a single stitch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchConfig {
    /// Directory scanned for target pixel files.
    pub input_dir: PathBuf,
    /// Wildcard pattern matched against file names inside `input_dir`.
    pub pattern: String,
    /// Root directory of the Zarr store to create.
    pub output_path: PathBuf,
    /// Path of the calibration FITS image written from the last frame.
    /// Derived from `output_path` when not set.
    pub calibration_path: Option<PathBuf>,
    /// Bintable column holding the per-cadence pixel samples.
    pub pixel_column: String,
    /// Replace an existing store at `output_path` instead of failing.
    pub overwrite: bool,
    /// Chunking, compression, and dtype of the cube store.
    pub store: CubeStoreConfig,
}

impl StitchConfig {
    /// Creates a configuration with default pattern, column, and store
    /// settings for the given input directory and output store.
    pub fn new(input_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            output_path: output_path.into(),
            calibration_path: None,
            pixel_column: DEFAULT_PIXEL_COLUMN.to_string(),
            overwrite: false,
            store: CubeStoreConfig::default(),
        }
    }

    /// Resolves the calibration FITS path, deriving it from the store
    /// path when none was configured.
    pub fn calibration_path(&self) -> PathBuf {
        match &self.calibration_path {
            Some(path) => path.clone(),
            None => derived_calibration_path(&self.output_path),
        }
    }

    /// Validates the configuration, returning an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.pattern.is_empty() {
            return Err("pattern must not be empty".to_string());
        }
        if self.pixel_column.is_empty() {
            return Err("pixel_column must not be empty".to_string());
        }
        if self.output_path.as_os_str().is_empty() {
            return Err("output_path must not be empty".to_string());
        }
        self.store.validate()
    }
}

/// Builds the default calibration image path for a cube store path.
///
/// `/data/c16.zarr` becomes `/data/c16.fits`; a store without an
/// extension gets `.fits` appended.
pub fn derived_calibration_path(output_path: &Path) -> PathBuf {
    let mut path = output_path.to_path_buf();
    path.set_extension("fits");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StitchConfig::new("/data/tpf", "/data/cube.zarr");
        assert!(config.validate().is_ok());
        assert_eq!(config.pattern, "*.fits.gz");
        assert_eq!(config.pixel_column, "FLUX");
        assert!(!config.overwrite);
    }

    #[test]
    fn test_calibration_path_derived_from_store() {
        let config = StitchConfig::new("/data/tpf", "/data/c16.zarr");
        assert_eq!(config.calibration_path(), PathBuf::from("/data/c16.fits"));
    }

    #[test]
    fn test_explicit_calibration_path_wins() {
        let mut config = StitchConfig::new("/data/tpf", "/data/c16.zarr");
        config.calibration_path = Some(PathBuf::from("/tmp/last_frame.fits"));
        assert_eq!(
            config.calibration_path(),
            PathBuf::from("/tmp/last_frame.fits")
        );
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let mut config = StitchConfig::new("/data/tpf", "/data/cube.zarr");
        config.pattern.clear();
        assert!(config.validate().is_err());
    }
}

//! Error types for cube assembly.

use thiserror::Error;

/// Errors that can occur while building or persisting a cube.
#[derive(Error, Debug)]
pub enum CubeBuilderError {
    /// A patch does not fit inside the cube footprint.
    #[error("patch {patch} is outside cube bounds {cube}")]
    OutOfBounds { patch: String, cube: String },

    /// Supplied data does not match the declared shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The cube has a zero-length axis.
    #[error("empty cube: {0}")]
    EmptyCube(String),

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    ZarrError(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl CubeBuilderError {
    /// Create an OutOfBounds error.
    pub fn out_of_bounds(patch: impl Into<String>, cube: impl Into<String>) -> Self {
        Self::OutOfBounds {
            patch: patch.into(),
            cube: cube.into(),
        }
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create a StorageError.
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }
}

impl From<std::io::Error> for CubeBuilderError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

/// Result type for cube builder operations.
pub type Result<T> = std::result::Result<T, CubeBuilderError>;

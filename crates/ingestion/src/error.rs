//! Error types for the stitching crate.

use thiserror::Error;

/// Errors that can occur while stitching target pixel files.
#[derive(Error, Debug)]
pub enum StitchError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("{file}: {source}")]
    Fits {
        file: String,
        #[source]
        source: fits_parser::FitsError,
    },

    #[error(transparent)]
    Cube(#[from] cube_builder::CubeBuilderError),

    #[error("No input files matching '{pattern}' under {dir}")]
    NoInputFiles { dir: String, pattern: String },

    #[error("{file}: not a FITS file (neither gzip nor SIMPLE header)")]
    UnsupportedFile { file: String },

    #[error("{file}: table has no cadences")]
    EmptyTable { file: String },

    #[error("{file}: has {actual} cadences, {reference} has {expected}")]
    CadenceCountMismatch {
        file: String,
        reference: String,
        expected: usize,
        actual: usize,
    },

    #[error("{file}: column {column} holds {actual} pixels per cadence, aperture declares {expected}")]
    PixelCountMismatch {
        file: String,
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Output path already exists (pass overwrite to replace it): {0}")]
    OutputExists(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StitchError {
    /// Attaches the offending file name to a FITS-level error.
    pub fn fits(path: &std::path::Path, source: fits_parser::FitsError) -> Self {
        StitchError::Fits {
            file: path.display().to_string(),
            source,
        }
    }
}

/// Result type for stitching operations.
pub type Result<T> = std::result::Result<T, StitchError>;

//! Error types for FITS parsing operations.

use thiserror::Error;

/// Result type for FITS parser operations.
pub type Result<T> = std::result::Result<T, FitsError>;

/// Errors that can occur while reading or writing FITS data.
#[derive(Error, Debug)]
pub enum FitsError {
    /// File ended before a complete header or data unit.
    #[error("unexpected end of file: {0}")]
    UnexpectedEof(String),

    /// A header card could not be parsed.
    #[error("invalid header card '{keyword}': {reason}")]
    InvalidCard { keyword: String, reason: String },

    /// A required keyword is absent from the header.
    #[error("missing required keyword: {0}")]
    MissingKeyword(String),

    /// A keyword is present but holds a value of the wrong type.
    #[error("keyword {keyword} has type {actual}, expected {expected}")]
    WrongValueType {
        keyword: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The requested HDU index does not exist.
    #[error("HDU {index} not present (file has {count} HDUs)")]
    MissingHdu { index: usize, count: usize },

    /// An operation expected a binary table HDU.
    #[error("HDU is not a binary table: {0}")]
    NotABinaryTable(String),

    /// A TFORM value could not be interpreted.
    #[error("invalid TFORM value: {0}")]
    InvalidTform(String),

    /// The named column does not exist in the table.
    #[error("unknown table column {column} (available: {available})")]
    UnknownColumn { column: String, available: String },

    /// The column's stored type cannot be read as the requested type.
    #[error("cannot read column {column} ({tform}) as {requested}")]
    UnsupportedConversion {
        column: String,
        tform: String,
        requested: &'static str,
    },

    /// Image dimensions are inconsistent with the supplied data.
    #[error("invalid image dimensions: {0}")]
    InvalidDimensions(String),
}

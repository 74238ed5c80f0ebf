//! Pure Rust reader for FITS files as produced by the Kepler/K2
//! pipeline: header parsing, HDU segmentation, binary table column
//! access, and a minimal single-image writer.
//!
//! The parser operates on fully decompressed in-memory bytes and slices
//! data regions zero-copy via [`bytes::Bytes`].

pub mod bintable;
pub mod error;
pub mod hdu;
pub mod header;
pub mod image;

pub use bintable::{BinTable, Column, Tform};
pub use error::{FitsError, Result};
pub use hdu::{FitsFile, Hdu, HduKind};
pub use header::{Card, Header, Value};
pub use image::{decode_image_f32, encode_primary_f32, encode_primary_i32, ImageFrame};

/// FITS logical record size. Headers and data regions are padded to a
/// multiple of this.
pub const BLOCK_SIZE: usize = 2880;

/// Size of one header card.
pub const CARD_SIZE: usize = 80;

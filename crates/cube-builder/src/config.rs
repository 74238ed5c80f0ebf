//! Configuration for cube persistence.

use serde::{Deserialize, Serialize};

use crate::types::CubeDtype;

/// Configuration for the cube store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubeStoreConfig {
    /// Chunk length along the frame (time) axis.
    pub chunk_frames: usize,

    /// Chunk dimension along each spatial axis (square chunks).
    pub chunk_pixels: usize,

    /// Compression codec for stored arrays.
    pub compression: CubeCompression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub shuffle: bool,

    /// Element type of the flux cube.
    pub dtype: CubeDtype,
}

impl Default for CubeStoreConfig {
    fn default() -> Self {
        Self {
            chunk_frames: 64,
            chunk_pixels: 512,
            compression: CubeCompression::BloscZstd,
            compression_level: 1,
            shuffle: true,
            dtype: CubeDtype::F32,
        }
    }
}

impl CubeStoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STITCH_CHUNK_FRAMES") {
            if let Ok(size) = val.parse() {
                config.chunk_frames = size;
            }
        }

        if let Ok(val) = std::env::var("STITCH_CHUNK_PIXELS") {
            if let Ok(size) = val.parse() {
                config.chunk_pixels = size;
            }
        }

        if let Ok(val) = std::env::var("STITCH_COMPRESSION") {
            config.compression = CubeCompression::from_str(&val);
        }

        if let Ok(val) = std::env::var("STITCH_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("STITCH_SHUFFLE") {
            config.shuffle = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("STITCH_DTYPE") {
            config.dtype = CubeDtype::from_str(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_frames == 0 {
            return Err("chunk_frames must be > 0".to_string());
        }

        if self.chunk_pixels == 0 {
            return Err("chunk_pixels must be > 0".to_string());
        }

        if self.compression_level == 0 || self.compression_level > 9 {
            return Err("compression_level must be 1-9".to_string());
        }

        Ok(())
    }
}

/// Compression codec for stored arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CubeCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd (recommended).
    BloscZstd,
}

impl Default for CubeCompression {
    fn default() -> Self {
        Self::BloscZstd
    }
}

impl CubeCompression {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            "zstd" | "blosc_zstd" => Self::BloscZstd,
            _ => Self::BloscZstd,
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for CubeCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

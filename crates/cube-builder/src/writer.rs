//! Zarr V3 writer for the assembled cube.
//!
//! Persists the flux cube together with its coverage mask, time axis,
//! and merged quality flags as named arrays under one root group.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ReadableStorageTraits, WritableStorageTraits};

use crate::config::{CubeCompression, CubeStoreConfig};
use crate::cube::{CoverageMask, CubePixels, MosaicCube, QualityAccumulator};
use crate::error::{CubeBuilderError, Result};
use crate::types::CubeDtype;

/// Provenance recorded on the root group of the cube store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CubeAttrs {
    /// Right ascension span of the stitched targets, degrees.
    pub ra_range: [f64; 2],
    /// Declination span of the stitched targets, degrees.
    pub dec_range: [f64; 2],
    /// Base names of the input files, in stitch order.
    pub source_names: Vec<String>,
}

/// Result of persisting a cube.
#[derive(Debug)]
pub struct CubeWriteSummary {
    /// Paths of the arrays written, in write order.
    pub arrays: Vec<String>,
    /// Cube shape as `[frames, width, height]`.
    pub shape: [u64; 3],
    /// Chunk shape of the frames array.
    pub chunk_shape: [u64; 3],
    /// Element type of the frames array.
    pub dtype: String,
    /// Configured compression codec name.
    pub compression: String,
    /// Total element bytes written (uncompressed).
    pub bytes_written: u64,
}

/// Writer for creating the Zarr V3 cube store.
pub struct CubeWriter {
    config: CubeStoreConfig,
}

impl CubeWriter {
    /// Create a new CubeWriter with the given configuration.
    pub fn new(config: CubeStoreConfig) -> Self {
        Self { config }
    }

    /// Write the cube and its companion arrays to storage.
    ///
    /// The store receives a root group holding provenance attributes and
    /// the arrays `frames`, `mask`, `time`, and (when flags were merged)
    /// `quality`.
    pub fn write<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
        &self,
        storage: S,
        cube: &MosaicCube,
        mask: &CoverageMask,
        time: &[f64],
        quality: Option<&QualityAccumulator>,
        attrs: &CubeAttrs,
    ) -> Result<CubeWriteSummary> {
        if time.len() != cube.frames() {
            return Err(CubeBuilderError::shape_mismatch(format!(
                "time axis has {} values, cube has {} frames",
                time.len(),
                cube.frames()
            )));
        }
        if mask.width() != cube.width() || mask.height() != cube.height() {
            return Err(CubeBuilderError::shape_mismatch(format!(
                "mask is {}x{}, cube footprint is {}x{}",
                mask.width(),
                mask.height(),
                cube.width(),
                cube.height()
            )));
        }

        let store = Arc::new(storage);
        let mut arrays = Vec::new();
        let mut bytes_written = 0u64;

        self.write_root_group(store.clone(), cube, attrs)?;

        // Flux cube: [frame, x, y].
        let shape = [
            cube.frames() as u64,
            cube.width() as u64,
            cube.height() as u64,
        ];
        let chunks = [
            self.config.chunk_frames as u64,
            self.config.chunk_pixels as u64,
            self.config.chunk_pixels as u64,
        ];
        let frames_array = match cube.dtype() {
            CubeDtype::F32 => self.build_array(
                store.clone(),
                "/frames",
                shape.to_vec(),
                chunks.to_vec(),
                DataType::Float32,
                FillValue::from(f32::NAN),
                &["time", "x", "y"],
            )?,
            CubeDtype::I32 => self.build_array(
                store.clone(),
                "/frames",
                shape.to_vec(),
                chunks.to_vec(),
                DataType::Int32,
                FillValue::from(-1i32),
                &["time", "x", "y"],
            )?,
        };
        let subset = full_subset(&shape)?;
        match cube.elements() {
            CubePixels::F32(data) => {
                frames_array
                    .store_array_subset_elements(&subset, data)
                    .map_err(|e| CubeBuilderError::StorageError(e.to_string()))?;
            }
            CubePixels::I32(data) => {
                frames_array
                    .store_array_subset_elements(&subset, data)
                    .map_err(|e| CubeBuilderError::StorageError(e.to_string()))?;
            }
        }
        arrays.push("/frames".to_string());
        bytes_written += (cube.frames() * cube.width() * cube.height()) as u64 * 4;

        // Coverage mask: [x, y], 0/1 bytes.
        let mask_shape = vec![cube.width() as u64, cube.height() as u64];
        let mask_chunks = vec![
            self.config.chunk_pixels as u64,
            self.config.chunk_pixels as u64,
        ];
        let mask_array = self.build_array(
            store.clone(),
            "/mask",
            mask_shape.clone(),
            mask_chunks,
            DataType::UInt8,
            FillValue::from(0u8),
            &["x", "y"],
        )?;
        let mask_bytes = mask.to_u8();
        mask_array
            .store_array_subset_elements(&full_subset(&mask_shape)?, &mask_bytes)
            .map_err(|e| CubeBuilderError::StorageError(e.to_string()))?;
        arrays.push("/mask".to_string());
        bytes_written += mask_bytes.len() as u64;

        // Time axis: [frame].
        let time_shape = vec![cube.frames() as u64];
        let time_chunks = vec![self.config.chunk_frames as u64];
        let time_array = self.build_array(
            store.clone(),
            "/time",
            time_shape.clone(),
            time_chunks.clone(),
            DataType::Float64,
            FillValue::from(f64::NAN),
            &["time"],
        )?;
        time_array
            .store_array_subset_elements(&full_subset(&time_shape)?, time)
            .map_err(|e| CubeBuilderError::StorageError(e.to_string()))?;
        arrays.push("/time".to_string());
        bytes_written += time.len() as u64 * 8;

        // Merged quality flags: [frame], only when any file carried them.
        if let Some(quality) = quality {
            if quality.flags().len() != cube.frames() {
                return Err(CubeBuilderError::shape_mismatch(format!(
                    "quality has {} cadences, cube has {} frames",
                    quality.flags().len(),
                    cube.frames()
                )));
            }
            let quality_array = self.build_array(
                store.clone(),
                "/quality",
                time_shape.clone(),
                time_chunks,
                DataType::UInt32,
                FillValue::from(0u32),
                &["time"],
            )?;
            quality_array
                .store_array_subset_elements(&full_subset(&time_shape)?, quality.flags())
                .map_err(|e| CubeBuilderError::StorageError(e.to_string()))?;
            arrays.push("/quality".to_string());
            bytes_written += quality.flags().len() as u64 * 4;
        }

        info!(
            arrays = arrays.len(),
            bytes_written, "persisted cube store"
        );

        Ok(CubeWriteSummary {
            arrays,
            shape,
            chunk_shape: chunks,
            dtype: cube.dtype().as_str().to_string(),
            compression: self.config.compression.as_str().to_string(),
            bytes_written,
        })
    }

    /// Write the root group carrying cube-level provenance.
    fn write_root_group<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
        &self,
        store: Arc<S>,
        cube: &MosaicCube,
        attrs: &CubeAttrs,
    ) -> Result<()> {
        let mut group_attrs = serde_json::Map::new();
        group_attrs.insert("ra_range".to_string(), serde_json::json!(attrs.ra_range));
        group_attrs.insert("dec_range".to_string(), serde_json::json!(attrs.dec_range));
        group_attrs.insert(
            "source_files".to_string(),
            serde_json::json!(attrs.source_names.len()),
        );
        group_attrs.insert(
            "source_names".to_string(),
            serde_json::json!(attrs.source_names),
        );
        group_attrs.insert(
            "shape".to_string(),
            serde_json::json!([cube.frames(), cube.width(), cube.height()]),
        );
        group_attrs.insert("dtype".to_string(), serde_json::json!(cube.dtype().as_str()));
        group_attrs.insert(
            "compression".to_string(),
            serde_json::json!(self.config.compression.as_str()),
        );
        group_attrs.insert(
            "created".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );

        let mut binding = GroupBuilder::new();
        let group = binding
            .attributes(group_attrs)
            .build(store, "/")
            .map_err(|e| CubeBuilderError::ZarrError(e.to_string()))?;
        group
            .store_metadata()
            .map_err(|e| CubeBuilderError::StorageError(e.to_string()))?;
        Ok(())
    }

    /// Build one array with the configured chunking and compression.
    fn build_array<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
        &self,
        store: Arc<S>,
        path: &str,
        shape: Vec<u64>,
        chunk_shape: Vec<u64>,
        data_type: DataType,
        fill_value: FillValue,
        dimensions: &[&str],
    ) -> Result<Array<S>> {
        let typesize = fill_value.as_ne_bytes().len();

        let mut attrs = serde_json::Map::new();
        attrs.insert(
            "_ARRAY_DIMENSIONS".to_string(),
            serde_json::json!(dimensions),
        );

        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| CubeBuilderError::ConfigError(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(shape, data_type, chunk_grid, fill_value);
        let mut builder = binding.attributes(attrs);

        if self.config.compression != CubeCompression::None {
            let codec = self.create_compression_codec(typesize)?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(store, path)
            .map_err(|e| CubeBuilderError::ZarrError(e.to_string()))?;
        array
            .store_metadata()
            .map_err(|e| CubeBuilderError::StorageError(e.to_string()))?;
        Ok(array)
    }

    /// Create the compression codec based on configuration.
    fn create_compression_codec(
        &self,
        typesize: usize,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| CubeBuilderError::ConfigError("Invalid compression level".to_string()))?;

        let shuffle = if self.config.shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // typesize is required when shuffle is enabled
        let typesize = if self.config.shuffle {
            Some(typesize)
        } else {
            None
        };

        let compressor = match self.config.compression {
            CubeCompression::None => {
                return Err(CubeBuilderError::ConfigError(
                    "No compression configured".to_string(),
                ))
            }
            CubeCompression::BloscLz4 => BloscCompressor::LZ4,
            CubeCompression::BloscZstd => BloscCompressor::Zstd,
        };

        // BloscCodec::new(cname, clevel, blocksize, shuffle_mode, typesize)
        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| CubeBuilderError::ConfigError(e.to_string()))?;

        Ok(Arc::new(codec))
    }
}

fn full_subset(shape: &[u64]) -> Result<ArraySubset> {
    ArraySubset::new_with_start_shape(vec![0; shape.len()], shape.to_vec())
        .map_err(|e| CubeBuilderError::ZarrError(e.to_string()))
}

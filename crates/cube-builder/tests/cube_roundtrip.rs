//! Integration test: persist a cube and read it back with zarrs.
//!
//! 1. Assemble a cube from two adjacent patches with known values
//! 2. Write it to a Zarr V3 store
//! 3. Open the arrays directly and verify shapes, values, and attributes

use std::sync::Arc;

use cube_builder::{
    normalize_bounds, CoverageMask, CubeAttrs, CubeCompression, CubeDtype, CubeStoreConfig,
    CubeWriter, MosaicCube, PatchBounds, QualityAccumulator,
};
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

/// Patch flux where the value encodes (cadence, y, x) as t*100 + y*10 + x,
/// offset by a per-patch tag.
fn patch_flux(tag: f32, frames: usize, width: usize, height: usize) -> Vec<f32> {
    let mut flux = Vec::with_capacity(frames * width * height);
    for t in 0..frames {
        for y in 0..height {
            for x in 0..width {
                flux.push(tag + (t * 100 + y * 10 + x) as f32);
            }
        }
    }
    flux
}

fn full_subset(shape: &[u64]) -> ArraySubset {
    ArraySubset::new_with_start_shape(vec![0; shape.len()], shape.to_vec())
        .expect("Failed to build subset")
}

#[test]
fn test_cube_roundtrip_two_patches() {
    let frames = 3;

    // Two 2x2 patches sharing no pixels, with a one-column gap at x=4.
    let mut bounds = vec![
        PatchBounds::from_corner(670, 240, 2, 2),
        PatchBounds::from_corner(672, 240, 2, 2),
        PatchBounds::from_corner(675, 240, 2, 2),
    ];
    let (width, height) = normalize_bounds(&mut bounds);
    assert_eq!((width, height), (7, 2));

    let mut cube = MosaicCube::new(frames, width, height, CubeDtype::F32).unwrap();
    let mut mask = CoverageMask::new(width, height);
    let mut quality = QualityAccumulator::new(frames);

    for (i, b) in bounds.iter().enumerate() {
        let flux = patch_flux(1000.0 * i as f32, frames, b.width(), b.height());
        cube.write_patch(b, &flux).unwrap();
        mask.mark(b).unwrap();
    }
    quality.or_flags(&[0, 8, 0]).unwrap();
    quality.or_flags(&[1, 0, 0]).unwrap();

    let time = vec![2000.0, 2000.02, 2000.04];

    // Write the store.
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("stitched.zarr");
    std::fs::create_dir_all(&store_path).expect("Failed to create dir");
    let store = FilesystemStore::new(&store_path).expect("Failed to create store");

    let config = CubeStoreConfig {
        compression: CubeCompression::BloscZstd,
        chunk_frames: 2,
        chunk_pixels: 4,
        ..Default::default()
    };
    let writer = CubeWriter::new(config);
    let attrs = CubeAttrs {
        ra_range: [169.53435, 169.73435],
        dec_range: [-4.68346, -4.48346],
        source_names: vec![
            "a.fits.gz".to_string(),
            "b.fits.gz".to_string(),
            "c.fits.gz".to_string(),
        ],
    };

    let summary = writer
        .write(store, &cube, &mask, &time, Some(&quality), &attrs)
        .expect("Failed to write cube");
    assert_eq!(summary.arrays.len(), 4);
    assert_eq!(summary.shape, [3, 7, 2]);
    assert_eq!(summary.chunk_shape, [2, 4, 4]);
    assert_eq!(summary.compression, "blosc_zstd");

    // Read every array back.
    let read_store = Arc::new(FilesystemStore::new(&store_path).expect("Failed to open store"));

    let frames_array = Array::open(read_store.clone(), "/frames").expect("Failed to open frames");
    assert_eq!(frames_array.shape(), &[3, 7, 2]);

    let data: Vec<f32> = frames_array
        .retrieve_array_subset_elements(&full_subset(frames_array.shape()))
        .expect("Failed to read frames");
    assert_eq!(data.len(), 3 * 7 * 2);

    let at = |t: usize, x: usize, y: usize| data[(t * 7 + x) * 2 + y];

    // Patch 0 occupies x in [0, 2): value (t=2, local x=1, y=1) = 211.
    assert_eq!(at(2, 1, 1), 211.0);
    // Patch 1 occupies x in [2, 4): tag 1000.
    assert_eq!(at(0, 2, 0), 1000.0);
    assert_eq!(at(1, 3, 1), 1111.0);
    // Patch 2 occupies x in [5, 7): tag 2000.
    assert_eq!(at(0, 5, 0), 2000.0);
    // The gap column never received data.
    assert!(at(0, 4, 0).is_nan());
    assert!(at(2, 4, 1).is_nan());

    let mask_array = Array::open(read_store.clone(), "/mask").expect("Failed to open mask");
    let mask_data: Vec<u8> = mask_array
        .retrieve_array_subset_elements(&full_subset(mask_array.shape()))
        .expect("Failed to read mask");
    // [x, y] order: x=4 column (indices 8 and 9) is the gap.
    assert_eq!(mask_data.len(), 14);
    assert_eq!(mask_data[8], 0);
    assert_eq!(mask_data[9], 0);
    assert_eq!(mask_data.iter().map(|&b| b as usize).sum::<usize>(), 12);

    let time_array = Array::open(read_store.clone(), "/time").expect("Failed to open time");
    let time_data: Vec<f64> = time_array
        .retrieve_array_subset_elements(&full_subset(time_array.shape()))
        .expect("Failed to read time");
    assert_eq!(time_data, time);

    let quality_array =
        Array::open(read_store.clone(), "/quality").expect("Failed to open quality");
    let quality_data: Vec<u32> = quality_array
        .retrieve_array_subset_elements(&full_subset(quality_array.shape()))
        .expect("Failed to read quality");
    assert_eq!(quality_data, vec![1, 8, 0]);
}

#[test]
fn test_root_group_attributes() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("attrs.zarr");
    std::fs::create_dir_all(&store_path).expect("Failed to create dir");
    let store = FilesystemStore::new(&store_path).expect("Failed to create store");

    let mut cube = MosaicCube::new(1, 2, 2, CubeDtype::F32).unwrap();
    let bounds = PatchBounds::from_corner(0, 0, 2, 2);
    cube.write_patch(&bounds, &[1.0, 2.0, 3.0, 4.0]).unwrap();
    let mut mask = CoverageMask::new(2, 2);
    mask.mark(&bounds).unwrap();

    let writer = CubeWriter::new(CubeStoreConfig {
        compression: CubeCompression::None,
        ..Default::default()
    });
    let attrs = CubeAttrs {
        ra_range: [10.0, 10.2],
        dec_range: [-3.5, -3.4],
        source_names: vec!["ktwo0001-c05_lpd-targ.fits.gz".to_string()],
    };
    writer
        .write(store, &cube, &mask, &[2100.5], None, &attrs)
        .expect("Failed to write cube");

    let read_store = Arc::new(FilesystemStore::new(&store_path).expect("Failed to open store"));
    let group = zarrs::group::Group::open(read_store, "/").expect("Failed to open group");
    let group_attrs = group.attributes();

    assert_eq!(group_attrs["ra_range"], serde_json::json!([10.0, 10.2]));
    assert_eq!(group_attrs["dec_range"], serde_json::json!([-3.5, -3.4]));
    assert_eq!(group_attrs["source_files"], serde_json::json!(1));
    assert_eq!(
        group_attrs["source_names"],
        serde_json::json!(["ktwo0001-c05_lpd-targ.fits.gz"])
    );
    assert_eq!(group_attrs["shape"], serde_json::json!([1, 2, 2]));
    assert_eq!(group_attrs["dtype"], serde_json::json!("f32"));
    assert!(group_attrs.contains_key("created"));
}

#[test]
fn test_int_cube_roundtrip_fill_value() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store_path = temp_dir.path().join("int.zarr");
    std::fs::create_dir_all(&store_path).expect("Failed to create dir");
    let store = FilesystemStore::new(&store_path).expect("Failed to create store");

    // One 1x1 patch in a 2x1 footprint leaves one pixel untouched.
    let mut cube = MosaicCube::new(2, 2, 1, CubeDtype::I32).unwrap();
    let bounds = PatchBounds::from_corner(0, 0, 1, 1);
    cube.write_patch(&bounds, &[41.7, 43.2]).unwrap();
    let mut mask = CoverageMask::new(2, 1);
    mask.mark(&bounds).unwrap();

    let writer = CubeWriter::new(CubeStoreConfig {
        compression: CubeCompression::None,
        ..Default::default()
    });
    let attrs = CubeAttrs {
        ra_range: [0.0, 0.0],
        dec_range: [0.0, 0.0],
        source_names: vec!["a.fits.gz".to_string()],
    };
    writer
        .write(store, &cube, &mask, &[0.0, 1.0], None, &attrs)
        .expect("Failed to write cube");

    let read_store = Arc::new(FilesystemStore::new(&store_path).expect("Failed to open store"));
    let frames_array = Array::open(read_store, "/frames").expect("Failed to open frames");
    let data: Vec<i32> = frames_array
        .retrieve_array_subset_elements(&full_subset(frames_array.shape()))
        .expect("Failed to read frames");

    // Samples truncate toward zero; the uncovered pixel keeps the -1 fill.
    assert_eq!(data, vec![41, -1, 43, -1]);
}

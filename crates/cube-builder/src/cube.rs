//! In-memory cube assembly.
//!
//! The cube is a dense `[frame, x, y]` array covering the union footprint
//! of every input patch, pre-filled with the missing-data sentinel. Each
//! patch is scattered into its normalized bounds one cadence at a time,
//! and a coverage mask tracks which pixels any patch touched.

use tracing::warn;

use crate::error::{CubeBuilderError, Result};
use crate::types::{CubeDtype, PatchBounds};

/// Backing storage for the cube, one variant per supported dtype.
#[derive(Debug, Clone)]
pub enum CubePixels {
    F32(Vec<f32>),
    I32(Vec<i32>),
}

/// One frame of the cube, borrowed from its backing storage.
#[derive(Debug, Clone, Copy)]
pub enum FramePixels<'a> {
    F32(&'a [f32]),
    I32(&'a [i32]),
}

/// Dense output cube indexed `[frame, x, y]` with `y` fastest.
#[derive(Debug, Clone)]
pub struct MosaicCube {
    frames: usize,
    width: usize,
    height: usize,
    dtype: CubeDtype,
    pixels: CubePixels,
}

impl MosaicCube {
    /// Allocate a cube pre-filled with the dtype's missing-data value
    /// (NaN for floats, -1 for integers).
    pub fn new(frames: usize, width: usize, height: usize, dtype: CubeDtype) -> Result<Self> {
        if frames == 0 || width == 0 || height == 0 {
            return Err(CubeBuilderError::EmptyCube(format!(
                "cube shape [{}, {}, {}] has a zero axis",
                frames, width, height
            )));
        }

        let len = frames * width * height;
        let pixels = match dtype {
            CubeDtype::F32 => CubePixels::F32(vec![f32::NAN; len]),
            CubeDtype::I32 => CubePixels::I32(vec![-1; len]),
        };

        Ok(Self {
            frames,
            width,
            height,
            dtype,
            pixels,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dtype(&self) -> CubeDtype {
        self.dtype
    }

    /// Shape as `[frames, width, height]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.frames, self.width, self.height]
    }

    fn index(&self, frame: usize, x: usize, y: usize) -> usize {
        (frame * self.width + x) * self.height + y
    }

    fn check_bounds(&self, bounds: &PatchBounds) -> Result<()> {
        if bounds.xmin < 0
            || bounds.ymin < 0
            || bounds.xmax > self.width as i64
            || bounds.ymax > self.height as i64
        {
            return Err(CubeBuilderError::out_of_bounds(
                bounds.to_string(),
                format!("{}x{}", self.width, self.height),
            ));
        }
        Ok(())
    }

    /// Scatter one patch into the cube across every frame.
    ///
    /// `flux` holds `frames * patch-pixels` samples laid out cadence-major
    /// with the column index fastest, exactly as a FLUX table column with
    /// TDIM `(width, height)` reads out. The bounds are validated before
    /// anything is written, so a failed call leaves the cube untouched.
    pub fn write_patch(&mut self, bounds: &PatchBounds, flux: &[f32]) -> Result<()> {
        self.check_bounds(bounds)?;

        let pw = bounds.width();
        let ph = bounds.height();
        let expected = self.frames * pw * ph;
        if flux.len() != expected {
            return Err(CubeBuilderError::shape_mismatch(format!(
                "patch {} over {} frames needs {} samples, got {}",
                bounds,
                self.frames,
                expected,
                flux.len()
            )));
        }

        let x0 = bounds.xmin as usize;
        let y0 = bounds.ymin as usize;
        for t in 0..self.frames {
            for py in 0..ph {
                for px in 0..pw {
                    let sample = flux[(t * ph + py) * pw + px];
                    let i = self.index(t, x0 + px, y0 + py);
                    match &mut self.pixels {
                        CubePixels::F32(data) => data[i] = sample,
                        CubePixels::I32(data) => data[i] = sample as i32,
                    }
                }
            }
        }
        Ok(())
    }

    /// Borrow one frame. The `[x, y]` layout of the cube makes each frame
    /// a contiguous `width * height` slice with `y` fastest.
    pub fn frame(&self, frame: usize) -> Result<FramePixels<'_>> {
        if frame >= self.frames {
            return Err(CubeBuilderError::shape_mismatch(format!(
                "frame {} out of range (cube has {})",
                frame, self.frames
            )));
        }
        let lo = frame * self.width * self.height;
        let hi = lo + self.width * self.height;
        Ok(match &self.pixels {
            CubePixels::F32(data) => FramePixels::F32(&data[lo..hi]),
            CubePixels::I32(data) => FramePixels::I32(&data[lo..hi]),
        })
    }

    /// Borrow the final frame, the conventional calibration image.
    pub fn last_frame(&self) -> Result<FramePixels<'_>> {
        self.frame(self.frames - 1)
    }

    /// All cube elements in storage order.
    pub fn elements(&self) -> &CubePixels {
        &self.pixels
    }

    /// Value at `(frame, x, y)` widened to f64, for inspection.
    pub fn get(&self, frame: usize, x: usize, y: usize) -> Option<f64> {
        if frame >= self.frames || x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(frame, x, y);
        Some(match &self.pixels {
            CubePixels::F32(data) => data[i] as f64,
            CubePixels::I32(data) => data[i] as f64,
        })
    }
}

/// Per-pixel record of which cube positions received data.
#[derive(Debug, Clone)]
pub struct CoverageMask {
    width: usize,
    height: usize,
    covered: Vec<bool>,
}

impl CoverageMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            covered: vec![false; width * height],
        }
    }

    /// Mark every pixel under `bounds` as covered.
    pub fn mark(&mut self, bounds: &PatchBounds) -> Result<()> {
        if bounds.xmin < 0
            || bounds.ymin < 0
            || bounds.xmax > self.width as i64
            || bounds.ymax > self.height as i64
        {
            return Err(CubeBuilderError::out_of_bounds(
                bounds.to_string(),
                format!("{}x{}", self.width, self.height),
            ));
        }
        for x in bounds.xmin as usize..bounds.xmax as usize {
            for y in bounds.ymin as usize..bounds.ymax as usize {
                self.covered[x * self.height + y] = true;
            }
        }
        Ok(())
    }

    pub fn is_covered(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.covered[x * self.height + y]
    }

    /// Number of covered pixels.
    pub fn covered_pixels(&self) -> usize {
        self.covered.iter().filter(|&&c| c).count()
    }

    /// True when every pixel of the footprint is covered.
    pub fn is_complete(&self) -> bool {
        self.covered.iter().all(|&c| c)
    }

    /// The mask as 0/1 bytes in `[x, y]` storage order.
    pub fn to_u8(&self) -> Vec<u8> {
        self.covered.iter().map(|&c| c as u8).collect()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

/// Bitwise-OR accumulator for per-cadence quality flags.
///
/// Kepler quality flags are bit fields stored in a signed column; values
/// are reinterpreted as their bit patterns so the sign bit survives the
/// merge.
#[derive(Debug, Clone)]
pub struct QualityAccumulator {
    flags: Vec<u32>,
    merged: bool,
}

impl QualityAccumulator {
    pub fn new(frames: usize) -> Self {
        Self {
            flags: vec![0; frames],
            merged: false,
        }
    }

    /// OR one file's per-cadence flags into the accumulator.
    pub fn or_flags(&mut self, flags: &[i32]) -> Result<()> {
        if flags.len() != self.flags.len() {
            return Err(CubeBuilderError::shape_mismatch(format!(
                "quality column has {} cadences, cube has {}",
                flags.len(),
                self.flags.len()
            )));
        }
        for (acc, &f) in self.flags.iter_mut().zip(flags) {
            if f < 0 {
                warn!(flag = f, "negative quality flag, merging bit pattern");
            }
            *acc |= f as u32;
        }
        self.merged = true;
        Ok(())
    }

    /// Whether any flags were merged.
    pub fn merged_any(&self) -> bool {
        self.merged
    }

    pub fn flags(&self) -> &[u32] {
        &self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flux for one patch: value encodes (cadence, y, x) as t*100 + y*10 + x.
    fn patch_flux(frames: usize, width: usize, height: usize) -> Vec<f32> {
        let mut flux = Vec::with_capacity(frames * width * height);
        for t in 0..frames {
            for y in 0..height {
                for x in 0..width {
                    flux.push((t * 100 + y * 10 + x) as f32);
                }
            }
        }
        flux
    }

    #[test]
    fn test_new_cube_is_nan_filled() {
        let cube = MosaicCube::new(2, 3, 4, CubeDtype::F32).unwrap();
        assert_eq!(cube.shape(), [2, 3, 4]);
        for t in 0..2 {
            for x in 0..3 {
                for y in 0..4 {
                    assert!(cube.get(t, x, y).unwrap().is_nan());
                }
            }
        }
    }

    #[test]
    fn test_new_i32_cube_fills_with_sentinel() {
        let cube = MosaicCube::new(1, 2, 2, CubeDtype::I32).unwrap();
        assert_eq!(cube.get(0, 1, 1), Some(-1.0));
    }

    #[test]
    fn test_zero_axis_rejected() {
        assert!(matches!(
            MosaicCube::new(0, 3, 4, CubeDtype::F32),
            Err(CubeBuilderError::EmptyCube(_))
        ));
    }

    #[test]
    fn test_write_patch_places_samples() {
        let mut cube = MosaicCube::new(2, 5, 4, CubeDtype::F32).unwrap();
        let bounds = PatchBounds::from_corner(2, 1, 2, 3);
        cube.write_patch(&bounds, &patch_flux(2, 2, 3)).unwrap();

        // Sample (t=1, local y=2, local x=1) lands at cube (1, 3, 3).
        assert_eq!(cube.get(1, 3, 3), Some(121.0));
        // Sample (t=0, local y=0, local x=0) lands at the corner.
        assert_eq!(cube.get(0, 2, 1), Some(0.0));
        // Pixels outside the patch stay NaN.
        assert!(cube.get(0, 0, 0).unwrap().is_nan());
        assert!(cube.get(1, 4, 3).unwrap().is_nan());
    }

    #[test]
    fn test_write_patch_rejects_out_of_bounds() {
        let mut cube = MosaicCube::new(1, 4, 4, CubeDtype::F32).unwrap();
        let bounds = PatchBounds::from_corner(3, 0, 2, 2);
        let err = cube.write_patch(&bounds, &vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, CubeBuilderError::OutOfBounds { .. }));
        // Nothing was written.
        assert!(cube.get(0, 3, 0).unwrap().is_nan());
    }

    #[test]
    fn test_write_patch_rejects_wrong_sample_count() {
        let mut cube = MosaicCube::new(2, 4, 4, CubeDtype::F32).unwrap();
        let bounds = PatchBounds::from_corner(0, 0, 2, 2);
        let err = cube.write_patch(&bounds, &vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, CubeBuilderError::ShapeMismatch(_)));
    }

    #[test]
    fn test_i32_cube_truncates_samples() {
        let mut cube = MosaicCube::new(1, 1, 1, CubeDtype::I32).unwrap();
        let bounds = PatchBounds::from_corner(0, 0, 1, 1);
        cube.write_patch(&bounds, &[7.9]).unwrap();
        assert_eq!(cube.get(0, 0, 0), Some(7.0));
    }

    #[test]
    fn test_frame_is_contiguous_y_fastest() {
        let mut cube = MosaicCube::new(2, 2, 2, CubeDtype::F32).unwrap();
        let bounds = PatchBounds::from_corner(0, 0, 2, 2);
        cube.write_patch(&bounds, &patch_flux(2, 2, 2)).unwrap();

        match cube.frame(1).unwrap() {
            FramePixels::F32(px) => {
                // Order: (x=0,y=0), (x=0,y=1), (x=1,y=0), (x=1,y=1)
                assert_eq!(px, &[100.0, 110.0, 101.0, 111.0]);
            }
            FramePixels::I32(_) => panic!("wrong dtype"),
        }
    }

    #[test]
    fn test_last_frame() {
        let mut cube = MosaicCube::new(3, 1, 1, CubeDtype::F32).unwrap();
        let bounds = PatchBounds::from_corner(0, 0, 1, 1);
        cube.write_patch(&bounds, &[5.0, 6.0, 7.0]).unwrap();
        match cube.last_frame().unwrap() {
            FramePixels::F32(px) => assert_eq!(px, &[7.0]),
            FramePixels::I32(_) => panic!("wrong dtype"),
        }
    }

    #[test]
    fn test_coverage_mask() {
        let mut mask = CoverageMask::new(4, 2);
        assert!(!mask.is_complete());
        assert_eq!(mask.covered_pixels(), 0);

        mask.mark(&PatchBounds::from_corner(0, 0, 2, 2)).unwrap();
        assert!(mask.is_covered(1, 1));
        assert!(!mask.is_covered(2, 0));
        assert_eq!(mask.covered_pixels(), 4);

        mask.mark(&PatchBounds::from_corner(2, 0, 2, 2)).unwrap();
        assert!(mask.is_complete());
        assert_eq!(mask.to_u8(), vec![1; 8]);
    }

    #[test]
    fn test_coverage_mask_rejects_out_of_bounds() {
        let mut mask = CoverageMask::new(2, 2);
        let err = mask.mark(&PatchBounds::from_corner(1, 1, 2, 2)).unwrap_err();
        assert!(matches!(err, CubeBuilderError::OutOfBounds { .. }));
    }

    #[test]
    fn test_mask_matches_bounds_containment() {
        let bounds = [
            PatchBounds::from_corner(0, 0, 2, 2),
            PatchBounds::from_corner(3, 1, 2, 1),
        ];
        let mut mask = CoverageMask::new(5, 2);
        for b in &bounds {
            mask.mark(b).unwrap();
        }
        for x in 0..5 {
            for y in 0..2 {
                let expected = bounds.iter().any(|b| b.contains(x, y));
                assert_eq!(mask.is_covered(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_quality_accumulator_ors_flags() {
        let mut acc = QualityAccumulator::new(3);
        assert!(!acc.merged_any());

        acc.or_flags(&[1, 0, 4]).unwrap();
        acc.or_flags(&[2, 0, 4]).unwrap();
        assert!(acc.merged_any());
        assert_eq!(acc.flags(), &[3, 0, 4]);
    }

    #[test]
    fn test_quality_accumulator_keeps_sign_bit() {
        let mut acc = QualityAccumulator::new(1);
        acc.or_flags(&[-2147483648]).unwrap();
        assert_eq!(acc.flags(), &[0x8000_0000]);
    }

    #[test]
    fn test_quality_accumulator_length_mismatch() {
        let mut acc = QualityAccumulator::new(2);
        let err = acc.or_flags(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, CubeBuilderError::ShapeMismatch(_)));
    }
}

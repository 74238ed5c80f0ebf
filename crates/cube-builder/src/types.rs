//! Core types for cube assembly.

use serde::{Deserialize, Serialize};

/// Pixel footprint of one target patch on the output CCD plane, in
/// half-open column/row intervals: `xmin <= x < xmax`.
///
/// Raw bounds come straight from the aperture header (CRVAL1P/CRVAL2P
/// corners plus the image extents) and may sit anywhere on the CCD. They
/// are shifted to a zero-based frame by [`normalize_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchBounds {
    pub xmin: i64,
    pub xmax: i64,
    pub ymin: i64,
    pub ymax: i64,
}

impl PatchBounds {
    /// Build bounds from an aperture corner and image extents.
    pub fn from_corner(crval1p: i64, crval2p: i64, naxis1: i64, naxis2: i64) -> Self {
        Self {
            xmin: crval1p,
            xmax: crval1p + naxis1,
            ymin: crval2p,
            ymax: crval2p + naxis2,
        }
    }

    /// Patch width in pixels.
    pub fn width(&self) -> usize {
        (self.xmax - self.xmin).max(0) as usize
    }

    /// Patch height in pixels.
    pub fn height(&self) -> usize {
        (self.ymax - self.ymin).max(0) as usize
    }

    /// Number of pixels covered.
    pub fn pixels(&self) -> usize {
        self.width() * self.height()
    }

    /// Shift the bounds by the given column/row offsets.
    pub fn translate(&self, dx: i64, dy: i64) -> Self {
        Self {
            xmin: self.xmin + dx,
            xmax: self.xmax + dx,
            ymin: self.ymin + dy,
            ymax: self.ymax + dy,
        }
    }

    /// Check whether a cube position lies inside the patch.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        let (x, y) = (x as i64, y as i64);
        x >= self.xmin && x < self.xmax && y >= self.ymin && y < self.ymax
    }

    /// Check whether another patch overlaps this one.
    pub fn overlaps(&self, other: &PatchBounds) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }
}

impl std::fmt::Display for PatchBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x[{}, {}) y[{}, {})",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

/// Shift all bounds so the smallest column and row land at zero, and
/// return the resulting cube footprint as `(width, height)`.
///
/// The minimum is taken independently per axis across every patch, so
/// after normalization at least one patch touches column 0 and at least
/// one touches row 0 (not necessarily the same patch).
pub fn normalize_bounds(bounds: &mut [PatchBounds]) -> (usize, usize) {
    if bounds.is_empty() {
        return (0, 0);
    }

    let dx = bounds.iter().map(|b| b.xmin).min().unwrap_or(0);
    let dy = bounds.iter().map(|b| b.ymin).min().unwrap_or(0);

    let mut width = 0i64;
    let mut height = 0i64;
    for b in bounds.iter_mut() {
        *b = b.translate(-dx, -dy);
        width = width.max(b.xmax);
        height = height.max(b.ymax);
    }

    (width.max(0) as usize, height.max(0) as usize)
}

/// Element type of the output cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CubeDtype {
    /// 32-bit float, missing pixels fill with NaN.
    F32,
    /// 32-bit integer, missing pixels fill with -1.
    I32,
}

impl Default for CubeDtype {
    fn default() -> Self {
        Self::F32
    }
}

impl CubeDtype {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "i32" | "int32" | "int" => Self::I32,
            _ => Self::F32,
        }
    }

    /// Get the dtype name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::I32 => "i32",
        }
    }

    /// Element size in bytes.
    pub fn size(&self) -> usize {
        4
    }
}

impl std::fmt::Display for CubeDtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

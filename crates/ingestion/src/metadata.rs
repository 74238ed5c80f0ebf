//! First-pass metadata extraction.
//!
//! Each target pixel file carries its CCD footprint in the aperture
//! extension header and its cadence count in the table header. The
//! first pass over the inputs reads only these headers so the output
//! cube can be sized and validated before any flux is loaded.

use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use cube_builder::PatchBounds;
use fits_parser::{FitsError, FitsFile, HduKind};
use tracing::debug;

use crate::error::{Result, StitchError};

/// HDU index of the aperture IMAGE extension in a target pixel file.
pub const APERTURE_HDU: usize = 2;

/// HDU index of the target data BINTABLE extension.
pub const TABLE_HDU: usize = 1;

/// Sky position, CCD footprint, and cadence count of one target pixel
/// file, read from its extension headers.
#[derive(Debug, Clone)]
pub struct TargetMeta {
    /// Source file the metadata was read from.
    pub path: PathBuf,
    /// Right ascension of the target, degrees.
    pub ra_obj: f64,
    /// Declination of the target, degrees.
    pub dec_obj: f64,
    /// Raw (un-normalized) CCD footprint of the patch.
    pub bounds: PatchBounds,
    /// Number of table rows (cube frames contributed).
    pub cadences: usize,
}

/// Read a FITS file from disk, gunzipping when the content starts with
/// the gzip magic bytes.
pub fn read_fits_bytes(path: &Path) -> Result<Bytes> {
    let raw = std::fs::read(path)?;
    if is_gzip(&raw) {
        decompress_gzip(&raw)
    } else {
        Ok(Bytes::from(raw))
    }
}

/// Decompress gzip-compressed FITS data.
pub fn decompress_gzip(data: &[u8]) -> Result<Bytes> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| StitchError::Decompression(e.to_string()))?;
    Ok(Bytes::from(decompressed))
}

/// Check for the gzip magic bytes.
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&[0x1f, 0x8b])
}

/// Parse one file far enough to read its aperture geometry and cadence
/// count.
pub fn read_target_meta(path: &Path) -> Result<TargetMeta> {
    let bytes = read_fits_bytes(path)?;
    if !bytes.starts_with(b"SIMPLE") {
        return Err(StitchError::UnsupportedFile {
            file: path.display().to_string(),
        });
    }
    let file = FitsFile::parse(bytes).map_err(|e| StitchError::fits(path, e))?;
    target_meta_from_file(path, &file)
}

/// Extract aperture geometry and cadence count from an already-parsed
/// file.
pub fn target_meta_from_file(path: &Path, file: &FitsFile) -> Result<TargetMeta> {
    let wrap = |e| StitchError::fits(path, e);

    let table = file.hdu(TABLE_HDU).map_err(wrap)?;
    if table.kind != HduKind::BinTable {
        return Err(wrap(FitsError::NotABinaryTable(format!(
            "{:?}",
            table.kind
        ))));
    }
    let cadences = table.header.require_i64("NAXIS2").map_err(wrap)? as usize;
    if cadences == 0 {
        return Err(StitchError::EmptyTable {
            file: path.display().to_string(),
        });
    }

    let aperture = file.hdu(APERTURE_HDU).map_err(wrap)?;
    let header = &aperture.header;

    let ra_obj = header.require_f64("RA_OBJ").map_err(wrap)?;
    let dec_obj = header.require_f64("DEC_OBJ").map_err(wrap)?;
    let crval1p = header.require_i64("CRVAL1P").map_err(wrap)?;
    let crval2p = header.require_i64("CRVAL2P").map_err(wrap)?;
    let naxis1 = header.require_i64("NAXIS1").map_err(wrap)?;
    let naxis2 = header.require_i64("NAXIS2").map_err(wrap)?;

    let bounds = PatchBounds::from_corner(crval1p, crval2p, naxis1, naxis2);
    debug!(
        file = %path.display(),
        ra_obj = ra_obj,
        dec_obj = dec_obj,
        bounds = %bounds,
        cadences = cadences,
        "read target headers"
    );

    Ok(TargetMeta {
        path: path.to_path_buf(),
        ra_obj,
        dec_obj,
        bounds,
        cadences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fits_parser::FitsError;
    use test_utils::TpfBuilder;

    #[test]
    fn test_read_target_meta_from_gzip() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("ktwo1-c16.fits.gz");
        TpfBuilder::new(3, 2)
            .corner(671, 241)
            .sky_position(169.1, -4.5)
            .cadences(4)
            .write_gzip(&path)
            .expect("write tpf");

        let meta = read_target_meta(&path).expect("read meta");
        assert_eq!(meta.bounds, PatchBounds::from_corner(671, 241, 3, 2));
        test_utils::assert_approx_eq!(meta.ra_obj, 169.1, 1e-9);
        test_utils::assert_approx_eq!(meta.dec_obj, -4.5, 1e-9);
        assert_eq!(meta.cadences, 4);
        assert_eq!(meta.path, path);
    }

    #[test]
    fn test_read_target_meta_plain_fits() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("target.fits");
        std::fs::write(&path, TpfBuilder::new(2, 2).corner(10, 20).build()).expect("write");

        let meta = read_target_meta(&path).expect("read meta");
        assert_eq!(meta.bounds, PatchBounds::from_corner(10, 20, 2, 2));
    }

    #[test]
    fn test_missing_corner_keyword_is_reported_with_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("broken.fits.gz");
        TpfBuilder::new(2, 2)
            .without_keyword("CRVAL2P")
            .write_gzip(&path)
            .expect("write tpf");

        let err = read_target_meta(&path).unwrap_err();
        match err {
            StitchError::Fits { file, source } => {
                assert!(file.contains("broken.fits.gz"));
                assert!(matches!(source, FitsError::MissingKeyword(k) if k == "CRVAL2P"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_gzip() {
        assert!(is_gzip(&[0x1f, 0x8b, 0x08]));
        assert!(!is_gzip(b"SIMPLE  ="));
        assert!(!is_gzip(&[]));
    }

    #[test]
    fn test_non_fits_content_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("notes.fits.gz");
        std::fs::write(&path, b"this is not a target pixel file").expect("write");

        let err = read_target_meta(&path).unwrap_err();
        assert!(matches!(err, StitchError::UnsupportedFile { .. }));
    }

    #[test]
    fn test_truncated_gzip_fails_decompression() {
        let full = TpfBuilder::new(2, 2).build_gzip();
        let err = decompress_gzip(&full[..full.len() / 2]).unwrap_err();
        assert!(matches!(err, StitchError::Decompression(_)));
    }
}

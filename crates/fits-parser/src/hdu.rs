//! HDU segmentation.
//!
//! A FITS file is a sequence of header-data units. Each unit is a header
//! (whole 2880-byte blocks, END-terminated) followed by an optional data
//! region whose length is derived from the header and padded up to a
//! block boundary.

use bytes::Bytes;
use tracing::debug;

use crate::error::{FitsError, Result};
use crate::header::Header;
use crate::BLOCK_SIZE;

/// Classification of a header-data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HduKind {
    /// The mandatory first HDU.
    Primary,
    /// `XTENSION= 'IMAGE'` extension.
    Image,
    /// `XTENSION= 'BINTABLE'` extension.
    BinTable,
    /// `XTENSION= 'TABLE'` (ASCII table) extension.
    AsciiTable,
    /// Any other extension type.
    Other(String),
}

/// One header-data unit: parsed header plus the raw (big-endian) data
/// region, without the trailing block padding.
#[derive(Debug, Clone)]
pub struct Hdu {
    pub kind: HduKind,
    pub header: Header,
    pub data: Bytes,
}

impl Hdu {
    /// Size in bytes of the data region described by `header`.
    ///
    /// The FITS sizing rule is
    ///   |BITPIX| / 8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISm)
    /// with GCOUNT defaulting to 1 and PCOUNT to 0. NAXIS = 0 means no
    /// data region at all.
    fn data_size(header: &Header) -> Result<usize> {
        let bitpix = header.require_i64("BITPIX")?;
        let naxis = header.require_i64("NAXIS")?;
        if naxis == 0 {
            return Ok(0);
        }

        let mut elements: i64 = 1;
        for axis in 1..=naxis {
            let len = header.require_i64(&format!("NAXIS{}", axis))?;
            if len < 0 {
                return Err(FitsError::InvalidCard {
                    keyword: format!("NAXIS{}", axis),
                    reason: format!("negative axis length {}", len),
                });
            }
            elements *= len;
        }

        let gcount = header.get_i64("GCOUNT").unwrap_or(1);
        let pcount = header.get_i64("PCOUNT").unwrap_or(0);
        let bytes = bitpix.unsigned_abs() as usize / 8
            * gcount as usize
            * (pcount as usize + elements as usize);
        Ok(bytes)
    }

    fn kind_of(header: &Header, is_primary: bool) -> HduKind {
        if is_primary {
            return HduKind::Primary;
        }
        match header.get_str("XTENSION") {
            Some("IMAGE") => HduKind::Image,
            Some("BINTABLE") => HduKind::BinTable,
            Some("TABLE") => HduKind::AsciiTable,
            Some(other) => HduKind::Other(other.to_string()),
            None => HduKind::Other(String::new()),
        }
    }
}

/// A fully segmented FITS file.
#[derive(Debug, Clone)]
pub struct FitsFile {
    hdus: Vec<Hdu>,
}

impl FitsFile {
    /// Segment `data` (an entire decompressed FITS file) into HDUs.
    ///
    /// Data regions are sliced out of `data` without copying.
    pub fn parse(data: Bytes) -> Result<FitsFile> {
        let mut hdus = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            // Files are block-aligned, but a ragged tail of pure padding
            // is tolerated rather than reported as a truncated HDU.
            if data[offset..].iter().all(|&b| b == b' ' || b == 0) {
                break;
            }

            let (header, consumed) = Header::parse(&data[offset..])?;
            let kind = Hdu::kind_of(&header, hdus.is_empty());
            let data_start = offset + consumed;
            let data_len = Hdu::data_size(&header)?;

            if data_start + data_len > data.len() {
                return Err(FitsError::UnexpectedEof(format!(
                    "HDU {} declares {} data bytes but only {} remain",
                    hdus.len(),
                    data_len,
                    data.len() - data_start
                )));
            }

            debug!(
                index = hdus.len(),
                kind = ?kind,
                data_bytes = data_len,
                "parsed HDU"
            );

            hdus.push(Hdu {
                kind,
                header,
                data: data.slice(data_start..data_start + data_len),
            });

            let padded = data_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
            offset = data_start + padded;
        }

        if hdus.is_empty() {
            return Err(FitsError::UnexpectedEof("file contains no HDUs".to_string()));
        }

        Ok(FitsFile { hdus })
    }

    pub fn len(&self) -> usize {
        self.hdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hdus.is_empty()
    }

    pub fn hdus(&self) -> &[Hdu] {
        &self.hdus
    }

    /// Fetch an HDU by index.
    pub fn hdu(&self, index: usize) -> Result<&Hdu> {
        self.hdus.get(index).ok_or(FitsError::MissingHdu {
            index,
            count: self.hdus.len(),
        })
    }
}

//! Binary table (BINTABLE extension) access.
//!
//! Rows are fixed-width byte records of NAXIS1 bytes; TFIELDS columns are
//! laid out left to right, each described by a TFORMn code of the form
//! `rT` (repeat count followed by a type letter). All values are stored
//! big-endian.

use std::fmt;

use crate::error::{FitsError, Result};
use crate::hdu::{Hdu, HduKind};

/// A parsed TFORM code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tform {
    /// Leading repeat count (defaults to 1).
    pub repeat: usize,
    /// Type letter (`L`, `B`, `I`, `J`, `K`, `E`, `D`, ...).
    pub code: char,
}

impl Tform {
    pub fn parse(raw: &str) -> Result<Tform> {
        let trimmed = raw.trim();
        let split = trimmed
            .char_indices()
            .find(|(_, c)| c.is_ascii_alphabetic())
            .map(|(i, _)| i)
            .ok_or_else(|| FitsError::InvalidTform(raw.to_string()))?;

        let (digits, rest) = trimmed.split_at(split);
        let repeat = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<usize>()
                .map_err(|_| FitsError::InvalidTform(raw.to_string()))?
        };

        let code = match rest.chars().next() {
            Some(c) => c.to_ascii_uppercase(),
            None => return Err(FitsError::InvalidTform(raw.to_string())),
        };
        // Anything after the type letter (P/Q element types, widths) is
        // ignored for sizing purposes.
        Self::element_size(code).ok_or_else(|| FitsError::InvalidTform(raw.to_string()))?;

        Ok(Tform { repeat, code })
    }

    /// Bytes per element for fixed-size codes.
    fn element_size(code: char) -> Option<usize> {
        match code {
            'L' | 'B' | 'A' => Some(1),
            'X' => Some(1), // bit arrays are sized separately
            'I' => Some(2),
            'J' | 'E' => Some(4),
            'K' | 'D' | 'C' | 'P' => Some(8),
            'M' | 'Q' => Some(16),
            _ => None,
        }
    }

    /// Total bytes this field occupies in a row.
    pub fn width(&self) -> usize {
        match self.code {
            // X packs repeat bits into whole bytes.
            'X' => self.repeat.div_ceil(8),
            _ => {
                // element_size was validated at parse time
                self.repeat * Self::element_size(self.code).unwrap_or(0)
            }
        }
    }
}

impl fmt::Display for Tform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.repeat, self.code)
    }
}

/// One table column: name, shape, and its byte span within a row.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub tform: Tform,
    /// Byte offset of this field from the start of a row.
    pub offset: usize,
    /// Reversed TDIMn axis lengths, if declared.
    pub dims: Option<Vec<usize>>,
}

/// A binary table HDU with resolved column layout.
#[derive(Debug)]
pub struct BinTable<'a> {
    hdu: &'a Hdu,
    columns: Vec<Column>,
    row_bytes: usize,
    rows: usize,
}

impl<'a> BinTable<'a> {
    /// Resolve the column layout of a BINTABLE HDU.
    pub fn from_hdu(hdu: &'a Hdu) -> Result<BinTable<'a>> {
        if hdu.kind != HduKind::BinTable {
            return Err(FitsError::NotABinaryTable(format!("{:?}", hdu.kind)));
        }

        let row_bytes = hdu.header.require_i64("NAXIS1")? as usize;
        let rows = hdu.header.require_i64("NAXIS2")? as usize;
        let tfields = hdu.header.require_i64("TFIELDS")? as usize;

        let mut columns = Vec::with_capacity(tfields);
        let mut offset = 0;
        for n in 1..=tfields {
            let name = hdu
                .header
                .get_str(&format!("TTYPE{}", n))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| format!("COL{}", n));
            let tform = Tform::parse(hdu.header.require_str(&format!("TFORM{}", n))?)?;
            let dims = hdu
                .header
                .get_str(&format!("TDIM{}", n))
                .and_then(parse_tdim);

            columns.push(Column {
                name,
                tform,
                offset,
                dims,
            });
            offset += tform.width();
        }

        if offset != row_bytes {
            return Err(FitsError::InvalidCard {
                keyword: "NAXIS1".to_string(),
                reason: format!(
                    "declared row width {} does not match summed field widths {}",
                    row_bytes, offset
                ),
            });
        }

        Ok(BinTable {
            hdu,
            columns,
            row_bytes,
            rows,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| FitsError::UnknownColumn {
                column: name.to_string(),
                available: self
                    .columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Read a column as `f32`, flattened row-major (`rows * repeat`
    /// values). `E` is native; integer codes widen.
    pub fn read_f32(&self, name: &str) -> Result<Vec<f32>> {
        let column = self.column(name)?;
        let mut out = Vec::with_capacity(self.rows * column.tform.repeat);
        self.for_each_element(column, |bytes| {
            out.push(match column.tform.code {
                'E' => f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                'D' => be_f64(bytes) as f32,
                'B' => bytes[0] as f32,
                'I' => i16::from_be_bytes([bytes[0], bytes[1]]) as f32,
                'J' => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
                _ => {
                    return Err(FitsError::UnsupportedConversion {
                        column: column.name.clone(),
                        tform: column.tform.to_string(),
                        requested: "f32",
                    })
                }
            });
            Ok(())
        })?;
        Ok(out)
    }

    /// Read a column as `f64`, flattened row-major.
    pub fn read_f64(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name)?;
        let mut out = Vec::with_capacity(self.rows * column.tform.repeat);
        self.for_each_element(column, |bytes| {
            out.push(match column.tform.code {
                'D' => be_f64(bytes),
                'E' => f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
                'B' => bytes[0] as f64,
                'I' => i16::from_be_bytes([bytes[0], bytes[1]]) as f64,
                'J' => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
                'K' => be_i64(bytes) as f64,
                _ => {
                    return Err(FitsError::UnsupportedConversion {
                        column: column.name.clone(),
                        tform: column.tform.to_string(),
                        requested: "f64",
                    })
                }
            });
            Ok(())
        })?;
        Ok(out)
    }

    /// Read a column as `i32`, flattened row-major. Widening only; `K`
    /// columns are refused rather than silently truncated.
    pub fn read_i32(&self, name: &str) -> Result<Vec<i32>> {
        let column = self.column(name)?;
        let mut out = Vec::with_capacity(self.rows * column.tform.repeat);
        self.for_each_element(column, |bytes| {
            out.push(match column.tform.code {
                'J' => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                'I' => i16::from_be_bytes([bytes[0], bytes[1]]) as i32,
                'B' => bytes[0] as i32,
                _ => {
                    return Err(FitsError::UnsupportedConversion {
                        column: column.name.clone(),
                        tform: column.tform.to_string(),
                        requested: "i32",
                    })
                }
            });
            Ok(())
        })?;
        Ok(out)
    }

    /// Walk every element of `column` across all rows in storage order.
    fn for_each_element<F>(&self, column: &Column, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let element = match column.tform.code {
            'X' => {
                return Err(FitsError::UnsupportedConversion {
                    column: column.name.clone(),
                    tform: column.tform.to_string(),
                    requested: "numeric",
                })
            }
            code => Tform::element_size(code).unwrap_or(1),
        };

        let data = &self.hdu.data;
        let needed = self.rows * self.row_bytes;
        if data.len() < needed {
            return Err(FitsError::UnexpectedEof(format!(
                "table data holds {} bytes, {} rows of {} need {}",
                data.len(),
                self.rows,
                self.row_bytes,
                needed
            )));
        }

        for row in 0..self.rows {
            let start = row * self.row_bytes + column.offset;
            for r in 0..column.tform.repeat {
                let lo = start + r * element;
                f(&data[lo..lo + element])?;
            }
        }
        Ok(())
    }
}

fn be_f64(bytes: &[u8]) -> f64 {
    f64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

fn be_i64(bytes: &[u8]) -> i64 {
    i64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Parse a TDIMn value such as `(4,3)` into axis lengths, fastest-varying
/// axis first.
fn parse_tdim(raw: &str) -> Option<Vec<usize>> {
    let inner = raw.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(|part| part.trim().parse::<usize>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdu::FitsFile;
    use crate::{BLOCK_SIZE, CARD_SIZE};
    use bytes::Bytes;

    fn card(text: &str) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(CARD_SIZE, b' ');
        bytes
    }

    fn header_bytes(cards: &[&str]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for c in cards {
            bytes.extend_from_slice(&card(c));
        }
        bytes.extend_from_slice(&card("END"));
        let blocks = (bytes.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
        bytes.resize(blocks * BLOCK_SIZE, b' ');
        bytes
    }

    /// Build a file with one BINTABLE holding TIME (D), FLUX (6E with
    /// TDIM '(3,2)') and QUALITY (J), two rows.
    fn sample_table() -> Vec<u8> {
        let mut bytes = header_bytes(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
        ]);
        bytes.extend_from_slice(&header_bytes(&[
            "XTENSION= 'BINTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                   36",
            "NAXIS2  =                    2",
            "PCOUNT  =                    0",
            "GCOUNT  =                    1",
            "TFIELDS =                    3",
            "TTYPE1  = 'TIME    '",
            "TFORM1  = 'D       '",
            "TTYPE2  = 'FLUX    '",
            "TFORM2  = '6E      '",
            "TDIM2   = '(3,2)   '",
            "TTYPE3  = 'QUALITY '",
            "TFORM3  = 'J       '",
        ]));

        let mut data = Vec::new();
        for row in 0..2u32 {
            data.extend_from_slice(&(2000.0 + row as f64).to_be_bytes());
            for k in 0..6u32 {
                data.extend_from_slice(&((row * 10 + k) as f32).to_be_bytes());
            }
            data.extend_from_slice(&(1i32 << row).to_be_bytes());
        }
        let blocks = (data.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
        data.resize(blocks * BLOCK_SIZE, 0);
        bytes.extend_from_slice(&data);
        bytes
    }

    #[test]
    fn test_tform_parsing() {
        assert_eq!(Tform::parse("D").unwrap(), Tform { repeat: 1, code: 'D' });
        assert_eq!(
            Tform::parse("  6E ").unwrap(),
            Tform { repeat: 6, code: 'E' }
        );
        assert_eq!(Tform::parse("1J").unwrap().width(), 4);
        assert_eq!(Tform::parse("13X").unwrap().width(), 2);
        assert_eq!(Tform::parse("16A").unwrap().width(), 16);
        assert!(Tform::parse("").is_err());
        assert!(Tform::parse("42").is_err());
        assert!(Tform::parse("3Z").is_err());
    }

    #[test]
    fn test_column_layout() {
        let fits = FitsFile::parse(Bytes::from(sample_table())).unwrap();
        let table = BinTable::from_hdu(fits.hdu(1).unwrap()).unwrap();

        assert_eq!(table.rows(), 2);
        assert_eq!(table.column("TIME").unwrap().offset, 0);
        assert_eq!(table.column("FLUX").unwrap().offset, 8);
        assert_eq!(table.column("QUALITY").unwrap().offset, 32);
        assert_eq!(table.column("FLUX").unwrap().dims, Some(vec![3, 2]));
    }

    #[test]
    fn test_read_columns() {
        let fits = FitsFile::parse(Bytes::from(sample_table())).unwrap();
        let table = BinTable::from_hdu(fits.hdu(1).unwrap()).unwrap();

        let time = table.read_f64("TIME").unwrap();
        assert_eq!(time, vec![2000.0, 2001.0]);

        let flux = table.read_f32("FLUX").unwrap();
        assert_eq!(flux.len(), 12);
        assert_eq!(flux[0], 0.0);
        assert_eq!(flux[5], 5.0);
        assert_eq!(flux[6], 10.0);

        let quality = table.read_i32("QUALITY").unwrap();
        assert_eq!(quality, vec![1, 2]);
    }

    #[test]
    fn test_case_insensitive_lookup_and_unknown_column() {
        let fits = FitsFile::parse(Bytes::from(sample_table())).unwrap();
        let table = BinTable::from_hdu(fits.hdu(1).unwrap()).unwrap();

        assert!(table.column("flux").is_ok());
        let err = table.column("SAP_FLUX").unwrap_err();
        match err {
            FitsError::UnknownColumn { column, available } => {
                assert_eq!(column, "SAP_FLUX");
                assert!(available.contains("FLUX"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_refused_conversion() {
        let fits = FitsFile::parse(Bytes::from(sample_table())).unwrap();
        let table = BinTable::from_hdu(fits.hdu(1).unwrap()).unwrap();
        let err = table.read_i32("TIME").unwrap_err();
        assert!(matches!(err, FitsError::UnsupportedConversion { .. }));
    }

    #[test]
    fn test_not_a_bintable() {
        let fits = FitsFile::parse(Bytes::from(sample_table())).unwrap();
        let err = BinTable::from_hdu(fits.hdu(0).unwrap()).unwrap_err();
        assert!(matches!(err, FitsError::NotABinaryTable(_)));
    }

    #[test]
    fn test_row_width_mismatch() {
        let mut bytes = header_bytes(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
        ]);
        bytes.extend_from_slice(&header_bytes(&[
            "XTENSION= 'BINTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                   99",
            "NAXIS2  =                    1",
            "TFIELDS =                    1",
            "TFORM1  = 'D       '",
        ]));
        bytes.extend_from_slice(&[0; BLOCK_SIZE]);

        let fits = FitsFile::parse(Bytes::from(bytes)).unwrap();
        let err = BinTable::from_hdu(fits.hdu(1).unwrap()).unwrap_err();
        assert!(matches!(err, FitsError::InvalidCard { .. }));
    }
}

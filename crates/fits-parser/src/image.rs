//! Image HDU decoding and minimal single-image FITS writing.
//!
//! Image data is a big-endian array in row-major order with NAXIS1 the
//! fastest-varying axis. Only 2-dimensional images are handled here.

use crate::error::{FitsError, Result};
use crate::hdu::Hdu;
use crate::{BLOCK_SIZE, CARD_SIZE};

/// A decoded 2-D image: `width` is NAXIS1, `height` is NAXIS2, and
/// `pixels[y * width + x]` holds the sample at (x, y).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<f32>,
}

/// Decode a 2-D image HDU to `f32` samples, converting from the stored
/// BITPIX representation.
pub fn decode_image_f32(hdu: &Hdu) -> Result<ImageFrame> {
    let naxis = hdu.header.require_i64("NAXIS")?;
    if naxis != 2 {
        return Err(FitsError::InvalidDimensions(format!(
            "expected a 2-D image, got NAXIS = {}",
            naxis
        )));
    }
    let width = hdu.header.require_i64("NAXIS1")? as usize;
    let height = hdu.header.require_i64("NAXIS2")? as usize;
    let bitpix = hdu.header.require_i64("BITPIX")?;

    let count = width * height;
    let sample = bitpix.unsigned_abs() as usize / 8;
    if hdu.data.len() < count * sample {
        return Err(FitsError::UnexpectedEof(format!(
            "image data holds {} bytes, {}x{} BITPIX {} needs {}",
            hdu.data.len(),
            width,
            height,
            bitpix,
            count * sample
        )));
    }

    let mut pixels = Vec::with_capacity(count);
    for chunk in hdu.data[..count * sample].chunks_exact(sample) {
        pixels.push(match bitpix {
            -32 => f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            -64 => f64::from_be_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]) as f32,
            8 => chunk[0] as f32,
            16 => i16::from_be_bytes([chunk[0], chunk[1]]) as f32,
            32 => i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f32,
            64 => i64::from_be_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]) as f32,
            other => {
                return Err(FitsError::InvalidDimensions(format!(
                    "unsupported BITPIX {}",
                    other
                )))
            }
        });
    }

    Ok(ImageFrame {
        width,
        height,
        pixels,
    })
}

/// Encode a complete single-HDU FITS file holding one 2-D `f32` image.
pub fn encode_primary_f32(width: usize, height: usize, pixels: &[f32]) -> Result<Vec<u8>> {
    let data: Vec<u8> = pixels.iter().flat_map(|v| v.to_be_bytes()).collect();
    encode_primary(width, height, pixels.len(), -32, data)
}

/// Encode a complete single-HDU FITS file holding one 2-D `i32` image.
pub fn encode_primary_i32(width: usize, height: usize, pixels: &[i32]) -> Result<Vec<u8>> {
    let data: Vec<u8> = pixels.iter().flat_map(|v| v.to_be_bytes()).collect();
    encode_primary(width, height, pixels.len(), 32, data)
}

fn encode_primary(
    width: usize,
    height: usize,
    count: usize,
    bitpix: i64,
    data: Vec<u8>,
) -> Result<Vec<u8>> {
    if count != width * height {
        return Err(FitsError::InvalidDimensions(format!(
            "{} pixels do not fill a {}x{} image",
            count, width, height
        )));
    }

    let mut out = Vec::new();
    out.extend_from_slice(&format_logical_card("SIMPLE", true));
    out.extend_from_slice(&format_integer_card("BITPIX", bitpix));
    out.extend_from_slice(&format_integer_card("NAXIS", 2));
    out.extend_from_slice(&format_integer_card("NAXIS1", width as i64));
    out.extend_from_slice(&format_integer_card("NAXIS2", height as i64));
    out.extend_from_slice(&format_end_card());
    pad_to_block(&mut out, b' ');

    out.extend_from_slice(&data);
    pad_to_block(&mut out, 0);
    Ok(out)
}

/// Fixed-format card: keyword in bytes 0-7, `= ` at 8-9, value right
/// justified in bytes 10-29.
fn format_fixed_card(keyword: &str, value: &str) -> [u8; CARD_SIZE] {
    let mut card = [b' '; CARD_SIZE];
    let text = format!("{:<8}= {:>20}", keyword, value);
    card[..text.len()].copy_from_slice(text.as_bytes());
    card
}

fn format_integer_card(keyword: &str, value: i64) -> [u8; CARD_SIZE] {
    format_fixed_card(keyword, &value.to_string())
}

fn format_logical_card(keyword: &str, value: bool) -> [u8; CARD_SIZE] {
    format_fixed_card(keyword, if value { "T" } else { "F" })
}

fn format_end_card() -> [u8; CARD_SIZE] {
    let mut card = [b' '; CARD_SIZE];
    card[..3].copy_from_slice(b"END");
    card
}

fn pad_to_block(out: &mut Vec<u8>, fill: u8) {
    let rem = out.len() % BLOCK_SIZE;
    if rem != 0 {
        out.resize(out.len() + BLOCK_SIZE - rem, fill);
    }
}

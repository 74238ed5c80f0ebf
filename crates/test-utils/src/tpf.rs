//! Synthetic target pixel file generator.
//!
//! Builds byte-exact FITS files with the three-HDU layout of Kepler/K2
//! target pixel files: an empty primary HDU, a BINTABLE with TIME, FLUX
//! (and optionally QUALITY) columns, and an aperture IMAGE extension
//! whose header carries the sky position and CCD corner keywords.
//!
//! Everything here works on raw bytes so the generated files exercise
//! real parsing code rather than a shared serializer.

use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Builder for one synthetic target pixel file.
///
/// # Example
///
/// ```
/// use test_utils::TpfBuilder;
///
/// let bytes = TpfBuilder::new(2, 2)
///     .corner(671, 241)
///     .cadences(3)
///     .flux_constant(1.0)
///     .build();
/// assert_eq!(bytes.len() % 2880, 0);
/// ```
pub struct TpfBuilder {
    width: usize,
    height: usize,
    cadences: usize,
    ra_obj: f64,
    dec_obj: f64,
    crval1p: i64,
    crval2p: i64,
    time: Option<Vec<f64>>,
    time_start: f64,
    flux: Option<Vec<f32>>,
    fill: f32,
    quality: Option<Vec<i32>>,
    drop_keyword: Option<String>,
}

impl TpfBuilder {
    /// Start a builder for a patch of `width` x `height` pixels
    /// (`width` is the column count, the fastest-varying flux axis).
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cadences: 1,
            ra_obj: 169.53435,
            dec_obj: -4.68346,
            crval1p: 0,
            crval2p: 0,
            time: None,
            time_start: 2000.0,
            flux: None,
            fill: 1.0,
            quality: None,
            drop_keyword: None,
        }
    }

    /// Set the CCD corner (CRVAL1P, CRVAL2P) of the patch.
    pub fn corner(mut self, crval1p: i64, crval2p: i64) -> Self {
        self.crval1p = crval1p;
        self.crval2p = crval2p;
        self
    }

    /// Set the object sky position (RA_OBJ, DEC_OBJ) in degrees.
    pub fn sky_position(mut self, ra: f64, dec: f64) -> Self {
        self.ra_obj = ra;
        self.dec_obj = dec;
        self
    }

    /// Number of cadences (table rows).
    pub fn cadences(mut self, n: usize) -> Self {
        self.cadences = n;
        self
    }

    /// First TIME value; subsequent cadences step by the K2 long-cadence
    /// interval unless [`time_values`](Self::time_values) overrides them.
    pub fn time_start(mut self, start: f64) -> Self {
        self.time_start = start;
        self
    }

    /// Explicit TIME column values (length must equal the cadence count).
    pub fn time_values(mut self, time: Vec<f64>) -> Self {
        self.time = Some(time);
        self
    }

    /// Fill every flux sample with a constant.
    pub fn flux_constant(mut self, value: f32) -> Self {
        self.fill = value;
        self.flux = None;
        self
    }

    /// Explicit flux samples, cadence-major with the cell laid out x
    /// fastest: index `(cadence * height + y) * width + x`.
    pub fn flux_values(mut self, flux: Vec<f32>) -> Self {
        self.flux = Some(flux);
        self
    }

    /// Add a QUALITY column with the given per-cadence flags.
    pub fn quality(mut self, flags: Vec<i32>) -> Self {
        self.quality = Some(flags);
        self
    }

    /// Omit one aperture-header keyword, for exercising validation paths.
    pub fn without_keyword(mut self, keyword: &str) -> Self {
        self.drop_keyword = Some(keyword.to_string());
        self
    }

    /// Assemble the complete FITS byte stream.
    pub fn build(self) -> Vec<u8> {
        let pixels = self.width * self.height;
        let time: Vec<f64> = match &self.time {
            Some(t) => {
                assert_eq!(t.len(), self.cadences, "time length != cadences");
                t.clone()
            }
            None => (0..self.cadences)
                .map(|k| self.time_start + k as f64 * 0.0204)
                .collect(),
        };
        let flux: Vec<f32> = match &self.flux {
            Some(f) => {
                assert_eq!(f.len(), self.cadences * pixels, "flux length mismatch");
                f.clone()
            }
            None => vec![self.fill; self.cadences * pixels],
        };
        if let Some(q) = &self.quality {
            assert_eq!(q.len(), self.cadences, "quality length != cadences");
        }

        let mut out = Vec::new();

        // Primary HDU: header only.
        let mut primary = vec![
            logical_card("SIMPLE", true),
            integer_card("BITPIX", 8),
            integer_card("NAXIS", 0),
            logical_card("EXTEND", true),
            string_card("TELESCOP", "Kepler"),
            string_card("INSTRUME", "Kepler Photometer"),
        ];
        primary.push(real_card("RA_OBJ", self.ra_obj));
        primary.push(real_card("DEC_OBJ", self.dec_obj));
        out.extend_from_slice(&finish_header(primary));

        // Binary table HDU: TIME, FLUX, optional QUALITY.
        let flux_width = 4 * pixels;
        let row_bytes = 8 + flux_width + if self.quality.is_some() { 4 } else { 0 };
        let mut table = vec![
            string_card("XTENSION", "BINTABLE"),
            integer_card("BITPIX", 8),
            integer_card("NAXIS", 2),
            integer_card("NAXIS1", row_bytes as i64),
            integer_card("NAXIS2", self.cadences as i64),
            integer_card("PCOUNT", 0),
            integer_card("GCOUNT", 1),
            integer_card(
                "TFIELDS",
                if self.quality.is_some() { 3 } else { 2 },
            ),
            string_card("EXTNAME", "TARGETTABLES"),
            string_card("TTYPE1", "TIME"),
            string_card("TFORM1", "D"),
            string_card("TTYPE2", "FLUX"),
            string_card("TFORM2", &format!("{}E", pixels)),
            string_card("TDIM2", &format!("({},{})", self.width, self.height)),
        ];
        if self.quality.is_some() {
            table.push(string_card("TTYPE3", "QUALITY"));
            table.push(string_card("TFORM3", "J"));
        }
        out.extend_from_slice(&finish_header(table));

        let mut data = Vec::with_capacity(self.cadences * row_bytes);
        for k in 0..self.cadences {
            data.extend_from_slice(&time[k].to_be_bytes());
            for v in &flux[k * pixels..(k + 1) * pixels] {
                data.extend_from_slice(&v.to_be_bytes());
            }
            if let Some(q) = &self.quality {
                data.extend_from_slice(&q[k].to_be_bytes());
            }
        }
        out.extend_from_slice(&pad_block(data, 0));

        // Aperture HDU: the image header carries the patch geometry.
        let mut aperture = vec![
            string_card("XTENSION", "IMAGE"),
            integer_card("BITPIX", 32),
            integer_card("NAXIS", 2),
            integer_card("NAXIS1", self.width as i64),
            integer_card("NAXIS2", self.height as i64),
            integer_card("PCOUNT", 0),
            integer_card("GCOUNT", 1),
            string_card("EXTNAME", "APERTURE"),
            real_card("RA_OBJ", self.ra_obj),
            real_card("DEC_OBJ", self.dec_obj),
            integer_card("CRVAL1P", self.crval1p),
            integer_card("CRVAL2P", self.crval2p),
        ];
        if let Some(dropped) = &self.drop_keyword {
            aperture.retain(|card| !card.starts_with(pad_keyword(dropped).as_bytes()));
        }
        out.extend_from_slice(&finish_header(aperture));

        let mut mask = Vec::with_capacity(4 * pixels);
        for _ in 0..pixels {
            mask.extend_from_slice(&3i32.to_be_bytes());
        }
        out.extend_from_slice(&pad_block(mask, 0));

        out
    }

    /// Assemble and gzip-compress the file.
    pub fn build_gzip(self) -> Vec<u8> {
        gzip(&self.build())
    }

    /// Assemble, compress, and write to `path`.
    pub fn write_gzip(self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.build_gzip())
    }
}

/// Gzip-compress a byte slice.
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip write failed");
    encoder.finish().expect("gzip finish failed")
}

fn pad_keyword(keyword: &str) -> String {
    format!("{:<8}", keyword)
}

fn fixed_card(keyword: &str, value: &str) -> [u8; CARD_SIZE] {
    let mut card = [b' '; CARD_SIZE];
    let text = format!("{:<8}= {:>20}", keyword, value);
    card[..text.len()].copy_from_slice(text.as_bytes());
    card
}

fn integer_card(keyword: &str, value: i64) -> [u8; CARD_SIZE] {
    fixed_card(keyword, &value.to_string())
}

fn logical_card(keyword: &str, value: bool) -> [u8; CARD_SIZE] {
    fixed_card(keyword, if value { "T" } else { "F" })
}

fn real_card(keyword: &str, value: f64) -> [u8; CARD_SIZE] {
    fixed_card(keyword, &format!("{:?}", value))
}

fn string_card(keyword: &str, value: &str) -> [u8; CARD_SIZE] {
    let mut card = [b' '; CARD_SIZE];
    let text = format!("{:<8}= '{:<8}'", keyword, value);
    card[..text.len()].copy_from_slice(text.as_bytes());
    card
}

/// Append END and pad the card list out to whole blocks.
fn finish_header(mut cards: Vec<[u8; CARD_SIZE]>) -> Vec<u8> {
    let mut end = [b' '; CARD_SIZE];
    end[..3].copy_from_slice(b"END");
    cards.push(end);

    let mut bytes: Vec<u8> = cards.concat();
    let blocks = (bytes.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
    bytes.resize(blocks * BLOCK_SIZE, b' ');
    bytes
}

fn pad_block(mut bytes: Vec<u8>, fill: u8) -> Vec<u8> {
    let blocks = (bytes.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
    bytes.resize(blocks * BLOCK_SIZE, fill);
    bytes
}

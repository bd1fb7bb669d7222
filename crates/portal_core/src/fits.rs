//! Minimal reader for the primary image HDU of a FITS file.
//!
//! Enough for the SFD reddening maps: 2-D images with floating point or
//! scaled integer pixels, no extensions, no compression.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

const BLOCK_LEN: usize = 2880;
const CARD_LEN: usize = 80;

#[derive(Debug, Error)]
pub enum FitsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("header is truncated or has no END card")]
    MissingEnd,
    #[error("missing header keyword {0}")]
    MissingKeyword(&'static str),
    #[error("header keyword {key} has invalid value {value:?}")]
    InvalidKeyword { key: &'static str, value: String },
    #[error("unsupported BITPIX {0}")]
    UnsupportedBitpix(i64),
    #[error("expected a 2-D image, NAXIS = {0}")]
    NotAnImage(i64),
    #[error("image of {width} x {height} pixels does not fit in memory")]
    TooLarge { width: usize, height: usize },
    #[error("data unit truncated: need {expected} bytes, have {actual}")]
    TruncatedData { expected: usize, actual: usize },
}

/// A 2-D image from the primary HDU; pixel (x, y) lives at `y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitsImage {
    pub width: usize,
    pub height: usize,
    header: HashMap<String, String>,
    pixels: Vec<f32>,
}

impl FitsImage {
    pub fn open(path: &Path) -> Result<Self, FitsError> {
        let bytes = fs::read(path).map_err(|source| FitsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FitsError> {
        let (header, data_offset) = parse_header(bytes)?;

        let naxis = integer_keyword(&header, "NAXIS")?;
        if naxis != 2 {
            return Err(FitsError::NotAnImage(naxis));
        }
        let width = dimension(&header, "NAXIS1")?;
        let height = dimension(&header, "NAXIS2")?;
        let bitpix = integer_keyword(&header, "BITPIX")?;
        let bscale = optional_float(&header, "BSCALE")?.unwrap_or(1.0);
        let bzero = optional_float(&header, "BZERO")?.unwrap_or(0.0);

        let bytes_per_pixel = match bitpix {
            8 => 1,
            16 => 2,
            32 | -32 => 4,
            64 | -64 => 8,
            other => return Err(FitsError::UnsupportedBitpix(other)),
        };
        let expected = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
            .ok_or(FitsError::TooLarge { width, height })?;
        let data = bytes.get(data_offset..).unwrap_or_default();
        if data.len() < expected {
            return Err(FitsError::TruncatedData {
                expected,
                actual: data.len(),
            });
        }

        let scale = |raw: f64| (raw * bscale + bzero) as f32;
        let pixels = data[..expected]
            .chunks_exact(bytes_per_pixel)
            .map(|chunk| match bitpix {
                8 => scale(f64::from(chunk[0])),
                16 => scale(f64::from(i16::from_be_bytes([chunk[0], chunk[1]]))),
                32 => scale(f64::from(i32::from_be_bytes([
                    chunk[0], chunk[1], chunk[2], chunk[3],
                ]))),
                64 => scale(i64::from_be_bytes(eight(chunk)) as f64),
                -32 => scale(f64::from(f32::from_be_bytes([
                    chunk[0], chunk[1], chunk[2], chunk[3],
                ]))),
                _ => scale(f64::from_be_bytes(eight(chunk))),
            })
            .collect();

        Ok(Self {
            width,
            height,
            header,
            pixels,
        })
    }

    /// Raw header value text, string values without their quotes.
    pub fn keyword(&self, key: &str) -> Option<&str> {
        self.header.get(key).map(String::as_str)
    }

    pub fn keyword_f64(&self, key: &str) -> Option<f64> {
        self.keyword(key).and_then(parse_float)
    }

    /// Pixel value, `None` outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }
}

fn eight(chunk: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&chunk[..8]);
    out
}

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, String>, usize), FitsError> {
    let mut header = HashMap::new();
    for (index, card) in bytes.chunks_exact(CARD_LEN).enumerate() {
        let card = String::from_utf8_lossy(card);
        let key = card.get(..8).unwrap_or(&*card).trim_end();
        if key == "END" {
            let header_len = (index + 1) * CARD_LEN;
            let data_offset = header_len.div_ceil(BLOCK_LEN) * BLOCK_LEN;
            return Ok((header, data_offset));
        }
        if card.get(8..10) != Some("= ") {
            continue;
        }
        if let Some(value) = card.get(10..).map(card_value) {
            header.insert(key.to_string(), value);
        }
    }
    Err(FitsError::MissingEnd)
}

fn card_value(raw: &str) -> String {
    let raw = raw.trim_start();
    if let Some(rest) = raw.strip_prefix('\'') {
        // Quoted strings end at the next lone quote; '' escapes a quote.
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                    continue;
                }
                break;
            }
            value.push(c);
        }
        return value.trim_end().to_string();
    }
    raw.split('/').next().unwrap_or_default().trim().to_string()
}

fn parse_float(text: &str) -> Option<f64> {
    // FITS allows Fortran-style exponents such as 1.0D-03.
    text.trim().replace(['D', 'd'], "E").parse().ok()
}

fn integer_keyword(header: &HashMap<String, String>, key: &'static str) -> Result<i64, FitsError> {
    let value = header.get(key).ok_or(FitsError::MissingKeyword(key))?;
    value.parse().map_err(|_| FitsError::InvalidKeyword {
        key,
        value: value.clone(),
    })
}

fn dimension(header: &HashMap<String, String>, key: &'static str) -> Result<usize, FitsError> {
    let value = integer_keyword(header, key)?;
    usize::try_from(value).map_err(|_| FitsError::InvalidKeyword {
        key,
        value: value.to_string(),
    })
}

fn optional_float(
    header: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<f64>, FitsError> {
    header
        .get(key)
        .map(|value| {
            parse_float(value).ok_or_else(|| FitsError::InvalidKeyword {
                key,
                value: value.clone(),
            })
        })
        .transpose()
}

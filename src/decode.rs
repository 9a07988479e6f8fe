//! Decoding raw responses into 16-bit samples and physical units.
//!
//! Responses are handled as lowercase hex text split into 4-character tokens,
//! which is also the form written to the CSV "Hex Sample" column. A trailing
//! partial token (odd byte count) is dropped.

use crate::error::{LinkError, Result};
use std::fmt::Write;

/// Hex characters per sample (two bytes).
pub const TOKEN_WIDTH: usize = 4;

/// Full scale of the XADC's 12-bit conversion.
pub const XADC_FULL_SCALE: f64 = 4096.0;

/// One decoded sample; also one CSV output record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// 1-based arrival order.
    pub index: usize,
    pub token: String,
    pub value: u16,
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing to a String cannot fail.
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Splits hex text into whole 4-character tokens, dropping any remainder.
///
/// A chunk that does not fall on character boundaries is reported as an
/// [`LinkError::InvalidToken`] rather than skipped.
pub fn tokens(hex: &str) -> Result<Vec<&str>> {
    hex.as_bytes()
        .chunks_exact(TOKEN_WIDTH)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .map_err(|_| LinkError::InvalidToken(String::from_utf8_lossy(chunk).into_owned()))
        })
        .collect()
}

pub fn parse_token(token: &str) -> Result<u16> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(LinkError::InvalidToken(token.to_string()));
    }
    u16::from_str_radix(token, 16).map_err(|_| LinkError::InvalidToken(token.to_string()))
}

/// Decodes a raw response into samples numbered from 1.
pub fn decode_samples(bytes: &[u8]) -> Vec<Sample> {
    words_be(bytes)
        .into_iter()
        .enumerate()
        .map(|(i, value)| Sample {
            index: i + 1,
            token: format!("{:04x}", value),
            value,
        })
        .collect()
}

/// Decodes hex text (as found in saved dumps) into samples numbered from 1.
pub fn decode_hex(hex: &str) -> Result<Vec<Sample>> {
    tokens(hex)?
        .into_iter()
        .enumerate()
        .map(|(i, token)| {
            Ok(Sample {
                index: i + 1,
                token: token.to_ascii_lowercase(),
                value: parse_token(token)?,
            })
        })
        .collect()
}

/// Groups bytes into big-endian words; an odd trailing byte is dropped.
pub fn words_be(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// The XADC returns its 12-bit result MSB-justified in a 16-bit word.
pub fn xadc_code(word: u16) -> u16 {
    word >> 4
}

/// Linear conversion from a 12-bit XADC code to a physical unit:
/// `(code / 4096) * scale - offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub scale: f64,
    pub offset: f64,
}

impl Calibration {
    pub const fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }

    pub fn apply(&self, code: u16) -> f64 {
        (f64::from(code) / XADC_FULL_SCALE) * self.scale - self.offset
    }
}

/// On-die temperature sensor, degrees Celsius.
pub const TEMPERATURE: Calibration = Calibration::new(503.975, 273.15);

/// Auxiliary inputs behind the board's 1k / 2.32k divider, volts.
pub const VAUX_DIVIDER: Calibration = Calibration::new((1e3 + 2.32e3) / 1e3, 0.0);

/// Offset-binary code of the 14-bit, 2 Vpp front-end ADC to volts.
pub fn adc_volts(code: u16) -> f64 {
    const MID: f64 = 8192.0;
    2.0 / 16384.0 * (f64::from(code) - MID)
}

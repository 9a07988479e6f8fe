//! Building a BRAM initialisation word list from a captured dump.
//!
//! The input is a logic-analyzer style CSV where each row carries five leading
//! metadata columns, then one hex byte per column, then a trailing column.
//! Consecutive bytes are joined into 16-bit words. The output is the first
//! `words` tokens separated by spaces, ready to paste into a COE file.

use crate::config::InitBramJob;
use crate::decode::{adc_volts, parse_token};
use crate::error::Result;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Leading columns that precede the byte data in each row.
const LEADING_COLUMNS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitBram {
    /// 4-character hex words in dump order.
    pub words: Vec<String>,
    pub codes: Vec<u16>,
    pub volts: Vec<f64>,
    /// Sample time of each word in seconds.
    pub times: Vec<f64>,
}

/// Parses a dump CSV into words, ADC codes, volts and sample times.
pub fn convert<R: Read>(reader: R, sampling_hz: f64) -> Result<InitBram> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut bytes: Vec<String> = Vec::new();
    for record in csv.records() {
        let record = record?;
        if record.len() <= LEADING_COLUMNS {
            continue;
        }
        bytes.extend(
            record
                .iter()
                .skip(LEADING_COLUMNS)
                .take(record.len() - LEADING_COLUMNS - 1)
                .map(|field| field.trim().to_string()),
        );
    }

    let words: Vec<String> = bytes
        .chunks_exact(2)
        .map(|pair| format!("{}{}", pair[0], pair[1]))
        .collect();
    let codes = words
        .iter()
        .map(|w| parse_token(w))
        .collect::<Result<Vec<u16>>>()?;
    let volts = codes.iter().map(|&c| adc_volts(c)).collect();
    let times = (0..codes.len()).map(|i| i as f64 / sampling_hz).collect();

    Ok(InitBram {
        words,
        codes,
        volts,
        times,
    })
}

/// Writes the first `limit` words, space separated, to `path`. Returns the
/// number of words written.
pub fn write_words<P: AsRef<Path>>(words: &[String], limit: usize, path: P) -> Result<usize> {
    let path = path.as_ref();
    let slice = &words[..limit.min(words.len())];
    let mut file = File::create(path)?;
    file.write_all(slice.join(" ").as_bytes())?;
    file.flush()?;
    tracing::info!(path = %path.display(), words = slice.len(), "wrote BRAM init words");
    Ok(slice.len())
}

/// Reads `job.input`, converts it and writes `job.output`.
pub fn run(job: &InitBramJob) -> Result<InitBram> {
    let file = File::open(&job.input)?;
    let converted = convert(file, job.sampling_hz)?;
    if converted.words.len() < job.words {
        tracing::warn!(
            available = converted.words.len(),
            requested = job.words,
            "dump holds fewer words than the BRAM depth"
        );
    }
    write_words(&converted.words, job.words, &job.output)?;
    Ok(converted)
}

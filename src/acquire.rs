//! The board's acquisition runs.
//!
//! Each run is one linear exchange over an open [`Session`]; persisting or
//! plotting the result is left to the caller.

use crate::config::{BramJob, BurstJob, SelfTestJob, XadcJob};
use crate::decode::{self, xadc_code, Sample, TEMPERATURE, VAUX_DIVIDER};
use crate::error::{LinkError, Result};
use crate::frame::{split_frames, FrameGeometry, ImageFrame};
use crate::link::Session;
use crate::{Command, XadcChannel};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{info, warn};

/// Dumps the block RAM and decodes it into samples.
pub fn dump_bram<T: Read + Write>(session: &mut Session<T>, job: &BramJob) -> Result<Vec<Sample>> {
    info!(bytes = job.bytes, "dumping BRAM");
    let raw = session.query(Command::DumpBram, job.bytes)?;
    let samples = decode::decode_samples(&raw);
    info!(samples = samples.len(), "BRAM dump decoded");
    Ok(samples)
}

/// Result of a burst capture.
#[derive(Debug, Clone)]
pub struct Burst {
    pub samples: Vec<Sample>,
    pub frames: Vec<ImageFrame>,
}

/// Triggers a burst capture and reshapes it into frames.
///
/// With a truncating short-read policy only the frames that arrived completely
/// are built; every received sample is still returned.
pub fn capture_burst<T: Read + Write>(session: &mut Session<T>, job: &BurstJob) -> Result<Burst> {
    let geometry = FrameGeometry::from(job);
    let per_frame = geometry.pixels_per_frame();
    if per_frame == 0 || geometry.frames == 0 {
        return Err(LinkError::Config("burst geometry must be non-zero".into()));
    }
    info!(
        rows = geometry.rows,
        cols = geometry.cols,
        frames = geometry.frames,
        bytes = geometry.total_bytes(),
        "starting burst capture"
    );
    let raw = session.query(Command::BurstCapture, geometry.total_bytes())?;
    let samples = decode::decode_samples(&raw);
    let values: Vec<u16> = samples.iter().map(|s| s.value).collect();

    let complete = (values.len() / per_frame).min(geometry.frames);
    if complete < geometry.frames {
        warn!(
            expected = geometry.frames,
            complete, "burst incomplete, dropping partial frames"
        );
    }
    let frames = split_frames(
        &values[..complete * per_frame],
        &FrameGeometry {
            frames: complete,
            ..geometry
        },
    )?;
    Ok(Burst { samples, frames })
}

/// Sends the UART self-test command and returns the raw reply.
pub fn self_test<T: Read + Write>(session: &mut Session<T>, job: &SelfTestJob) -> Result<Vec<u8>> {
    let reply = session.query(Command::UartSelfTest, job.bytes)?;
    info!(reply = %decode::to_hex(&reply), "self-test reply");
    Ok(reply)
}

/// One row of the XADC monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct XadcReading {
    pub index: usize,
    pub delay_secs: f64,
    pub dt_secs: f64,
    pub temperature_c: f64,
    pub vaux5_v: f64,
    pub vaux12_v: f64,
}

/// Reads the 16-bit result register of one XADC channel.
pub fn read_xadc_word<T: Read + Write>(
    session: &mut Session<T>,
    channel: XadcChannel,
) -> Result<u16> {
    let raw = session.query(Command::Xadc(channel), 2)?;
    decode::words_be(&raw)
        .first()
        .copied()
        .ok_or(LinkError::ShortRead {
            expected: 2,
            received: raw.len(),
        })
}

/// Samples temperature, VAUX5 and VAUX12 `job.samples` times, `job.dt()`
/// seconds apart, handing each reading to `on_reading`. Returns the number of
/// readings taken.
pub fn monitor_xadc<T, F>(session: &mut Session<T>, job: &XadcJob, mut on_reading: F) -> Result<usize>
where
    T: Read + Write,
    F: FnMut(&XadcReading) -> Result<()>,
{
    let dt = job.dt();
    info!(samples = job.samples, dt_secs = dt, "starting XADC monitor");

    for k in 0..job.samples {
        let temperature = read_xadc_word(session, XadcChannel::Temperature)?;
        let vaux5 = read_xadc_word(session, XadcChannel::Vaux5)?;
        let vaux12 = read_xadc_word(session, XadcChannel::Vaux12)?;

        let reading = XadcReading {
            index: k + 1,
            delay_secs: job.start_secs + k as f64 * dt,
            dt_secs: dt,
            temperature_c: TEMPERATURE.apply(xadc_code(temperature)),
            vaux5_v: VAUX_DIVIDER.apply(xadc_code(vaux5)),
            vaux12_v: VAUX_DIVIDER.apply(xadc_code(vaux12)),
        };
        info!(
            iteration = reading.index,
            temperature_c = reading.temperature_c,
            vaux5_v = reading.vaux5_v,
            vaux12_v = reading.vaux12_v,
            "XADC sample"
        );
        on_reading(&reading)?;

        if k + 1 < job.samples && dt > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(dt));
        }
    }
    Ok(job.samples)
}

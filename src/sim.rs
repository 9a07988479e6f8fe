//! # Simulated Test Board
//!
//! An in-process stand-in for the FPGA board. It accepts the same single-byte
//! commands as the firmware and queues the response the hardware would send,
//! so every run can be exercised without a serial device attached.

use crate::frame::FrameGeometry;
use crate::{Command, XadcChannel};
use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// State of the simulated board.
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    // BRAM depth in 16-bit words.
    bram_words: usize,
    burst: FrameGeometry,
    // Result registers for temperature, VAUX5 and VAUX12.
    xadc_words: [u16; 3],
    // Caps every response to this many bytes to mimic a stalled link.
    response_limit: Option<usize>,
    pending: VecDeque<u8>,
    received: Vec<u8>,
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBoard {
    /// Reply to the UART self-test: the command echoed back followed by "OK".
    pub const SELF_TEST_REPLY: [u8; 3] = [0x20, b'O', b'K'];

    /// Creates a board with the stock BRAM depth and burst geometry, and XADC
    /// registers reading roughly 25 °C, 1.0 V and 0.5 V.
    pub fn new() -> Self {
        Self {
            bram_words: 65_536,
            burst: FrameGeometry {
                rows: 1024,
                cols: 512,
                frames: 4,
                bytes_per_pixel: 2,
            },
            xadc_words: [0x9770, 0x4D20, 0x2690],
            response_limit: None,
            pending: VecDeque::new(),
            received: Vec::new(),
        }
    }

    pub fn with_bram_words(mut self, words: usize) -> Self {
        self.bram_words = words;
        self
    }

    pub fn with_burst_geometry(mut self, geometry: FrameGeometry) -> Self {
        self.burst = geometry;
        self
    }

    pub fn with_xadc_words(mut self, temperature: u16, vaux5: u16, vaux12: u16) -> Self {
        self.xadc_words = [temperature, vaux5, vaux12];
        self
    }

    pub fn with_response_limit(mut self, bytes: usize) -> Self {
        self.response_limit = Some(bytes);
        self
    }

    /// Every command byte received so far, in order.
    pub fn commands_received(&self) -> &[u8] {
        &self.received
    }

    /// Bytes queued but not yet read.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Builds the response to one command byte. Unknown commands are ignored,
    /// as the firmware does.
    pub fn process_command(&mut self, byte: u8) -> Option<Vec<u8>> {
        self.received.push(byte);
        let response = match Command::from(byte) {
            Command::DumpBram => self.bram_contents(),
            Command::BurstCapture => self.burst_contents(),
            Command::UartSelfTest => Self::SELF_TEST_REPLY.to_vec(),
            Command::Xadc(channel) => self.xadc_register(channel).to_be_bytes().to_vec(),
            Command::Raw(other) => {
                tracing::debug!(byte = other, "simulated board ignoring unknown command");
                return None;
            }
        };
        Some(match self.response_limit {
            Some(limit) => response.into_iter().take(limit).collect(),
            None => response,
        })
    }

    // Counter pattern starting at 1, as loaded by the test bitstream.
    fn bram_contents(&self) -> Vec<u8> {
        (0..self.bram_words)
            .flat_map(|i| ((i + 1) as u16).to_be_bytes())
            .collect()
    }

    // Diagonal gradient per frame, shifted by frame number.
    fn burst_contents(&self) -> Vec<u8> {
        let FrameGeometry {
            rows, cols, frames, ..
        } = self.burst;
        let span = (rows + cols).saturating_sub(2).max(1);
        let mut out = Vec::with_capacity(self.burst.total_bytes());
        for frame in 0..frames {
            for r in 0..rows {
                for c in 0..cols {
                    let level = ((r + c) * 65_535 / span) as u16;
                    let value = level.wrapping_add((frame as u16).wrapping_mul(4096));
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
        }
        out
    }

    fn xadc_register(&self, channel: XadcChannel) -> u16 {
        match channel {
            XadcChannel::Temperature => self.xadc_words[0],
            XadcChannel::Vaux5 => self.xadc_words[1],
            XadcChannel::Vaux12 => self.xadc_words[2],
        }
    }
}

impl Write for SimulatedBoard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if let Some(response) = self.process_command(byte) {
                self.pending.extend(response);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedBoard {
    /// Behaves like a serial port with nothing left to deliver: an empty queue
    /// reports a timeout.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data from simulated board"));
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

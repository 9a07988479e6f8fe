//! # FPGA UART Link Library
//!
//! This library drives the UART link to the FPGA test board. Every exchange
//! follows the same shape: send one command byte, read back a response of a
//! known size, decode the bytes into 16-bit samples and persist or plot them.
//!
//! The [`acquire`] module composes the pieces into the board's runs (BRAM dump,
//! burst capture, UART self-test, XADC monitor); [`sim`] provides a simulated
//! board that answers the same commands.

pub mod acquire;
pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod init_bram;
pub mod link;
pub mod plot;
pub mod sim;
pub mod sink;

pub use config::Config;
pub use error::{LinkError, Result};
pub use link::Session;

/// XADC channel selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XadcChannel {
    /// On-die temperature sensor.
    Temperature,
    Vaux5,
    Vaux12,
}

impl XadcChannel {
    pub const ALL: [XadcChannel; 3] = [
        XadcChannel::Temperature,
        XadcChannel::Vaux5,
        XadcChannel::Vaux12,
    ];

    pub fn address(self) -> u8 {
        match self {
            XadcChannel::Temperature => 0x00,
            XadcChannel::Vaux5 => 0x15,
            XadcChannel::Vaux12 => 0x1C,
        }
    }
}

/// Single-byte commands understood by the board firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    UartSelfTest,
    DumpBram,
    BurstCapture,
    Xadc(XadcChannel),
    // Anything else, sent as-is.
    Raw(u8),
}

impl Command {
    /// The byte written on the wire.
    pub fn byte(self) -> u8 {
        match self {
            Command::UartSelfTest => 0x20,
            Command::DumpBram => 0x30,
            Command::BurstCapture => 0x55,
            Command::Xadc(channel) => channel.address(),
            Command::Raw(b) => b,
        }
    }
}

impl From<u8> for Command {
    fn from(byte: u8) -> Self {
        match byte {
            0x20 => Command::UartSelfTest,
            0x30 => Command::DumpBram,
            0x55 => Command::BurstCapture,
            0x00 => Command::Xadc(XadcChannel::Temperature),
            0x15 => Command::Xadc(XadcChannel::Vaux5),
            0x1C => Command::Xadc(XadcChannel::Vaux12),
            other => Command::Raw(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes() {
        assert_eq!(Command::DumpBram.byte(), 0x30);
        assert_eq!(Command::BurstCapture.byte(), 0x55);
        assert_eq!(Command::UartSelfTest.byte(), 0x20);
        assert_eq!(Command::Xadc(XadcChannel::Temperature).byte(), 0x00);
        assert_eq!(Command::Xadc(XadcChannel::Vaux5).byte(), 0x15);
        assert_eq!(Command::Xadc(XadcChannel::Vaux12).byte(), 0x1C);
    }

    #[test]
    fn parse_known_and_unknown_bytes() {
        for cmd in [
            Command::DumpBram,
            Command::BurstCapture,
            Command::UartSelfTest,
            Command::Xadc(XadcChannel::Vaux12),
        ] {
            assert_eq!(Command::from(cmd.byte()), cmd);
        }
        assert_eq!(Command::from(0x41), Command::Raw(0x41));
    }
}

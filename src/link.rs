//! Serial session: opening the port, sending command bytes and reading
//! fixed-size responses.

use crate::config::{LinkConfig, ShortReadPolicy};
use crate::error::{LinkError, Result};
use crate::Command;
use serialport::{ClearBuffer, FlowControl, SerialPort};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Anything a session can talk through: a serial port, the simulated board,
/// or a test double.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

/// Opens the configured port with `timeout` as its read timeout and discards
/// any input already buffered by the driver.
pub fn open_port(config: &LinkConfig, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    config.validate()?;
    let port = serialport::new(config.port.as_str(), config.baud_rate)
        .parity(config.parity.into())
        .stop_bits(config.stop_bits()?)
        .data_bits(config.data_bits()?)
        .flow_control(FlowControl::None)
        .timeout(timeout)
        .open()
        .map_err(|source| LinkError::Open {
            port: config.port.clone(),
            source,
        })?;
    port.clear(ClearBuffer::Input)?;
    info!(
        port = %config.port,
        baud = config.baud_rate,
        parity = ?config.parity,
        "serial port opened"
    );
    Ok(port)
}

/// One exclusive conversation with the board. The transport is released when
/// the session is dropped.
pub struct Session<T> {
    transport: T,
    timeout: Duration,
    short_read: ShortReadPolicy,
}

impl Session<Box<dyn SerialPort>> {
    pub fn open(config: &LinkConfig, timeout: Duration) -> Result<Self> {
        let port = open_port(config, timeout)?;
        Ok(Session::new(port, timeout, config.short_read))
    }
}

impl<T: Read + Write> Session<T> {
    pub fn new(transport: T, timeout: Duration, short_read: ShortReadPolicy) -> Self {
        Self {
            transport,
            timeout,
            short_read,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Writes the command byte. No acknowledgement is awaited.
    pub fn send_command(&mut self, command: Command) -> Result<()> {
        let byte = command.byte();
        debug!(command = ?command, byte = %format!("{:#04x}", byte), "sending command");
        self.transport.write_all(&[byte])?;
        self.transport.flush()?;
        Ok(())
    }

    /// Reads until `expected` bytes arrived or the session timeout elapsed.
    ///
    /// A short response is an error under [`ShortReadPolicy::Fail`]; under
    /// [`ShortReadPolicy::Truncate`] the bytes received so far are returned.
    pub fn read_response(&mut self, expected: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; expected];
        let mut received = 0;
        // An unrepresentable deadline means "no deadline"; the transport's own
        // timeout still bounds each read.
        let deadline = Instant::now().checked_add(self.timeout);

        while received < expected {
            match self.transport.read(&mut buf[received..]) {
                Ok(0) => break,
                Ok(n) => received += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
            if matches!(deadline, Some(d) if Instant::now() >= d) {
                break;
            }
        }
        buf.truncate(received);
        debug!(expected, received, "response read");

        if received < expected {
            match self.short_read {
                ShortReadPolicy::Fail => {
                    return Err(LinkError::ShortRead { expected, received });
                }
                ShortReadPolicy::Truncate => {
                    warn!(expected, received, "short read, keeping truncated response");
                }
            }
        }
        Ok(buf)
    }

    /// Sends `command` and reads its `expected`-byte response.
    pub fn query(&mut self, command: Command, expected: usize) -> Result<Vec<u8>> {
        self.send_command(command)?;
        self.read_response(expected)
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

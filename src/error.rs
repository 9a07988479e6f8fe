//! Error type shared by every part of the library.

use thiserror::Error;

/// Convenience alias for results using [`LinkError`].
pub type Result<T> = std::result::Result<T, LinkError>;

#[derive(Error, Debug)]
pub enum LinkError {
    /// The serial port could not be opened (device absent or busy).
    #[error("failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes arrived than the command's response size before the timeout.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// A configuration value is outside the recognised options.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// The decoded sample count does not fill the requested frames.
    #[error("frame geometry mismatch: expected {expected} samples, got {got}")]
    Geometry { expected: usize, got: usize },

    #[error("invalid hex token '{0}'")]
    InvalidToken(String),
}

//! Link and job configuration.
//!
//! Every section has defaults equal to the board's stock settings, so an empty
//! (or missing) TOML file yields a usable configuration:
//!
//! ```toml
//! [link]
//! port = "/dev/ttyUSB1"
//! parity = "odd"
//!
//! [burst]
//! frames = 2
//! ```

use crate::error::{LinkError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "uart_link.toml";

/// Longest read timeout accepted from configuration.
pub const MAX_TIMEOUT_SECS: f64 = 3600.0;

fn timeout_from_secs(section: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 || secs > MAX_TIMEOUT_SECS {
        return Err(LinkError::Config(format!(
            "{} timeout_secs must be in (0, {}], got {}",
            section, MAX_TIMEOUT_SECS, secs
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub link: LinkConfig,
    pub bram: BramJob,
    pub burst: BurstJob,
    pub self_test: SelfTestJob,
    pub xadc: XadcJob,
    pub init_bram: InitBramJob,
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, else [`DEFAULT_CONFIG_FILE`] if it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                fallback
            }
        };
        tracing::info!(path = %path.display(), "loading configuration");
        let text = std::fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.link.validate()?;
        self.bram.timeout()?;
        self.burst.timeout()?;
        self.self_test.timeout()?;
        self.xadc.timeout()?;
        if self.burst.rows == 0 || self.burst.cols == 0 || self.burst.frames == 0 {
            return Err(LinkError::Config(
                "burst rows, cols and frames must be non-zero".into(),
            ));
        }
        if self.burst.bytes_per_pixel != 2 {
            return Err(LinkError::Config(format!(
                "burst bytes_per_pixel must be 2, got {}",
                self.burst.bytes_per_pixel
            )));
        }
        if !(1..=16).contains(&self.burst.bit_depth) {
            return Err(LinkError::Config(format!(
                "burst bit_depth must be in 1..=16, got {}",
                self.burst.bit_depth
            )));
        }
        if self.xadc.samples == 0 {
            return Err(LinkError::Config("xadc samples must be non-zero".into()));
        }
        if !self.xadc.start_secs.is_finite() || !self.xadc.stop_secs.is_finite() {
            return Err(LinkError::Config(
                "xadc start_secs and stop_secs must be finite".into(),
            ));
        }
        if self.xadc.stop_secs < self.xadc.start_secs {
            return Err(LinkError::Config(format!(
                "xadc stop_secs ({}) is before start_secs ({})",
                self.xadc.stop_secs, self.xadc.start_secs
            )));
        }
        if !self.init_bram.sampling_hz.is_finite() || self.init_bram.sampling_hz <= 0.0 {
            return Err(LinkError::Config(
                "init_bram sampling_hz must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParitySetting {
    None,
    Odd,
    Even,
}

impl From<ParitySetting> for serialport::Parity {
    fn from(p: ParitySetting) -> Self {
        match p {
            ParitySetting::None => serialport::Parity::None,
            ParitySetting::Odd => serialport::Parity::Odd,
            ParitySetting::Even => serialport::Parity::Even,
        }
    }
}

/// What to do when a response is shorter than expected.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShortReadPolicy {
    #[default]
    Fail,
    /// Keep whatever arrived and log a warning.
    Truncate,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub port: String,
    pub baud_rate: u32,
    pub parity: ParitySetting,
    pub stop_bits: u8,
    pub data_bits: u8,
    pub short_read: ShortReadPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: String::from("COM3"),
            baud_rate: 1_000_000,
            parity: ParitySetting::Odd,
            stop_bits: 1,
            data_bits: 8,
            short_read: ShortReadPolicy::Fail,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(LinkError::Config("link port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(LinkError::Config("link baud_rate must be non-zero".into()));
        }
        self.stop_bits()?;
        self.data_bits()?;
        Ok(())
    }

    pub fn stop_bits(&self) -> Result<serialport::StopBits> {
        match self.stop_bits {
            1 => Ok(serialport::StopBits::One),
            2 => Ok(serialport::StopBits::Two),
            n => Err(LinkError::Config(format!("stop_bits must be 1 or 2, got {}", n))),
        }
    }

    pub fn data_bits(&self) -> Result<serialport::DataBits> {
        match self.data_bits {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            n => Err(LinkError::Config(format!("data_bits must be 5..=8, got {}", n))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BramJob {
    pub bytes: usize,
    pub timeout_secs: f64,
    pub output: PathBuf,
}

impl Default for BramJob {
    fn default() -> Self {
        Self {
            bytes: 131_072,
            timeout_secs: 30.0,
            output: PathBuf::from("read_bram_dump.csv"),
        }
    }
}

impl BramJob {
    pub fn timeout(&self) -> Result<Duration> {
        timeout_from_secs("bram", self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BurstJob {
    pub rows: usize,
    pub cols: usize,
    pub frames: usize,
    pub bytes_per_pixel: usize,
    /// Grayscale range used when rendering (`0 ..= 2^bit_depth - 1`).
    pub bit_depth: u32,
    pub timeout_secs: f64,
    pub output: PathBuf,
    /// Directory for `frame_<i>.tif`; no TIFFs are written when unset.
    pub tiff_dir: Option<PathBuf>,
}

impl Default for BurstJob {
    fn default() -> Self {
        Self {
            rows: 1024,
            cols: 512,
            frames: 4,
            bytes_per_pixel: 2,
            bit_depth: 16,
            timeout_secs: 60.0,
            output: PathBuf::from("read_burst_dump.csv"),
            tiff_dir: None,
        }
    }
}

impl BurstJob {
    pub fn timeout(&self) -> Result<Duration> {
        timeout_from_secs("burst", self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SelfTestJob {
    pub bytes: usize,
    pub timeout_secs: f64,
}

impl Default for SelfTestJob {
    fn default() -> Self {
        Self {
            bytes: 3,
            timeout_secs: 10.0,
        }
    }
}

impl SelfTestJob {
    pub fn timeout(&self) -> Result<Duration> {
        timeout_from_secs("self_test", self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct XadcJob {
    pub start_secs: f64,
    pub stop_secs: f64,
    pub samples: usize,
    pub timeout_secs: f64,
    pub output: PathBuf,
}

impl Default for XadcJob {
    fn default() -> Self {
        Self {
            start_secs: 0.0,
            stop_secs: 60.0,
            samples: 120,
            timeout_secs: 10.0,
            output: PathBuf::from("xadc_dump.csv"),
        }
    }
}

impl XadcJob {
    pub fn timeout(&self) -> Result<Duration> {
        timeout_from_secs("xadc", self.timeout_secs)
    }

    /// Spacing between samples in seconds.
    pub fn dt(&self) -> f64 {
        (self.stop_secs - self.start_secs) / self.samples as f64
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InitBramJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Number of words written to the init file (BRAM depth).
    pub words: usize,
    pub sampling_hz: f64,
}

impl Default for InitBramJob {
    fn default() -> Self {
        Self {
            input: PathBuf::from("dump1_20230106_edited_for_csv.csv"),
            output: PathBuf::from("init_bram.csv"),
            words: 65_536,
            sampling_hz: 125e6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_board_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.link.port, "COM3");
        assert_eq!(config.link.baud_rate, 1_000_000);
        assert_eq!(config.link.parity, ParitySetting::Odd);
        assert_eq!(config.bram.bytes, 131_072);
        assert_eq!(config.self_test.bytes, 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [link]
            port = "/dev/ttyUSB1"
            parity = "even"
            short_read = "truncate"

            [burst]
            frames = 2
            tiff_dir = "frames"
            "#,
        )
        .unwrap();
        assert_eq!(config.link.port, "/dev/ttyUSB1");
        assert_eq!(config.link.parity, ParitySetting::Even);
        assert_eq!(config.link.short_read, ShortReadPolicy::Truncate);
        assert_eq!(config.link.baud_rate, 1_000_000);
        assert_eq!(config.burst.frames, 2);
        assert_eq!(config.burst.rows, 1024);
        assert_eq!(config.burst.tiff_dir, Some(PathBuf::from("frames")));
    }

    #[test]
    fn reject_unknown_parity() {
        let result = Config::from_toml("[link]\nparity = \"mark\"\n");
        assert!(matches!(result, Err(LinkError::ConfigParse(_))));
    }

    #[test]
    fn reject_unknown_field() {
        let result = Config::from_toml("[bram]\nbyte_count = 4\n");
        assert!(matches!(result, Err(LinkError::ConfigParse(_))));
    }

    #[test]
    fn reject_out_of_range_serial_settings() {
        assert!(matches!(
            Config::from_toml("[link]\nstop_bits = 3\n"),
            Err(LinkError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("[link]\ndata_bits = 9\n"),
            Err(LinkError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("[link]\nport = \"\"\n"),
            Err(LinkError::Config(_))
        ));
    }

    #[test]
    fn reject_bad_burst_geometry() {
        assert!(matches!(
            Config::from_toml("[burst]\ncols = 0\n"),
            Err(LinkError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("[burst]\nbytes_per_pixel = 3\n"),
            Err(LinkError::Config(_))
        ));
    }

    #[test]
    fn reject_bad_timeout() {
        for value in ["-1.0", "0.0", "1e30", "nan", "inf"] {
            for section in ["bram", "burst", "self_test", "xadc"] {
                let text = format!("[{}]\ntimeout_secs = {}\n", section, value);
                assert!(
                    matches!(Config::from_toml(&text), Err(LinkError::Config(_))),
                    "{} accepted",
                    text
                );
            }
        }
        let job = BramJob {
            timeout_secs: -1.0,
            ..BramJob::default()
        };
        assert!(matches!(job.timeout(), Err(LinkError::Config(_))));
        assert_eq!(
            SelfTestJob::default().timeout().unwrap(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn reject_non_finite_schedule_values() {
        assert!(matches!(
            Config::from_toml("[xadc]\nstop_secs = nan\n"),
            Err(LinkError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("[init_bram]\nsampling_hz = nan\n"),
            Err(LinkError::Config(_))
        ));
    }

    #[test]
    fn xadc_interval_matches_sample_schedule() {
        let job = XadcJob::default();
        assert_eq!(job.dt(), 0.5);
        assert!(matches!(
            Config::from_toml("[xadc]\nstart_secs = 5.0\nstop_secs = 1.0\n"),
            Err(LinkError::Config(_))
        ));
    }
}

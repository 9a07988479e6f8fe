//! Persisting decoded data: CSV dumps and TIFF frames.
//!
//! Write failures are always returned to the caller.

use crate::acquire::XadcReading;
use crate::decode::Sample;
use crate::error::{LinkError, Result};
use crate::frame::ImageFrame;
use image::ImageEncoder;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const SAMPLE_HEADER: [&str; 3] = ["Sample Number", "Hex Sample", "Decimal Code"];

pub const XADC_HEADER: [&str; 6] = [
    "Sample Number",
    "Delay (sec)",
    "dt (sec)",
    "Temperature (degrees C)",
    "VAUX5 (V)",
    "VAUX12 (V)",
];

#[derive(Serialize)]
struct SampleRow<'a> {
    index: usize,
    token: &'a str,
    value: u16,
}

/// CSV of `(Sample Number, Hex Sample, Decimal Code)` rows.
pub struct SampleCsv<W: Write> {
    writer: csv::Writer<W>,
}

impl SampleCsv<File> {
    /// Creates (or truncates) `path` and writes the header.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::from_writer(file)
    }
}

impl<W: Write> SampleCsv<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(SAMPLE_HEADER)?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, sample: &Sample) -> Result<()> {
        self.writer.serialize(SampleRow {
            index: sample.index,
            token: &sample.token,
            value: sample.value,
        })?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| LinkError::Io(e.into_error()))
    }
}

/// Writes every sample to a fresh CSV at `path`.
pub fn write_samples<P: AsRef<Path>>(path: P, samples: &[Sample]) -> Result<()> {
    let path = path.as_ref();
    let mut csv = SampleCsv::create(path)?;
    for sample in samples {
        csv.write(sample)?;
    }
    csv.finish()?;
    tracing::info!(path = %path.display(), rows = samples.len(), "wrote sample CSV");
    Ok(())
}

#[derive(Serialize)]
struct XadcRow {
    index: usize,
    delay_secs: f64,
    dt_secs: f64,
    temperature_c: f64,
    vaux5_v: f64,
    vaux12_v: f64,
}

impl From<&XadcReading> for XadcRow {
    fn from(r: &XadcReading) -> Self {
        Self {
            index: r.index,
            delay_secs: r.delay_secs,
            dt_secs: r.dt_secs,
            temperature_c: r.temperature_c,
            vaux5_v: r.vaux5_v,
            vaux12_v: r.vaux12_v,
        }
    }
}

/// XADC monitor log. Each row is flushed as soon as it is written so a run
/// stopped early keeps everything sampled so far.
pub struct XadcCsv<W: Write> {
    writer: csv::Writer<W>,
}

impl XadcCsv<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::from_writer(file)
    }
}

impl<W: Write> XadcCsv<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(XADC_HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, reading: &XadcReading) -> Result<()> {
        self.writer.serialize(XadcRow::from(reading))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| LinkError::Io(e.into_error()))
    }
}

/// Writes one frame as a 16-bit grayscale TIFF.
pub fn write_frame_tiff<P: AsRef<Path>>(frame: &ImageFrame, path: P) -> Result<()> {
    let path = path.as_ref();
    let width = u32::try_from(frame.cols)
        .map_err(|_| LinkError::Config(format!("frame width {} too large", frame.cols)))?;
    let height = u32::try_from(frame.rows)
        .map_err(|_| LinkError::Config(format!("frame height {} too large", frame.rows)))?;

    // The encoder takes 16-bit samples as native-endian bytes.
    let bytes: Vec<u8> = frame.pixels.iter().flat_map(|v| v.to_ne_bytes()).collect();

    let writer = BufWriter::new(File::create(path)?);
    let encoder = image::codecs::tiff::TiffEncoder::new(writer);
    encoder.write_image(&bytes, width, height, image::ExtendedColorType::L16)?;

    tracing::debug!(
        path = %path.display(),
        dimensions = format!("{}x{}", frame.cols, frame.rows),
        "wrote 16-bit TIFF"
    );
    Ok(())
}

/// Writes `<dir>/<stem>_<i>.tif` for every frame and returns the paths.
pub fn write_frame_stack<P: AsRef<Path>>(
    frames: &[ImageFrame],
    dir: P,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("{}_{}.tif", stem, i));
        write_frame_tiff(frame, &path)?;
        paths.push(path);
    }
    tracing::info!(dir = %dir.display(), frames = frames.len(), "wrote TIFF frames");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_samples;
    use tempfile::TempDir;

    #[test]
    fn sample_csv_layout() {
        let samples = decode_samples(&[0x00, 0x01, 0x00, 0x02, 0x00, 0xFF]);
        let mut csv = SampleCsv::from_writer(Vec::new()).unwrap();
        for s in &samples {
            csv.write(s).unwrap();
        }
        let text = String::from_utf8(csv.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "Sample Number,Hex Sample,Decimal Code\n1,0001,1\n2,0002,2\n3,00ff,255\n"
        );
    }

    #[test]
    fn empty_dump_still_has_header() {
        let csv = SampleCsv::from_writer(Vec::new()).unwrap();
        let text = String::from_utf8(csv.finish().unwrap()).unwrap();
        assert_eq!(text, "Sample Number,Hex Sample,Decimal Code\n");
    }

    #[test]
    fn write_samples_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.csv");
        std::fs::write(&path, "stale contents that are longer than the new file\n").unwrap();
        write_samples(&path, &decode_samples(&[0x12, 0x34])).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Sample Number,Hex Sample,Decimal Code\n1,1234,4660\n");
    }

    #[test]
    fn write_into_missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no-such-dir").join("dump.csv");
        assert!(matches!(write_samples(&path, &[]), Err(LinkError::Io(_))));
    }

    #[test]
    fn xadc_csv_rows() {
        let mut csv = XadcCsv::from_writer(Vec::new()).unwrap();
        csv.write(&XadcReading {
            index: 1,
            delay_secs: 0.0,
            dt_secs: 0.5,
            temperature_c: 25.5,
            vaux5_v: 1.25,
            vaux12_v: 0.0,
        })
        .unwrap();
        let text = String::from_utf8(csv.finish().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Sample Number,Delay (sec),dt (sec),Temperature (degrees C),VAUX5 (V),VAUX12 (V)")
        );
        assert_eq!(lines.next(), Some("1,0.0,0.5,25.5,1.25,0.0"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn tiff_stack_round_trip() {
        let dir = TempDir::new().unwrap();
        let frames = vec![
            ImageFrame::from_flat(2, 3, vec![0, 1, 2, 300, 40000, 65535]).unwrap(),
            ImageFrame::from_flat(2, 3, vec![7; 6]).unwrap(),
        ];
        let paths = write_frame_stack(&frames, dir.path().join("out"), "frame").unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("frame_1.tif"));

        let img = image::open(&paths[0]).unwrap().to_luma16();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 1).0, [300]);
        assert_eq!(img.get_pixel(2, 1).0, [65535]);
    }
}

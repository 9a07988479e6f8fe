//! Reshaping a flat burst of samples into image frames.

use crate::error::{LinkError, Result};

/// Shape of a burst capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub rows: usize,
    pub cols: usize,
    pub frames: usize,
    pub bytes_per_pixel: usize,
}

impl FrameGeometry {
    pub fn pixels_per_frame(&self) -> usize {
        self.rows * self.cols
    }

    /// Response size of a burst capture with this geometry.
    pub fn total_bytes(&self) -> usize {
        self.pixels_per_frame() * self.frames * self.bytes_per_pixel
    }
}

impl From<&crate::config::BurstJob> for FrameGeometry {
    fn from(job: &crate::config::BurstJob) -> Self {
        Self {
            rows: job.rows,
            cols: job.cols,
            frames: job.frames,
            bytes_per_pixel: job.bytes_per_pixel,
        }
    }
}

/// One grayscale frame stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u16>,
}

impl ImageFrame {
    pub fn from_flat(rows: usize, cols: usize, pixels: Vec<u16>) -> Result<Self> {
        if pixels.len() != rows * cols {
            return Err(LinkError::Geometry {
                expected: rows * cols,
                got: pixels.len(),
            });
        }
        Ok(Self { rows, cols, pixels })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u16> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.pixels.get(row * self.cols + col).copied()
    }

    /// Grid position of flat index `i`.
    pub fn position_of(&self, i: usize) -> (usize, usize) {
        (i / self.cols, i % self.cols)
    }

    pub fn row(&self, row: usize) -> &[u16] {
        &self.pixels[row * self.cols..(row + 1) * self.cols]
    }
}

/// Splits `values` into `geometry.frames` frames. The sample count must match
/// the geometry exactly.
pub fn split_frames(values: &[u16], geometry: &FrameGeometry) -> Result<Vec<ImageFrame>> {
    let per_frame = geometry.pixels_per_frame();
    let expected = per_frame * geometry.frames;
    if values.len() != expected || per_frame == 0 {
        return Err(LinkError::Geometry {
            expected,
            got: values.len(),
        });
    }
    values
        .chunks_exact(per_frame)
        .map(|chunk| ImageFrame::from_flat(geometry.rows, geometry.cols, chunk.to_vec()))
        .collect()
}

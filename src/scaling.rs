//! Conversion of raw ADC counts to physical units.
//!
//! Each channel has a polynomial in increasing power order that linearizes
//! the converter, followed by a division by the channel scale:
//! `y = (c0 + c1*x + c2*x^2 + ...) / scale`. The polynomial is evaluated in
//! `f64` whatever the requested output precision.
use itertools::izip;

use crate::error::WavesurferError;

/// Floating point type of scaled samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Double,
    Single,
}

/// Row-major `channels x scans` block of int16 samples as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    channels: usize,
    scans: usize,
    samples: Vec<i16>,
}

impl RawBlock {
    pub fn new(channels: usize, scans: usize, samples: Vec<i16>) -> Result<Self, WavesurferError> {
        let expected = channels
            .checked_mul(scans)
            .ok_or(WavesurferError::ShapeMismatch {
                what: "raw sample count",
                expected: usize::MAX,
                found: samples.len(),
            })?;
        if samples.len() != expected {
            return Err(WavesurferError::ShapeMismatch {
                what: "raw sample count",
                expected,
                found: samples.len(),
            });
        }
        Ok(Self {
            channels,
            scans,
            samples,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn scans(&self) -> usize {
        self.scans
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Samples of channel `channel`.
    ///
    /// # Panics
    /// If `channel >= self.channels()`.
    pub fn row(&self, channel: usize) -> &[i16] {
        &self.samples[channel * self.scans..(channel + 1) * self.scans]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i16]> + '_ {
        (0..self.channels).map(|c| self.row(c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScaledData {
    F64(Vec<f64>),
    F32(Vec<f32>),
}

/// Row-major `channels x scans` block of scaled samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledBlock {
    channels: usize,
    scans: usize,
    data: ScaledData,
}

impl ScaledBlock {
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn scans(&self) -> usize {
        self.scans
    }

    pub fn data(&self) -> &ScaledData {
        &self.data
    }

    pub fn into_data(self) -> ScaledData {
        self.data
    }

    pub fn precision(&self) -> Precision {
        match self.data {
            ScaledData::F64(_) => Precision::Double,
            ScaledData::F32(_) => Precision::Single,
        }
    }

    /// numpy-style name of the element type.
    pub fn dtype(&self) -> &'static str {
        match self.precision() {
            Precision::Double => "float64",
            Precision::Single => "float32",
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            ScaledData::F64(v) => Some(v),
            ScaledData::F32(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            ScaledData::F32(v) => Some(v),
            ScaledData::F64(_) => None,
        }
    }

    /// Channel `channel` widened to `f64`.
    pub fn row_f64(&self, channel: usize) -> Vec<f64> {
        let range = channel * self.scans..(channel + 1) * self.scans;
        match &self.data {
            ScaledData::F64(v) => v[range].to_vec(),
            ScaledData::F32(v) => v[range].iter().map(|&x| x as f64).collect(),
        }
    }
}

/// Applies per-channel polynomial calibration and channel scale to `raw`.
///
/// `channel_scales` and `coefficients` need one entry per channel of `raw`,
/// and every coefficient row must have the same length. Empty rows produce
/// zeros.
pub fn scale(
    raw: &RawBlock,
    channel_scales: &[f64],
    coefficients: &[Vec<f64>],
    precision: Precision,
) -> Result<ScaledBlock, WavesurferError> {
    if channel_scales.len() != raw.channels {
        return Err(WavesurferError::ShapeMismatch {
            what: "channel scale count",
            expected: raw.channels,
            found: channel_scales.len(),
        });
    }
    if coefficients.len() != raw.channels {
        return Err(WavesurferError::ShapeMismatch {
            what: "coefficient row count",
            expected: raw.channels,
            found: coefficients.len(),
        });
    }
    let order = coefficients.first().map_or(0, Vec::len);
    if let Some(row) = coefficients.iter().find(|row| row.len() != order) {
        return Err(WavesurferError::ShapeMismatch {
            what: "coefficient row length",
            expected: order,
            found: row.len(),
        });
    }

    let scaled = izip!(raw.rows(), channel_scales, coefficients).flat_map(|(row, &scale, coeffs)| {
        row.iter()
            .map(move |&x| horner(coeffs, x as f64) / scale)
    });
    let data = match precision {
        Precision::Double => ScaledData::F64(scaled.collect()),
        Precision::Single => ScaledData::F32(scaled.map(|y| y as f32).collect()),
    };
    Ok(ScaledBlock {
        channels: raw.channels,
        scans: raw.scans,
        data,
    })
}

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

//! `polars` DataFrame API for decoded sweeps
//!
//! Each sweep becomes a frame with one column per active channel, so the
//! usual polars tooling can be applied to recorded traces.
use polars::{frame::DataFrame, prelude::*};

use crate::{
    error::WavesurferError,
    reader::{DecodedFile, SweepRecord},
    scaling::{ScaledBlock, ScaledData},
};

/// DataFrame wrapper for one sweep.
#[derive(Debug, Clone)]
pub struct SweepDataFrame(pub(crate) DataFrame);

/// Statistics of one channel over a sweep. NaN for empty channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub name: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl SweepDataFrame {
    /// Builds columns from the scaled block when present, otherwise from the
    /// raw counts as Int16.
    ///
    /// Column names come from `names` when it has one unique name per
    /// channel, `ai<index>` otherwise.
    pub fn from_record(record: &SweepRecord, names: &[String]) -> Result<Self, WavesurferError> {
        let channels = record.raw.channels();
        let names = column_names(names, channels);
        let scans = record.raw.scans();
        let columns: Vec<Column> = match record.scaled.as_ref().map(ScaledBlock::data) {
            Some(ScaledData::F64(v)) => named_columns(&names, rows(v, channels, scans)),
            Some(ScaledData::F32(v)) => named_columns(&names, rows(v, channels, scans)),
            None => named_columns(&names, record.raw.rows()),
        };
        Ok(Self(DataFrame::new(columns)?))
    }

    /// Mean, minimum and maximum of every column.
    pub fn summary(&self) -> Result<Vec<ChannelSummary>, WavesurferError> {
        self.0
            .get_columns()
            .iter()
            .map(|column| -> Result<ChannelSummary, WavesurferError> {
                let series = column.as_materialized_series();
                Ok(ChannelSummary {
                    name: series.name().to_string(),
                    mean: series.mean().unwrap_or(f64::NAN),
                    min: series.min::<f64>()?.unwrap_or(f64::NAN),
                    max: series.max::<f64>()?.unwrap_or(f64::NAN),
                })
            })
            .collect()
    }

    /// Get the inner `polars` DataFrame.
    pub fn into_inner(self) -> DataFrame {
        self.0
    }
}

fn rows<T>(values: &[T], channels: usize, scans: usize) -> impl Iterator<Item = &[T]> {
    (0..channels).map(move |c| &values[c * scans..(c + 1) * scans])
}

fn named_columns<'a, T, I>(names: &[String], rows: I) -> Vec<Column>
where
    I: Iterator<Item = &'a [T]>,
    T: 'a,
    Series: NamedFrom<&'a [T], [T]>,
{
    names
        .iter()
        .zip(rows)
        .map(|(name, row)| Column::from(Series::new(name.as_str().into(), row)))
        .collect()
}

fn column_names(names: &[String], channels: usize) -> Vec<String> {
    let unique = names.len() == channels
        && names
            .iter()
            .enumerate()
            .all(|(i, name)| !name.is_empty() && !names[..i].contains(name));
    if unique {
        names.to_vec()
    } else {
        (0..channels).map(|i| format!("ai{i}")).collect()
    }
}

impl DecodedFile {
    /// The sweep `name` as a DataFrame with active channel names as columns.
    pub fn sweep_dataframe(&self, name: &str) -> Result<SweepDataFrame, WavesurferError> {
        let record = self
            .sweep(name)
            .ok_or_else(|| WavesurferError::SweepNotFound(name.to_owned()))?;
        SweepDataFrame::from_record(record, &self.header.active_channel_names())
    }

    /// Per-channel statistics of sweep `name`, in physical units for scaled
    /// output and counts for raw.
    pub fn channel_summary(&self, name: &str) -> Result<Vec<ChannelSummary>, WavesurferError> {
        self.sweep_dataframe(name)?.summary()
    }
}

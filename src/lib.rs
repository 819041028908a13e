//! Decoding WaveSurfer electrophysiology recordings.
//!
//! A file holds a `/header` group describing the rig and one group per
//! sweep with int16 ADC counts. [`load_data_file`] detects which release
//! wrote the file, normalizes the header and scales every sweep into
//! physical units.
pub use polars;
pub use wavesurfer_hdf5 as hdf5;

mod clock;
mod container;
mod dataframe;
pub mod error;
mod header;
mod reader;
mod scaling;
mod version;

pub use clock::{reconcile, ClockConfig, Rounding, DEFAULT_REFERENCE_HZ};
pub use container::Container;
pub use dataframe::{ChannelSummary, SweepDataFrame};
pub use error::{ErrorKind, WavesurferError};
pub use header::{normalize, CanonicalHeader, HeaderNode, HeaderTree};
pub use reader::{
    load_data_file, load_data_file_with, load_from_container, DecodeOptions, DecodedFile,
    OutputFormat, SweepRecord,
};
pub use scaling::{scale, Precision, RawBlock, ScaledBlock, ScaledData};
pub use version::{version_number, FieldTable, VersionTag};

#[cfg(doctest)]
doc_comment::doctest!("../README.md", readme);

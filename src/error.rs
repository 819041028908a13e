use std::{io, path::PathBuf};

use polars::error::PolarsError;
use wavesurfer_hdf5::Hdf5Error;

/// Broad category of a [`WavesurferError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The path does not exist or cannot be read.
    NotFound,
    /// Not a container of this file family, or no known header layout.
    UnsupportedFormat,
    /// Calibration, channel and sample dimensions disagree.
    ShapeMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum WavesurferError {
    #[error("The file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("File must be a WaveSurfer-generated HDF5 (.h5) file.")]
    NotHdf5File(PathBuf),

    #[error("The file {} could not be read: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File must be a WaveSurfer-generated HDF5 (.h5) file. {} could not be read: {source}", path.display())]
    InvalidContainer {
        path: PathBuf,
        #[source]
        source: Hdf5Error,
    },

    #[error("File must be a WaveSurfer-generated HDF5 file, unrecognized header layout: {0}")]
    UnrecognizedFormat(String),

    #[error("Missing header field {0}")]
    MissingField(String),

    #[error("Header field {field} has unexpected type {found}")]
    InvalidField { field: String, found: &'static str },

    #[error("Unable to read channel scaling coefficients")]
    MissingCoefficients,

    #[error("Mismatched {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    #[error("Unknown output format {0:?}, expected \"double\", \"single\" or \"raw\"")]
    UnknownOutputFormat(String),

    #[error("No sweep named {0}")]
    SweepNotFound(String),

    #[error("{0}")]
    Hdf5(#[from] Hdf5Error),

    #[error("{0}")]
    Polars(#[from] PolarsError),

    #[error("{0}")]
    IOError(#[from] io::Error),
}

impl WavesurferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WavesurferError::FileNotFound(_)
            | WavesurferError::Unreadable { .. }
            | WavesurferError::SweepNotFound(_)
            | WavesurferError::IOError(_) => ErrorKind::NotFound,
            WavesurferError::ShapeMismatch { .. }
            | WavesurferError::MissingCoefficients
            | WavesurferError::Polars(_) => ErrorKind::ShapeMismatch,
            WavesurferError::NotHdf5File(_)
            | WavesurferError::InvalidContainer { .. }
            | WavesurferError::UnrecognizedFormat(_)
            | WavesurferError::MissingField(_)
            | WavesurferError::InvalidField { .. }
            | WavesurferError::InvalidSampleRate(_)
            | WavesurferError::UnknownOutputFormat(_)
            | WavesurferError::Hdf5(_) => ErrorKind::UnsupportedFormat,
        }
    }
}

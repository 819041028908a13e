use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Hdf5Error {
    #[error("{0}")]
    IOError(#[from] io::Error),

    #[error("HDF5 signature not found, file is not an HDF5 container")]
    SignatureNotFound,

    #[error("Unexpected end of data, need {expected} bytes, have {available}")]
    UnexpectedEof { expected: usize, available: usize },

    #[error("Unsupported {structure} version {version}")]
    UnsupportedVersion {
        structure: &'static str,
        version: u8,
    },

    #[error("Invalid size {0} for an address or length field")]
    InvalidFieldSize(u8),

    #[error("Invalid {0} signature")]
    InvalidSignature(&'static str),

    #[error("Unknown message type {0:#06x} is marked as must-understand")]
    UnsupportedMessage(u16),

    #[error("Unsupported datatype class {0}")]
    UnsupportedDatatype(u8),

    #[error("Unsupported {0}-byte floating point type")]
    UnsupportedFloatSize(usize),

    #[error("Unsupported layout class {0}")]
    UnsupportedLayout(u8),

    #[error("Unsupported chunk index type {0}")]
    UnsupportedChunkIndex(u8),

    #[error("Unsupported filter {0}")]
    UnsupportedFilter(u16),

    #[error("Failed to decompress chunk, {0}")]
    Decompression(io::Error),

    #[error("Group {0} uses dense link storage, which is not supported")]
    DenseLinkStorage(String),

    #[error("No object at {0}")]
    PathNotFound(String),

    #[error("{0} is not a group")]
    NotAGroup(String),

    #[error("{0} is not a dataset")]
    NotADataset(String),

    #[error("No attribute {name} on {path}")]
    AttributeNotFound { path: String, name: String },

    #[error("Object {path} is missing its {message} message")]
    MissingMessage {
        path: String,
        message: &'static str,
    },

    #[error("Extent {dims:?} of {element_size}-byte elements does not fit in {limit} bytes")]
    ExtentTooLarge {
        dims: Vec<u64>,
        element_size: usize,
        limit: u64,
    },

    #[error("Data size mismatch, expected {expected} bytes, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("Global heap object {index} not found in collection at {address:#x}")]
    GlobalHeapObjectMissing { address: u64, index: u32 },
}

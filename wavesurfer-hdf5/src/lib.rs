//! Read-only access to the HDF5 containers written by WaveSurfer.
//!
//! Only the subset of the format those files use is supported: symbol-table
//! and compact link storage, contiguous, compact and B-tree chunked layouts,
//! and the deflate, shuffle and fletcher32 filters.
//!
//! ```no_run
//! use wavesurfer_hdf5::File;
//!
//! let file = File::open("data_0001.h5")?;
//! for child in file.list_children("/")? {
//!     println!("{} {:?}", child.name, child.kind);
//! }
//! # Ok::<(), wavesurfer_hdf5::Hdf5Error>(())
//! ```
mod array;
mod attribute;
mod btree;
mod bytes;
mod dataspace;
mod datatype;
mod error;
mod file;
mod filters;
mod heap;
mod layout;
mod link;
mod object_header;
mod superblock;

#[cfg(any(test, feature = "test-util"))]
pub mod builder;

pub use array::{Array, ArrayData};
pub use error::Hdf5Error;
pub use file::{Child, File, NodeKind};
pub use superblock::{Superblock, HDF5_SIGNATURE};

//! The operations the decoder needs from a hierarchical file.
use wavesurfer_hdf5::{Array, Child, File};

use crate::error::WavesurferError;

/// Read-only access to groups, attributes and datasets by slash-separated
/// path. Opening is left to the implementor.
pub trait Container {
    fn list_children(&self, path: &str) -> Result<Vec<Child>, WavesurferError>;

    fn attribute_names(&self, path: &str) -> Result<Vec<String>, WavesurferError>;

    fn read_attribute(&self, path: &str, name: &str) -> Result<Array, WavesurferError>;

    fn read_dataset(&self, path: &str) -> Result<Array, WavesurferError>;
}

impl Container for File {
    fn list_children(&self, path: &str) -> Result<Vec<Child>, WavesurferError> {
        Ok(File::list_children(self, path)?)
    }

    fn attribute_names(&self, path: &str) -> Result<Vec<String>, WavesurferError> {
        Ok(File::attribute_names(self, path)?)
    }

    fn read_attribute(&self, path: &str, name: &str) -> Result<Array, WavesurferError> {
        Ok(File::read_attribute(self, path, name)?)
    }

    fn read_dataset(&self, path: &str) -> Result<Array, WavesurferError> {
        Ok(File::read_dataset(self, path)?)
    }
}

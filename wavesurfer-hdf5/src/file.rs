//! Opening a container and resolving slash-separated paths to objects.
use std::{borrow::Cow, fs, path::Path};

use log::{debug, trace};
use memmap2::Mmap;

use crate::{
    array::{self, Array},
    attribute::Attribute,
    btree::chunk_records,
    bytes::{checked_slice, read_u32, read_uint},
    dataspace::Dataspace,
    datatype::Datatype,
    error::Hdf5Error,
    filters::FilterPipeline,
    heap::global_heap_object,
    layout::Layout,
    link::{parse_link_message, uses_dense_storage, Link, SymbolTable},
    object_header::{MessageType, ObjectHeader},
    superblock::{locate_signature, Superblock},
};

// upper bound on zlib's compression ratio
const MAX_INFLATE_RATIO: u64 = 1032;

enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Mapped(m) => m,
            Storage::Owned(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Dataset,
}

/// A member of a group as listed by [`File::list_children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub name: String,
    pub kind: NodeKind,
}

/// An open, read-only HDF5 file. The underlying mapping is released when
/// the value is dropped.
pub struct File {
    storage: Storage,
    base: usize,
    superblock: Superblock,
}

impl File {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Hdf5Error> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;
        // SAFETY: mapped read-only; the file is not modified while we hold it.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!("mapped {} ({} bytes)", path.display(), mmap.len());
        Self::from_storage(Storage::Mapped(mmap))
    }

    /// Reads a container already held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Hdf5Error> {
        Self::from_storage(Storage::Owned(bytes))
    }

    fn from_storage(storage: Storage) -> Result<Self, Hdf5Error> {
        let signature = locate_signature(storage.bytes())?;
        let superblock = Superblock::parse(&storage.bytes()[signature..])?;
        let base = match superblock.base_address {
            0 => signature,
            address => address as usize,
        };
        if base > storage.bytes().len() {
            return Err(Hdf5Error::SignatureNotFound);
        }
        debug!(
            "superblock v{} at {signature:#x}, root group at {:#x}",
            superblock.version, superblock.root_address
        );
        Ok(Self {
            storage,
            base,
            superblock,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    fn data(&self) -> &[u8] {
        &self.storage.bytes()[self.base..]
    }

    fn header_at(&self, address: u64) -> Result<ObjectHeader<'_>, Hdf5Error> {
        ObjectHeader::parse(self.data(), address as usize, &self.superblock)
    }

    fn links(&self, header: &ObjectHeader<'_>, path: &str) -> Result<Vec<Link>, Hdf5Error> {
        let sb = &self.superblock;
        if let Some(msg) = header.find(MessageType::SymbolTable) {
            return SymbolTable::parse(msg.data, sb)?.links(self.data(), sb);
        }
        if let Some(info) = header.find(MessageType::LinkInfo) {
            if uses_dense_storage(info.data, sb)? {
                return Err(Hdf5Error::DenseLinkStorage(path.to_owned()));
            }
        }
        let mut links = Vec::new();
        for msg in header.messages_of(MessageType::Link) {
            if let Some(link) = parse_link_message(msg.data, sb)? {
                links.push(link);
            }
        }
        Ok(links)
    }

    fn resolve(&self, path: &str) -> Result<ObjectHeader<'_>, Hdf5Error> {
        let mut header = self.header_at(self.superblock.root_address)?;
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if is_dataset(&header) {
                return Err(Hdf5Error::NotAGroup(current));
            }
            let link = self
                .links(&header, &current)?
                .into_iter()
                .find(|l| l.name == part)
                .ok_or_else(|| Hdf5Error::PathNotFound(format!("{current}/{part}")))?;
            current.push('/');
            current.push_str(part);
            header = self.header_at(link.address)?;
        }
        Ok(header)
    }

    /// Kind of the object at `path`.
    pub fn kind(&self, path: &str) -> Result<NodeKind, Hdf5Error> {
        let header = self.resolve(path)?;
        Ok(if is_dataset(&header) {
            NodeKind::Dataset
        } else {
            NodeKind::Group
        })
    }

    /// Members of the group at `path` in stored order.
    pub fn list_children(&self, path: &str) -> Result<Vec<Child>, Hdf5Error> {
        let header = self.resolve(path)?;
        if is_dataset(&header) {
            return Err(Hdf5Error::NotAGroup(path.to_owned()));
        }
        self.links(&header, path)?
            .into_iter()
            .map(|link| -> Result<Child, Hdf5Error> {
                let kind = if is_dataset(&self.header_at(link.address)?) {
                    NodeKind::Dataset
                } else {
                    NodeKind::Group
                };
                Ok(Child {
                    name: link.name,
                    kind,
                })
            })
            .collect()
    }

    pub fn attribute_names(&self, path: &str) -> Result<Vec<String>, Hdf5Error> {
        let header = self.resolve(path)?;
        header
            .messages_of(MessageType::Attribute)
            .map(|msg| Attribute::parse(msg.data, self.superblock.length_size).map(|a| a.name))
            .collect()
    }

    pub fn read_attribute(&self, path: &str, name: &str) -> Result<Array, Hdf5Error> {
        let header = self.resolve(path)?;
        for msg in header.messages_of(MessageType::Attribute) {
            let attr = Attribute::parse(msg.data, self.superblock.length_size)?;
            if attr.name == name {
                return self.decode_value(&attr.datatype, &attr.dataspace, attr.raw);
            }
        }
        Err(Hdf5Error::AttributeNotFound {
            path: path.to_owned(),
            name: name.to_owned(),
        })
    }

    pub fn read_dataset(&self, path: &str) -> Result<Array, Hdf5Error> {
        let header = self.resolve(path)?;
        let sb = &self.superblock;
        let missing = |message| Hdf5Error::MissingMessage {
            path: path.to_owned(),
            message,
        };
        let layout = header
            .find(MessageType::Layout)
            .ok_or_else(|| Hdf5Error::NotADataset(path.to_owned()))?;
        let layout = Layout::parse(layout.data, sb.offset_size, sb.length_size)?;
        let datatype = header
            .find(MessageType::Datatype)
            .ok_or_else(|| missing("datatype"))?;
        let (datatype, _) = Datatype::parse(datatype.data)?;
        let dataspace = header
            .find(MessageType::Dataspace)
            .ok_or_else(|| missing("dataspace"))?;
        let dataspace = Dataspace::parse(dataspace.data, sb.length_size)?;
        let pipeline = header
            .find(MessageType::FilterPipeline)
            .map(|m| FilterPipeline::parse(m.data))
            .transpose()?;

        let element_size = datatype.size();
        let available = self.data().len() as u64;
        let limit = match (&layout, &pipeline) {
            (Layout::Chunked { .. } | Layout::SingleChunk { .. }, Some(_)) => {
                available.saturating_mul(MAX_INFLATE_RATIO)
            }
            _ => available,
        };
        let total = dataspace.byte_size(element_size, limit)?;
        trace!("reading {path}: {:?} {datatype:?} {layout:?}", dataspace.dims);
        let raw: Cow<'_, [u8]> = match layout {
            Layout::Compact(bytes) => Cow::Borrowed(bytes),
            Layout::Contiguous { address: None, .. } => Cow::Owned(vec![0; total]),
            Layout::Contiguous {
                address: Some(address),
                ..
            } => Cow::Borrowed(checked_slice(self.data(), address, total as u64)?),
            Layout::Chunked {
                btree_address,
                chunk_dims,
            } => {
                let mut out = vec![0; total];
                if let Some(address) = btree_address {
                    let shape = ChunkShape::new(&chunk_dims, &dataspace.dims, element_size)?;
                    for record in chunk_records(self.data(), address, dataspace.dims.len(), sb)? {
                        let stored = checked_slice(self.data(), record.address, record.size as u64)?;
                        let chunk = unfilter(pipeline.as_ref(), stored, record.filter_mask, element_size)?;
                        shape.copy_into(&mut out, &chunk, &record.offsets)?;
                    }
                }
                Cow::Owned(out)
            }
            Layout::SingleChunk {
                address,
                filtered_size,
                filter_mask,
                chunk_dims,
            } => {
                let mut out = vec![0; total];
                if let Some(address) = address {
                    let shape = ChunkShape::new(&chunk_dims, &dataspace.dims, element_size)?;
                    let size = filtered_size.unwrap_or(shape.chunk_bytes as u64);
                    let stored = checked_slice(self.data(), address, size)?;
                    let chunk = unfilter(pipeline.as_ref(), stored, filter_mask, element_size)?;
                    let origin = vec![0; dataspace.dims.len()];
                    shape.copy_into(&mut out, &chunk, &origin)?;
                }
                Cow::Owned(out)
            }
        };
        self.decode_value(&datatype, &dataspace, &raw)
    }

    fn decode_value(
        &self,
        datatype: &Datatype,
        dataspace: &Dataspace,
        raw: &[u8],
    ) -> Result<Array, Hdf5Error> {
        let count = dataspace
            .num_elements()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Hdf5Error::ExtentTooLarge {
                dims: dataspace.dims.clone(),
                element_size: datatype.size(),
                limit: raw.len() as u64,
            })?;
        let data = array::decode(raw, datatype, count, |d| self.vlen_string(d))?;
        Ok(Array {
            shape: dataspace.dims.clone(),
            data,
        })
    }

    /// Resolves a variable-length string descriptor: length, global heap
    /// collection address, object index.
    fn vlen_string(&self, descriptor: &[u8]) -> Result<String, Hdf5Error> {
        let sb = &self.superblock;
        let len = read_u32(descriptor, 0)? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let address = read_uint(descriptor, 4, sb.offset_size)?;
        let index = read_u32(descriptor, 4 + sb.offset_size as usize)?;
        let bytes = global_heap_object(self.data(), address, index, sb)?;
        let text = &bytes[..len.min(bytes.len())];
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        Ok(String::from_utf8_lossy(&text[..end]).into_owned())
    }
}

fn is_dataset(header: &ObjectHeader<'_>) -> bool {
    header.find(MessageType::Layout).is_some()
}

fn unfilter(
    pipeline: Option<&FilterPipeline>,
    stored: &[u8],
    filter_mask: u32,
    element_size: usize,
) -> Result<Vec<u8>, Hdf5Error> {
    match pipeline {
        Some(p) => p.decode(stored.to_vec(), filter_mask, element_size),
        None => Ok(stored.to_vec()),
    }
}

/// Geometry for scattering decoded chunks into the dataset buffer.
struct ChunkShape<'a> {
    chunk: &'a [u64],
    dims: &'a [u64],
    element_size: usize,
    chunk_bytes: usize,
}

impl<'a> ChunkShape<'a> {
    fn new(chunk: &'a [u64], dims: &'a [u64], element_size: usize) -> Result<Self, Hdf5Error> {
        if chunk.len() != dims.len() {
            return Err(Hdf5Error::SizeMismatch {
                expected: dims.len(),
                found: chunk.len(),
            });
        }
        let chunk_bytes = chunk
            .iter()
            .try_fold(element_size as u64, |acc, &d| acc.checked_mul(d))
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| Hdf5Error::ExtentTooLarge {
                dims: chunk.to_vec(),
                element_size,
                limit: usize::MAX as u64,
            })?;
        Ok(Self {
            chunk,
            dims,
            element_size,
            chunk_bytes,
        })
    }

    /// Copies the in-bounds part of a full-sized chunk whose first element
    /// sits at `offset`. Edge chunks are stored at full size.
    fn copy_into(&self, out: &mut [u8], chunk: &[u8], offset: &[u64]) -> Result<(), Hdf5Error> {
        if chunk.len() < self.chunk_bytes {
            return Err(Hdf5Error::SizeMismatch {
                expected: self.chunk_bytes,
                found: chunk.len(),
            });
        }
        let rank = self.dims.len();
        let es = self.element_size;
        if rank == 0 {
            let n = es.min(out.len());
            out[..n].copy_from_slice(&chunk[..n]);
            return Ok(());
        }
        let last = rank - 1;
        let run = self.chunk[last].min(self.dims[last].saturating_sub(offset[last])) as usize;
        if run == 0 {
            return Ok(());
        }
        let mut idx = vec![0u64; last];
        loop {
            if (0..last).all(|d| offset[d].saturating_add(idx[d]) < self.dims[d]) {
                let mut src = 0u64;
                let mut dst = 0u64;
                for d in 0..last {
                    src = src * self.chunk[d] + idx[d];
                    dst = dst * self.dims[d] + offset[d] + idx[d];
                }
                let src = (src * self.chunk[last]) as usize * es;
                let dst = (dst * self.dims[last] + offset[last]) as usize * es;
                let n = run * es;
                if dst + n > out.len() {
                    return Err(Hdf5Error::SizeMismatch {
                        expected: dst + n,
                        found: out.len(),
                    });
                }
                out[dst..dst + n].copy_from_slice(&chunk[src..src + n]);
            }
            // advance the outer index, odometer style
            let mut d = last;
            loop {
                if d == 0 {
                    return Ok(());
                }
                d -= 1;
                idx[d] += 1;
                if idx[d] < self.chunk[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
    }
}

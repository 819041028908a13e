//! Writes small HDF5 files for tests.
//!
//! Output uses superblock version 0, version 1 object headers and
//! symbol-table groups, the same structures older acquisition software
//! writes. Every group is a single B-tree leaf with one symbol node, which
//! is all this crate's reader needs.
use std::{fs, io, io::Write, path::Path};

use flate2::{write::ZlibEncoder, Compression};

use crate::{
    array::{Array, ArrayData},
    bytes::pad8,
    filters::{shuffle, FILTER_DEFLATE, FILTER_SHUFFLE},
    superblock::HDF5_SIGNATURE,
};

const UNDEFINED: u64 = u64::MAX;
const SUPERBLOCK_SIZE: usize = 96;

#[derive(Debug, Clone)]
enum Storage {
    Contiguous,
    Compact,
    Chunked {
        chunk: Vec<u64>,
        deflate: Option<u32>,
        shuffle: bool,
    },
}

#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    array: Array,
    storage: Storage,
    attributes: Vec<(String, Array)>,
}

impl DatasetBuilder {
    pub fn contiguous(array: Array) -> Self {
        Self {
            array,
            storage: Storage::Contiguous,
            attributes: Vec::new(),
        }
    }

    pub fn compact(array: Array) -> Self {
        Self {
            storage: Storage::Compact,
            ..Self::contiguous(array)
        }
    }

    /// Chunked storage; `chunk` has one extent per dataset dimension.
    pub fn chunked(array: Array, chunk: &[u64]) -> Self {
        Self {
            storage: Storage::Chunked {
                chunk: chunk.to_vec(),
                deflate: None,
                shuffle: false,
            },
            ..Self::contiguous(array)
        }
    }

    /// Compresses chunks with zlib at `level`. No effect on unchunked data.
    pub fn deflate(mut self, level: u32) -> Self {
        if let Storage::Chunked { deflate, .. } = &mut self.storage {
            *deflate = Some(level);
        }
        self
    }

    /// Byte-shuffles chunks before compression. No effect on unchunked data.
    pub fn shuffle(mut self) -> Self {
        if let Storage::Chunked { shuffle, .. } = &mut self.storage {
            *shuffle = true;
        }
        self
    }

    pub fn attribute(mut self, name: &str, value: Array) -> Self {
        self.attributes.push((name.to_owned(), value));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupBuilder {
    groups: Vec<(String, GroupBuilder)>,
    datasets: Vec<(String, DatasetBuilder)>,
    attributes: Vec<(String, Array)>,
}

impl GroupBuilder {
    /// Returns the subgroup `name`, creating it if needed.
    pub fn group(&mut self, name: &str) -> &mut GroupBuilder {
        let idx = match self.groups.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.groups.push((name.to_owned(), GroupBuilder::default()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[idx].1
    }

    /// Adds a contiguous dataset, replacing any dataset of the same name.
    pub fn dataset(&mut self, name: &str, array: Array) -> &mut Self {
        self.dataset_with(name, DatasetBuilder::contiguous(array))
    }

    pub fn dataset_with(&mut self, name: &str, dataset: DatasetBuilder) -> &mut Self {
        self.datasets.retain(|(n, _)| n != name);
        self.datasets.push((name.to_owned(), dataset));
        self
    }

    pub fn attribute(&mut self, name: &str, value: Array) -> &mut Self {
        self.attributes.push((name.to_owned(), value));
        self
    }

    fn max_members(&self) -> usize {
        self.groups
            .iter()
            .map(|(_, g)| g.max_members())
            .fold(self.groups.len() + self.datasets.len(), usize::max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileBuilder {
    root: GroupBuilder,
}

impl FileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&mut self) -> &mut GroupBuilder {
        &mut self.root
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let leaf_k = self.root.max_members().div_ceil(2).max(4) as u16;
        let mut writer = Writer {
            buf: vec![0; SUPERBLOCK_SIZE],
        };
        let root = writer.group(&self.root)?;
        let eof = writer.buf.len() as u64;

        let mut sb = HDF5_SIGNATURE.to_vec();
        // versions, then 8-byte offsets and lengths
        sb.extend_from_slice(&[0, 0, 0, 0, 0, 8, 8, 0]);
        sb.extend_from_slice(&leaf_k.to_le_bytes());
        sb.extend_from_slice(&16u16.to_le_bytes());
        sb.extend_from_slice(&0u32.to_le_bytes());
        for address in [0, UNDEFINED, eof, UNDEFINED] {
            sb.extend_from_slice(&address.to_le_bytes());
        }
        // root symbol table entry
        sb.extend_from_slice(&0u64.to_le_bytes());
        sb.extend_from_slice(&root.to_le_bytes());
        sb.extend_from_slice(&[0; 24]);
        writer.buf[..SUPERBLOCK_SIZE].copy_from_slice(&sb);
        Ok(writer.buf)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::write(path, self.to_bytes()?)
    }
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn alloc(&mut self, bytes: &[u8]) -> u64 {
        self.buf.resize(pad8(self.buf.len()), 0);
        let address = self.buf.len() as u64;
        self.buf.extend_from_slice(bytes);
        address
    }

    fn group(&mut self, group: &GroupBuilder) -> io::Result<u64> {
        let mut members: Vec<(&str, u64)> = Vec::new();
        for (name, g) in &group.groups {
            members.push((name, self.group(g)?));
        }
        for (name, d) in &group.datasets {
            members.push((name, self.dataset(d)?));
        }
        members.sort_by(|a, b| a.0.cmp(b.0));

        // offset 0 of the heap holds the empty name
        let mut segment = vec![0u8; 8];
        let mut offsets = Vec::with_capacity(members.len());
        for (name, _) in &members {
            offsets.push(segment.len() as u64);
            segment.extend_from_slice(name.as_bytes());
            segment.push(0);
            segment.resize(pad8(segment.len()), 0);
        }
        let segment_address = self.alloc(&segment);
        let mut heap = b"HEAP\0\0\0\0".to_vec();
        heap.extend_from_slice(&(segment.len() as u64).to_le_bytes());
        heap.extend_from_slice(&UNDEFINED.to_le_bytes());
        heap.extend_from_slice(&segment_address.to_le_bytes());
        let heap_address = self.alloc(&heap);

        let mut btree = b"TREE\0\0".to_vec();
        if let Some(&last) = offsets.last() {
            let mut snod = b"SNOD\x01\0".to_vec();
            snod.extend_from_slice(&(members.len() as u16).to_le_bytes());
            for ((_, address), offset) in members.iter().zip(&offsets) {
                snod.extend_from_slice(&offset.to_le_bytes());
                snod.extend_from_slice(&address.to_le_bytes());
                snod.extend_from_slice(&[0; 24]);
            }
            let snod_address = self.alloc(&snod);
            btree.extend_from_slice(&1u16.to_le_bytes());
            btree.extend_from_slice(&[0xFF; 16]);
            btree.extend_from_slice(&0u64.to_le_bytes());
            btree.extend_from_slice(&snod_address.to_le_bytes());
            btree.extend_from_slice(&last.to_le_bytes());
        } else {
            btree.extend_from_slice(&0u16.to_le_bytes());
            btree.extend_from_slice(&[0xFF; 16]);
            btree.extend_from_slice(&0u64.to_le_bytes());
        }
        let btree_address = self.alloc(&btree);

        let mut symbol_table = btree_address.to_le_bytes().to_vec();
        symbol_table.extend_from_slice(&heap_address.to_le_bytes());
        let mut messages = vec![(0x11, symbol_table)];
        messages.extend(attribute_messages(&group.attributes));
        Ok(self.object_header(&messages))
    }

    fn dataset(&mut self, dataset: &DatasetBuilder) -> io::Result<u64> {
        let array = &dataset.array;
        let (datatype, element_size) = datatype_message(&array.data);
        let raw = encode(&array.data, element_size);
        let mut messages = vec![(0x01, dataspace_message(&array.shape)), (0x03, datatype)];
        let layout = match &dataset.storage {
            Storage::Contiguous => {
                let address = self.alloc(&raw);
                let mut layout = vec![3, 1];
                layout.extend_from_slice(&address.to_le_bytes());
                layout.extend_from_slice(&(raw.len() as u64).to_le_bytes());
                layout
            }
            Storage::Compact => {
                let mut layout = vec![3, 0];
                layout.extend_from_slice(&(raw.len() as u16).to_le_bytes());
                layout.extend_from_slice(&raw);
                layout
            }
            Storage::Chunked {
                chunk,
                deflate,
                shuffle,
            } => {
                let mut filters = Vec::new();
                if *shuffle {
                    filters.push((FILTER_SHUFFLE, element_size as u32));
                }
                if let Some(level) = deflate {
                    filters.push((FILTER_DEFLATE, *level));
                }
                if !filters.is_empty() {
                    messages.push((0x0B, pipeline_message(&filters)));
                }
                let btree = self.chunks(&raw, &array.shape, chunk, element_size, *shuffle, *deflate)?;
                let mut layout = vec![3, 2, chunk.len() as u8 + 1];
                layout.extend_from_slice(&btree.to_le_bytes());
                for extent in chunk {
                    layout.extend_from_slice(&(*extent as u32).to_le_bytes());
                }
                layout.extend_from_slice(&(element_size as u32).to_le_bytes());
                layout
            }
        };
        messages.push((0x08, layout));
        messages.extend(attribute_messages(&dataset.attributes));
        Ok(self.object_header(&messages))
    }

    fn chunks(
        &mut self,
        raw: &[u8],
        dims: &[u64],
        chunk: &[u64],
        element_size: usize,
        shuffled: bool,
        deflate: Option<u32>,
    ) -> io::Result<u64> {
        let grid: Vec<u64> = dims.iter().zip(chunk).map(|(d, c)| d.div_ceil(*c)).collect();
        let chunk_elements: u64 = chunk.iter().product();
        let mut entries = Vec::new();
        for index in 0..grid.iter().product::<u64>() {
            let origin: Vec<u64> = unravel(index, &grid)
                .iter()
                .zip(chunk)
                .map(|(g, c)| g * c)
                .collect();
            let mut bytes = vec![0u8; chunk_elements as usize * element_size];
            for e in 0..chunk_elements {
                let global: Vec<u64> = unravel(e, chunk)
                    .iter()
                    .zip(&origin)
                    .map(|(l, o)| l + o)
                    .collect();
                if global.iter().zip(dims).all(|(g, d)| g < d) {
                    let src = ravel(&global, dims) as usize * element_size;
                    let dst = e as usize * element_size;
                    bytes[dst..dst + element_size].copy_from_slice(&raw[src..src + element_size]);
                }
            }
            if shuffled {
                bytes = shuffle(&bytes, element_size);
            }
            if let Some(level) = deflate {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
                encoder.write_all(&bytes)?;
                bytes = encoder.finish()?;
            }
            let address = self.alloc(&bytes);
            entries.push((bytes.len() as u32, origin, address));
        }

        let mut node = b"TREE\x01\0".to_vec();
        node.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        node.extend_from_slice(&[0xFF; 16]);
        for (size, origin, address) in &entries {
            node.extend_from_slice(&size.to_le_bytes());
            node.extend_from_slice(&0u32.to_le_bytes());
            for offset in origin {
                node.extend_from_slice(&offset.to_le_bytes());
            }
            node.extend_from_slice(&0u64.to_le_bytes());
            node.extend_from_slice(&address.to_le_bytes());
        }
        node.extend_from_slice(&[0; 8]);
        for extent in dims {
            node.extend_from_slice(&extent.to_le_bytes());
        }
        node.extend_from_slice(&0u64.to_le_bytes());
        Ok(self.alloc(&node))
    }

    fn object_header(&mut self, messages: &[(u16, Vec<u8>)]) -> u64 {
        let mut body = Vec::new();
        for (kind, data) in messages {
            let size = pad8(data.len());
            body.extend_from_slice(&kind.to_le_bytes());
            body.extend_from_slice(&(size as u16).to_le_bytes());
            body.extend_from_slice(&[0; 4]);
            body.extend_from_slice(data);
            body.resize(body.len() + size - data.len(), 0);
        }
        let mut header = vec![1, 0];
        header.extend_from_slice(&(messages.len() as u16).to_le_bytes());
        header.extend_from_slice(&1u32.to_le_bytes());
        header.extend_from_slice(&(body.len() as u32).to_le_bytes());
        header.extend_from_slice(&[0; 4]);
        header.extend(body);
        self.alloc(&header)
    }
}

fn unravel(mut index: u64, dims: &[u64]) -> Vec<u64> {
    let mut out = vec![0; dims.len()];
    for d in (0..dims.len()).rev() {
        out[d] = index % dims[d];
        index /= dims[d];
    }
    out
}

fn ravel(index: &[u64], dims: &[u64]) -> u64 {
    index.iter().zip(dims).fold(0, |acc, (i, d)| acc * d + i)
}

fn dataspace_message(shape: &[u64]) -> Vec<u8> {
    let mut msg = vec![1, shape.len() as u8, 0, 0, 0, 0, 0, 0];
    for extent in shape {
        msg.extend_from_slice(&extent.to_le_bytes());
    }
    msg
}

fn integer_type(size: u32, signed: bool) -> Vec<u8> {
    let mut msg = vec![0x10, if signed { 0x08 } else { 0 }, 0, 0];
    msg.extend_from_slice(&size.to_le_bytes());
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&((size * 8) as u16).to_le_bytes());
    msg
}

fn float_type(size: u32) -> Vec<u8> {
    let (sign, exp_location, exp_size, mantissa_size, bias) = match size {
        4 => (31u8, 23u8, 8u8, 23u8, 127u32),
        _ => (63, 52, 11, 52, 1023),
    };
    let mut msg = vec![0x11, 0x20, sign, 0];
    msg.extend_from_slice(&size.to_le_bytes());
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&((size * 8) as u16).to_le_bytes());
    msg.extend_from_slice(&[exp_location, exp_size, 0, mantissa_size]);
    msg.extend_from_slice(&bias.to_le_bytes());
    msg
}

/// Datatype message and element size for the array's element type. Strings
/// are written null-padded at the longest value's length.
fn datatype_message(data: &ArrayData) -> (Vec<u8>, usize) {
    match data {
        ArrayData::I8(_) => (integer_type(1, true), 1),
        ArrayData::U8(_) => (integer_type(1, false), 1),
        ArrayData::I16(_) => (integer_type(2, true), 2),
        ArrayData::U16(_) => (integer_type(2, false), 2),
        ArrayData::I32(_) => (integer_type(4, true), 4),
        ArrayData::U32(_) => (integer_type(4, false), 4),
        ArrayData::I64(_) => (integer_type(8, true), 8),
        ArrayData::U64(_) => (integer_type(8, false), 8),
        ArrayData::F32(_) => (float_type(4), 4),
        ArrayData::F64(_) => (float_type(8), 8),
        ArrayData::Str(values) => {
            let size = values.iter().map(String::len).max().unwrap_or(0).max(1);
            let mut msg = vec![0x13, 0x01, 0, 0];
            msg.extend_from_slice(&(size as u32).to_le_bytes());
            (msg, size)
        }
    }
}

fn encode(data: &ArrayData, element_size: usize) -> Vec<u8> {
    match data {
        ArrayData::I8(v) => v.iter().map(|&x| x as u8).collect(),
        ArrayData::U8(v) => v.clone(),
        ArrayData::I16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        ArrayData::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        ArrayData::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        ArrayData::U32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        ArrayData::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        ArrayData::U64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        ArrayData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        ArrayData::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        ArrayData::Str(values) => values
            .iter()
            .flat_map(|s| {
                let mut bytes = s.as_bytes().to_vec();
                bytes.resize(element_size, 0);
                bytes
            })
            .collect(),
    }
}

fn pipeline_message(filters: &[(u16, u32)]) -> Vec<u8> {
    let mut msg = vec![1, filters.len() as u8, 0, 0, 0, 0, 0, 0];
    for (id, param) in filters {
        msg.extend_from_slice(&id.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&1u16.to_le_bytes());
        msg.extend_from_slice(&param.to_le_bytes());
        // an odd parameter count is padded in version 1
        msg.extend_from_slice(&[0; 4]);
    }
    msg
}

fn attribute_messages(attributes: &[(String, Array)]) -> Vec<(u16, Vec<u8>)> {
    attributes
        .iter()
        .map(|(name, value)| {
            let (datatype, element_size) = datatype_message(&value.data);
            let dataspace = dataspace_message(&value.shape);
            let mut name_bytes = name.as_bytes().to_vec();
            name_bytes.push(0);
            let mut msg = vec![1, 0];
            for part in [&name_bytes, &datatype, &dataspace] {
                msg.extend_from_slice(&(part.len() as u16).to_le_bytes());
            }
            for part in [&name_bytes, &datatype, &dataspace] {
                msg.extend_from_slice(part);
                msg.resize(msg.len() + pad8(part.len()) - part.len(), 0);
            }
            msg.extend(encode(&value.data, element_size));
            (0x0C, msg)
        })
        .collect()
}

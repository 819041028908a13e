//! Group membership: old-style symbol tables and new-style link messages.
use crate::{
    bytes::{ensure_len, read_address, read_u16, read_uint},
    btree::group_symbol_nodes,
    error::Hdf5Error,
    heap::LocalHeap,
    superblock::Superblock,
};

/// A named hard link to an object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub address: u64,
}

/// Symbol table message body: B-tree and local heap of an old-style group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTable {
    pub btree_address: u64,
    pub heap_address: u64,
}

impl SymbolTable {
    pub fn parse(data: &[u8], sb: &Superblock) -> Result<Self, Hdf5Error> {
        Ok(Self {
            btree_address: read_uint(data, 0, sb.offset_size)?,
            heap_address: read_uint(data, sb.offset_size as usize, sb.offset_size)?,
        })
    }

    /// Every link of the group in stored (name) order.
    pub fn links(&self, data: &[u8], sb: &Superblock) -> Result<Vec<Link>, Hdf5Error> {
        let heap = LocalHeap::parse(data, self.heap_address, sb)?;
        let mut links = Vec::new();
        for node in group_symbol_nodes(data, self.btree_address, sb)? {
            links.extend(symbol_node_links(data, node, &heap, sb)?);
        }
        Ok(links)
    }
}

fn symbol_node_links(
    data: &[u8],
    address: u64,
    heap: &LocalHeap<'_>,
    sb: &Superblock,
) -> Result<Vec<Link>, Hdf5Error> {
    let pos = address as usize;
    ensure_len(data, pos, 8)?;
    if &data[pos..pos + 4] != b"SNOD" {
        return Err(Hdf5Error::InvalidSignature("symbol table node"));
    }
    let count = read_u16(data, pos + 6)? as usize;
    let os = sb.offset_size as usize;
    // name offset, header address, cache type, reserved, 16 scratch bytes
    let entry_size = 2 * os + 24;
    (0..count)
        .map(|i| {
            let entry = pos + 8 + i * entry_size;
            let name_offset = read_uint(data, entry, sb.offset_size)?;
            Ok(Link {
                name: heap.name_at(name_offset)?,
                address: read_uint(data, entry + os, sb.offset_size)?,
            })
        })
        .collect()
}

/// Parses a link message; soft and external links yield `None`.
pub fn parse_link_message(data: &[u8], sb: &Superblock) -> Result<Option<Link>, Hdf5Error> {
    ensure_len(data, 0, 2)?;
    if data[0] != 1 {
        return Err(Hdf5Error::UnsupportedVersion {
            structure: "link message",
            version: data[0],
        });
    }
    let flags = data[1];
    let mut pos = 2;
    let link_type = if flags & 0x08 != 0 {
        ensure_len(data, pos, 1)?;
        pos += 1;
        data[pos - 1]
    } else {
        0
    };
    if flags & 0x04 != 0 {
        // creation order
        pos += 8;
    }
    if flags & 0x10 != 0 {
        // character set
        pos += 1;
    }
    let width = 1u8 << (flags & 0x03);
    let name_len = read_uint(data, pos, width)? as usize;
    pos += width as usize;
    ensure_len(data, pos, name_len)?;
    let name = String::from_utf8_lossy(&data[pos..pos + name_len]).into_owned();
    pos += name_len;
    if link_type != 0 {
        return Ok(None);
    }
    let address = read_uint(data, pos, sb.offset_size)?;
    Ok(Some(Link { name, address }))
}

/// True when a link info message points at a fractal heap, meaning the
/// group's links are held in dense storage instead of link messages.
pub fn uses_dense_storage(data: &[u8], sb: &Superblock) -> Result<bool, Hdf5Error> {
    ensure_len(data, 0, 2)?;
    let flags = data[1];
    let pos = if flags & 0x01 != 0 { 10 } else { 2 };
    Ok(read_address(data, pos, sb.offset_size)?.is_some())
}

//! Version 1 B-trees: group nodes (type 0) and raw data chunk nodes (type 1).
use crate::{
    bytes::{ensure_len, read_u16, read_u32, read_uint},
    error::Hdf5Error,
    superblock::Superblock,
};

const TREE_SIGNATURE: &[u8; 4] = b"TREE";

struct NodeHeader {
    node_type: u8,
    level: u8,
    entries: usize,
}

fn node_header(data: &[u8], address: usize, sb: &Superblock) -> Result<(NodeHeader, usize), Hdf5Error> {
    ensure_len(data, address, 8)?;
    if &data[address..address + 4] != TREE_SIGNATURE {
        return Err(Hdf5Error::InvalidSignature("B-tree node"));
    }
    let header = NodeHeader {
        node_type: data[address + 4],
        level: data[address + 5],
        entries: read_u16(data, address + 6)? as usize,
    };
    // skip both sibling addresses
    Ok((header, address + 8 + 2 * sb.offset_size as usize))
}

/// Addresses of every symbol table node (SNOD) under a group B-tree, in key
/// order.
pub fn group_symbol_nodes(data: &[u8], address: u64, sb: &Superblock) -> Result<Vec<u64>, Hdf5Error> {
    let (header, mut pos) = node_header(data, address as usize, sb)?;
    if header.node_type != 0 {
        return Err(Hdf5Error::InvalidSignature("group B-tree node type"));
    }
    let key_size = sb.length_size as usize;
    let os = sb.offset_size as usize;
    let mut nodes = Vec::with_capacity(header.entries);
    for _ in 0..header.entries {
        pos += key_size;
        let child = read_uint(data, pos, sb.offset_size)?;
        pos += os;
        if header.level == 0 {
            nodes.push(child);
        } else {
            nodes.extend(group_symbol_nodes(data, child, sb)?);
        }
    }
    Ok(nodes)
}

/// One stored chunk located through a chunk B-tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub size: u32,
    pub filter_mask: u32,
    /// Element offset of the chunk in each dataset dimension.
    pub offsets: Vec<u64>,
    pub address: u64,
}

/// Collects the chunk records under a chunk B-tree for a dataset of `rank`
/// dimensions.
pub fn chunk_records(
    data: &[u8],
    address: u64,
    rank: usize,
    sb: &Superblock,
) -> Result<Vec<ChunkRecord>, Hdf5Error> {
    let (header, mut pos) = node_header(data, address as usize, sb)?;
    if header.node_type != 1 {
        return Err(Hdf5Error::InvalidSignature("chunk B-tree node type"));
    }
    // chunk size, filter mask, then rank + 1 offsets of 8 bytes each
    let key_size = 8 + 8 * (rank + 1);
    let os = sb.offset_size as usize;
    let mut records = Vec::with_capacity(header.entries);
    for _ in 0..header.entries {
        ensure_len(data, pos, key_size + os)?;
        let size = read_u32(data, pos)?;
        let filter_mask = read_u32(data, pos + 4)?;
        let offsets = (0..rank)
            .map(|d| read_uint(data, pos + 8 + 8 * d, 8))
            .collect::<Result<Vec<_>, _>>()?;
        pos += key_size;
        let child = read_uint(data, pos, sb.offset_size)?;
        pos += os;
        if header.level == 0 {
            records.push(ChunkRecord {
                size,
                filter_mask,
                offsets,
                address: child,
            });
        } else {
            records.extend(chunk_records(data, child, rank, sb)?);
        }
    }
    Ok(records)
}

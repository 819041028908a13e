//! Local heaps (link names of symbol-table groups) and global heap
//! collections (variable-length string storage).
use crate::{
    bytes::{checked_slice, ensure_len, pad8, read_c_string, read_u16, read_uint},
    error::Hdf5Error,
    superblock::Superblock,
};

pub struct LocalHeap<'a> {
    segment: &'a [u8],
}

impl<'a> LocalHeap<'a> {
    pub fn parse(data: &'a [u8], address: u64, sb: &Superblock) -> Result<Self, Hdf5Error> {
        let pos = address as usize;
        ensure_len(data, pos, 8)?;
        if &data[pos..pos + 4] != b"HEAP" {
            return Err(Hdf5Error::InvalidSignature("local heap"));
        }
        let ls = sb.length_size as usize;
        let segment_size = read_uint(data, pos + 8, sb.length_size)?;
        let segment_address = read_uint(data, pos + 8 + 2 * ls, sb.offset_size)?;
        Ok(Self {
            segment: checked_slice(data, segment_address, segment_size)?,
        })
    }

    pub fn name_at(&self, offset: u64) -> Result<String, Hdf5Error> {
        read_c_string(self.segment, offset as usize)
    }
}

/// Object `index` of the global heap collection at `address`.
pub fn global_heap_object<'a>(
    data: &'a [u8],
    address: u64,
    index: u32,
    sb: &Superblock,
) -> Result<&'a [u8], Hdf5Error> {
    let start = address as usize;
    ensure_len(data, start, 8)?;
    if &data[start..start + 4] != b"GCOL" {
        return Err(Hdf5Error::InvalidSignature("global heap collection"));
    }
    let ls = sb.length_size as usize;
    let collection_size = read_uint(data, start + 8, sb.length_size)? as usize;
    let end = start.saturating_add(collection_size).min(data.len());
    let mut pos = start + 8 + ls;
    while pos + 8 + ls <= end {
        let object_index = read_u16(data, pos)?;
        if object_index == 0 {
            // free space marks the end of the used objects
            break;
        }
        let size = read_uint(data, pos + 8, sb.length_size)? as usize;
        let body = pos + 8 + ls;
        if object_index as u32 == index {
            ensure_len(data, body, size)?;
            return Ok(&data[body..body + size]);
        }
        pos = body + pad8(size);
    }
    Err(Hdf5Error::GlobalHeapObjectMissing { address, index })
}

#[cfg(test)]
mod test {
    use super::*;

    fn sb() -> Superblock {
        Superblock {
            version: 0,
            offset_size: 8,
            length_size: 8,
            base_address: 0,
            eof_address: 0,
            root_address: 0,
            group_leaf_node_k: Some(4),
        }
    }

    #[test]
    fn test_local_heap_names() -> eyre::Result<()> {
        let mut data = b"HEAP\0\0\0\0".to_vec();
        let segment = b"\0\0\0\0\0\0\0\0header\0\0sweep_0001\0".to_vec();
        data.extend_from_slice(&(segment.len() as u64).to_le_bytes());
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.extend_from_slice(&32u64.to_le_bytes());
        data.extend(segment);

        let heap = LocalHeap::parse(&data, 0, &sb())?;
        assert_eq!(heap.name_at(8)?, "header");
        assert_eq!(heap.name_at(16)?, "sweep_0001");
        Ok(())
    }

    #[test]
    fn test_global_heap_lookup() -> eyre::Result<()> {
        let mut objects = Vec::new();
        for (index, text) in [(1u16, &b"0.933"[..]), (2, &b"Volts"[..])] {
            objects.extend_from_slice(&index.to_le_bytes());
            objects.extend_from_slice(&1u16.to_le_bytes());
            objects.extend_from_slice(&[0; 4]);
            objects.extend_from_slice(&(text.len() as u64).to_le_bytes());
            objects.extend_from_slice(text);
            objects.extend_from_slice(&[0; 3]);
        }
        let mut data = b"GCOL\x01\0\0\0".to_vec();
        data.extend_from_slice(&((16 + objects.len()) as u64).to_le_bytes());
        data.extend(objects);

        assert_eq!(global_heap_object(&data, 0, 2, &sb())?, b"Volts");
        assert!(matches!(
            global_heap_object(&data, 0, 3, &sb()),
            Err(Hdf5Error::GlobalHeapObjectMissing { index: 3, .. })
        ));
        Ok(())
    }
}

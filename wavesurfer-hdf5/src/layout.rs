use crate::{
    bytes::{ensure_len, read_address, read_u16, read_u32, read_uint},
    error::Hdf5Error,
};

/// Where a dataset keeps its raw data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout<'a> {
    Compact(&'a [u8]),
    Contiguous {
        address: Option<u64>,
        size: u64,
    },
    /// Chunks indexed by a version 1 B-tree. `chunk_dims` carries one entry
    /// per dataset dimension.
    Chunked {
        btree_address: Option<u64>,
        chunk_dims: Vec<u64>,
    },
    /// A single chunk covering the whole dataset, optionally filtered.
    SingleChunk {
        address: Option<u64>,
        filtered_size: Option<u64>,
        filter_mask: u32,
        chunk_dims: Vec<u64>,
    },
}

impl<'a> Layout<'a> {
    pub fn parse(data: &'a [u8], offset_size: u8, length_size: u8) -> Result<Self, Hdf5Error> {
        ensure_len(data, 0, 2)?;
        match data[0] {
            3 => Self::parse_v3(data, offset_size, length_size),
            4 => Self::parse_v4(data, offset_size, length_size),
            version => Err(Hdf5Error::UnsupportedVersion {
                structure: "data layout",
                version,
            }),
        }
    }

    fn parse_v3(data: &'a [u8], offset_size: u8, length_size: u8) -> Result<Self, Hdf5Error> {
        let os = offset_size as usize;
        match data[1] {
            0 => {
                let size = read_u16(data, 2)? as usize;
                ensure_len(data, 4, size)?;
                Ok(Self::Compact(&data[4..4 + size]))
            }
            1 => Ok(Self::Contiguous {
                address: read_address(data, 2, offset_size)?,
                size: read_uint(data, 2 + os, length_size)?,
            }),
            2 => {
                ensure_len(data, 2, 1)?;
                // Stored dimensionality includes a trailing element-size entry.
                let dimensionality = data[2] as usize;
                let btree_address = read_address(data, 3, offset_size)?;
                let start = 3 + os;
                let chunk_dims = (0..dimensionality.saturating_sub(1))
                    .map(|i| read_u32(data, start + 4 * i).map(u64::from))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Chunked {
                    btree_address,
                    chunk_dims,
                })
            }
            class => Err(Hdf5Error::UnsupportedLayout(class)),
        }
    }

    fn parse_v4(data: &'a [u8], offset_size: u8, length_size: u8) -> Result<Self, Hdf5Error> {
        match data[1] {
            0 | 1 => Self::parse_v3(data, offset_size, length_size),
            2 => {
                ensure_len(data, 2, 3)?;
                let flags = data[2];
                let dimensionality = data[3] as usize;
                let width = data[4];
                let mut pos = 5;
                let mut chunk_dims = Vec::with_capacity(dimensionality);
                for _ in 0..dimensionality {
                    chunk_dims.push(read_uint(data, pos, width)?);
                    pos += width as usize;
                }
                // drop the element-size entry
                chunk_dims.pop();
                ensure_len(data, pos, 1)?;
                let index_type = data[pos];
                pos += 1;
                match index_type {
                    1 => {
                        let (filtered_size, filter_mask) = if flags & 0x02 != 0 {
                            let size = read_uint(data, pos, length_size)?;
                            let mask = read_u32(data, pos + length_size as usize)?;
                            pos += length_size as usize + 4;
                            (Some(size), mask)
                        } else {
                            (None, 0)
                        };
                        Ok(Self::SingleChunk {
                            address: read_address(data, pos, offset_size)?,
                            filtered_size,
                            filter_mask,
                            chunk_dims,
                        })
                    }
                    other => Err(Hdf5Error::UnsupportedChunkIndex(other)),
                }
            }
            class => Err(Hdf5Error::UnsupportedLayout(class)),
        }
    }
}

//! Filter pipeline messages and the reverse filters applied to chunks.
use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::{
    bytes::{ensure_len, pad8, read_u16, read_u32},
    error::Hdf5Error,
};

pub const FILTER_DEFLATE: u16 = 1;
pub const FILTER_SHUFFLE: u16 = 2;
pub const FILTER_FLETCHER32: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub id: u16,
    pub flags: u16,
    pub params: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPipeline {
    pub filters: Vec<Filter>,
}

impl FilterPipeline {
    pub fn parse(data: &[u8]) -> Result<Self, Hdf5Error> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        let count = data[1] as usize;
        let mut pos = match version {
            1 => 8,
            2 => 2,
            _ => {
                return Err(Hdf5Error::UnsupportedVersion {
                    structure: "filter pipeline",
                    version,
                })
            }
        };
        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let id = read_u16(data, pos)?;
            pos += 2;
            // Version 2 omits the name length for library-defined filters.
            let name_len = if version == 1 || id >= 256 {
                let n = read_u16(data, pos)? as usize;
                pos += 2;
                n
            } else {
                0
            };
            let flags = read_u16(data, pos)?;
            let n_params = read_u16(data, pos + 2)? as usize;
            pos += 4;
            pos += if version == 1 { pad8(name_len) } else { name_len };
            let params = (0..n_params)
                .map(|i| read_u32(data, pos + 4 * i))
                .collect::<Result<Vec<_>, _>>()?;
            pos += 4 * n_params;
            if version == 1 && n_params % 2 == 1 {
                pos += 4;
            }
            filters.push(Filter { id, flags, params });
        }
        Ok(Self { filters })
    }

    /// Undoes the pipeline on one stored chunk. Bit `i` of `filter_mask`
    /// marks filter `i` as skipped for this chunk.
    pub fn decode(
        &self,
        mut chunk: Vec<u8>,
        filter_mask: u32,
        element_size: usize,
    ) -> Result<Vec<u8>, Hdf5Error> {
        for (i, filter) in self.filters.iter().enumerate().rev() {
            if filter_mask & (1 << i) != 0 {
                continue;
            }
            chunk = match filter.id {
                FILTER_DEFLATE => inflate(&chunk)?,
                FILTER_SHUFFLE => {
                    let size = filter.params.first().map_or(element_size, |&s| s as usize);
                    unshuffle(&chunk, size)
                }
                FILTER_FLETCHER32 => {
                    let keep = chunk.len().saturating_sub(4);
                    chunk.truncate(keep);
                    chunk
                }
                other => return Err(Hdf5Error::UnsupportedFilter(other)),
            };
        }
        Ok(chunk)
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, Hdf5Error> {
    let mut out = Vec::with_capacity(data.len() * 4);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(Hdf5Error::Decompression)?;
    Ok(out)
}

/// Byte shuffle groups byte `b` of every element together; this restores
/// element order. Trailing bytes that do not fill an element are left alone.
pub fn unshuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / element_size;
    let mut out = data.to_vec();
    for b in 0..element_size {
        for i in 0..n {
            out[i * element_size + b] = data[b * n + i];
        }
    }
    out
}

#[cfg(any(test, feature = "test-util"))]
pub(crate) fn shuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 {
        return data.to_vec();
    }
    let n = data.len() / element_size;
    let mut out = data.to_vec();
    for b in 0..element_size {
        for i in 0..n {
            out[b * n + i] = data[i * element_size + b];
        }
    }
    out
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use flate2::{write::ZlibEncoder, Compression};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_v1() -> eyre::Result<()> {
        let mut data = vec![1, 2, 0, 0, 0, 0, 0, 0];
        // shuffle, one parameter plus padding
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0; 4]);
        // deflate with a padded name
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(b"deflate\0");
        data.extend_from_slice(&6u32.to_le_bytes());
        data.extend_from_slice(&[0; 4]);

        let pipeline = FilterPipeline::parse(&data)?;
        assert_eq!(
            pipeline.filters,
            vec![
                Filter {
                    id: FILTER_SHUFFLE,
                    flags: 1,
                    params: vec![2]
                },
                Filter {
                    id: FILTER_DEFLATE,
                    flags: 0,
                    params: vec![6]
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_parse_v2() -> eyre::Result<()> {
        let mut data = vec![2, 1];
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        let pipeline = FilterPipeline::parse(&data)?;
        assert_eq!(pipeline.filters[0].params, vec![4]);
        Ok(())
    }

    #[test]
    fn test_shuffle_deflate_decode() -> eyre::Result<()> {
        let values: Vec<u8> = (0i16..64).flat_map(|v| (v * 300).to_le_bytes()).collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&shuffle(&values, 2))?;
        let stored = encoder.finish()?;

        let pipeline = FilterPipeline {
            filters: vec![
                Filter {
                    id: FILTER_SHUFFLE,
                    flags: 0,
                    params: vec![2],
                },
                Filter {
                    id: FILTER_DEFLATE,
                    flags: 0,
                    params: vec![6],
                },
            ],
        };
        assert_eq!(pipeline.decode(stored, 0, 2)?, values);
        Ok(())
    }

    #[test]
    fn test_masked_filter_skipped() -> eyre::Result<()> {
        let pipeline = FilterPipeline {
            filters: vec![Filter {
                id: FILTER_DEFLATE,
                flags: 0,
                params: vec![],
            }],
        };
        assert_eq!(pipeline.decode(vec![1, 2, 3], 0b1, 1)?, vec![1, 2, 3]);
        assert!(pipeline.decode(vec![1, 2, 3], 0, 1).is_err());
        Ok(())
    }

    #[test]
    fn test_unshuffle_keeps_tail() {
        let data = [1, 3, 2, 4, 9];
        assert_eq!(unshuffle(&data, 2), vec![1, 2, 3, 4, 9]);
    }
}

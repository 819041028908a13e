//! Superblock parsing, versions 0 through 3.
use crate::{
    bytes::{ensure_len, read_u16, read_uint},
    error::Hdf5Error,
};

pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// File-wide layout parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub version: u8,
    /// Width in bytes of every address field.
    pub offset_size: u8,
    /// Width in bytes of every length field.
    pub length_size: u8,
    pub base_address: u64,
    pub eof_address: u64,
    /// Object header address of the root group.
    pub root_address: u64,
    /// Group leaf node K, only stored by versions 0 and 1.
    pub group_leaf_node_k: Option<u16>,
}

/// Finds the superblock signature, which may sit behind a user block at
/// offset 0, 512, 1024, 2048, ...
pub fn locate_signature(data: &[u8]) -> Result<usize, Hdf5Error> {
    let mut offset = 0usize;
    while offset + HDF5_SIGNATURE.len() <= data.len() {
        if data[offset..offset + HDF5_SIGNATURE.len()] == HDF5_SIGNATURE {
            return Ok(offset);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    Err(Hdf5Error::SignatureNotFound)
}

fn validate_sizes(offset_size: u8, length_size: u8) -> Result<(), Hdf5Error> {
    for size in [offset_size, length_size] {
        if !matches!(size, 2 | 4 | 8) {
            return Err(Hdf5Error::InvalidFieldSize(size));
        }
    }
    Ok(())
}

impl Superblock {
    /// Parses the superblock at the start of `data`, which must begin with
    /// the signature.
    pub fn parse(data: &[u8]) -> Result<Self, Hdf5Error> {
        ensure_len(data, 0, 9)?;
        if data[..8] != HDF5_SIGNATURE {
            return Err(Hdf5Error::SignatureNotFound);
        }
        match data[8] {
            0 => Self::parse_v0_v1(data, false),
            1 => Self::parse_v0_v1(data, true),
            2 | 3 => Self::parse_v2_v3(data),
            version => Err(Hdf5Error::UnsupportedVersion {
                structure: "superblock",
                version,
            }),
        }
    }

    fn parse_v0_v1(data: &[u8], v1: bool) -> Result<Self, Hdf5Error> {
        // Version 1 adds the indexed storage K and two reserved bytes.
        let fixed = if v1 { 28 } else { 24 };
        ensure_len(data, 0, fixed)?;
        let offset_size = data[13];
        let length_size = data[14];
        validate_sizes(offset_size, length_size)?;
        let group_leaf_node_k = read_u16(data, 16)?;

        let os = offset_size as usize;
        let mut pos = fixed;
        let base_address = read_uint(data, pos, offset_size)?;
        pos += os;
        // free space info address
        pos += os;
        let eof_address = read_uint(data, pos, offset_size)?;
        pos += os;
        // driver info address
        pos += os;

        // Root group symbol table entry: link name offset, then header address.
        pos += os;
        let root_address = read_uint(data, pos, offset_size)?;

        Ok(Self {
            version: data[8],
            offset_size,
            length_size,
            base_address,
            eof_address,
            root_address,
            group_leaf_node_k: Some(group_leaf_node_k),
        })
    }

    fn parse_v2_v3(data: &[u8]) -> Result<Self, Hdf5Error> {
        ensure_len(data, 0, 12)?;
        let offset_size = data[9];
        let length_size = data[10];
        validate_sizes(offset_size, length_size)?;

        let os = offset_size as usize;
        let mut pos = 12;
        let base_address = read_uint(data, pos, offset_size)?;
        pos += os;
        // superblock extension address
        pos += os;
        let eof_address = read_uint(data, pos, offset_size)?;
        pos += os;
        let root_address = read_uint(data, pos, offset_size)?;

        Ok(Self {
            version: data[8],
            offset_size,
            length_size,
            base_address,
            eof_address,
            root_address,
            group_leaf_node_k: None,
        })
    }
}

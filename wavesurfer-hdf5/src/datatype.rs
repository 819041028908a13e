use crate::{
    bytes::{ensure_len, read_u32},
    error::Hdf5Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPadding {
    NullTerminated,
    NullPadded,
    SpacePadded,
}

/// Element types that appear in acquisition files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datatype {
    Integer {
        size: usize,
        signed: bool,
        big_endian: bool,
    },
    Float {
        size: usize,
        big_endian: bool,
    },
    FixedString {
        size: usize,
        padding: StringPadding,
    },
    /// Variable-length string; each element references the global heap.
    VarString { size: usize },
}

impl Datatype {
    /// Parses a datatype message, returning the type and the bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), Hdf5Error> {
        ensure_len(data, 0, 8)?;
        let class = data[0] & 0x0F;
        let bf0 = data[1];
        let size = read_u32(data, 4)? as usize;
        let big_endian = bf0 & 0x01 != 0;
        match class {
            // fixed-point
            0 => Ok((
                Self::Integer {
                    size,
                    signed: bf0 & 0x08 != 0,
                    big_endian,
                },
                12,
            )),
            // floating-point
            1 => {
                if !matches!(size, 4 | 8) {
                    return Err(Hdf5Error::UnsupportedFloatSize(size));
                }
                Ok((Self::Float { size, big_endian }, 20))
            }
            // string
            3 => {
                let padding = match bf0 & 0x0F {
                    0 => StringPadding::NullTerminated,
                    1 => StringPadding::NullPadded,
                    _ => StringPadding::SpacePadded,
                };
                Ok((Self::FixedString { size, padding }, 8))
            }
            // bitfield, read as unsigned
            4 => Ok((
                Self::Integer {
                    size,
                    signed: false,
                    big_endian,
                },
                12,
            )),
            // enumeration: logical values are stored as enums over an integer base
            8 => {
                let (base, used) = Self::parse(&data[8..])?;
                Ok((base, 8 + used))
            }
            // variable-length, string kind only
            9 if bf0 & 0x0F == 1 => Ok((Self::VarString { size }, 8)),
            other => Err(Hdf5Error::UnsupportedDatatype(other)),
        }
    }

    /// Bytes per element as stored.
    pub fn size(&self) -> usize {
        match self {
            Self::Integer { size, .. }
            | Self::Float { size, .. }
            | Self::FixedString { size, .. }
            | Self::VarString { size } => *size,
        }
    }
}

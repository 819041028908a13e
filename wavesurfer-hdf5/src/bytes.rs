//! Little-endian field access over raw file bytes.
use byteorder::{ByteOrder, LittleEndian};

use crate::error::Hdf5Error;

pub(crate) fn ensure_len(data: &[u8], pos: usize, needed: usize) -> Result<(), Hdf5Error> {
    match pos.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(Hdf5Error::UnexpectedEof {
            expected: pos.saturating_add(needed),
            available: data.len(),
        }),
    }
}

/// Reads an unsigned little-endian integer of `size` bytes, as used for
/// addresses and lengths whose width is fixed by the superblock.
pub(crate) fn read_uint(data: &[u8], pos: usize, size: u8) -> Result<u64, Hdf5Error> {
    let s = size as usize;
    ensure_len(data, pos, s)?;
    let slice = &data[pos..pos + s];
    Ok(match size {
        1 => slice[0] as u64,
        2 => LittleEndian::read_u16(slice) as u64,
        4 => LittleEndian::read_u32(slice) as u64,
        8 => LittleEndian::read_u64(slice),
        _ => return Err(Hdf5Error::InvalidFieldSize(size)),
    })
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16, Hdf5Error> {
    ensure_len(data, pos, 2)?;
    Ok(LittleEndian::read_u16(&data[pos..pos + 2]))
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Result<u32, Hdf5Error> {
    ensure_len(data, pos, 4)?;
    Ok(LittleEndian::read_u32(&data[pos..pos + 4]))
}

/// An address field with every bit set marks an unallocated object.
pub(crate) fn read_address(data: &[u8], pos: usize, size: u8) -> Result<Option<u64>, Hdf5Error> {
    let s = size as usize;
    ensure_len(data, pos, s)?;
    if data[pos..pos + s].iter().all(|&b| b == 0xFF) {
        Ok(None)
    } else {
        read_uint(data, pos, size).map(Some)
    }
}

pub(crate) fn checked_slice(data: &[u8], pos: u64, len: u64) -> Result<&[u8], Hdf5Error> {
    let (Ok(pos), Ok(len)) = (usize::try_from(pos), usize::try_from(len)) else {
        return Err(Hdf5Error::UnexpectedEof {
            expected: usize::MAX,
            available: data.len(),
        });
    };
    ensure_len(data, pos, len)?;
    Ok(&data[pos..pos + len])
}

/// Null-terminated string starting at `pos`.
pub(crate) fn read_c_string(data: &[u8], pos: usize) -> Result<String, Hdf5Error> {
    ensure_len(data, pos, 1)?;
    let end = data[pos..]
        .iter()
        .position(|&b| b == 0)
        .map(|n| pos + n)
        .unwrap_or(data.len());
    Ok(String::from_utf8_lossy(&data[pos..end]).into_owned())
}

pub(crate) fn pad8(n: usize) -> usize {
    n.div_ceil(8) * 8
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_uint_widths() -> Result<(), Hdf5Error> {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_uint(&data, 0, 1)?, 0x01);
        assert_eq!(read_uint(&data, 0, 2)?, 0x0201);
        assert_eq!(read_uint(&data, 0, 4)?, 0x0403_0201);
        assert_eq!(read_uint(&data, 0, 8)?, 0x0807_0605_0403_0201);
        assert!(matches!(
            read_uint(&data, 0, 3),
            Err(Hdf5Error::InvalidFieldSize(3))
        ));
        Ok(())
    }

    #[test]
    fn test_undefined_address() -> Result<(), Hdf5Error> {
        let data = [0xFF; 8];
        assert_eq!(read_address(&data, 0, 8)?, None);
        assert_eq!(read_address(&data, 0, 4)?, None);
        Ok(())
    }

    #[test]
    fn test_truncated() {
        let data = [0u8; 3];
        assert!(matches!(
            read_u32(&data, 0),
            Err(Hdf5Error::UnexpectedEof {
                expected: 4,
                available: 3
            })
        ));
        assert!(ensure_len(&data, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_c_string() -> Result<(), Hdf5Error> {
        let data = b"\0sweep_0001\0trial";
        assert_eq!(read_c_string(data, 0)?, "");
        assert_eq!(read_c_string(data, 1)?, "sweep_0001");
        assert_eq!(read_c_string(data, 12)?, "trial");
        assert_eq!(pad8(0), 0);
        assert_eq!(pad8(9), 16);
        Ok(())
    }
}

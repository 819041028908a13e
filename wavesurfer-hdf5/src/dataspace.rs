use crate::{
    bytes::{ensure_len, read_uint},
    error::Hdf5Error,
};

/// Extent of a dataset or attribute. A scalar has no dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    pub dims: Vec<u64>,
    pub is_null: bool,
}

impl Dataspace {
    pub fn parse(data: &[u8], length_size: u8) -> Result<Self, Hdf5Error> {
        ensure_len(data, 0, 4)?;
        let version = data[0];
        let rank = data[1] as usize;
        let (header, is_null) = match version {
            1 => (8, false),
            2 => (4, data[3] == 2),
            _ => {
                return Err(Hdf5Error::UnsupportedVersion {
                    structure: "dataspace",
                    version,
                })
            }
        };
        let ls = length_size as usize;
        let dims = (0..rank)
            .map(|i| read_uint(data, header + i * ls, length_size))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { dims, is_null })
    }

    /// Element count, or `None` when the product of the dimensions overflows.
    pub fn num_elements(&self) -> Option<u64> {
        if self.is_null {
            return Some(0);
        }
        self.dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
    }

    /// Size in bytes of the whole extent, refused above `limit`.
    pub fn byte_size(&self, element_size: usize, limit: u64) -> Result<usize, Hdf5Error> {
        self.num_elements()
            .and_then(|n| n.checked_mul(element_size as u64))
            .filter(|&bytes| bytes <= limit)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| Hdf5Error::ExtentTooLarge {
                dims: self.dims.clone(),
                element_size,
                limit,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_v1_matrix() -> eyre::Result<()> {
        let mut data = vec![1, 2, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&3u64.to_le_bytes());
        data.extend_from_slice(&2000u64.to_le_bytes());
        let space = Dataspace::parse(&data, 8)?;
        assert_eq!(space.dims, vec![3, 2000]);
        assert_eq!(space.num_elements(), Some(6000));
        assert_eq!(space.byte_size(2, 12000)?, 12000);
        Ok(())
    }

    #[test]
    fn test_v2_scalar_and_null() -> eyre::Result<()> {
        let scalar = Dataspace::parse(&[2, 0, 0, 0], 8)?;
        assert_eq!(scalar.num_elements(), Some(1));
        let null = Dataspace::parse(&[2, 0, 0, 2], 8)?;
        assert_eq!(null.num_elements(), Some(0));
        Ok(())
    }

    #[test]
    fn test_overflowing_extent() -> eyre::Result<()> {
        let mut data = vec![1, 2, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&(1u64 << 33).to_le_bytes());
        data.extend_from_slice(&(1u64 << 33).to_le_bytes());
        let space = Dataspace::parse(&data, 8)?;
        assert_eq!(space.num_elements(), None);
        assert!(matches!(
            space.byte_size(2, u64::MAX),
            Err(Hdf5Error::ExtentTooLarge { element_size: 2, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_extent_larger_than_limit() -> eyre::Result<()> {
        let space = Dataspace {
            dims: vec![1000, 1000],
            is_null: false,
        };
        assert!(space.byte_size(8, 4096).is_err());
        assert_eq!(space.byte_size(8, 8_000_000)?, 8_000_000);
        Ok(())
    }

    #[test]
    fn test_bad_version() {
        assert!(Dataspace::parse(&[9, 0, 0, 0], 8).is_err());
    }
}

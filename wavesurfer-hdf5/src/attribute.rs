use crate::{
    bytes::{ensure_len, pad8, read_u16},
    dataspace::Dataspace,
    datatype::Datatype,
    error::Hdf5Error,
};

/// A compact attribute message with its undecoded value bytes.
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    pub name: String,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub raw: &'a [u8],
}

impl<'a> Attribute<'a> {
    pub fn parse(data: &'a [u8], length_size: u8) -> Result<Self, Hdf5Error> {
        ensure_len(data, 0, 8)?;
        let version = data[0];
        let name_size = read_u16(data, 2)? as usize;
        let datatype_size = read_u16(data, 4)? as usize;
        let dataspace_size = read_u16(data, 6)? as usize;
        // Version 1 pads each field to 8 bytes; version 3 adds an encoding byte.
        let (mut pos, padded) = match version {
            1 => (8, true),
            2 => (8, false),
            3 => (9, false),
            _ => {
                return Err(Hdf5Error::UnsupportedVersion {
                    structure: "attribute",
                    version,
                })
            }
        };
        let align = |n: usize| if padded { pad8(n) } else { n };

        ensure_len(data, pos, name_size)?;
        let name_bytes = &data[pos..pos + name_size];
        let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_size);
        let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
        pos += align(name_size);

        ensure_len(data, pos, datatype_size)?;
        let (datatype, _) = Datatype::parse(&data[pos..pos + datatype_size])?;
        pos += align(datatype_size);

        ensure_len(data, pos, dataspace_size)?;
        let dataspace = Dataspace::parse(&data[pos..pos + dataspace_size], length_size)?;
        pos += align(dataspace_size);

        Ok(Self {
            name,
            datatype,
            dataspace,
            raw: data.get(pos..).unwrap_or(&[]),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn float_type() -> Vec<u8> {
        let mut dt = vec![0x11, 0x20, 63, 0];
        dt.extend_from_slice(&8u32.to_le_bytes());
        dt.extend_from_slice(&[0, 0, 64, 0, 52, 11, 0, 52]);
        dt.extend_from_slice(&1023u32.to_le_bytes());
        dt
    }

    #[test]
    fn test_v1_padded() -> eyre::Result<()> {
        let name = b"SampleRate\0";
        let dt = float_type();
        let ds = [1u8, 0, 0, 0, 0, 0, 0, 0];
        let mut data = vec![1, 0];
        data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        data.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        data.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        data.extend_from_slice(name);
        data.extend_from_slice(&[0; 5]);
        data.extend_from_slice(&dt);
        data.extend_from_slice(&[0; 4]);
        data.extend_from_slice(&ds);
        data.extend_from_slice(&20e3f64.to_le_bytes());

        let attr = Attribute::parse(&data, 8)?;
        assert_eq!(attr.name, "SampleRate");
        assert_eq!(attr.dataspace.num_elements(), Some(1));
        assert_eq!(attr.raw, &20e3f64.to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_v3_unpadded() -> eyre::Result<()> {
        let name = b"Units\0";
        let mut dt = vec![0x13, 0x01, 0, 0];
        dt.extend_from_slice(&2u32.to_le_bytes());
        let ds = [2u8, 0, 0, 0];
        let mut data = vec![3, 0];
        data.extend_from_slice(&(name.len() as u16).to_le_bytes());
        data.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        data.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        data.push(0);
        data.extend_from_slice(name);
        data.extend_from_slice(&dt);
        data.extend_from_slice(&ds);
        data.extend_from_slice(b"mV");

        let attr = Attribute::parse(&data, 8)?;
        assert_eq!(attr.name, "Units");
        assert_eq!(attr.datatype.size(), 2);
        assert_eq!(attr.raw, b"mV");
        Ok(())
    }
}

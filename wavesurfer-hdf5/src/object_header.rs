//! Object headers, versions 1 and 2, with continuation blocks.
use log::trace;

use crate::{
    bytes::{ensure_len, read_u16, read_u32, read_uint},
    error::Hdf5Error,
    superblock::Superblock,
};

const OHDR_SIGNATURE: &[u8; 4] = b"OHDR";
const OCHK_SIGNATURE: &[u8; 4] = b"OCHK";

/// Header message types this crate acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Nil,
    Dataspace,
    LinkInfo,
    Datatype,
    Link,
    Layout,
    FilterPipeline,
    Attribute,
    Continuation,
    SymbolTable,
    Other(u16),
}

impl MessageType {
    pub fn from_u16(id: u16) -> Self {
        match id {
            0x00 => Self::Nil,
            0x01 => Self::Dataspace,
            0x02 => Self::LinkInfo,
            0x03 => Self::Datatype,
            0x06 => Self::Link,
            0x08 => Self::Layout,
            0x0B => Self::FilterPipeline,
            0x0C => Self::Attribute,
            0x10 => Self::Continuation,
            0x11 => Self::SymbolTable,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeaderMessage<'a> {
    pub kind: MessageType,
    pub flags: u8,
    pub data: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct ObjectHeader<'a> {
    pub version: u8,
    pub messages: Vec<HeaderMessage<'a>>,
}

/// Known message types are ignored when unused, but an unknown one flagged
/// must-understand (bit 3) makes the object unreadable.
fn check_known(kind: MessageType, flags: u8) -> Result<(), Hdf5Error> {
    match kind {
        MessageType::Other(id) if flags & 0x08 != 0 => Err(Hdf5Error::UnsupportedMessage(id)),
        _ => Ok(()),
    }
}

fn continuation_target(data: &[u8], sb: &Superblock) -> Result<(usize, usize), Hdf5Error> {
    let address = read_uint(data, 0, sb.offset_size)? as usize;
    let length = read_uint(data, sb.offset_size as usize, sb.length_size)? as usize;
    Ok((address, length))
}

impl<'a> ObjectHeader<'a> {
    pub fn parse(data: &'a [u8], address: usize, sb: &Superblock) -> Result<Self, Hdf5Error> {
        ensure_len(data, address, 4)?;
        if &data[address..address + 4] == OHDR_SIGNATURE {
            Self::parse_v2(data, address, sb)
        } else {
            Self::parse_v1(data, address, sb)
        }
    }

    /// Messages of the given type in header order.
    pub fn messages_of(&self, kind: MessageType) -> impl Iterator<Item = &HeaderMessage<'a>> {
        self.messages.iter().filter(move |m| m.kind == kind)
    }

    pub fn find(&self, kind: MessageType) -> Option<&HeaderMessage<'a>> {
        self.messages_of(kind).next()
    }

    fn parse_v1(data: &'a [u8], address: usize, sb: &Superblock) -> Result<Self, Hdf5Error> {
        // version, reserved, message count, reference count, header size;
        // the 12-byte prefix is padded to 16 so messages stay 8-byte aligned.
        ensure_len(data, address, 16)?;
        let version = data[address];
        if version != 1 {
            return Err(Hdf5Error::UnsupportedVersion {
                structure: "object header",
                version,
            });
        }
        let header_size = read_u32(data, address + 8)? as usize;

        let mut messages = Vec::new();
        let mut blocks = vec![(address + 16, header_size)];
        while let Some((start, len)) = blocks.pop() {
            ensure_len(data, start, len)?;
            let end = start + len;
            let mut pos = start;
            while pos + 8 <= end {
                let kind = MessageType::from_u16(read_u16(data, pos)?);
                let size = read_u16(data, pos + 2)? as usize;
                let flags = data[pos + 4];
                pos += 8;
                ensure_len(data, pos, size)?;
                if pos + size > end {
                    break;
                }
                check_known(kind, flags)?;
                let body = &data[pos..pos + size];
                match kind {
                    MessageType::Nil => {}
                    MessageType::Continuation => blocks.push(continuation_target(body, sb)?),
                    _ => messages.push(HeaderMessage {
                        kind,
                        flags,
                        data: body,
                    }),
                }
                pos += size;
            }
        }
        trace!("object header v1 at {address:#x}: {} messages", messages.len());
        Ok(Self {
            version: 1,
            messages,
        })
    }

    fn parse_v2(data: &'a [u8], address: usize, sb: &Superblock) -> Result<Self, Hdf5Error> {
        ensure_len(data, address, 6)?;
        let version = data[address + 4];
        if version != 2 {
            return Err(Hdf5Error::UnsupportedVersion {
                structure: "object header",
                version,
            });
        }
        let flags = data[address + 5];
        let mut pos = address + 6;
        if flags & 0x20 != 0 {
            // access, modification, change and birth times
            pos += 16;
        }
        if flags & 0x10 != 0 {
            // attribute phase change thresholds
            pos += 4;
        }
        let width = 1u8 << (flags & 0x03);
        let chunk0_size = read_uint(data, pos, width)? as usize;
        pos += width as usize;
        let tracks_order = flags & 0x04 != 0;

        let mut messages = Vec::new();
        let mut blocks = vec![(pos, chunk0_size)];
        let mut first = true;
        while let Some((start, len)) = blocks.pop() {
            let (start, len) = if first {
                first = false;
                (start, len)
            } else {
                // OCHK signature in front, checksum behind.
                ensure_len(data, start, 4)?;
                if &data[start..start + 4] != OCHK_SIGNATURE {
                    return Err(Hdf5Error::InvalidSignature("object header continuation"));
                }
                (start + 4, len.saturating_sub(8))
            };
            ensure_len(data, start, len)?;
            let end = start + len;
            let prefix = if tracks_order { 6 } else { 4 };
            let mut p = start;
            while p + prefix <= end {
                let kind = MessageType::from_u16(data[p] as u16);
                let size = read_u16(data, p + 1)? as usize;
                let msg_flags = data[p + 3];
                p += prefix;
                if p + size > end {
                    break;
                }
                check_known(kind, msg_flags)?;
                let body = &data[p..p + size];
                match kind {
                    MessageType::Nil => {}
                    MessageType::Continuation => blocks.push(continuation_target(body, sb)?),
                    _ => messages.push(HeaderMessage {
                        kind,
                        flags: msg_flags,
                        data: body,
                    }),
                }
                p += size;
            }
        }
        trace!("object header v2 at {address:#x}: {} messages", messages.len());
        Ok(Self {
            version: 2,
            messages,
        })
    }
}

//! Typed n-dimensional values read from datasets and attributes.
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{
    datatype::{Datatype, StringPadding},
    error::Hdf5Error,
};

/// Element storage of an [`Array`], row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Str(Vec<String>),
}

macro_rules! array_data_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for ArrayData {
                fn from(v: Vec<$ty>) -> Self {
                    ArrayData::$variant(v)
                }
            }
        )*
    };
}

array_data_from!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Str,
);

macro_rules! for_each_numeric {
    ($data:expr, $v:ident => $body:expr, $otherwise:expr) => {
        match $data {
            ArrayData::I8($v) => $body,
            ArrayData::U8($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
            ArrayData::Str(_) => $otherwise,
        }
    };
}

impl ArrayData {
    pub fn len(&self) -> usize {
        if let ArrayData::Str(v) = self {
            return v.len();
        }
        for_each_numeric!(self, v => v.len(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the element type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArrayData::I8(_) => "int8",
            ArrayData::U8(_) => "uint8",
            ArrayData::I16(_) => "int16",
            ArrayData::U16(_) => "uint16",
            ArrayData::I32(_) => "int32",
            ArrayData::U32(_) => "uint32",
            ArrayData::I64(_) => "int64",
            ArrayData::U64(_) => "uint64",
            ArrayData::F32(_) => "float32",
            ArrayData::F64(_) => "float64",
            ArrayData::Str(_) => "string",
        }
    }
}

/// A dataset or attribute value with its HDF5 shape. A scalar has an empty
/// shape and one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub shape: Vec<u64>,
    pub data: ArrayData,
}

impl Array {
    pub fn new(shape: Vec<u64>, data: impl Into<ArrayData>) -> Self {
        Self {
            shape,
            data: data.into(),
        }
    }

    pub fn scalar<T>(value: T) -> Self
    where
        Vec<T>: Into<ArrayData>,
    {
        Self::new(Vec::new(), vec![value])
    }

    pub fn vector<T>(values: Vec<T>) -> Self
    where
        Vec<T>: Into<ArrayData>,
    {
        Self::new(vec![values.len() as u64], values)
    }

    /// Row-major `rows x cols` matrix.
    pub fn matrix<T>(rows: u64, cols: u64, values: Vec<T>) -> Self
    where
        Vec<T>: Into<ArrayData>,
    {
        Self::new(vec![rows, cols], values)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(Vec::new(), vec![value.into()])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Every element widened to `f64`, or `None` for strings.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        for_each_numeric!(&self.data, v => Some(v.iter().map(|&x| x as f64).collect()), None)
    }

    pub fn as_scalar_f64(&self) -> Option<f64> {
        match self.len() {
            1 => self.to_f64_vec().and_then(|v| v.first().copied()),
            _ => None,
        }
    }

    /// Nonzero elements are true.
    pub fn to_bool_vec(&self) -> Option<Vec<bool>> {
        self.to_f64_vec()
            .map(|v| v.into_iter().map(|x| x != 0.0).collect())
    }

    pub fn as_i16(&self) -> Option<&[i16]> {
        match &self.data {
            ArrayData::I16(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_strings(&self) -> Option<Vec<String>> {
        match &self.data {
            ArrayData::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Decodes `count` stored elements. Variable-length string descriptors are
/// passed to `resolve_string`.
pub(crate) fn decode<F>(
    raw: &[u8],
    datatype: &Datatype,
    count: usize,
    resolve_string: F,
) -> Result<ArrayData, Hdf5Error>
where
    F: Fn(&[u8]) -> Result<String, Hdf5Error>,
{
    let size = datatype.size();
    let needed = count.checked_mul(size).unwrap_or(usize::MAX);
    if raw.len() < needed {
        return Err(Hdf5Error::SizeMismatch {
            expected: needed,
            found: raw.len(),
        });
    }
    let raw = &raw[..needed];
    match *datatype {
        Datatype::Integer {
            size,
            signed,
            big_endian: false,
        } => decode_int::<LittleEndian>(raw, size, signed, count),
        Datatype::Integer {
            size,
            signed,
            big_endian: true,
        } => decode_int::<BigEndian>(raw, size, signed, count),
        Datatype::Float {
            size,
            big_endian: false,
        } => decode_float::<LittleEndian>(raw, size, count),
        Datatype::Float {
            size,
            big_endian: true,
        } => decode_float::<BigEndian>(raw, size, count),
        Datatype::FixedString { size: 0, .. } => Ok(ArrayData::Str(vec![String::new(); count])),
        Datatype::FixedString { size, padding } => Ok(ArrayData::Str(
            raw.chunks(size).map(|c| fixed_string(c, padding)).collect(),
        )),
        Datatype::VarString { size } if size > 0 => raw
            .chunks(size)
            .map(resolve_string)
            .collect::<Result<Vec<_>, _>>()
            .map(ArrayData::Str),
        Datatype::VarString { .. } => Ok(ArrayData::Str(vec![String::new(); count])),
    }
}

fn decode_int<B: ByteOrder>(
    raw: &[u8],
    size: usize,
    signed: bool,
    count: usize,
) -> Result<ArrayData, Hdf5Error> {
    Ok(match (size, signed) {
        (1, true) => ArrayData::I8(raw.iter().map(|&b| b as i8).collect()),
        (1, false) => ArrayData::U8(raw.to_vec()),
        (2, true) => {
            let mut v = vec![0; count];
            B::read_i16_into(raw, &mut v);
            ArrayData::I16(v)
        }
        (2, false) => {
            let mut v = vec![0; count];
            B::read_u16_into(raw, &mut v);
            ArrayData::U16(v)
        }
        (4, true) => {
            let mut v = vec![0; count];
            B::read_i32_into(raw, &mut v);
            ArrayData::I32(v)
        }
        (4, false) => {
            let mut v = vec![0; count];
            B::read_u32_into(raw, &mut v);
            ArrayData::U32(v)
        }
        (8, true) => {
            let mut v = vec![0; count];
            B::read_i64_into(raw, &mut v);
            ArrayData::I64(v)
        }
        (8, false) => {
            let mut v = vec![0; count];
            B::read_u64_into(raw, &mut v);
            ArrayData::U64(v)
        }
        _ => return Err(Hdf5Error::InvalidFieldSize(size as u8)),
    })
}

fn decode_float<B: ByteOrder>(raw: &[u8], size: usize, count: usize) -> Result<ArrayData, Hdf5Error> {
    match size {
        4 => {
            let mut v = vec![0.0; count];
            B::read_f32_into(raw, &mut v);
            Ok(ArrayData::F32(v))
        }
        8 => {
            let mut v = vec![0.0; count];
            B::read_f64_into(raw, &mut v);
            Ok(ArrayData::F64(v))
        }
        other => Err(Hdf5Error::UnsupportedFloatSize(other)),
    }
}

fn fixed_string(bytes: &[u8], padding: StringPadding) -> String {
    let text = match padding {
        StringPadding::NullTerminated | StringPadding::NullPadded => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            &bytes[..end]
        }
        StringPadding::SpacePadded => {
            let end = bytes
                .iter()
                .rposition(|&b| b != b' ' && b != 0)
                .map_or(0, |i| i + 1);
            &bytes[..end]
        }
    };
    String::from_utf8_lossy(text).into_owned()
}

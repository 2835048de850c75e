//! Fixed-layout records packed into data event payloads.
//!
//! A [`StructLayout`] names byte offsets into a payload. Reads decode one
//! field in place; writes produce a complete replacement payload in which
//! only the field's bytes differ, so callers can swap it in atomically.
//! Bytes outside the declared fields, including anything past the end of
//! the layout, are carried over untouched.

use crate::codec::primitives::{encode_int, encode_uint, Width};
use crate::error::{EncodeError, StructError};

/// Primitive type of a struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl FieldType {
    /// Size of the field in bytes.
    pub const fn len(self) -> usize {
        match self {
            FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::F64 => 8,
        }
    }

    /// Returns true for the integer types, the only ones that hold flags.
    pub const fn is_integer(self) -> bool {
        !matches!(self, FieldType::F32 | FieldType::F64)
    }
}

/// A named field at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub ty: FieldType,
}

impl Field {
    pub const fn new(name: &'static str, offset: usize, ty: FieldType) -> Self {
        Self { name, offset, ty }
    }

    /// Offset one past the last byte of the field.
    pub const fn end(&self) -> usize {
        self.offset + self.ty.len()
    }
}

/// Layout of a fixed-size record.
///
/// `size` is the record stride; fields may leave gaps, which are
/// preserved as unknown bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct StructLayout {
    pub name: &'static str,
    pub size: usize,
    pub fields: &'static [Field],
}

impl StructLayout {
    pub const fn new(name: &'static str, size: usize, fields: &'static [Field]) -> Self {
        Self { name, size, fields }
    }

    /// Looks a field up by name.
    pub fn field(&self, name: &str) -> Result<&'static Field, StructError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| StructError::UnknownField {
                layout: self.name,
                field: name.to_string(),
            })
    }

    /// Returns true if `field` is one of this layout's fields.
    pub fn declares(&self, field: &Field) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// End of the furthest declared field.
    pub fn span(&self) -> usize {
        self.fields.iter().map(Field::end).max().unwrap_or(0)
    }

    /// Number of whole records in a payload of `len` bytes.
    pub fn count(&self, len: usize) -> usize {
        if self.size == 0 { 0 } else { len / self.size }
    }

    fn check(&self, field: &Field, base: usize, len: usize) -> Result<usize, StructError> {
        if !self.declares(field) {
            return Err(StructError::UnknownField {
                layout: self.name,
                field: field.name.to_string(),
            });
        }
        let start = base + field.offset;
        let end = start + field.ty.len();
        if end > len {
            return Err(StructError::FieldOutOfBounds {
                field: field.name,
                end,
                len,
            });
        }
        Ok(start)
    }
}

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    F64(f64),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::U8(_) => FieldType::U8,
            FieldValue::I8(_) => FieldType::I8,
            FieldValue::U16(_) => FieldType::U16,
            FieldValue::I16(_) => FieldType::I16,
            FieldValue::U32(_) => FieldType::U32,
            FieldValue::I32(_) => FieldType::I32,
            FieldValue::F32(_) => FieldType::F32,
            FieldValue::F64(_) => FieldType::F64,
        }
    }

    /// Decodes `bytes`, which must be exactly `ty.len()` long.
    fn decode(ty: FieldType, bytes: &[u8]) -> FieldValue {
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        match ty {
            FieldType::U8 => FieldValue::U8(buf[0]),
            FieldType::I8 => FieldValue::I8(buf[0] as i8),
            FieldType::U16 => FieldValue::U16(u16::from_le_bytes([buf[0], buf[1]])),
            FieldType::I16 => FieldValue::I16(i16::from_le_bytes([buf[0], buf[1]])),
            FieldType::U32 => FieldValue::U32(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
            FieldType::I32 => FieldValue::I32(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
            FieldType::F32 => FieldValue::F32(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
            FieldType::F64 => FieldValue::F64(f64::from_le_bytes(buf)),
        }
    }

    fn encode(&self) -> Vec<u8> {
        match *self {
            FieldValue::U8(v) => vec![v],
            FieldValue::I8(v) => vec![v as u8],
            FieldValue::U16(v) => v.to_le_bytes().to_vec(),
            FieldValue::I16(v) => v.to_le_bytes().to_vec(),
            FieldValue::U32(v) => v.to_le_bytes().to_vec(),
            FieldValue::I32(v) => v.to_le_bytes().to_vec(),
            FieldValue::F32(v) => v.to_le_bytes().to_vec(),
            FieldValue::F64(v) => v.to_le_bytes().to_vec(),
        }
    }

    /// The raw bit pattern of an integer value, zero-extended.
    pub fn bits(&self) -> Option<u64> {
        match *self {
            FieldValue::U8(v) => Some(v as u64),
            FieldValue::I8(v) => Some(v as u8 as u64),
            FieldValue::U16(v) => Some(v as u64),
            FieldValue::I16(v) => Some(v as u16 as u64),
            FieldValue::U32(v) => Some(v as u64),
            FieldValue::I32(v) => Some(v as u32 as u64),
            FieldValue::F32(_) | FieldValue::F64(_) => None,
        }
    }

    /// An integer value of type `ty` from a bit pattern, truncated to width.
    pub fn from_bits(ty: FieldType, bits: u64) -> Option<FieldValue> {
        let bytes = bits.to_le_bytes();
        ty.is_integer()
            .then(|| FieldValue::decode(ty, &bytes[..ty.len()]))
    }

    /// The numeric value of an integer field.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::U8(v) => Some(v as i64),
            FieldValue::I8(v) => Some(v as i64),
            FieldValue::U16(v) => Some(v as i64),
            FieldValue::I16(v) => Some(v as i64),
            FieldValue::U32(v) => Some(v as i64),
            FieldValue::I32(v) => Some(v as i64),
            FieldValue::F32(_) | FieldValue::F64(_) => None,
        }
    }

    /// The numeric value of a float field.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::F32(v) => Some(v as f64),
            FieldValue::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Converts an integer to a value of type `ty`, checking its range.
    pub fn from_i64(ty: FieldType, value: i64) -> Result<FieldValue, EncodeError> {
        let width = match ty.len() {
            1 => Width::One,
            2 => Width::Two,
            _ => Width::Four,
        };
        let bytes = match ty {
            FieldType::U8 | FieldType::U16 | FieldType::U32 => {
                let unsigned = u64::try_from(value).map_err(|_| EncodeError::OutOfRange {
                    value: value as i128,
                    width: width.len(),
                    signed: false,
                })?;
                encode_uint(unsigned, width)?
            }
            FieldType::I8 | FieldType::I16 | FieldType::I32 => encode_int(value, width)?,
            FieldType::F32 => return Ok(FieldValue::F32(value as f32)),
            FieldType::F64 => return Ok(FieldValue::F64(value as f64)),
        };
        Ok(FieldValue::decode(ty, &bytes))
    }
}

/// Conversion between Rust scalars and struct field values.
pub trait FieldScalar: Sized {
    /// Human-readable type name for errors.
    const NAME: &'static str;

    fn from_field(value: FieldValue) -> Option<Self>;

    fn to_field(self, field: &Field) -> Result<FieldValue, StructError>;
}

macro_rules! int_field_scalar {
    ($($t:ty),*) => {$(
        impl FieldScalar for $t {
            const NAME: &'static str = stringify!($t);

            fn from_field(value: FieldValue) -> Option<Self> {
                value.as_i64().and_then(|v| <$t>::try_from(v).ok())
            }

            fn to_field(self, field: &Field) -> Result<FieldValue, StructError> {
                FieldValue::from_i64(field.ty, self as i64)
                    .map_err(|source| StructError::Range { field: field.name, source })
            }
        }
    )*};
}

int_field_scalar!(u8, i8, u16, i16, u32, i32);

impl FieldScalar for f32 {
    const NAME: &'static str = "f32";

    fn from_field(value: FieldValue) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }

    fn to_field(self, field: &Field) -> Result<FieldValue, StructError> {
        (self as f64).to_field(field)
    }
}

impl FieldScalar for f64 {
    const NAME: &'static str = "f64";

    fn from_field(value: FieldValue) -> Option<Self> {
        value.as_f64()
    }

    fn to_field(self, field: &Field) -> Result<FieldValue, StructError> {
        match field.ty {
            FieldType::F32 => Ok(FieldValue::F32(self as f32)),
            FieldType::F64 => Ok(FieldValue::F64(self)),
            found => Err(StructError::TypeMismatch {
                field: field.name,
                expected: Self::NAME,
                found,
            }),
        }
    }
}

impl FieldScalar for bool {
    const NAME: &'static str = "bool";

    fn from_field(value: FieldValue) -> Option<Self> {
        value.bits().map(|bits| bits != 0)
    }

    fn to_field(self, field: &Field) -> Result<FieldValue, StructError> {
        FieldValue::from_i64(field.ty, self as i64)
            .map_err(|source| StructError::Range { field: field.name, source })
    }
}

/// Read-only view of one record inside a payload.
#[derive(Debug, Clone, Copy)]
pub struct StructView<'a> {
    layout: &'static StructLayout,
    bytes: &'a [u8],
    base: usize,
}

impl<'a> StructView<'a> {
    /// A view of the record starting at the beginning of `bytes`.
    pub fn new(layout: &'static StructLayout, bytes: &'a [u8]) -> Self {
        Self::at(layout, bytes, 0)
    }

    /// A view of the record starting at byte `base` (repeated records).
    pub fn at(layout: &'static StructLayout, bytes: &'a [u8], base: usize) -> Self {
        Self { layout, bytes, base }
    }

    pub fn layout(&self) -> &'static StructLayout {
        self.layout
    }

    /// Decodes one field.
    pub fn read(&self, field: &Field) -> Result<FieldValue, StructError> {
        let start = self.layout.check(field, self.base, self.bytes.len())?;
        Ok(FieldValue::decode(field.ty, &self.bytes[start..start + field.ty.len()]))
    }

    /// Decodes one field, looked up by name.
    pub fn read_named(&self, name: &str) -> Result<FieldValue, StructError> {
        let field = self.layout.field(name)?;
        self.read(field)
    }

    /// Decodes a field into a Rust scalar.
    pub fn get<T: FieldScalar>(&self, field: &Field) -> Result<T, StructError> {
        let value = self.read(field)?;
        T::from_field(value).ok_or(StructError::TypeMismatch {
            field: field.name,
            expected: T::NAME,
            found: field.ty,
        })
    }

    /// Tests whether all bits of `mask` are set in an integer field.
    pub fn has_flag(&self, field: &Field, mask: u64) -> Result<bool, StructError> {
        let bits = self.read(field)?.bits().ok_or(StructError::TypeMismatch {
            field: field.name,
            expected: "flags",
            found: field.ty,
        })?;
        Ok(bits & mask == mask)
    }
}

/// Returns a copy of `payload` with one field of the record at `base`
/// re-encoded. All other bytes are unchanged.
pub fn write_field(
    layout: &'static StructLayout,
    payload: &[u8],
    base: usize,
    field: &Field,
    value: FieldValue,
) -> Result<Vec<u8>, StructError> {
    if value.field_type() != field.ty {
        return Err(StructError::TypeMismatch {
            field: field.name,
            expected: type_name(value.field_type()),
            found: field.ty,
        });
    }
    let start = layout.check(field, base, payload.len())?;
    let mut out = payload.to_vec();
    out[start..start + field.ty.len()].copy_from_slice(&value.encode());
    Ok(out)
}

/// Returns a copy of `payload` with `mask` set (`on`) or cleared in an
/// integer field of the record at `base`.
pub fn set_flag(
    layout: &'static StructLayout,
    payload: &[u8],
    base: usize,
    field: &Field,
    mask: u64,
    on: bool,
) -> Result<Vec<u8>, StructError> {
    let mismatch = || StructError::TypeMismatch {
        field: field.name,
        expected: "flags",
        found: field.ty,
    };
    let current = StructView::at(layout, payload, base).read(field)?;
    let bits = current.bits().ok_or_else(mismatch)?;
    let bits = if on { bits | mask } else { bits & !mask };
    let value = FieldValue::from_bits(field.ty, bits).ok_or_else(mismatch)?;
    write_field(layout, payload, base, field, value)
}

fn type_name(ty: FieldType) -> &'static str {
    match ty {
        FieldType::U8 => "u8",
        FieldType::I8 => "i8",
        FieldType::U16 => "u16",
        FieldType::I16 => "i16",
        FieldType::U32 => "u32",
        FieldType::I32 => "i32",
        FieldType::F32 => "f32",
        FieldType::F64 => "f64",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const FLAGS: Field = Field::new("flags", 0, FieldType::U16);
    const LEVEL: Field = Field::new("level", 4, FieldType::I32);
    const GAIN: Field = Field::new("gain", 8, FieldType::F32);

    static LAYOUT: StructLayout = StructLayout::new("Test", 12, &[FLAGS, LEVEL, GAIN]);

    fn payload() -> Vec<u8> {
        let mut p = vec![0x05, 0x00, 0xAA, 0xBB];
        p.extend_from_slice(&(-7i32).to_le_bytes());
        p.extend_from_slice(&1.5f32.to_le_bytes());
        p.extend_from_slice(&[0xDE, 0xAD]); // unknown trailing bytes
        p
    }

    #[test]
    fn test_read_fields() {
        let bytes = payload();
        let view = StructView::new(&LAYOUT, &bytes);
        assert_eq!(view.read(&FLAGS).unwrap(), FieldValue::U16(5));
        assert_eq!(view.get::<i32>(&LEVEL).unwrap(), -7);
        assert_eq!(view.get::<f32>(&GAIN).unwrap(), 1.5);
        assert_eq!(view.read_named("level").unwrap(), FieldValue::I32(-7));
        assert_eq!(LAYOUT.span(), 12);
    }

    #[test]
    fn test_unknown_field() {
        let bytes = payload();
        let view = StructView::new(&LAYOUT, &bytes);
        let err = view.read_named("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        let foreign = Field::new("foreign", 0, FieldType::U8);
        assert!(matches!(view.read(&foreign), Err(StructError::UnknownField { .. })));
    }

    #[test]
    fn test_short_payload() {
        let bytes = [0u8; 6];
        let view = StructView::new(&LAYOUT, &bytes);
        assert!(view.read(&FLAGS).is_ok());
        assert!(matches!(
            view.read(&LEVEL),
            Err(StructError::FieldOutOfBounds { end: 8, len: 6, .. })
        ));
    }

    #[test]
    fn test_write_preserves_other_bytes() {
        let bytes = payload();
        let out = write_field(&LAYOUT, &bytes, 0, &LEVEL, FieldValue::I32(1000)).unwrap();
        assert_eq!(out.len(), bytes.len());
        assert_eq!(&out[..4], &bytes[..4]);
        assert_eq!(&out[4..8], &1000i32.to_le_bytes());
        assert_eq!(&out[8..], &bytes[8..]);
    }

    #[test]
    fn test_write_type_mismatch() {
        let bytes = payload();
        let result = write_field(&LAYOUT, &bytes, 0, &LEVEL, FieldValue::U8(1));
        assert!(matches!(result, Err(StructError::TypeMismatch { .. })));
    }

    #[test]
    fn test_scalar_range() {
        let err = 70000u32.to_field(&FLAGS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(5u8.to_field(&FLAGS).unwrap(), FieldValue::U16(5));
        assert!(2.0f64.to_field(&LEVEL).is_err());
    }

    #[test]
    fn test_flags() {
        let bytes = payload();
        let view = StructView::new(&LAYOUT, &bytes);
        assert!(view.has_flag(&FLAGS, 0x4).unwrap());
        assert!(!view.has_flag(&FLAGS, 0x2).unwrap());

        let out = set_flag(&LAYOUT, &bytes, 0, &FLAGS, 0x2, true).unwrap();
        assert_eq!(&out[..2], &[0x07, 0x00]);
        let out = set_flag(&LAYOUT, &out, 0, &FLAGS, 0x1, false).unwrap();
        assert_eq!(&out[..2], &[0x06, 0x00]);
        assert_eq!(&out[2..], &bytes[2..]);

        assert!(set_flag(&LAYOUT, &bytes, 0, &GAIN, 1, true).is_err());
    }

    #[test]
    fn test_repeated_records() {
        let mut bytes = payload();
        bytes.truncate(12);
        bytes.extend_from_slice(&payload()[..12]);
        assert_eq!(LAYOUT.count(bytes.len()), 2);

        let out = write_field(&LAYOUT, &bytes, 12, &FLAGS, FieldValue::U16(9)).unwrap();
        assert_eq!(&out[..12], &bytes[..12]);
        assert_eq!(StructView::at(&LAYOUT, &out, 12).read(&FLAGS).unwrap(), FieldValue::U16(9));
    }

    #[test]
    fn test_signed_bits() {
        let value = FieldValue::from_bits(FieldType::I16, 0xFFFF).unwrap();
        assert_eq!(value, FieldValue::I16(-1));
        assert_eq!(value.bits(), Some(0xFFFF));
        assert!(FieldValue::from_bits(FieldType::F32, 1).is_none());
    }
}

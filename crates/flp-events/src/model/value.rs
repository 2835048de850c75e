//! Typed values moving through property descriptors.

use std::fmt;

use crate::codec::text::TextEncoding;
use crate::error::{DecodeError, EventError, PropertyError};
use crate::model::event::{Color, Event, SizeKind};

/// A dynamically typed property value, as exposed by registries.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Color(Color),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Text(_) => "text",
            PropertyValue::Color(_) => "color",
            PropertyValue::Bytes(_) => "bytes",
        }
    }

    fn mismatch(&self, expected: &'static str) -> PropertyError {
        PropertyError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Text(v) => write!(f, "{v:?}"),
            PropertyValue::Color(c) => write!(f, "#{:02x}{:02x}{:02x}", c.r, c.g, c.b),
            PropertyValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! int_property_value {
    ($($t:ty),*) => {$(
        impl From<$t> for PropertyValue {
            fn from(value: $t) -> Self {
                PropertyValue::Int(value as i64)
            }
        }

        impl TryFrom<PropertyValue> for $t {
            type Error = PropertyError;

            fn try_from(value: PropertyValue) -> Result<Self, Self::Error> {
                match value {
                    PropertyValue::Int(v) => <$t>::try_from(v)
                        .map_err(|_| PropertyError::TypeMismatch {
                            expected: stringify!($t),
                            found: "out-of-range int",
                        }),
                    other => Err(other.mismatch(stringify!($t))),
                }
            }
        }
    )*};
}

int_property_value!(u8, i8, u16, i16, u32, i32);

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl TryFrom<PropertyValue> for bool {
    type Error = PropertyError;

    fn try_from(value: PropertyValue) -> Result<Self, Self::Error> {
        match value {
            PropertyValue::Bool(v) => Ok(v),
            PropertyValue::Int(v) => Ok(v != 0),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Float(value as f64)
    }
}

impl TryFrom<PropertyValue> for f32 {
    type Error = PropertyError;

    fn try_from(value: PropertyValue) -> Result<Self, Self::Error> {
        match value {
            PropertyValue::Float(v) => Ok(v as f32),
            PropertyValue::Int(v) => Ok(v as f32),
            other => Err(other.mismatch("f32")),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl TryFrom<PropertyValue> for String {
    type Error = PropertyError;

    fn try_from(value: PropertyValue) -> Result<Self, Self::Error> {
        match value {
            PropertyValue::Text(v) => Ok(v),
            other => Err(other.mismatch("text")),
        }
    }
}

impl From<Color> for PropertyValue {
    fn from(value: Color) -> Self {
        PropertyValue::Color(value)
    }
}

impl TryFrom<PropertyValue> for Color {
    type Error = PropertyError;

    fn try_from(value: PropertyValue) -> Result<Self, Self::Error> {
        match value {
            PropertyValue::Color(v) => Ok(v),
            other => Err(other.mismatch("color")),
        }
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Bytes(value)
    }
}

impl TryFrom<PropertyValue> for Vec<u8> {
    type Error = PropertyError;

    fn try_from(value: PropertyValue) -> Result<Self, Self::Error> {
        match value {
            PropertyValue::Bytes(v) => Ok(v),
            other => Err(other.mismatch("bytes")),
        }
    }
}

/// A value stored as the entire payload of one event.
///
/// `encode` computes the replacement payload without touching the event,
/// so a failed conversion leaves the stream as it was. `encoding` is the
/// stream-wide text encoding, if one is known.
pub trait EventValue: Sized {
    fn read(event: &Event, encoding: Option<TextEncoding>) -> Result<Self, PropertyError>;

    fn encode(&self, event: &Event, encoding: Option<TextEncoding>) -> Result<Vec<u8>, PropertyError>;
}

fn exact_kind(event: &Event, kind: SizeKind, expected: &'static str) -> Result<(), EventError> {
    if event.kind() == kind {
        Ok(())
    } else {
        Err(EventError::TypeMismatch {
            id: event.id(),
            expected,
            found: event.kind(),
        })
    }
}

macro_rules! int_event_value {
    ($($t:ty => $kind:ident, $read:ident, $encode:ident, $wide:ty);* $(;)?) => {$(
        impl EventValue for $t {
            fn read(event: &Event, _: Option<TextEncoding>) -> Result<Self, PropertyError> {
                Ok(event.$read()?)
            }

            fn encode(&self, event: &Event, _: Option<TextEncoding>) -> Result<Vec<u8>, PropertyError> {
                exact_kind(event, SizeKind::$kind, stringify!($t))?;
                Ok(event.$encode(*self as $wide)?)
            }
        }
    )*};
}

int_event_value! {
    u8 => Byte, as_u8, encode_uint, u64;
    i8 => Byte, as_i8, encode_int, i64;
    u16 => Word, as_u16, encode_uint, u64;
    i16 => Word, as_i16, encode_int, i64;
    u32 => DWord, as_u32, encode_uint, u64;
    i32 => DWord, as_i32, encode_int, i64;
}

impl EventValue for bool {
    fn read(event: &Event, _: Option<TextEncoding>) -> Result<Self, PropertyError> {
        Ok(event.as_bool()?)
    }

    fn encode(&self, event: &Event, _: Option<TextEncoding>) -> Result<Vec<u8>, PropertyError> {
        Ok(event.encode_bool(*self)?)
    }
}

impl EventValue for Color {
    fn read(event: &Event, _: Option<TextEncoding>) -> Result<Self, PropertyError> {
        Ok(event.as_color()?)
    }

    fn encode(&self, event: &Event, _: Option<TextEncoding>) -> Result<Vec<u8>, PropertyError> {
        Ok(event.encode_color(*self)?)
    }
}

/// The encoding a text event uses; the version event needs no stream mode.
fn text_encoding_for(event: &Event, encoding: Option<TextEncoding>) -> Result<TextEncoding, PropertyError> {
    match encoding {
        Some(encoding) => Ok(event.text_encoding(encoding)),
        None if event.id() == crate::limits::VERSION_EVENT => Ok(TextEncoding::Narrow),
        None => Err(DecodeError::VersionNotDetected.into()),
    }
}

impl EventValue for String {
    fn read(event: &Event, encoding: Option<TextEncoding>) -> Result<Self, PropertyError> {
        exact_kind(event, SizeKind::Text, "text")?;
        Ok(event.as_text(text_encoding_for(event, encoding)?)?)
    }

    fn encode(&self, event: &Event, encoding: Option<TextEncoding>) -> Result<Vec<u8>, PropertyError> {
        exact_kind(event, SizeKind::Text, "text")?;
        Ok(event.encode_text(self, text_encoding_for(event, encoding)?)?)
    }
}

impl EventValue for Vec<u8> {
    fn read(event: &Event, _: Option<TextEncoding>) -> Result<Self, PropertyError> {
        exact_kind(event, SizeKind::Data, "data")?;
        Ok(event.payload().to_vec())
    }

    fn encode(&self, event: &Event, _: Option<TextEncoding>) -> Result<Vec<u8>, PropertyError> {
        exact_kind(event, SizeKind::Data, "data")?;
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_property_value_conversions() {
        assert_eq!(PropertyValue::from(7u16), PropertyValue::Int(7));
        assert_eq!(u8::try_from(PropertyValue::Int(255)).unwrap(), 255);
        assert_eq!(
            u8::try_from(PropertyValue::Int(256)).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(
            String::try_from(PropertyValue::Bool(true)).unwrap_err(),
            PropertyError::TypeMismatch {
                expected: "text",
                found: "bool"
            }
        );
        assert!(bool::try_from(PropertyValue::Int(2)).unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyValue::Color(Color::new(255, 0, 16)).to_string(), "#ff0010");
        assert_eq!(PropertyValue::Text("Mix".into()).to_string(), "\"Mix\"");
        assert_eq!(PropertyValue::Bytes(vec![0; 3]).to_string(), "<3 bytes>");
    }

    #[test]
    fn test_int_event_values() {
        let event = Event::word(95, 300).unwrap();
        assert_eq!(u16::read(&event, None).unwrap(), 300);
        assert_eq!(i16::read(&event, None).unwrap(), 300);
        assert!(u8::read(&event, None).is_err());

        assert_eq!(7u16.encode(&event, None).unwrap(), vec![7, 0]);
        assert_eq!(
            (-1i16).encode(&event, None).unwrap(),
            vec![0xFF, 0xFF]
        );
        // Width must match the event kind exactly
        assert_eq!(
            7u8.encode(&event, None).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_text_event_values() {
        let event = Event::text(204, "Lead", TextEncoding::Wide).unwrap();
        assert_eq!(String::read(&event, Some(TextEncoding::Wide)).unwrap(), "Lead");
        assert_eq!(
            String::read(&event, None).unwrap_err().kind(),
            ErrorKind::VersionNotDetected
        );

        let version = Event::text(199, "20.8.4", TextEncoding::Wide).unwrap();
        assert_eq!(String::read(&version, None).unwrap(), "20.8.4");
        assert_eq!(
            "21.0.0".to_string().encode(&version, Some(TextEncoding::Wide)).unwrap(),
            b"21.0.0\0".to_vec()
        );
    }

    #[test]
    fn test_color_and_data_values() {
        let event = Event::dword(149, 0x0030_2010).unwrap();
        assert_eq!(Color::read(&event, None).unwrap(), Color::new(0x10, 0x20, 0x30));

        let data = Event::data(236, vec![1, 2, 3]).unwrap();
        assert_eq!(Vec::<u8>::read(&data, None).unwrap(), vec![1, 2, 3]);
        assert!(Vec::<u8>::read(&event, None).is_err());
    }
}

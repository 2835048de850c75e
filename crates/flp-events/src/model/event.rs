//! Events: the ID-tagged units of the project event stream.
//!
//! An event's ID decides the shape of its payload. IDs below 192 carry a
//! fixed 1, 2 or 4 byte payload; the rest carry a varint-prefixed blob.

use std::fmt;

use crate::codec::primitives::{
    decode_int, decode_uint, encode_int, encode_uint, varint_len, Width, Writer,
};
use crate::codec::text::{decode_text, encode_text, TextEncoding};
use crate::error::EventError;
use crate::limits::{DATA, DATA_TEXT_EVENTS, DWORD, TEXT, VERSION_EVENT, WORD};

/// Payload shape of an event, derived from its ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeKind {
    /// IDs 0..64, 1 byte payload.
    Byte,
    /// IDs 64..128, 2 byte payload.
    Word,
    /// IDs 128..192, 4 byte payload.
    DWord,
    /// IDs 192..208 and the data-text allow-list, string payload.
    Text,
    /// IDs 208..256, opaque blob payload.
    Data,
}

impl SizeKind {
    /// Classifies an event ID.
    pub fn of(id: u8) -> SizeKind {
        match id {
            0..WORD => SizeKind::Byte,
            WORD..DWORD => SizeKind::Word,
            DWORD..TEXT => SizeKind::DWord,
            TEXT..DATA => SizeKind::Text,
            _ if DATA_TEXT_EVENTS.contains(&id) => SizeKind::Text,
            _ => SizeKind::Data,
        }
    }

    /// Payload width of the fixed kinds.
    pub fn width(self) -> Option<Width> {
        match self {
            SizeKind::Byte => Some(Width::One),
            SizeKind::Word => Some(Width::Two),
            SizeKind::DWord => Some(Width::Four),
            SizeKind::Text | SizeKind::Data => None,
        }
    }

    /// Returns true for the varint-prefixed kinds.
    pub fn is_variable(self) -> bool {
        self.width().is_none()
    }

    /// The contiguous ID span `[start, end)` of this kind.
    ///
    /// The data-text allow-list lies outside the text span.
    pub fn id_span(self) -> (u16, u16) {
        match self {
            SizeKind::Byte => (0, WORD as u16),
            SizeKind::Word => (WORD as u16, DWORD as u16),
            SizeKind::DWord => (DWORD as u16, TEXT as u16),
            SizeKind::Text => (TEXT as u16, DATA as u16),
            SizeKind::Data => (DATA as u16, 256),
        }
    }
}

/// A red/green/blue color stored in the low three bytes of a dword event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Creates a color from 8-bit channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Creates a color from channels in `0.0..=1.0`, scaled to 0-255.
    pub fn from_unit_rgb(r: f64, g: f64, b: f64) -> Self {
        let scale = |c: f64| (c.clamp(0.0, 1.0) * 255.0) as u8;
        Self::new(scale(r), scale(g), scale(b))
    }

    /// Returns the channels scaled to `0.0..=1.0`.
    pub fn to_unit_rgb(self) -> (f64, f64, f64) {
        (
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
        )
    }

    /// The on-disk representation, high byte zero.
    pub fn to_payload(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0]
    }
}

/// One ID-tagged unit of the event stream.
///
/// The ID and size kind are fixed at construction; the payload can be
/// replaced, subject to the kind's width.
#[derive(Clone)]
pub struct Event {
    id: u8,
    kind: SizeKind,
    payload: Vec<u8>,
    sequence: u64,
}

impl Event {
    /// Creates an event, classifying its kind from the ID.
    pub fn new(id: u8, payload: Vec<u8>) -> Result<Self, EventError> {
        Self::with_kind(SizeKind::of(id), id, payload)
    }

    /// Creates an event of a declared kind.
    ///
    /// Fails if the ID does not belong to `kind` or if a fixed-size payload
    /// has the wrong length.
    pub fn with_kind(kind: SizeKind, id: u8, payload: Vec<u8>) -> Result<Self, EventError> {
        if SizeKind::of(id) != kind {
            return Err(EventError::IdOutOfRange { id, kind });
        }
        check_len(id, kind, payload.len())?;
        Ok(Self {
            id,
            kind,
            payload,
            sequence: 0,
        })
    }

    /// Creates a byte event.
    pub fn byte(id: u8, value: u8) -> Result<Self, EventError> {
        Self::with_kind(SizeKind::Byte, id, vec![value])
    }

    /// Creates a word event.
    pub fn word(id: u8, value: u16) -> Result<Self, EventError> {
        Self::with_kind(SizeKind::Word, id, value.to_le_bytes().to_vec())
    }

    /// Creates a dword event.
    pub fn dword(id: u8, value: u32) -> Result<Self, EventError> {
        Self::with_kind(SizeKind::DWord, id, value.to_le_bytes().to_vec())
    }

    /// Creates a text event.
    pub fn text(id: u8, text: &str, encoding: TextEncoding) -> Result<Self, EventError> {
        let encoding = if id == VERSION_EVENT { TextEncoding::Narrow } else { encoding };
        Self::with_kind(SizeKind::Text, id, encode_text(text, encoding))
    }

    /// Creates a data event.
    pub fn data(id: u8, payload: Vec<u8>) -> Result<Self, EventError> {
        Self::with_kind(SizeKind::Data, id, payload)
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// The event ID.
    #[inline]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// The size kind derived from the ID.
    #[inline]
    pub fn kind(&self) -> SizeKind {
        self.kind
    }

    /// The raw payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Creation order within the owning stream. Identity only, never ordering.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Total encoded length in bytes, header included.
    pub fn size(&self) -> usize {
        match self.kind.width() {
            Some(width) => 1 + width.len(),
            None => 1 + varint_len(self.payload.len() as u32) + self.payload.len(),
        }
    }

    /// Appends the on-disk bytes of this event to `writer`.
    pub fn write_to(&self, writer: &mut Writer) {
        writer.write_byte(self.id);
        if self.kind.is_variable() {
            // Empty payloads still carry an explicit zero length.
            writer.write_varint(self.payload.len() as u32);
        }
        writer.write_bytes(&self.payload);
    }

    /// The exact on-disk bytes of this event.
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.size());
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Compares two events of the same kind.
    ///
    /// Comparing events of different size kinds is a usage error.
    pub fn try_eq(&self, other: &Event) -> Result<bool, EventError> {
        if self.kind != other.kind {
            return Err(EventError::TypeMismatch {
                id: other.id,
                expected: kind_name(self.kind),
                found: other.kind,
            });
        }
        Ok(self == other)
    }

    /// The encoding text in this event uses given the stream-wide mode.
    ///
    /// The version event is always narrow.
    pub fn text_encoding(&self, stream: TextEncoding) -> TextEncoding {
        if self.id == VERSION_EVENT {
            TextEncoding::Narrow
        } else {
            stream
        }
    }

    // =========================================================================
    // TYPED ACCESSORS
    // =========================================================================

    fn fixed(&self, kind: SizeKind, expected: &'static str) -> Result<Width, EventError> {
        match self.kind.width() {
            Some(width) if self.kind == kind => Ok(width),
            _ => Err(self.mismatch(expected)),
        }
    }

    fn mismatch(&self, expected: &'static str) -> EventError {
        EventError::TypeMismatch {
            id: self.id,
            expected,
            found: self.kind,
        }
    }

    /// The payload of a fixed-size event as an unsigned integer.
    pub fn as_uint(&self) -> Result<u64, EventError> {
        let width = self.kind.width().ok_or_else(|| self.mismatch("integer"))?;
        decode_uint(&self.payload, width).map_err(|_| self.mismatch("integer"))
    }

    /// The payload of a fixed-size event as a signed integer.
    pub fn as_int(&self) -> Result<i64, EventError> {
        let width = self.kind.width().ok_or_else(|| self.mismatch("integer"))?;
        decode_int(&self.payload, width).map_err(|_| self.mismatch("integer"))
    }

    pub fn as_u8(&self) -> Result<u8, EventError> {
        self.fixed(SizeKind::Byte, "u8")?;
        Ok(self.payload[0])
    }

    pub fn as_i8(&self) -> Result<i8, EventError> {
        self.fixed(SizeKind::Byte, "i8")?;
        Ok(self.payload[0] as i8)
    }

    pub fn as_u16(&self) -> Result<u16, EventError> {
        self.fixed(SizeKind::Word, "u16")?;
        Ok(u16::from_le_bytes([self.payload[0], self.payload[1]]))
    }

    pub fn as_i16(&self) -> Result<i16, EventError> {
        Ok(self.as_u16().map_err(|_| self.mismatch("i16"))? as i16)
    }

    pub fn as_u32(&self) -> Result<u32, EventError> {
        self.fixed(SizeKind::DWord, "u32")?;
        let p = &self.payload;
        Ok(u32::from_le_bytes([p[0], p[1], p[2], p[3]]))
    }

    pub fn as_i32(&self) -> Result<i32, EventError> {
        Ok(self.as_u32().map_err(|_| self.mismatch("i32"))? as i32)
    }

    /// Non-zero payload integer.
    pub fn as_bool(&self) -> Result<bool, EventError> {
        Ok(self.as_uint().map_err(|_| self.mismatch("bool"))? != 0)
    }

    /// The low three bytes of a dword event as a color.
    pub fn as_color(&self) -> Result<Color, EventError> {
        self.fixed(SizeKind::DWord, "color")?;
        Ok(Color::new(self.payload[0], self.payload[1], self.payload[2]))
    }

    /// Decodes a text event. Lossy, never fails on the bytes themselves.
    pub fn as_text(&self, encoding: TextEncoding) -> Result<String, EventError> {
        if self.kind != SizeKind::Text {
            return Err(self.mismatch("text"));
        }
        Ok(decode_text(&self.payload, self.text_encoding(encoding)))
    }

    // =========================================================================
    // PAYLOAD ENCODERS
    // =========================================================================
    //
    // These compute a replacement payload without touching the event, so a
    // failed conversion leaves it unchanged.

    /// Payload for an unsigned integer of this event's width.
    pub fn encode_uint(&self, value: u64) -> Result<Vec<u8>, EventError> {
        let width = self.kind.width().ok_or_else(|| self.mismatch("integer"))?;
        encode_uint(value, width).map_err(|source| EventError::Range { id: self.id, source })
    }

    /// Payload for a signed integer of this event's width.
    pub fn encode_int(&self, value: i64) -> Result<Vec<u8>, EventError> {
        let width = self.kind.width().ok_or_else(|| self.mismatch("integer"))?;
        encode_int(value, width).map_err(|source| EventError::Range { id: self.id, source })
    }

    pub fn encode_bool(&self, value: bool) -> Result<Vec<u8>, EventError> {
        self.encode_uint(value as u64)
    }

    pub fn encode_color(&self, color: Color) -> Result<Vec<u8>, EventError> {
        self.fixed(SizeKind::DWord, "color")?;
        Ok(color.to_payload().to_vec())
    }

    pub fn encode_text(&self, text: &str, encoding: TextEncoding) -> Result<Vec<u8>, EventError> {
        if self.kind != SizeKind::Text {
            return Err(self.mismatch("text"));
        }
        Ok(encode_text(text, self.text_encoding(encoding)))
    }

    // =========================================================================
    // MUTATORS
    // =========================================================================

    /// Replaces the payload, enforcing the fixed width of Byte/Word/DWord.
    pub fn replace_payload(&mut self, payload: Vec<u8>) -> Result<Vec<u8>, EventError> {
        check_len(self.id, self.kind, payload.len())?;
        Ok(std::mem::replace(&mut self.payload, payload))
    }

    pub fn set_uint(&mut self, value: u64) -> Result<(), EventError> {
        let payload = self.encode_uint(value)?;
        self.payload = payload;
        Ok(())
    }

    pub fn set_int(&mut self, value: i64) -> Result<(), EventError> {
        let payload = self.encode_int(value)?;
        self.payload = payload;
        Ok(())
    }

    pub fn set_bool(&mut self, value: bool) -> Result<(), EventError> {
        self.set_uint(value as u64)
    }

    pub fn set_color(&mut self, color: Color) -> Result<(), EventError> {
        let payload = self.encode_color(color)?;
        self.payload = payload;
        Ok(())
    }

    pub fn set_text(&mut self, text: &str, encoding: TextEncoding) -> Result<(), EventError> {
        let payload = self.encode_text(text, encoding)?;
        self.payload = payload;
        Ok(())
    }

    /// Replaces the blob of a data event. The length may change.
    pub fn set_data(&mut self, payload: Vec<u8>) -> Result<(), EventError> {
        if self.kind != SizeKind::Data {
            return Err(self.mismatch("data"));
        }
        self.payload = payload;
        Ok(())
    }
}

fn check_len(id: u8, kind: SizeKind, len: usize) -> Result<(), EventError> {
    match kind.width() {
        Some(width) if width.len() != len => Err(EventError::InvalidChunkSize {
            id,
            expected: width.len(),
            got: len,
        }),
        _ => Ok(()),
    }
}

fn kind_name(kind: SizeKind) -> &'static str {
    match kind {
        SizeKind::Byte => "a byte event",
        SizeKind::Word => "a word event",
        SizeKind::DWord => "a dword event",
        SizeKind::Text => "a text event",
        SizeKind::Data => "a data event",
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.payload == other.payload
    }
}

impl Eq for Event {}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Event");
        s.field("id", &self.id).field("kind", &self.kind);
        match (self.as_uint(), self.as_int()) {
            (Ok(unsigned), Ok(signed)) if unsigned as i64 != signed => {
                s.field("unsigned", &unsigned).field("signed", &signed)
            }
            (Ok(unsigned), _) => s.field("value", &unsigned),
            _ => s.field("size", &self.size()),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EncodeError, ErrorKind};

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(SizeKind::of(0), SizeKind::Byte);
        assert_eq!(SizeKind::of(63), SizeKind::Byte);
        assert_eq!(SizeKind::of(64), SizeKind::Word);
        assert_eq!(SizeKind::of(127), SizeKind::Word);
        assert_eq!(SizeKind::of(128), SizeKind::DWord);
        assert_eq!(SizeKind::of(191), SizeKind::DWord);
        assert_eq!(SizeKind::of(192), SizeKind::Text);
        assert_eq!(SizeKind::of(207), SizeKind::Text);
        assert_eq!(SizeKind::of(208), SizeKind::Data);
        assert_eq!(SizeKind::of(241), SizeKind::Text);
        assert_eq!(SizeKind::of(255), SizeKind::Data);
    }

    #[test]
    fn test_byte_kind_id_range() {
        let err = Event::with_kind(SizeKind::Byte, 64, vec![0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventIdOutOfRange);
        assert!(Event::with_kind(SizeKind::Byte, 63, vec![0]).is_ok());
        assert!(Event::byte(64, 0).is_err());
    }

    #[test]
    fn test_invalid_chunk_size() {
        let err = Event::new(1, vec![0, 0]).unwrap_err();
        assert_eq!(err, EventError::InvalidChunkSize { id: 1, expected: 1, got: 2 });
        assert_eq!(err.kind(), ErrorKind::InvalidEventChunkSize);
        assert!(Event::new(200, vec![]).is_ok());
    }

    #[test]
    fn test_serialize_fixed() {
        let event = Event::word(70, 300).unwrap();
        assert_eq!(event.serialize(), vec![70, 0x2C, 0x01]);
        assert_eq!(event.size(), 3);
    }

    #[test]
    fn test_serialize_empty_variable() {
        let event = Event::data(210, vec![]).unwrap();
        assert_eq!(event.serialize(), vec![0xD2, 0x00]);
        assert_eq!(event.size(), 2);
    }

    #[test]
    fn test_serialize_long_variable() {
        let event = Event::data(220, vec![7; 200]).unwrap();
        let bytes = event.serialize();
        assert_eq!(&bytes[..3], &[220, 0xC8, 0x01]);
        assert_eq!(bytes.len(), event.size());
    }

    #[test]
    fn test_equality() {
        let a = Event::byte(5, 1).unwrap().with_sequence(1);
        let b = Event::byte(5, 1).unwrap().with_sequence(2);
        assert_eq!(a, b);
        assert!(a.try_eq(&b).unwrap());

        let word = Event::word(70, 1).unwrap();
        let err = a.try_eq(&word).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_typed_accessors() {
        let event = Event::new(10, vec![0xFF]).unwrap();
        assert_eq!(event.as_u8().unwrap(), 255);
        assert_eq!(event.as_i8().unwrap(), -1);
        assert!(event.as_bool().unwrap());
        assert!(event.as_u16().is_err());

        let event = Event::new(150, vec![0xFE, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(event.as_i32().unwrap(), -2);
        assert_eq!(event.as_u32().unwrap(), u32::MAX - 1);
    }

    #[test]
    fn test_mutator_range_leaves_payload() {
        let mut event = Event::byte(5, 9).unwrap();
        let err = event.set_uint(256).unwrap_err();
        assert!(matches!(
            err,
            EventError::Range { id: 5, source: EncodeError::OutOfRange { .. } }
        ));
        assert_eq!(event.payload(), &[9]);

        event.set_int(-1).unwrap();
        assert_eq!(event.payload(), &[0xFF]);
    }

    #[test]
    fn test_color() {
        let mut event = Event::dword(128, 0).unwrap();
        event.set_color(Color::new(10, 20, 30)).unwrap();
        assert_eq!(event.payload(), &[10, 20, 30, 0]);
        assert_eq!(event.as_color().unwrap(), Color::new(10, 20, 30));

        let color = Color::from_unit_rgb(1.0, 0.5, 0.0);
        assert_eq!(color, Color::new(255, 127, 0));
    }

    #[test]
    fn test_version_text_always_narrow() {
        let event = Event::text(VERSION_EVENT, "20.8.4.2576", TextEncoding::Wide).unwrap();
        assert_eq!(event.payload(), b"20.8.4.2576\0");
        assert_eq!(event.as_text(TextEncoding::Wide).unwrap(), "20.8.4.2576");

        let event = Event::text(TEXT, "ab", TextEncoding::Wide).unwrap();
        assert_eq!(event.payload(), &[b'a', 0, b'b', 0, 0, 0]);
    }

    #[test]
    fn test_set_data_changes_length() {
        let mut event = Event::data(212, vec![1, 2]).unwrap();
        event.set_data(vec![1, 2, 3]).unwrap();
        assert_eq!(event.size(), 5);
        assert!(Event::byte(1, 0).unwrap().set_data(vec![]).is_err());
    }
}

//! Error types for event decoding, mutation and property binding.

use thiserror::Error;

use crate::codec::structs::FieldType;
use crate::model::SizeKind;

/// Error classification shared by every error type in this crate.
///
/// Callers that only need to decide between aborting, reporting or
/// retrying with different input can branch on this instead of matching
/// the concrete enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An event ID lies outside the span of its size kind.
    EventIdOutOfRange,
    /// A fixed-size event payload has the wrong length.
    InvalidEventChunkSize,
    /// The buffer ended in the middle of an event or varint.
    TruncatedData,
    /// A numeric value does not fit the target width.
    Range,
    /// Incompatible event kinds or value types were combined.
    TypeMismatch,
    /// A property write found none of its candidate events.
    PropertyCannotBeSet,
    /// A struct field name is not declared by the layout.
    UnknownField,
    /// A collection yielded no models.
    NoModelsFound,
    /// An indexed model lookup came up empty.
    ModelNotFound,
    /// The text encoding could not be inferred from the stream.
    VersionNotDetected,
    /// An out-of-band property slot was never registered.
    KeyNotRegistered,
    /// Overlong varints, oversized lengths and similar malformed input.
    MalformedEncoding,
    /// The container header is invalid.
    HeaderCorrupted,
    /// A structural change was attempted on a model that finished parsing.
    ModelSealed,
    /// A stream position holds no event.
    EventNotFound,
}

fn signedness(signed: bool) -> &'static str {
    if signed { "signed" } else { "unsigned" }
}

fn id_span(kind: SizeKind) -> String {
    let (start, end) = kind.id_span();
    format!("{start}..{end}")
}

/// Error while decoding a byte stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {context}")]
    Truncated { context: &'static str },

    #[error("varint exceeds maximum length (5 bytes)")]
    VarintTooLong,

    #[error("varint overflow (value exceeds u32)")]
    VarintOverflow,

    #[error("varint is not minimally encoded")]
    NonMinimalVarint,

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("project version event not found or unreadable, text encoding unknown")]
    VersionNotDetected,

    #[error("error parsing header: {context}")]
    HeaderCorrupted { context: &'static str },

    #[error(transparent)]
    Event(#[from] EventError),
}

impl DecodeError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Truncated { .. } => ErrorKind::TruncatedData,
            DecodeError::VarintTooLong
            | DecodeError::VarintOverflow
            | DecodeError::NonMinimalVarint
            | DecodeError::LengthExceedsLimit { .. } => ErrorKind::MalformedEncoding,
            DecodeError::VersionNotDetected => ErrorKind::VersionNotDetected,
            DecodeError::HeaderCorrupted { .. } => ErrorKind::HeaderCorrupted,
            DecodeError::Event(e) => e.kind(),
        }
    }
}

/// Error while encoding a primitive value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("value {value} does not fit in {width} byte(s) ({})", signedness(*.signed))]
    OutOfRange {
        value: i128,
        width: usize,
        signed: bool,
    },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("value {value} is outside {min}..={max}")]
    OutOfBounds { value: i64, min: i64, max: i64 },
}

impl EncodeError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::OutOfRange { .. } | EncodeError::OutOfBounds { .. } => ErrorKind::Range,
            EncodeError::LengthExceedsLimit { .. } => ErrorKind::MalformedEncoding,
        }
    }
}

/// Error while constructing, comparing or mutating an [`Event`](crate::Event).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error("event id {id} is outside the {kind:?} range {}", id_span(*.kind))]
    IdOutOfRange { id: u8, kind: SizeKind },

    #[error("event {id}: expected a payload of {expected} byte(s), got {got}")]
    InvalidChunkSize { id: u8, expected: usize, got: usize },

    #[error("event {id}: {source}")]
    Range { id: u8, source: EncodeError },

    #[error("event {id}: cannot use a {found:?} event as {expected}")]
    TypeMismatch {
        id: u8,
        expected: &'static str,
        found: SizeKind,
    },

    #[error("no event at position {pos} (stream has {len})")]
    NotFound { pos: usize, len: usize },
}

impl EventError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::IdOutOfRange { .. } => ErrorKind::EventIdOutOfRange,
            EventError::InvalidChunkSize { .. } => ErrorKind::InvalidEventChunkSize,
            EventError::Range { source, .. } => source.kind(),
            EventError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            EventError::NotFound { .. } => ErrorKind::EventNotFound,
        }
    }
}

/// Error raised by the struct codec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructError {
    #[error("struct {layout} has no field named {field:?}")]
    UnknownField { layout: &'static str, field: String },

    #[error("field {field} ends at byte {end} but the payload is {len} byte(s)")]
    FieldOutOfBounds {
        field: &'static str,
        end: usize,
        len: usize,
    },

    #[error("field {field} is {found:?}, cannot use it as {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: FieldType,
    },

    #[error("field {field}: {source}")]
    Range {
        field: &'static str,
        source: EncodeError,
    },
}

impl StructError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StructError::UnknownField { .. } | StructError::FieldOutOfBounds { .. } => {
                ErrorKind::UnknownField
            }
            StructError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            StructError::Range { source, .. } => source.kind(),
        }
    }
}

/// Error while writing a property through a descriptor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("event(s) {ids:?} were not found")]
    CannotBeSet { ids: Vec<u8> },

    #[error("property {key:?} was never registered")]
    KeyNotRegistered { key: String },

    #[error("property value is {found}, expected {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Struct(#[from] StructError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl PropertyError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PropertyError::CannotBeSet { .. } => ErrorKind::PropertyCannotBeSet,
            PropertyError::KeyNotRegistered { .. } => ErrorKind::KeyNotRegistered,
            PropertyError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            PropertyError::Event(e) => e.kind(),
            PropertyError::Struct(e) => e.kind(),
            PropertyError::Decode(e) => e.kind(),
        }
    }
}

/// Error raised by model construction and model collections.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("no {model} models found")]
    NoModelsFound { model: &'static str },

    #[error("{model} index {index} out of bounds (count: {len})")]
    ModelNotFound {
        model: &'static str,
        index: usize,
        len: usize,
    },

    #[error("{model} has finished parsing and cannot take event {id}")]
    Sealed { model: &'static str, id: u8 },
}

impl ModelError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::NoModelsFound { .. } => ErrorKind::NoModelsFound,
            ModelError::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            ModelError::Sealed { .. } => ErrorKind::ModelSealed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_distinguishable() {
        let range = EventError::Range {
            id: 1,
            source: EncodeError::OutOfRange {
                value: 256,
                width: 1,
                signed: false,
            },
        };
        assert_eq!(range.kind(), ErrorKind::Range);

        let wrapped = PropertyError::from(range);
        assert_eq!(wrapped.kind(), ErrorKind::Range);

        let truncated = DecodeError::Truncated { context: "payload" };
        assert_eq!(truncated.kind(), ErrorKind::TruncatedData);
        assert_eq!(
            PropertyError::CannotBeSet { ids: vec![1] }.kind(),
            ErrorKind::PropertyCannotBeSet
        );
    }

    #[test]
    fn test_messages() {
        let err = EventError::IdOutOfRange {
            id: 64,
            kind: SizeKind::Byte,
        };
        assert_eq!(err.to_string(), "event id 64 is outside the Byte range 0..64");

        let err = EncodeError::OutOfRange {
            value: 256,
            width: 1,
            signed: false,
        };
        assert_eq!(err.to_string(), "value 256 does not fit in 1 byte(s) (unsigned)");
    }
}

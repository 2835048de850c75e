//! The ordered event stream and its wire codec.
//!
//! Parsing walks the buffer once, front to back. Serializing walks the
//! events in their original order, so a stream that was not modified
//! reproduces its input byte for byte.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::codec::primitives::{Reader, Writer};
use crate::codec::text::TextEncoding;
use crate::error::{DecodeError, EventError};
use crate::limits::DEFAULT_MAX_EVENT_LEN;
use crate::model::version::FlVersion;
use crate::model::{Event, SizeKind};

/// How the stream-wide text encoding is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncodingMode {
    /// Infer it from the project version event.
    #[default]
    Detect,
    /// Use this encoding regardless of the version event.
    Fixed(TextEncoding),
}

/// Options for parsing an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// How text events are decoded.
    pub text_encoding: TextEncodingMode,
    /// Largest accepted variable-size payload.
    pub max_event_len: usize,
    /// Fail the parse when the text encoding cannot be detected.
    pub require_version: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            text_encoding: TextEncodingMode::Detect,
            max_event_len: DEFAULT_MAX_EVENT_LEN,
            require_version: false,
        }
    }
}

impl ParseOptions {
    /// Creates default options (detect encoding, version optional).
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed text encoding instead of detecting it.
    pub fn with_text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.text_encoding = TextEncodingMode::Fixed(encoding);
        self
    }

    /// Caps the payload length of variable-size events.
    pub fn with_max_event_len(mut self, max: usize) -> Self {
        self.max_event_len = max;
        self
    }

    /// Makes a missing or unreadable version event a parse error.
    pub fn require_version(mut self) -> Self {
        self.require_version = true;
        self
    }
}

/// Stream positions in order, grouped by event ID.
///
/// Used both by the stream itself and by models for the subset of events
/// they own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventIndex {
    order: Vec<usize>,
    by_id: FxHashMap<u8, Vec<usize>>,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the event at `pos`. Positions must be inserted in stream order.
    pub fn insert(&mut self, pos: usize, id: u8) {
        self.order.push(pos);
        self.by_id.entry(id).or_default().push(pos);
    }

    /// All positions, in stream order.
    pub fn positions(&self) -> &[usize] {
        &self.order
    }

    /// Positions of events with `id`, in stream order.
    pub fn of(&self, id: u8) -> &[usize] {
        self.by_id.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of the first event with `id`.
    pub fn first(&self, id: u8) -> Option<usize> {
        self.of(id).first().copied()
    }

    pub fn contains(&self, id: u8) -> bool {
        !self.of(id).is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// An ordered, indexed sequence of events.
///
/// The event list and the ID index only change together (on append), and
/// payload replacement never changes an ID, so the two views stay
/// consistent. A stream is meant for single-threaded use: concurrent
/// writers must bring their own synchronization.
#[derive(Debug, Clone, Default)]
pub struct EventStream {
    events: Vec<Event>,
    index: EventIndex,
    text_encoding: Option<TextEncoding>,
    next_sequence: u64,
}

impl EventStream {
    /// Creates an empty stream with an undetermined text encoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty stream with a known text encoding.
    pub fn with_text_encoding(encoding: TextEncoding) -> Self {
        Self {
            text_encoding: Some(encoding),
            ..Self::default()
        }
    }

    /// Parses a stream with default options.
    pub fn parse(input: &[u8]) -> Result<Self, DecodeError> {
        Self::parse_with(input, &ParseOptions::default())
    }

    /// Parses a stream.
    ///
    /// Any structural error aborts the whole parse; no partial stream is
    /// returned.
    pub fn parse_with(input: &[u8], options: &ParseOptions) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(input);
        let mut stream = EventStream::new();

        while !reader.is_empty() {
            let offset = reader.position();
            let id = reader.read_byte("event id")?;
            let kind = SizeKind::of(id);
            let payload = match kind.width() {
                Some(width) => reader.read_bytes(width.len(), "event payload")?,
                None => reader.read_bytes_prefixed(options.max_event_len, "event payload")?,
            };
            trace!(offset, id, ?kind, len = payload.len(), "event");
            stream.append(Event::with_kind(kind, id, payload.to_vec())?);
        }

        stream.text_encoding = match options.text_encoding {
            TextEncodingMode::Fixed(encoding) => Some(encoding),
            TextEncodingMode::Detect => match stream.detect_text_encoding() {
                Ok(encoding) => Some(encoding),
                Err(e) if options.require_version => return Err(e),
                Err(_) => None,
            },
        };

        debug!(
            events = stream.len(),
            bytes = input.len(),
            text_encoding = ?stream.text_encoding,
            "parsed event stream"
        );
        Ok(stream)
    }

    /// Appends an event and indexes it, returning its position.
    ///
    /// Only meant for building a stream; once models are attached the
    /// structure should stay fixed.
    pub fn append(&mut self, event: Event) -> usize {
        let pos = self.events.len();
        self.index.insert(pos, event.id());
        self.events.push(event.with_sequence(self.next_sequence));
        self.next_sequence += 1;
        pos
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The event at a stream position.
    pub fn get(&self, pos: usize) -> Option<&Event> {
        self.events.get(pos)
    }

    /// All events, in stream order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// The ID index over the whole stream.
    pub fn index(&self) -> &EventIndex {
        &self.index
    }

    /// Events with `id`, in stream order. Empty if there are none.
    pub fn events_of(&self, id: u8) -> impl Iterator<Item = &Event> + '_ {
        self.index.of(id).iter().map(move |&pos| &self.events[pos])
    }

    /// The first event with `id`.
    pub fn first(&self, id: u8) -> Option<&Event> {
        self.index.first(id).map(|pos| &self.events[pos])
    }

    /// Replaces the payload of the event at `pos` in one swap, returning the
    /// old payload. The event's ID and position do not change.
    pub fn replace_payload(&mut self, pos: usize, payload: Vec<u8>) -> Result<Vec<u8>, EventError> {
        let len = self.events.len();
        self.events
            .get_mut(pos)
            .ok_or(EventError::NotFound { pos, len })?
            .replace_payload(payload)
    }

    /// The stream-wide text encoding.
    pub fn text_encoding(&self) -> Result<TextEncoding, DecodeError> {
        self.text_encoding.ok_or(DecodeError::VersionNotDetected)
    }

    /// Overrides the stream-wide text encoding.
    pub fn set_text_encoding(&mut self, encoding: TextEncoding) {
        self.text_encoding = Some(encoding);
    }

    /// The project version, if the stream has a readable version event.
    pub fn version(&self) -> Option<FlVersion> {
        let event = self.first(crate::limits::VERSION_EVENT)?;
        event.as_text(TextEncoding::Narrow).ok()?.parse().ok()
    }

    fn detect_text_encoding(&self) -> Result<TextEncoding, DecodeError> {
        self.version()
            .map(|v| v.text_encoding())
            .ok_or(DecodeError::VersionNotDetected)
    }

    /// Total encoded size in bytes.
    pub fn byte_len(&self) -> usize {
        self.events.iter().map(Event::size).sum()
    }

    /// Appends every event, in stream order, to `writer`.
    pub fn write_to(&self, writer: &mut Writer) {
        for event in &self.events {
            event.write_to(writer);
        }
    }

    /// The on-disk bytes of the whole stream.
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.byte_len());
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}

impl<'a> IntoIterator for &'a EventStream {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::limits::VERSION_EVENT;
    use proptest::prelude::*;

    fn sample() -> Vec<u8> {
        let mut bytes = vec![VERSION_EVENT, 12];
        bytes.extend_from_slice(b"20.8.4.2576\0");
        bytes.extend_from_slice(&[
            0x05, 0x01, // byte
            0x48, 0x2C, 0x01, // word 72 = 300
            0x80, 0x01, 0x02, 0x03, 0x00, // dword 128
            0x05, 0x00, // byte again
            0xD2, 0x00, // empty data
        ]);
        bytes
    }

    #[test]
    fn test_parse_and_index() {
        let stream = EventStream::parse(&sample()).unwrap();
        assert_eq!(stream.len(), 6);
        assert_eq!(stream.events_of(0x05).count(), 2);
        assert_eq!(stream.first(0x48).unwrap().as_u16().unwrap(), 300);
        assert_eq!(stream.events_of(0x10).count(), 0);
        assert!(stream.first(0x10).is_none());
        assert_eq!(stream.index().of(0x05), &[1, 4]);
        assert_eq!(stream.text_encoding().unwrap(), TextEncoding::Wide);
    }

    #[test]
    fn test_sequence_is_per_stream() {
        let a = EventStream::parse(&sample()).unwrap();
        let b = EventStream::parse(&sample()).unwrap();
        let seq_a: Vec<u64> = a.iter().map(Event::sequence).collect();
        let seq_b: Vec<u64> = b.iter().map(Event::sequence).collect();
        assert_eq!(seq_a, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_roundtrip_identity() {
        let bytes = sample();
        let stream = EventStream::parse(&bytes).unwrap();
        assert_eq!(stream.serialize(), bytes);
        assert_eq!(stream.byte_len(), bytes.len());
    }

    #[test]
    fn test_word_mutation_scenario() {
        let mut stream = EventStream::parse(&[0x68, 0x05, 0x00]).unwrap();
        let event = stream.first(0x68).unwrap();
        assert_eq!(event.kind(), SizeKind::Word);
        assert_eq!(event.as_u16().unwrap(), 5);

        let payload = event.encode_uint(300).unwrap();
        stream.replace_payload(0, payload).unwrap();
        assert_eq!(stream.serialize(), vec![0x68, 0x2C, 0x01]);
    }

    #[test]
    fn test_low_id_is_byte_kind() {
        // 0x28 is a byte event; the trailing zero then starts an event with no payload.
        let err = EventStream::parse(&[0x28, 0x05, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn test_empty_data_event() {
        let stream = EventStream::parse(&[0xD2, 0x00]).unwrap();
        assert_eq!(stream.first(0xD2).unwrap().payload(), &[] as &[u8]);
        assert_eq!(stream.serialize(), vec![0xD2, 0x00]);
    }

    #[test]
    fn test_truncated_payload() {
        let err = EventStream::parse(&[0xD2, 0x05, 1, 2]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));

        let err = EventStream::parse(&[0x80, 1, 2]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));

        let err = EventStream::parse(&[0xD2, 0x80]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn test_max_event_len() {
        let options = ParseOptions::new().with_max_event_len(2);
        let err = EventStream::parse_with(&[0xD2, 0x03, 1, 2, 3], &options).unwrap_err();
        assert!(matches!(err, DecodeError::LengthExceedsLimit { max: 2, .. }));
    }

    #[test]
    fn test_version_detection() {
        let stream = EventStream::parse(&[0x05, 0x01]).unwrap();
        assert_eq!(stream.text_encoding(), Err(DecodeError::VersionNotDetected));

        let options = ParseOptions::new().require_version();
        let err = EventStream::parse_with(&[0x05, 0x01], &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionNotDetected);

        let mut old = vec![VERSION_EVENT, 6];
        old.extend_from_slice(b"9.1.0\0");
        let stream = EventStream::parse(&old).unwrap();
        assert_eq!(stream.text_encoding().unwrap(), TextEncoding::Narrow);

        let options = ParseOptions::new().with_text_encoding(TextEncoding::Wide);
        let stream = EventStream::parse_with(&old, &options).unwrap();
        assert_eq!(stream.text_encoding().unwrap(), TextEncoding::Wide);
    }

    #[test]
    fn test_replace_payload_checks_width() {
        let mut stream = EventStream::parse(&sample()).unwrap();
        let before = stream.serialize();
        let err = stream.replace_payload(2, vec![1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEventChunkSize);
        assert_eq!(stream.serialize(), before);
    }

    #[test]
    fn test_replace_payload_missing_position() {
        let mut stream = EventStream::parse(&sample()).unwrap();
        let before = stream.serialize();
        let len = stream.len();
        let err = stream.replace_payload(len, vec![1]).unwrap_err();
        assert_eq!(err, EventError::NotFound { pos: len, len });
        assert_eq!(err.kind(), ErrorKind::EventNotFound);
        assert_eq!(stream.serialize(), before);
    }

    #[test]
    fn test_padded_length_prefix_rejected() {
        let err = EventStream::parse(&[0xD2, 0x80, 0x00]).unwrap_err();
        assert_eq!(err, DecodeError::NonMinimalVarint);
        assert_eq!(err.kind(), ErrorKind::MalformedEncoding);

        assert_eq!(EventStream::parse(&[0xD2, 0x00]).unwrap().serialize(), vec![0xD2, 0x00]);
    }

    fn arb_event() -> impl Strategy<Value = Vec<u8>> {
        (any::<u8>(), proptest::collection::vec(any::<u8>(), 0..300)).prop_map(|(id, blob)| {
            let mut bytes = vec![id];
            match SizeKind::of(id).width() {
                Some(width) => bytes.extend(blob.iter().copied().chain(std::iter::repeat(0)).take(width.len())),
                None => {
                    let mut writer = Writer::new();
                    writer.write_bytes_prefixed(&blob).unwrap();
                    bytes.extend_from_slice(writer.as_bytes());
                }
            }
            bytes
        })
    }

    proptest! {
        #[test]
        fn prop_roundtrip(events in proptest::collection::vec(arb_event(), 0..40)) {
            let bytes: Vec<u8> = events.concat();
            let stream = EventStream::parse(&bytes).unwrap();
            prop_assert_eq!(stream.len(), events.len());
            prop_assert_eq!(stream.serialize(), bytes);
        }

        #[test]
        fn prop_padded_prefix_never_parses(
            id in 192u8..=255,
            blob in proptest::collection::vec(any::<u8>(), 0..300),
        ) {
            let mut prefix = Writer::new();
            prefix.write_varint(blob.len() as u32);
            let mut padded = prefix.into_bytes();
            if let Some(last) = padded.last_mut() {
                *last |= 0x80;
            }
            padded.push(0x00);

            let mut bytes = vec![id];
            bytes.extend_from_slice(&padded);
            bytes.extend_from_slice(&blob);
            let err = EventStream::parse(&bytes).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::MalformedEncoding);
        }
    }
}

//! Property descriptors: typed, reusable bindings from a model attribute to
//! the bytes that back it.
//!
//! A descriptor is declared once, as a `static`, and used by every instance
//! of a model type. It resolves its backing at call time:
//!
//! - Multi-event models: the candidate IDs are scanned in declaration order
//!   and the first event of the first present ID is used.
//! - Single-event models: the model's event.
//! - Item models: the record inside the parent event.
//!
//! Reads never fail. Missing or malformed data yields the declared default
//! (`None` if there is none). Writes fail with
//! [`PropertyError::CannotBeSet`] when nothing backs the property; they
//! never add events to the stream.

use std::marker::PhantomData;

use tracing::warn;

use crate::codec::stream::EventStream;
use crate::codec::structs::{
    set_flag, write_field, Field, FieldScalar, FieldValue, StructLayout, StructView,
};
use crate::error::{EncodeError, PropertyError, StructError};
use crate::model::base::{build, Backing, Model, ModelBase};
use crate::model::event::Event;
use crate::model::value::{EventValue, PropertyValue};

/// Get/set access to one typed attribute of a model.
pub trait Property {
    type Value;

    /// Reads the value, falling back to the default.
    fn get(&self, model: &Model, stream: &EventStream) -> Option<Self::Value>;

    /// Writes the value. On error, neither the model nor the stream changes.
    fn set(
        &self,
        model: &mut Model,
        stream: &mut EventStream,
        value: Self::Value,
    ) -> Result<(), PropertyError>;
}

/// A resolved location: the event at `pos`, record starting at `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub pos: usize,
    pub base: usize,
}

/// Applies the first-present-candidate rule to `model`'s backing.
pub fn resolve(model: &Model, ids: &[u8]) -> Option<Target> {
    match model.backing() {
        Backing::SingleEvent(pos) => Some(Target { pos: *pos, base: 0 }),
        Backing::Item(item) => Some(Target {
            pos: item.event,
            base: item.base(),
        }),
        Backing::MultiEvent(index) => ids
            .iter()
            .find_map(|&id| index.first(id))
            .map(|pos| Target { pos, base: 0 }),
    }
}

fn target_event<'s>(model: &Model, stream: &'s EventStream, ids: &[u8]) -> Option<(Target, &'s Event)> {
    let target = resolve(model, ids)?;
    stream.get(target.pos).map(|event| (target, event))
}

fn unset(ids: &[u8]) -> PropertyError {
    PropertyError::CannotBeSet { ids: ids.to_vec() }
}

// =============================================================================
// WHOLE-EVENT BINDING
// =============================================================================

/// The entire payload of an event, read through its typed accessor.
///
/// Records have no whole event of their own, so on item models this
/// binding never resolves.
#[derive(Debug)]
pub struct EventProp<T> {
    ids: &'static [u8],
    default: Option<T>,
}

impl<T> EventProp<T> {
    pub const fn new(ids: &'static [u8]) -> Self {
        Self { ids, default: None }
    }

    pub const fn with_default(ids: &'static [u8], default: T) -> Self {
        Self {
            ids,
            default: Some(default),
        }
    }

    pub fn ids(&self) -> &'static [u8] {
        self.ids
    }

    fn locate<'s>(&self, model: &Model, stream: &'s EventStream) -> Option<(Target, &'s Event)> {
        if matches!(model.backing(), Backing::Item(_)) {
            return None;
        }
        target_event(model, stream, self.ids)
    }
}

impl<T: EventValue + Clone> Property for EventProp<T> {
    type Value = T;

    fn get(&self, model: &Model, stream: &EventStream) -> Option<T> {
        let Some((_, event)) = self.locate(model, stream) else {
            return self.default.clone();
        };
        match T::read(event, stream.text_encoding().ok()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(model = model.name(), id = event.id(), error = %e, "unreadable event, using default");
                self.default.clone()
            }
        }
    }

    fn set(&self, model: &mut Model, stream: &mut EventStream, value: T) -> Result<(), PropertyError> {
        let (target, event) = self.locate(model, stream).ok_or_else(|| unset(self.ids))?;
        let payload = value.encode(event, stream.text_encoding().ok())?;
        stream.replace_payload(target.pos, payload)?;
        Ok(())
    }
}

// =============================================================================
// STRUCT FIELD BINDING
// =============================================================================

/// One field of a struct record.
///
/// Integer fields may declare an inclusive range; writes outside it fail
/// with [`StructError::Range`]. Stored values are read back as they are.
#[derive(Debug)]
pub struct StructProp<T> {
    ids: &'static [u8],
    layout: &'static StructLayout,
    field: &'static Field,
    default: Option<T>,
    range: Option<(i64, i64)>,
}

impl<T> StructProp<T> {
    pub const fn new(ids: &'static [u8], layout: &'static StructLayout, field: &'static Field) -> Self {
        Self {
            ids,
            layout,
            field,
            default: None,
            range: None,
        }
    }

    pub const fn with_default(
        ids: &'static [u8],
        layout: &'static StructLayout,
        field: &'static Field,
        default: T,
    ) -> Self {
        Self {
            ids,
            layout,
            field,
            default: Some(default),
            range: None,
        }
    }

    /// A field whose writes are restricted to `min..=max`.
    pub const fn ranged(
        ids: &'static [u8],
        layout: &'static StructLayout,
        field: &'static Field,
        min: i64,
        max: i64,
    ) -> Self {
        Self {
            ids,
            layout,
            field,
            default: None,
            range: Some((min, max)),
        }
    }

    pub fn field(&self) -> &'static Field {
        self.field
    }

    fn check_range(&self, value: FieldValue) -> Result<(), StructError> {
        let (Some((min, max)), Some(value)) = (self.range, value.as_i64()) else {
            return Ok(());
        };
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(StructError::Range {
                field: self.field.name,
                source: EncodeError::OutOfBounds { value, min, max },
            })
        }
    }
}

impl<T: FieldScalar + Clone> Property for StructProp<T> {
    type Value = T;

    fn get(&self, model: &Model, stream: &EventStream) -> Option<T> {
        let Some((target, event)) = target_event(model, stream, self.ids) else {
            return self.default.clone();
        };
        match StructView::at(self.layout, event.payload(), target.base).get::<T>(self.field) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(model = model.name(), field = self.field.name, error = %e, "unreadable field, using default");
                self.default.clone()
            }
        }
    }

    fn set(&self, model: &mut Model, stream: &mut EventStream, value: T) -> Result<(), PropertyError> {
        let (target, event) = target_event(model, stream, self.ids).ok_or_else(|| unset(self.ids))?;
        let value = value.to_field(self.field)?;
        self.check_range(value)?;
        let payload = write_field(self.layout, event.payload(), target.base, self.field, value)?;
        stream.replace_payload(target.pos, payload)?;
        Ok(())
    }
}

// =============================================================================
// FLAG BINDING
// =============================================================================

/// Where a flag's bits live.
#[derive(Debug, Clone, Copy)]
pub enum FlagSource {
    /// The integer payload of a fixed-size event.
    Payload,
    /// An integer field of a struct record.
    Field(&'static StructLayout, &'static Field),
}

/// One or more bits exposed as a boolean.
///
/// The flag reads true when every bit of `mask` is set. With `inverted`,
/// the stored bits mean the opposite of the exposed value.
#[derive(Debug)]
pub struct FlagProp {
    ids: &'static [u8],
    source: FlagSource,
    mask: u64,
    inverted: bool,
    default: Option<bool>,
}

impl FlagProp {
    pub const fn new(ids: &'static [u8], source: FlagSource, mask: u64) -> Self {
        Self {
            ids,
            source,
            mask,
            inverted: false,
            default: None,
        }
    }

    pub const fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub const fn with_default(mut self, default: bool) -> Self {
        self.default = Some(default);
        self
    }

    fn stored(&self, event: &Event, base: usize) -> Result<bool, PropertyError> {
        match self.source {
            FlagSource::Payload => Ok(event.as_uint()? & self.mask == self.mask),
            FlagSource::Field(layout, field) => {
                Ok(StructView::at(layout, event.payload(), base).has_flag(field, self.mask)?)
            }
        }
    }
}

impl Property for FlagProp {
    type Value = bool;

    fn get(&self, model: &Model, stream: &EventStream) -> Option<bool> {
        let Some((target, event)) = target_event(model, stream, self.ids) else {
            return self.default;
        };
        match self.stored(event, target.base) {
            Ok(bit) => Some(bit != self.inverted),
            Err(e) => {
                warn!(model = model.name(), mask = self.mask, error = %e, "unreadable flag, using default");
                self.default
            }
        }
    }

    fn set(&self, model: &mut Model, stream: &mut EventStream, value: bool) -> Result<(), PropertyError> {
        let (target, event) = target_event(model, stream, self.ids).ok_or_else(|| unset(self.ids))?;
        let on = value != self.inverted;
        let payload = match self.source {
            FlagSource::Payload => {
                let bits = event.as_uint()?;
                event.encode_uint(if on { bits | self.mask } else { bits & !self.mask })?
            }
            FlagSource::Field(layout, field) => {
                set_flag(layout, event.payload(), target.base, field, self.mask, on)?
            }
        };
        stream.replace_payload(target.pos, payload)?;
        Ok(())
    }
}

// =============================================================================
// OUT-OF-BAND BINDING
// =============================================================================

/// A value carried on the model rather than in any event.
///
/// The slot must be registered when the model is created
/// ([`Model::with_kw`]); reading or writing an unregistered slot fails with
/// [`PropertyError::KeyNotRegistered`].
#[derive(Debug)]
pub struct KwProp<T> {
    key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> KwProp<T> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }
}

impl<T> KwProp<T>
where
    T: TryFrom<PropertyValue, Error = PropertyError>,
{
    /// Reads the slot, failing if it was never registered.
    pub fn try_get(&self, model: &Model) -> Result<T, PropertyError> {
        let value = model.kw(self.key).ok_or_else(|| PropertyError::KeyNotRegistered {
            key: self.key.to_string(),
        })?;
        T::try_from(value.clone())
    }
}

impl<T> Property for KwProp<T>
where
    T: Into<PropertyValue> + TryFrom<PropertyValue, Error = PropertyError>,
{
    type Value = T;

    fn get(&self, model: &Model, _: &EventStream) -> Option<T> {
        self.try_get(model).ok()
    }

    fn set(&self, model: &mut Model, _: &mut EventStream, value: T) -> Result<(), PropertyError> {
        model.set_kw(self.key, value.into())
    }
}

// =============================================================================
// NESTED MODEL BINDING
// =============================================================================

/// A read-only sub-model over the owning model's events with the given IDs.
///
/// The sub-model is rebuilt on every read, so it always reflects the
/// current stream.
#[derive(Debug)]
pub struct NestedProp<M> {
    ids: &'static [u8],
    make: fn() -> M,
}

impl<M: ModelBase> NestedProp<M> {
    pub const fn new(ids: &'static [u8], make: fn() -> M) -> Self {
        Self { ids, make }
    }

    /// Builds the sub-model. `None` if the owner has none of the IDs.
    pub fn get(&self, model: &Model, stream: &EventStream) -> Option<M> {
        let mut positions: Vec<usize> = match model.backing() {
            Backing::MultiEvent(index) => self
                .ids
                .iter()
                .flat_map(|&id| index.of(id))
                .copied()
                .collect(),
            Backing::SingleEvent(_) | Backing::Item(_) => return None,
        };
        positions.sort_unstable();
        positions.dedup();
        if positions.is_empty() {
            return None;
        }
        match build((self.make)(), stream, positions) {
            Ok(nested) => Some(nested),
            Err(e) => {
                warn!(model = model.name(), error = %e, "nested model failed to build");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::structs::FieldType;
    use crate::codec::text::TextEncoding;
    use crate::error::ErrorKind;
    use crate::model::base::ItemRef;

    static FIELDS: [Field; 3] = [
        Field::new("flags", 0, FieldType::U32),
        Field::new("level", 4, FieldType::I16),
        Field::new("gain", 8, FieldType::F32),
    ];
    static LAYOUT: StructLayout = StructLayout::new("Sample", 12, &FIELDS);

    static PRIMARY: EventProp<u16> = EventProp::new(&[80, 81]);
    static WITH_DEFAULT: EventProp<u16> = EventProp::with_default(&[82], 42);
    static NAME: EventProp<String> = EventProp::new(&[204]);
    static LEVEL: StructProp<i16> = StructProp::new(&[236], &LAYOUT, &FIELDS[1]);
    static GAIN: StructProp<f32> = StructProp::with_default(&[236], &LAYOUT, &FIELDS[2], 1.0);
    static ENABLED: FlagProp =
        FlagProp::new(&[236], FlagSource::Field(&LAYOUT, &FIELDS[0]), 1 << 3).inverted();
    static MUTED: FlagProp = FlagProp::new(&[20], FlagSource::Payload, 1);
    static INDEX: KwProp<u16> = KwProp::new("index");

    fn stream_of(events: Vec<Event>) -> EventStream {
        let mut stream = EventStream::with_text_encoding(TextEncoding::Wide);
        for event in events {
            stream.append(event);
        }
        stream
    }

    fn attach(stream: &EventStream) -> Model {
        build(Model::new("Sample"), stream, 0..stream.len()).unwrap()
    }

    fn struct_payload() -> Vec<u8> {
        let mut payload = vec![0u8; 14];
        payload[0] = 0b1000;
        payload[4..6].copy_from_slice(&(-3i16).to_le_bytes());
        payload[8..12].copy_from_slice(&0.5f32.to_le_bytes());
        payload[12] = 0xEE;
        payload[13] = 0xFF;
        payload
    }

    #[test]
    fn test_first_match_resolution() {
        let stream = stream_of(vec![Event::word(81, 2).unwrap()]);
        let model = attach(&stream);
        assert_eq!(PRIMARY.get(&model, &stream), Some(2));

        let stream = stream_of(vec![
            Event::word(81, 2).unwrap(),
            Event::word(80, 1).unwrap(),
            Event::word(80, 9).unwrap(),
        ]);
        let model = attach(&stream);
        assert_eq!(PRIMARY.get(&model, &stream), Some(1));
    }

    #[test]
    fn test_defaults() {
        let stream = stream_of(vec![Event::byte(1, 0).unwrap()]);
        let model = attach(&stream);
        assert_eq!(PRIMARY.get(&model, &stream), None);
        assert_eq!(WITH_DEFAULT.get(&model, &stream), Some(42));
        assert_eq!(GAIN.get(&model, &stream), Some(1.0));
    }

    #[test]
    fn test_write_without_backing_leaves_stream_unchanged() {
        let mut stream = stream_of(vec![Event::byte(1, 0).unwrap()]);
        let mut model = attach(&stream);
        let before = stream.serialize();

        let err = WITH_DEFAULT.set(&mut model, &mut stream, 7).unwrap_err();
        assert_eq!(err, PropertyError::CannotBeSet { ids: vec![82] });
        assert_eq!(err.kind(), ErrorKind::PropertyCannotBeSet);
        assert_eq!(stream.serialize(), before);
    }

    #[test]
    fn test_event_write() {
        let mut stream = stream_of(vec![Event::word(80, 1).unwrap(), Event::word(80, 5).unwrap()]);
        let mut model = attach(&stream);
        PRIMARY.set(&mut model, &mut stream, 300).unwrap();
        assert_eq!(stream.serialize(), vec![80, 0x2C, 0x01, 80, 5, 0]);
    }

    #[test]
    fn test_text_write() {
        let mut stream = stream_of(vec![Event::text(204, "Kick", TextEncoding::Wide).unwrap()]);
        let mut model = attach(&stream);
        assert_eq!(NAME.get(&model, &stream).as_deref(), Some("Kick"));
        NAME.set(&mut model, &mut stream, "Snare".into()).unwrap();
        assert_eq!(NAME.get(&model, &stream).as_deref(), Some("Snare"));
    }

    #[test]
    fn test_struct_partial_write() {
        let mut stream = stream_of(vec![Event::data(236, struct_payload()).unwrap()]);
        let mut model = attach(&stream);
        assert_eq!(LEVEL.get(&model, &stream), Some(-3));
        assert_eq!(GAIN.get(&model, &stream), Some(0.5));

        LEVEL.set(&mut model, &mut stream, 1000).unwrap();
        let after = stream.get(0).unwrap().payload().to_vec();
        let before = struct_payload();
        assert_eq!(&after[4..6], &1000i16.to_le_bytes());
        assert_eq!(&after[..4], &before[..4]);
        assert_eq!(&after[6..], &before[6..]);
    }

    #[test]
    fn test_struct_range() {
        static BOUNDED: StructProp<i16> = StructProp::ranged(&[236], &LAYOUT, &FIELDS[1], -10, 10);

        let mut stream = stream_of(vec![Event::data(236, struct_payload()).unwrap()]);
        let mut model = attach(&stream);
        BOUNDED.set(&mut model, &mut stream, 10).unwrap();
        assert_eq!(BOUNDED.get(&model, &stream), Some(10));

        let before = stream.serialize();
        let err = BOUNDED.set(&mut model, &mut stream, 11).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(
            err,
            PropertyError::Struct(StructError::Range {
                field: "level",
                source: EncodeError::OutOfBounds { value: 11, min: -10, max: 10 },
            })
        );
        assert_eq!(stream.serialize(), before);

        // Values already stored out of range still read back
        LEVEL.set(&mut model, &mut stream, 1000).unwrap();
        assert_eq!(BOUNDED.get(&model, &stream), Some(1000));
    }

    #[test]
    fn test_struct_short_payload_falls_back() {
        let mut stream = stream_of(vec![Event::data(236, vec![0; 6]).unwrap()]);
        let mut model = attach(&stream);
        assert_eq!(LEVEL.get(&model, &stream), Some(0));
        assert_eq!(GAIN.get(&model, &stream), Some(1.0));

        let err = GAIN.set(&mut model, &mut stream, 2.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
        assert_eq!(stream.get(0).unwrap().payload(), &[0; 6]);
    }

    #[test]
    fn test_flag_inversion() {
        let mut stream = stream_of(vec![Event::data(236, struct_payload()).unwrap()]);
        let mut model = attach(&stream);
        // Bit 3 is set, so the inverted flag reads false
        assert_eq!(ENABLED.get(&model, &stream), Some(false));

        ENABLED.set(&mut model, &mut stream, true).unwrap();
        assert_eq!(stream.get(0).unwrap().payload()[0], 0);
        assert_eq!(ENABLED.get(&model, &stream), Some(true));
    }

    #[test]
    fn test_payload_flag() {
        let mut stream = stream_of(vec![Event::byte(20, 0b10).unwrap()]);
        let mut model = attach(&stream);
        assert_eq!(MUTED.get(&model, &stream), Some(false));
        MUTED.set(&mut model, &mut stream, true).unwrap();
        assert_eq!(stream.get(0).unwrap().payload(), &[0b11]);
    }

    #[test]
    fn test_item_backing() {
        let mut payload = struct_payload()[..12].to_vec();
        payload.extend_from_slice(&[0; 4]);
        payload.extend_from_slice(&7i16.to_le_bytes());
        payload.extend_from_slice(&[0; 6]);
        let mut stream = stream_of(vec![Event::data(236, payload).unwrap()]);

        let mut second = Model::item(
            "Item",
            ItemRef {
                event: 0,
                index: 1,
                layout: &LAYOUT,
            },
        );
        assert_eq!(LEVEL.get(&second, &stream), Some(7));
        LEVEL.set(&mut second, &mut stream, 8).unwrap();
        assert_eq!(&stream.get(0).unwrap().payload()[16..18], &8i16.to_le_bytes());
        assert_eq!(&stream.get(0).unwrap().payload()[4..6], &(-3i16).to_le_bytes());

        // Whole-event bindings have nothing to resolve on a record
        assert_eq!(PRIMARY.get(&second, &stream), None);
    }

    #[test]
    fn test_kw_binding() {
        let mut stream = stream_of(Vec::new());
        let mut model = Model::new("Sample").with_kw("index", 3u16);
        assert_eq!(INDEX.try_get(&model).unwrap(), 3);
        INDEX.set(&mut model, &mut stream, 9).unwrap();
        assert_eq!(INDEX.get(&model, &stream), Some(9));

        let mut bare = Model::new("Sample");
        assert_eq!(INDEX.try_get(&bare).unwrap_err().kind(), ErrorKind::KeyNotRegistered);
        assert_eq!(
            INDEX.set(&mut bare, &mut stream, 1).unwrap_err().kind(),
            ErrorKind::KeyNotRegistered
        );
    }

    #[test]
    fn test_nested_binding() {
        static NESTED: NestedProp<Model> = NestedProp::new(&[80, 204], || Model::new("Nested"));

        let stream = stream_of(vec![
            Event::word(80, 1).unwrap(),
            Event::byte(1, 0).unwrap(),
            Event::text(204, "x", TextEncoding::Wide).unwrap(),
        ]);
        let model = attach(&stream);
        let nested = NESTED.get(&model, &stream).unwrap();
        assert!(nested.is_ready());
        assert_eq!(nested.positions(), &[0, 2]);

        let other = stream_of(vec![Event::byte(1, 0).unwrap()]);
        let empty = attach(&other);
        assert!(NESTED.get(&empty, &other).is_none());
    }

    #[test]
    fn test_nested_binding_uses_owned_events_only() {
        static NESTED: NestedProp<Model> = NestedProp::new(&[204, 80], || Model::new("Nested"));

        let stream = stream_of(vec![
            Event::word(80, 1).unwrap(),
            Event::byte(1, 0).unwrap(),
            Event::text(204, "x", TextEncoding::Wide).unwrap(),
        ]);
        // Owns only the byte event at position 1
        let other = stream_of(vec![Event::word(80, 1).unwrap(), Event::byte(1, 0).unwrap()]);
        let mut partial = Model::new("Sample");
        partial.feed(1, other.get(1).unwrap()).unwrap();
        partial.finish();
        assert!(NESTED.get(&partial, &stream).is_none());

        // Candidate order does not change the stream order of the sub-model
        let model = attach(&stream);
        assert_eq!(NESTED.get(&model, &stream).unwrap().positions(), &[0, 2]);
    }
}

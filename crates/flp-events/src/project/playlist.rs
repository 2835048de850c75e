//! Playlist: clips placed on arrangement tracks.
//!
//! All clips of an arrangement live in one data event as back-to-back
//! 32-byte records. Each [`PlaylistItem`] is a view of one record.

use lazy_static::lazy_static;

use crate::codec::stream::EventStream;
use crate::codec::structs::{Field, FieldType, StructLayout};
use crate::error::PropertyError;
use crate::limits::DATA;
use crate::model::base::{ItemRef, Model, ModelBase};
use crate::model::descriptor::{Property, StructProp};
use crate::model::registry::Registry;

/// Data event holding the clip records.
pub const PLAYLIST_EVENT: u8 = DATA + 25;

/// Track numbers are stored counting down from this value.
pub const MAX_TRACK_INDEX: u16 = 499;

static ITEM_FIELDS: [Field; 9] = [
    Field::new("position", 0, FieldType::U32),
    Field::new("pattern_base", 4, FieldType::U16),
    Field::new("item_index", 6, FieldType::U16),
    Field::new("length", 8, FieldType::U32),
    Field::new("track_rvidx", 12, FieldType::U16),
    Field::new("group", 14, FieldType::U16),
    Field::new("item_flags", 18, FieldType::U16),
    Field::new("start_offset", 24, FieldType::F32),
    Field::new("end_offset", 28, FieldType::F32),
];

/// Layout of one clip record.
pub static ITEM_LAYOUT: StructLayout = StructLayout::new("PlaylistItem", 32, &ITEM_FIELDS);

const IDS: &[u8] = &[PLAYLIST_EVENT];

static POSITION: StructProp<u32> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[0]);
static PATTERN_BASE: StructProp<u16> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[1]);
static ITEM_INDEX: StructProp<u16> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[2]);
static LENGTH: StructProp<u32> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[3]);
static TRACK_RVIDX: StructProp<u16> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[4]);
static GROUP: StructProp<u16> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[5]);
static ITEM_FLAGS: StructProp<u16> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[6]);
static START_OFFSET: StructProp<f32> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[7]);
static END_OFFSET: StructProp<f32> = StructProp::new(IDS, &ITEM_LAYOUT, &ITEM_FIELDS[8]);

lazy_static! {
    pub static ref PLAYLIST_ITEM_PROPERTIES: Registry = Registry::new("PlaylistItem")
        .with("position", &POSITION)
        .with("pattern_base", &PATTERN_BASE)
        .with("item_index", &ITEM_INDEX)
        .with("length", &LENGTH)
        .with("track_rvidx", &TRACK_RVIDX)
        .with("group", &GROUP)
        .with("item_flags", &ITEM_FLAGS)
        .with("start_offset", &START_OFFSET)
        .with("end_offset", &END_OFFSET);
}

/// What a clip plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSource {
    Channel(u16),
    Pattern(u16),
}

/// All clip records of one arrangement.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    model: Model,
}

impl Playlist {
    pub fn new() -> Self {
        Self {
            model: Model::new("Playlist"),
        }
    }

    /// One view per whole record, in storage order.
    ///
    /// A trailing partial record is left alone.
    pub fn items(&self, stream: &EventStream) -> Vec<PlaylistItem> {
        let mut items = Vec::new();
        for &pos in self.model.positions() {
            let Some(event) = stream.get(pos) else { continue };
            if event.id() != PLAYLIST_EVENT {
                continue;
            }
            for index in 0..ITEM_LAYOUT.count(event.payload().len()) {
                items.push(PlaylistItem::new(ItemRef {
                    event: pos,
                    index,
                    layout: &ITEM_LAYOUT,
                }));
            }
        }
        items
    }

    pub fn len(&self, stream: &EventStream) -> usize {
        self.items(stream).len()
    }
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBase for Playlist {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }
}

/// One clip.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItem {
    model: Model,
}

impl PlaylistItem {
    pub fn new(item: ItemRef) -> Self {
        Self {
            model: Model::item("PlaylistItem", item),
        }
    }

    /// Start of the clip, in ticks.
    pub fn position(&self, stream: &EventStream) -> Option<u32> {
        POSITION.get(&self.model, stream)
    }

    pub fn set_position(&mut self, stream: &mut EventStream, value: u32) -> Result<(), PropertyError> {
        POSITION.set(&mut self.model, stream, value)
    }

    /// Length of the clip, in ticks.
    pub fn length(&self, stream: &EventStream) -> Option<u32> {
        LENGTH.get(&self.model, stream)
    }

    pub fn set_length(&mut self, stream: &mut EventStream, value: u32) -> Result<(), PropertyError> {
        LENGTH.set(&mut self.model, stream, value)
    }

    pub fn group(&self, stream: &EventStream) -> Option<u16> {
        GROUP.get(&self.model, stream)
    }

    pub fn flags(&self, stream: &EventStream) -> Option<u16> {
        ITEM_FLAGS.get(&self.model, stream)
    }

    pub fn start_offset(&self, stream: &EventStream) -> Option<f32> {
        START_OFFSET.get(&self.model, stream)
    }

    pub fn end_offset(&self, stream: &EventStream) -> Option<f32> {
        END_OFFSET.get(&self.model, stream)
    }

    /// Zero-based track number.
    pub fn track(&self, stream: &EventStream) -> Option<u16> {
        TRACK_RVIDX
            .get(&self.model, stream)
            .and_then(|rv| MAX_TRACK_INDEX.checked_sub(rv))
    }

    /// Moves the clip to another track.
    pub fn set_track(&mut self, stream: &mut EventStream, track: u16) -> Result<(), PropertyError> {
        let rv = MAX_TRACK_INDEX.saturating_sub(track);
        TRACK_RVIDX.set(&mut self.model, stream, rv)
    }

    /// Indices above `pattern_base` refer to patterns, the rest to channels.
    pub fn source(&self, stream: &EventStream) -> Option<ClipSource> {
        let base = PATTERN_BASE.get(&self.model, stream)?;
        let index = ITEM_INDEX.get(&self.model, stream)?;
        Some(if index > base {
            ClipSource::Pattern(index - base)
        } else {
            ClipSource::Channel(index)
        })
    }
}

impl ModelBase for PlaylistItem {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn properties(&self) -> Option<&'static Registry> {
        Some(&PLAYLIST_ITEM_PROPERTIES)
    }
}

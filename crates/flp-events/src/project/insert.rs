//! Mixer inserts and their effect slots.
//!
//! An insert owns a run of events. Slot events are handed to
//! [`InsertSlot`] children: a slot opens at its first event and closes at
//! its index event. Everything else stays with the insert, including
//! events this crate has no accessor for, so saving reproduces them.

use bitflags::bitflags;
use lazy_static::lazy_static;
use tracing::{trace, warn};

use crate::codec::stream::EventStream;
use crate::codec::structs::{Field, FieldType, StructLayout};
use crate::error::{ModelError, PropertyError};
use crate::limits::{DATA, DWORD, TEXT, WORD};
use crate::model::base::{Model, ModelBase, ModelList};
use crate::model::descriptor::{EventProp, FlagProp, FlagSource, KwProp, Property, StructProp};
use crate::model::event::{Color, Event};
use crate::model::registry::Registry;

pub const ICON_EVENT: u8 = WORD + 31;
pub const COLOR_EVENT: u8 = DWORD + 21;
pub const NAME_EVENT: u8 = TEXT + 12;
pub const FLAGS_EVENT: u8 = DATA + 28;

pub const SLOT_COLOR_EVENT: u8 = DWORD;
pub const SLOT_ICON_EVENT: u8 = DWORD + 27;
pub const SLOT_DEFAULT_NAME_EVENT: u8 = TEXT + 9;
pub const SLOT_PLUGIN_NEW_EVENT: u8 = DATA + 4;
pub const SLOT_PLUGIN_EVENT: u8 = DATA + 5;
/// Last event of every slot, used or not.
pub const SLOT_INDEX_EVENT: u8 = WORD + 34;

/// Events that belong to a slot rather than the insert.
pub const SLOT_EVENTS: &[u8] = &[
    SLOT_COLOR_EVENT,
    SLOT_ICON_EVENT,
    SLOT_DEFAULT_NAME_EVENT,
    SLOT_PLUGIN_NEW_EVENT,
    SLOT_PLUGIN_EVENT,
    SLOT_INDEX_EVENT,
];

/// Slots per insert in current versions.
pub const MAX_SLOTS: usize = 10;

bitflags! {
    /// Bits of the insert flags field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InsertFlags: u32 {
        const POLARITY_REVERSED = 1 << 0;
        const SWAP_LEFT_RIGHT = 1 << 1;
        const ENABLE_EFFECTS = 1 << 2;
        const ENABLED = 1 << 3;
        const DISABLE_THREADED_PROCESSING = 1 << 4;
        const DOCK_MIDDLE = 1 << 6;
        const DOCK_RIGHT = 1 << 7;
        const SEPARATOR_SHOWN = 1 << 10;
        const LOCKED = 1 << 11;
        const SOLO = 1 << 12;
        const AUDIO_TRACK = 1 << 15;
    }
}

static FLAGS_FIELDS: [Field; 1] = [Field::new("flags", 4, FieldType::U32)];
/// Layout of the insert flags event; the words around the flags are unknown.
pub static FLAGS_LAYOUT: StructLayout = StructLayout::new("InsertFlags", 12, &FLAGS_FIELDS);

macro_rules! insert_flag {
    ($flag:expr) => {
        FlagProp::new(
            &[FLAGS_EVENT],
            FlagSource::Field(&FLAGS_LAYOUT, &FLAGS_FIELDS[0]),
            $flag.bits() as u64,
        )
    };
}

static NAME: EventProp<String> = EventProp::new(&[NAME_EVENT]);
static COLOR: EventProp<Color> = EventProp::new(&[COLOR_EVENT]);
static ICON: EventProp<i16> = EventProp::new(&[ICON_EVENT]);
static FLAGS: StructProp<u32> = StructProp::new(&[FLAGS_EVENT], &FLAGS_LAYOUT, &FLAGS_FIELDS[0]);
static ENABLED: FlagProp = insert_flag!(InsertFlags::ENABLED);
static EFFECTS_ENABLED: FlagProp = insert_flag!(InsertFlags::ENABLE_EFFECTS);
static LOCKED: FlagProp = insert_flag!(InsertFlags::LOCKED);
static SOLO: FlagProp = insert_flag!(InsertFlags::SOLO);
static POLARITY_REVERSED: FlagProp = insert_flag!(InsertFlags::POLARITY_REVERSED);
static SWAP_LEFT_RIGHT: FlagProp = insert_flag!(InsertFlags::SWAP_LEFT_RIGHT);
static SEPARATOR_SHOWN: FlagProp = insert_flag!(InsertFlags::SEPARATOR_SHOWN);
static MULTITHREADED: FlagProp = insert_flag!(InsertFlags::DISABLE_THREADED_PROCESSING).inverted();
static INDEX: KwProp<u16> = KwProp::new("index");

static SLOT_COLOR: EventProp<Color> = EventProp::new(&[SLOT_COLOR_EVENT]);
static SLOT_ICON: EventProp<u32> = EventProp::new(&[SLOT_ICON_EVENT]);
static SLOT_DEFAULT_NAME: EventProp<String> = EventProp::new(&[SLOT_DEFAULT_NAME_EVENT]);
static SLOT_INDEX: EventProp<u16> = EventProp::new(&[SLOT_INDEX_EVENT]);

lazy_static! {
    pub static ref INSERT_PROPERTIES: Registry = Registry::new("Insert")
        .with("index", &INDEX)
        .with("name", &NAME)
        .with("color", &COLOR)
        .with("icon", &ICON)
        .with("enabled", &ENABLED)
        .with("effects_enabled", &EFFECTS_ENABLED)
        .with("locked", &LOCKED)
        .with("solo", &SOLO)
        .with("polarity_reversed", &POLARITY_REVERSED)
        .with("swap_left_right", &SWAP_LEFT_RIGHT)
        .with("separator_shown", &SEPARATOR_SHOWN)
        .with("multithreaded", &MULTITHREADED);

    pub static ref INSERT_SLOT_PROPERTIES: Registry = Registry::new("InsertSlot")
        .with("color", &SLOT_COLOR)
        .with("icon", &SLOT_ICON)
        .with("default_name", &SLOT_DEFAULT_NAME)
        .with("index", &SLOT_INDEX);
}

/// One effect slot of an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertSlot {
    model: Model,
}

impl InsertSlot {
    pub fn new() -> Self {
        Self {
            model: Model::new("InsertSlot"),
        }
    }

    pub fn color(&self, stream: &EventStream) -> Option<Color> {
        SLOT_COLOR.get(&self.model, stream)
    }

    pub fn set_color(&mut self, stream: &mut EventStream, color: Color) -> Result<(), PropertyError> {
        SLOT_COLOR.set(&mut self.model, stream, color)
    }

    pub fn icon(&self, stream: &EventStream) -> Option<u32> {
        SLOT_ICON.get(&self.model, stream)
    }

    /// "Fruity Wrapper" for external plugins, the plugin name otherwise.
    pub fn default_name(&self, stream: &EventStream) -> Option<String> {
        SLOT_DEFAULT_NAME.get(&self.model, stream)
    }

    pub fn index(&self, stream: &EventStream) -> Option<u16> {
        SLOT_INDEX.get(&self.model, stream)
    }

    /// Whether a plugin is loaded in the slot.
    pub fn is_used(&self) -> bool {
        self.model
            .events()
            .is_some_and(|events| events.contains(SLOT_PLUGIN_NEW_EVENT))
    }

    /// Raw plugin state, if the slot holds a plugin.
    pub fn plugin_data<'s>(&self, stream: &'s EventStream) -> Option<&'s [u8]> {
        let pos = self.model.events()?.first(SLOT_PLUGIN_EVENT)?;
        stream.get(pos).map(Event::payload)
    }

    fn is_closed(&self) -> bool {
        self.model
            .events()
            .is_some_and(|events| events.contains(SLOT_INDEX_EVENT))
    }
}

impl Default for InsertSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBase for InsertSlot {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn properties(&self) -> Option<&'static Registry> {
        Some(&INSERT_SLOT_PROPERTIES)
    }
}

/// A mixer insert.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    model: Model,
    slots: ModelList<InsertSlot>,
}

impl Insert {
    /// An empty insert. `index` is its position in the mixer, which the
    /// file does not store.
    pub fn new(index: u16) -> Self {
        Self {
            model: Model::new("Insert").with_kw("index", index),
            slots: ModelList::new("InsertSlot"),
        }
    }

    pub fn index(&self) -> Result<u16, PropertyError> {
        INDEX.try_get(&self.model)
    }

    pub fn set_index(&mut self, stream: &mut EventStream, index: u16) -> Result<(), PropertyError> {
        INDEX.set(&mut self.model, stream, index)
    }

    pub fn name(&self, stream: &EventStream) -> Option<String> {
        NAME.get(&self.model, stream)
    }

    pub fn set_name(&mut self, stream: &mut EventStream, name: &str) -> Result<(), PropertyError> {
        NAME.set(&mut self.model, stream, name.to_string())
    }

    pub fn color(&self, stream: &EventStream) -> Option<Color> {
        COLOR.get(&self.model, stream)
    }

    pub fn set_color(&mut self, stream: &mut EventStream, color: Color) -> Result<(), PropertyError> {
        COLOR.set(&mut self.model, stream, color)
    }

    pub fn icon(&self, stream: &EventStream) -> Option<i16> {
        ICON.get(&self.model, stream)
    }

    /// All flag bits, including ones without a named constant.
    pub fn flags(&self, stream: &EventStream) -> Option<InsertFlags> {
        FLAGS.get(&self.model, stream).map(InsertFlags::from_bits_retain)
    }

    pub fn enabled(&self, stream: &EventStream) -> Option<bool> {
        ENABLED.get(&self.model, stream)
    }

    pub fn set_enabled(&mut self, stream: &mut EventStream, on: bool) -> Result<(), PropertyError> {
        ENABLED.set(&mut self.model, stream, on)
    }

    pub fn locked(&self, stream: &EventStream) -> Option<bool> {
        LOCKED.get(&self.model, stream)
    }

    pub fn solo(&self, stream: &EventStream) -> Option<bool> {
        SOLO.get(&self.model, stream)
    }

    /// Stored as "threaded processing disabled".
    pub fn multithreaded(&self, stream: &EventStream) -> Option<bool> {
        MULTITHREADED.get(&self.model, stream)
    }

    pub fn set_multithreaded(&mut self, stream: &mut EventStream, on: bool) -> Result<(), PropertyError> {
        MULTITHREADED.set(&mut self.model, stream, on)
    }

    pub fn slots(&self) -> &ModelList<InsertSlot> {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut ModelList<InsertSlot> {
        &mut self.slots
    }

    /// Hands a slot event to the open slot, opening a new one if the last
    /// slot has seen its index event.
    fn dispatch_slot(&mut self, pos: usize, event: &Event) -> Result<(), ModelError> {
        if let Some(slot) = self.slots.last_mut().filter(|s| !s.is_closed()) {
            return slot.dispatch(pos, event);
        }
        if self.slots.len() >= MAX_SLOTS {
            warn!(slots = self.slots.len() + 1, "more slots than expected");
        }
        trace!(slot = self.slots.len(), "new insert slot");
        let mut slot = InsertSlot::new();
        slot.dispatch(pos, event)?;
        self.slots.push(slot);
        Ok(())
    }
}

impl ModelBase for Insert {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn dispatch(&mut self, pos: usize, event: &Event) -> Result<(), ModelError> {
        if !SLOT_EVENTS.contains(&event.id()) {
            return self.model.feed(pos, event);
        }
        if self.model.is_ready() {
            return Err(ModelError::Sealed {
                model: self.model.name(),
                id: event.id(),
            });
        }
        self.dispatch_slot(pos, event)
    }

    fn children(&self) -> Vec<&dyn ModelBase> {
        self.slots.as_children()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn ModelBase> {
        self.slots.as_children_mut()
    }

    fn properties(&self) -> Option<&'static Registry> {
        Some(&INSERT_PROPERTIES)
    }
}

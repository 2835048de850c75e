//! Arrangements: independent playlists, each with a name and an index.
//!
//! An arrangement starts at its index event; the events after it up to
//! the next arrangement belong to it.

use lazy_static::lazy_static;
use tracing::trace;

use crate::codec::stream::EventStream;
use crate::error::{ModelError, PropertyError};
use crate::limits::{TEXT, WORD};
use crate::model::base::{build, Model, ModelBase, ModelList};
use crate::model::descriptor::{EventProp, NestedProp, Property};
use crate::model::registry::Registry;
use crate::project::playlist::{Playlist, PLAYLIST_EVENT};

/// Starts an arrangement and holds its index.
pub const NEW_EVENT: u8 = WORD + 35;
/// Arrangement name.
pub const NAME_EVENT: u8 = TEXT + 49;

static INDEX: EventProp<u16> = EventProp::new(&[NEW_EVENT]);
static NAME: EventProp<String> = EventProp::new(&[NAME_EVENT]);
static PLAYLIST: NestedProp<Playlist> = NestedProp::new(&[PLAYLIST_EVENT], Playlist::new);

lazy_static! {
    pub static ref ARRANGEMENT_PROPERTIES: Registry = Registry::new("Arrangement")
        .with("index", &INDEX)
        .with("name", &NAME);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    model: Model,
}

impl Arrangement {
    pub fn new() -> Self {
        Self {
            model: Model::new("Arrangement"),
        }
    }

    pub fn index(&self, stream: &EventStream) -> Option<u16> {
        INDEX.get(&self.model, stream)
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

    /// The clips of this arrangement, rebuilt from the stream on each call.
    pub fn playlist(&self, stream: &EventStream) -> Option<Playlist> {
        PLAYLIST.get(&self.model, stream)
    }
}

impl Default for Arrangement {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBase for Arrangement {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn properties(&self) -> Option<&'static Registry> {
        Some(&ARRANGEMENT_PROPERTIES)
    }
}

/// Arrangements in the order they appear in the stream.
pub type Arrangements = ModelList<Arrangement>;

/// Splits the stream into arrangements.
///
/// Only arrangement events are taken: the index event opens a new
/// arrangement, name and playlist events go to the open one. Events before
/// the first index event are not part of any arrangement.
pub fn arrangements(stream: &EventStream) -> Result<Arrangements, ModelError> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (pos, event) in stream.iter().enumerate() {
        match event.id() {
            NEW_EVENT => groups.push(vec![pos]),
            NAME_EVENT | PLAYLIST_EVENT => match groups.last_mut() {
                Some(group) => group.push(pos),
                None => trace!(pos, id = event.id(), "arrangement event before the first arrangement"),
            },
            _ => {}
        }
    }

    let mut list = Arrangements::new("Arrangement");
    for positions in groups {
        list.push(build(Arrangement::new(), stream, positions)?);
    }
    Ok(list)
}

//! The model contract: what a model owns and how it is built and saved.
//!
//! A model never holds references into the stream. It records stream
//! positions (and, for repeated records, an offset into one event), so all
//! mutation goes through [`EventStream::replace_payload`].

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::codec::primitives::Writer;
use crate::codec::stream::{EventIndex, EventStream};
use crate::codec::structs::StructLayout;
use crate::error::{ModelError, PropertyError};
use crate::model::event::Event;
use crate::model::registry::Registry;
use crate::model::value::PropertyValue;

/// Lifecycle of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelState {
    /// Created, no events fed yet.
    Unattached,
    /// Taking events in stream order.
    Parsing,
    /// Structure fixed; only property values may change.
    Ready,
}

/// One fixed-size record inside a repeated-record data event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRef {
    /// Stream position of the data event.
    pub event: usize,
    /// Record number within the payload.
    pub index: usize,
    pub layout: &'static StructLayout,
}

impl ItemRef {
    /// Byte offset of the record within the payload.
    pub fn base(&self) -> usize {
        self.index * self.layout.size
    }
}

/// What a model is built over.
#[derive(Debug, Clone, PartialEq)]
pub enum Backing {
    /// Exactly one event, usually a struct event.
    SingleEvent(usize),
    /// A run of events, indexed by ID.
    MultiEvent(EventIndex),
    /// One record of a repeated-record event.
    Item(ItemRef),
}

/// State shared by every model: backing, lifecycle and out-of-band values.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: &'static str,
    backing: Backing,
    state: ModelState,
    kw: FxHashMap<&'static str, PropertyValue>,
}

impl Model {
    /// A multi-event model waiting for its first event.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            backing: Backing::MultiEvent(EventIndex::new()),
            state: ModelState::Unattached,
            kw: FxHashMap::default(),
        }
    }

    /// A model over the single event at `pos`. It has nothing to feed, so
    /// it starts out ready.
    pub fn single(name: &'static str, pos: usize) -> Self {
        Self {
            backing: Backing::SingleEvent(pos),
            state: ModelState::Ready,
            ..Self::new(name)
        }
    }

    /// A model over one record of a repeated-record event.
    pub fn item(name: &'static str, item: ItemRef) -> Self {
        Self {
            backing: Backing::Item(item),
            state: ModelState::Ready,
            ..Self::new(name)
        }
    }

    /// Registers an out-of-band slot with its initial value.
    pub fn with_kw(mut self, key: &'static str, value: impl Into<PropertyValue>) -> Self {
        self.kw.insert(key, value.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ModelState::Ready
    }

    /// The owned events of a multi-event model.
    pub fn events(&self) -> Option<&EventIndex> {
        match &self.backing {
            Backing::MultiEvent(index) => Some(index),
            _ => None,
        }
    }

    /// Stream positions this model writes when saved, in stream order.
    ///
    /// Item models own no whole event; their bytes are saved with the
    /// parent event.
    pub fn positions(&self) -> &[usize] {
        match &self.backing {
            Backing::SingleEvent(pos) => std::slice::from_ref(pos),
            Backing::MultiEvent(index) => index.positions(),
            Backing::Item(_) => &[],
        }
    }

    /// Takes ownership of the event at `pos`.
    pub fn feed(&mut self, pos: usize, event: &Event) -> Result<(), ModelError> {
        if self.state == ModelState::Ready {
            return Err(ModelError::Sealed {
                model: self.name,
                id: event.id(),
            });
        }
        if self.state == ModelState::Unattached {
            trace!(model = self.name, "parsing");
            self.state = ModelState::Parsing;
        }
        if let Backing::MultiEvent(index) = &mut self.backing {
            index.insert(pos, event.id());
        }
        Ok(())
    }

    /// Ends the feed. Idempotent.
    pub fn finish(&mut self) {
        if self.state != ModelState::Ready {
            trace!(model = self.name, events = self.positions().len(), "ready");
            self.state = ModelState::Ready;
        }
    }

    /// An out-of-band value, if its slot is registered.
    pub fn kw(&self, key: &str) -> Option<&PropertyValue> {
        self.kw.get(key)
    }

    /// Replaces an out-of-band value. The slot must already be registered.
    pub fn set_kw(&mut self, key: &str, value: PropertyValue) -> Result<(), PropertyError> {
        match self.kw.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(PropertyError::KeyNotRegistered {
                key: key.to_string(),
            }),
        }
    }

    /// Writes the owned events, in stream order.
    pub fn write_events(&self, stream: &EventStream, writer: &mut Writer) {
        for &pos in self.positions() {
            match stream.get(pos) {
                Some(event) => event.write_to(writer),
                None => warn!(model = self.name, pos, "owned position missing from stream"),
            }
        }
    }
}

/// Behaviour shared by concrete models.
///
/// Implementors expose their [`Model`] and route events in `dispatch`;
/// everything else has a default.
pub trait ModelBase {
    fn model(&self) -> &Model;

    fn model_mut(&mut self) -> &mut Model;

    /// Routes one event. By default the event is retained verbatim.
    fn dispatch(&mut self, pos: usize, event: &Event) -> Result<(), ModelError> {
        self.model_mut().feed(pos, event)
    }

    /// Child models, in the order they were first encountered.
    fn children(&self) -> Vec<&dyn ModelBase> {
        Vec::new()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn ModelBase> {
        Vec::new()
    }

    /// The named properties of this model type.
    fn properties(&self) -> Option<&'static Registry> {
        None
    }

    /// Ends the feed for this model and its children.
    fn finish(&mut self) {
        for child in self.children_mut() {
            child.finish();
        }
        self.model_mut().finish();
    }

    /// Writes the model's own events, then each child's.
    fn save_to(&self, stream: &EventStream, writer: &mut Writer) {
        self.model().write_events(stream, writer);
        for child in self.children() {
            child.save_to(stream, writer);
        }
    }

    /// The bytes of this model and its children.
    fn save(&self, stream: &EventStream) -> Vec<u8> {
        let mut writer = Writer::new();
        self.save_to(stream, &mut writer);
        writer.into_bytes()
    }
}

impl ModelBase for Model {
    fn model(&self) -> &Model {
        self
    }

    fn model_mut(&mut self) -> &mut Model {
        self
    }
}

/// Feeds the events at `positions` to `model` in order, then finishes it.
///
/// Positions past the end of the stream are skipped.
pub fn build<M: ModelBase>(
    mut model: M,
    stream: &EventStream,
    positions: impl IntoIterator<Item = usize>,
) -> Result<M, ModelError> {
    for pos in positions {
        let Some(event) = stream.get(pos) else {
            warn!(model = model.model().name(), pos, "position out of range");
            continue;
        };
        model.dispatch(pos, event)?;
    }
    model.finish();
    debug!(
        model = model.model().name(),
        events = model.model().positions().len(),
        children = model.children().len(),
        "model built"
    );
    Ok(model)
}

/// An ordered collection of models of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelList<M> {
    model: &'static str,
    items: Vec<M>,
}

impl<M> ModelList<M> {
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: M) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, M> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, M> {
        self.items.iter_mut()
    }

    pub fn last_mut(&mut self) -> Option<&mut M> {
        self.items.last_mut()
    }

    /// The model at `index`.
    pub fn get(&self, index: usize) -> Result<&M, ModelError> {
        self.items.get(index).ok_or(ModelError::ModelNotFound {
            model: self.model,
            index,
            len: self.items.len(),
        })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut M, ModelError> {
        let len = self.items.len();
        self.items.get_mut(index).ok_or(ModelError::ModelNotFound {
            model: self.model,
            index,
            len,
        })
    }

    /// The first model; fails if the collection is empty.
    pub fn first(&self) -> Result<&M, ModelError> {
        self.items
            .first()
            .ok_or(ModelError::NoModelsFound { model: self.model })
    }

    /// Fails if the collection is empty, otherwise returns it.
    pub fn non_empty(&self) -> Result<&Self, ModelError> {
        if self.items.is_empty() {
            Err(ModelError::NoModelsFound { model: self.model })
        } else {
            Ok(self)
        }
    }
}

impl<M: ModelBase> ModelList<M> {
    /// Child views for [`ModelBase::children`].
    pub fn as_children(&self) -> Vec<&dyn ModelBase> {
        self.items.iter().map(|m| m as &dyn ModelBase).collect()
    }

    pub fn as_children_mut(&mut self) -> Vec<&mut dyn ModelBase> {
        self.items.iter_mut().map(|m| m as &mut dyn ModelBase).collect()
    }
}

impl<'a, M> IntoIterator for &'a ModelList<M> {
    type Item = &'a M;
    type IntoIter = std::slice::Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//! Per-model-type property registries.
//!
//! Each model type builds one [`Registry`] the first time it is used (see
//! the `lazy_static!` blocks next to the models). It maps attribute names
//! to descriptors so tooling can read and write properties by name.

use crate::codec::stream::EventStream;
use crate::error::PropertyError;
use crate::model::base::Model;
use crate::model::descriptor::Property;
use crate::model::value::PropertyValue;

/// A descriptor with its value type erased to [`PropertyValue`].
pub trait DynProperty: Sync {
    fn get_value(&self, model: &Model, stream: &EventStream) -> Option<PropertyValue>;

    fn set_value(
        &self,
        model: &mut Model,
        stream: &mut EventStream,
        value: PropertyValue,
    ) -> Result<(), PropertyError>;
}

impl<P> DynProperty for P
where
    P: Property + Sync,
    P::Value: Into<PropertyValue> + TryFrom<PropertyValue, Error = PropertyError>,
{
    fn get_value(&self, model: &Model, stream: &EventStream) -> Option<PropertyValue> {
        self.get(model, stream).map(Into::into)
    }

    fn set_value(
        &self,
        model: &mut Model,
        stream: &mut EventStream,
        value: PropertyValue,
    ) -> Result<(), PropertyError> {
        let value = P::Value::try_from(value)?;
        self.set(model, stream, value)
    }
}

/// Named descriptors of one model type, in declaration order.
pub struct Registry {
    model: &'static str,
    entries: Vec<(&'static str, &'static dyn DynProperty)>,
}

impl Registry {
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            entries: Vec::new(),
        }
    }

    /// Adds a descriptor under `name`.
    pub fn with(mut self, name: &'static str, property: &'static dyn DynProperty) -> Self {
        self.entries.push((name, property));
        self
    }

    /// The model type this registry describes.
    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<&'static dyn DynProperty> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, property)| *property)
    }

    fn require(&self, name: &str) -> Result<&'static dyn DynProperty, PropertyError> {
        self.lookup(name).ok_or_else(|| PropertyError::KeyNotRegistered {
            key: format!("{}.{name}", self.model),
        })
    }

    /// Reads one property by name.
    pub fn get(
        &self,
        name: &str,
        model: &Model,
        stream: &EventStream,
    ) -> Result<Option<PropertyValue>, PropertyError> {
        Ok(self.require(name)?.get_value(model, stream))
    }

    /// Writes one property by name.
    pub fn set(
        &self,
        name: &str,
        model: &mut Model,
        stream: &mut EventStream,
        value: PropertyValue,
    ) -> Result<(), PropertyError> {
        self.require(name)?.set_value(model, stream, value)
    }

    /// Every property's current value, in declaration order.
    pub fn read_all(
        &self,
        model: &Model,
        stream: &EventStream,
    ) -> Vec<(&'static str, Option<PropertyValue>)> {
        self.entries
            .iter()
            .map(|(name, property)| (*name, property.get_value(model, stream)))
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("model", &self.model)
            .field("properties", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

//! Events and the models built over them.
//!
//! - Events (ID-tagged payloads) and their size kinds
//! - Models (owners of a subset of stream positions)
//! - Property descriptors (typed bindings to events, fields and flags)
//! - Registries (name-indexed descriptors per model type)

pub mod base;
pub mod descriptor;
pub mod event;
pub mod registry;
pub mod value;
pub mod version;

pub use base::{build, Backing, ItemRef, Model, ModelBase, ModelList, ModelState};
pub use descriptor::{EventProp, FlagProp, FlagSource, KwProp, NestedProp, Property, StructProp};
pub use event::{Color, Event, SizeKind};
pub use registry::{DynProperty, Registry};
pub use value::{EventValue, PropertyValue};
pub use version::FlVersion;

//! FL Studio project event streams: lossless parsing, typed access, and
//! byte-exact re-serialization.
//!
//! A project body is a flat sequence of ID-tagged events. This crate parses
//! that sequence into an [`EventStream`], lets models expose typed
//! properties over the events they own, and writes the stream back so that
//! untouched events reproduce their original bytes.
//!
//! # Quick Start
//!
//! ```rust
//! use flp_events::{EventStream, TextEncoding};
//!
//! // A word event (ID 0x68) holding 5, followed by an empty data event.
//! let bytes = [0x68, 0x05, 0x00, 0xD2, 0x00];
//! let mut stream = EventStream::parse(&bytes).unwrap();
//! assert_eq!(stream.get(0).unwrap().as_u16().unwrap(), 5);
//!
//! let payload = stream.get(0).unwrap().encode_uint(300).unwrap();
//! stream.replace_payload(0, payload).unwrap();
//! assert_eq!(stream.serialize(), vec![0x68, 0x2C, 0x01, 0xD2, 0x00]);
//! # let _ = TextEncoding::Wide;
//! ```
//!
//! # Modules
//!
//! - [`codec`]: primitives, text, struct records and the stream codec
//! - [`model`]: events, models, property descriptors and registries
//! - [`project`]: the file container and reference models
//! - [`error`]: error types and their [`ErrorKind`] classification
//! - [`limits`]: format constants and decoding limits
//!
//! # Concurrency
//!
//! Streams and models are plain owned data. Reads can be shared freely;
//! writes through descriptors assume a single writer per stream.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod project;

pub use codec::{EventIndex, EventStream, ParseOptions, Reader, TextEncoding, TextEncodingMode, Writer};
pub use error::{
    DecodeError, EncodeError, ErrorKind, EventError, ModelError, PropertyError, StructError,
};
pub use model::{
    build, Backing, Color, Event, FlVersion, Model, ModelBase, ModelList, ModelState,
    PropertyValue, Registry, SizeKind,
};
pub use project::ProjectFile;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

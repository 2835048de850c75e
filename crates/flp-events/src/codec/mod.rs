//! Binary encoding and decoding of the event stream.

pub mod primitives;
pub mod stream;
pub mod structs;
pub mod text;

pub use primitives::{Reader, Width, Writer, decode_varint, encode_varint};
pub use stream::{EventIndex, EventStream, ParseOptions, TextEncodingMode};
pub use structs::{Field, FieldScalar, FieldType, FieldValue, StructLayout, StructView};
pub use text::{TextEncoding, decode_text, encode_text};

//! Decoding limits and format constants.

/// Maximum encoded length of a payload-length varint (32-bit lengths).
pub const MAX_VARINT_BYTES: usize = 5;

/// Default upper bound on a single variable-size event payload.
///
/// Plugin state blobs are the largest events seen in practice and stay
/// well below this.
pub const DEFAULT_MAX_EVENT_LEN: usize = 64 * 1024 * 1024;

/// First ID of the byte-sized event range.
pub const BYTE: u8 = 0;
/// First ID of the word-sized event range.
pub const WORD: u8 = 64;
/// First ID of the dword-sized event range.
pub const DWORD: u8 = 128;
/// First ID of the text event range.
pub const TEXT: u8 = 192;
/// First ID of the data event range.
pub const DATA: u8 = 208;

/// IDs in the data range that nevertheless carry text.
pub const DATA_TEXT_EVENTS: &[u8] = &[
    TEXT + 39, // display group name
    TEXT + 47, // time marker name
    TEXT + 49, // arrangement name
    TEXT + 50, // track name
];

/// The project version string event; always narrow text.
pub const VERSION_EVENT: u8 = TEXT + 7;

/// Oldest version (major, minor) whose text events are wide.
pub const WIDE_TEXT_SINCE: (u32, u32) = (11, 5);

/// Magic of the header chunk.
pub const MAGIC_HEADER: &[u8; 4] = b"FLhd";
/// Magic of the event data chunk.
pub const MAGIC_DATA: &[u8; 4] = b"FLdt";
/// Declared size of the header chunk body.
pub const HEADER_LEN: u32 = 6;

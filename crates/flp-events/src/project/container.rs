//! The project file container: a header chunk followed by the event chunk.
//!
//! ```text
//! "FLhd" u32 len=6  i16 format  u16 channel_count  u16 ppq
//! "FLdt" u32 len    event stream[len]
//! ```
//!
//! All integers are little-endian.

use tracing::{debug, warn};

use crate::codec::primitives::{Reader, Writer};
use crate::codec::stream::{EventStream, ParseOptions};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{HEADER_LEN, MAGIC_DATA, MAGIC_HEADER};

/// What kind of document the file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    None,
    Project,
    Score,
    Automation,
    ChannelState,
    PluginState,
    GeneratorState,
    EffectState,
    InsertState,
}

impl FileFormat {
    pub fn from_raw(raw: i16) -> Option<Self> {
        Some(match raw {
            -1 => FileFormat::None,
            0x00 => FileFormat::Project,
            0x10 => FileFormat::Score,
            0x18 => FileFormat::Automation,
            0x20 => FileFormat::ChannelState,
            0x30 => FileFormat::PluginState,
            0x31 => FileFormat::GeneratorState,
            0x32 => FileFormat::EffectState,
            0x40 => FileFormat::InsertState,
            _ => return None,
        })
    }

    pub fn raw(self) -> i16 {
        match self {
            FileFormat::None => -1,
            FileFormat::Project => 0x00,
            FileFormat::Score => 0x10,
            FileFormat::Automation => 0x18,
            FileFormat::ChannelState => 0x20,
            FileFormat::PluginState => 0x30,
            FileFormat::GeneratorState => 0x31,
            FileFormat::EffectState => 0x32,
            FileFormat::InsertState => 0x40,
        }
    }
}

/// A parsed project file.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    /// Raw file format code; see [`ProjectFile::file_format`].
    pub format: i16,
    pub channel_count: u16,
    /// Pulses per quarter note.
    pub ppq: u16,
    pub events: EventStream,
}

impl ProjectFile {
    /// A file around an existing event stream.
    pub fn new(format: FileFormat, channel_count: u16, ppq: u16, events: EventStream) -> Self {
        Self {
            format: format.raw(),
            channel_count,
            ppq,
            events,
        }
    }

    /// Parses a file with default options.
    pub fn parse(input: &[u8]) -> Result<Self, DecodeError> {
        Self::parse_with(input, &ParseOptions::default())
    }

    /// Parses a file. Header errors are reported as
    /// [`DecodeError::HeaderCorrupted`]; event errors abort the parse.
    pub fn parse_with(input: &[u8], options: &ParseOptions) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(input);

        let magic = reader.read_bytes(4, "header magic")?;
        if magic != MAGIC_HEADER {
            return Err(DecodeError::HeaderCorrupted {
                context: "unexpected header chunk magic",
            });
        }
        if reader.read_u32("header length")? != HEADER_LEN {
            return Err(DecodeError::HeaderCorrupted {
                context: "unexpected header chunk size",
            });
        }
        let format = reader.read_i16("file format")?;
        let channel_count = reader.read_u16("channel count")?;
        let ppq = reader.read_u16("ppq")?;
        if FileFormat::from_raw(format).is_none() {
            warn!(format, "unknown file format");
        }

        let magic = reader.read_bytes(4, "data magic")?;
        if magic != MAGIC_DATA {
            return Err(DecodeError::HeaderCorrupted {
                context: "unexpected data chunk magic",
            });
        }
        let len = reader.read_u32("data length")? as usize;
        let body = reader.read_bytes(len, "event data")?;
        if !reader.is_empty() {
            warn!(trailing = reader.remaining_len(), "ignoring bytes after the data chunk");
        }

        let events = EventStream::parse_with(body, options)?;
        debug!(format, channel_count, ppq, events = events.len(), "parsed project file");
        Ok(Self {
            format,
            channel_count,
            ppq,
            events,
        })
    }

    /// The decoded file format, if known.
    pub fn file_format(&self) -> Option<FileFormat> {
        FileFormat::from_raw(self.format)
    }

    /// The on-disk bytes of the file.
    pub fn serialize(&self) -> Result<Vec<u8>, EncodeError> {
        let body_len = self.events.byte_len();
        let len = u32::try_from(body_len).map_err(|_| EncodeError::LengthExceedsLimit {
            field: "event data",
            len: body_len,
            max: u32::MAX as usize,
        })?;

        let mut writer = Writer::with_capacity(22 + body_len);
        writer.write_bytes(MAGIC_HEADER);
        writer.write_u32(HEADER_LEN);
        writer.write_i16(self.format);
        writer.write_u16(self.channel_count);
        writer.write_u16(self.ppq);
        writer.write_bytes(MAGIC_DATA);
        writer.write_u32(len);
        self.events.write_to(&mut writer);
        Ok(writer.into_bytes())
    }
}

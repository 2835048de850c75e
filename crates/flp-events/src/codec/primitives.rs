//! Primitive encoding/decoding for the event stream.
//!
//! Implements fixed-width little-endian integers, LEB128 payload lengths
//! and the cursor types the stream codec is built on.

use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_VARINT_BYTES;

/// Width of a fixed-size integer, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Width {
    One = 1,
    Two = 2,
    Four = 4,
}

impl Width {
    /// Returns the width for a byte count, if it is one of 1, 2 or 4.
    pub fn from_len(len: usize) -> Option<Width> {
        match len {
            1 => Some(Width::One),
            2 => Some(Width::Two),
            4 => Some(Width::Four),
            _ => None,
        }
    }

    /// Number of bytes.
    #[inline]
    pub fn len(self) -> usize {
        self as usize
    }

    fn bits(self) -> u32 {
        self as u32 * 8
    }
}

// =============================================================================
// FIXED-WIDTH INTEGERS
// =============================================================================

/// Encodes an unsigned integer as `width` little-endian bytes.
///
/// Fails before producing any bytes if the value does not fit.
pub fn encode_uint(value: u64, width: Width) -> Result<Vec<u8>, EncodeError> {
    if width.bits() < 64 && value >> width.bits() != 0 {
        return Err(EncodeError::OutOfRange {
            value: value as i128,
            width: width.len(),
            signed: false,
        });
    }
    Ok(value.to_le_bytes()[..width.len()].to_vec())
}

/// Encodes a signed integer as `width` little-endian two's complement bytes.
pub fn encode_int(value: i64, width: Width) -> Result<Vec<u8>, EncodeError> {
    let bits = width.bits();
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    if value < min || value > max {
        return Err(EncodeError::OutOfRange {
            value: value as i128,
            width: width.len(),
            signed: true,
        });
    }
    Ok(value.to_le_bytes()[..width.len()].to_vec())
}

/// Decodes the first `width` bytes as an unsigned little-endian integer.
pub fn decode_uint(bytes: &[u8], width: Width) -> Result<u64, DecodeError> {
    let bytes = bytes
        .get(..width.len())
        .ok_or(DecodeError::Truncated { context: "integer" })?;
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

/// Decodes the first `width` bytes as a signed little-endian integer.
pub fn decode_int(bytes: &[u8], width: Width) -> Result<i64, DecodeError> {
    let unsigned = decode_uint(bytes, width)?;
    let shift = 64 - width.bits();
    Ok(((unsigned << shift) as i64) >> shift)
}

// =============================================================================
// VARINT
// =============================================================================

/// Encodes a payload length as an unsigned LEB128 varint.
pub fn encode_varint(value: u32) -> Vec<u8> {
    let mut writer = Writer::with_capacity(MAX_VARINT_BYTES);
    writer.write_varint(value);
    writer.into_bytes()
}

/// Decodes an unsigned LEB128 varint, returning the value and the number of
/// bytes it occupied.
pub fn decode_varint(bytes: &[u8]) -> Result<(u32, usize), DecodeError> {
    let mut reader = Reader::new(bytes);
    let value = reader.read_varint("varint")?;
    Ok((value, reader.position()))
}

/// Number of bytes `encode_varint(value)` produces.
pub fn varint_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::Truncated { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::Truncated { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2, context)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian i16.
    pub fn read_i16(&mut self, context: &'static str) -> Result<i16, DecodeError> {
        Ok(self.read_u16(context)? as i16)
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4, context)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads an unsigned varint (LEB128) holding a 32-bit length.
    ///
    /// Only the minimal encoding is accepted, so every valid prefix is
    /// written back byte for byte.
    #[inline]
    pub fn read_varint(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        let mut result: u32 = 0;

        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_byte(context)?;
            let value = (byte & 0x7F) as u32;
            let shift = 7 * i as u32;

            // The fifth byte only has room for the top four bits
            if i == MAX_VARINT_BYTES - 1 && value > 0x0F {
                return Err(DecodeError::VarintOverflow);
            }

            result |= value << shift;

            if byte & 0x80 == 0 {
                // A zero group after a continuation adds nothing
                if i > 0 && byte == 0 {
                    return Err(DecodeError::NonMinimalVarint);
                }
                return Ok(result);
            }
        }

        Err(DecodeError::VarintTooLong)
    }

    /// Reads a varint length prefix followed by that many bytes.
    pub fn read_bytes_prefixed(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        let len = self.read_varint(field)? as usize;
        if len > max_len {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len,
                max: max_len,
            });
        }
        self.read_bytes(len, field)
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a little-endian u16.
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian i16.
    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an unsigned varint (LEB128).
    #[inline]
    pub fn write_varint(&mut self, mut value: u32) {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&buf[..len]);
    }

    /// Writes a varint length prefix followed by the bytes.
    pub fn write_bytes_prefixed(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let len = u32::try_from(bytes.len()).map_err(|_| EncodeError::LengthExceedsLimit {
            field: "payload",
            len: bytes.len(),
            max: u32::MAX as usize,
        })?;
        self.write_varint(len);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }
}

//! Null-terminated text in the two encodings used by project files.
//!
//! Older projects store single-byte ASCII strings; newer ones store
//! UTF-16LE. Decoding never fails: units that cannot be decoded are dropped.

/// Text encoding of string events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// One byte per character, terminated by a single zero byte.
    Narrow,
    /// UTF-16LE code units, terminated by two zero bytes.
    Wide,
}

impl TextEncoding {
    /// Size of the terminator in bytes.
    pub fn terminator_len(self) -> usize {
        match self {
            TextEncoding::Narrow => 1,
            TextEncoding::Wide => 2,
        }
    }
}

const BOM: u16 = 0xFEFF;

/// Encodes `text` with a trailing null terminator.
///
/// Characters the narrow encoding cannot represent are omitted.
pub fn encode_text(text: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Narrow => {
            let mut out: Vec<u8> = text.chars().filter(char::is_ascii).map(|c| c as u8).collect();
            out.push(0);
            out
        }
        TextEncoding::Wide => {
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out.extend_from_slice(&[0, 0]);
            out
        }
    }
}

/// Decodes a null-terminated string, dropping anything undecodable.
///
/// Leading and trailing nulls are stripped; a leading byte-order mark in
/// wide text is ignored.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    let decoded: String = match encoding {
        TextEncoding::Narrow => bytes
            .iter()
            .filter(|b| b.is_ascii())
            .map(|&b| b as char)
            .collect(),
        TextEncoding::Wide => {
            let mut units = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .peekable();
            units.next_if_eq(&BOM);
            char::decode_utf16(units).filter_map(Result::ok).collect()
        }
    };
    decoded.trim_matches('\0').to_string()
}

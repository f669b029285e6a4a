//! Binary transcoding
//!
//! The flashing engine takes image data as a "binary string": a text string
//! in which every char stands for one byte, with code point equal to the
//! byte value (U+0000..=U+00FF). This is the Latin-1 mapping, so every byte
//! value maps to exactly one char and back.

use core::fmt;
use thiserror::Error;

/// A byte sequence encoded as one char per byte
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryString {
    text: String,
    byte_len: usize,
}

/// Error returned when a string holds a char that is not a byte value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("char U+{code_point:04X} at position {position} is not a byte value")]
pub struct TranscodeError {
    /// Index (in chars) of the offending char
    pub position: usize,
    /// The offending code point
    pub code_point: u32,
}

/// Encode raw bytes as a binary string
///
/// Never fails; an empty input yields an empty string. Bytes 0x80..=0xFF
/// take two bytes in UTF-8, so the buffer is sized for the worst case once.
pub fn encode(bytes: &[u8]) -> BinaryString {
    let high = bytes.iter().filter(|&&b| b >= 0x80).count();
    let mut text = String::with_capacity(bytes.len() + high);
    text.extend(bytes.iter().map(|&b| char::from(b)));
    BinaryString {
        text,
        byte_len: bytes.len(),
    }
}

impl BinaryString {
    /// Reinterpret a string as a binary string
    ///
    /// Fails if any char is above U+00FF.
    pub fn from_text(text: impl Into<String>) -> Result<Self, TranscodeError> {
        let text = text.into();
        let mut byte_len = 0;
        for (position, c) in text.chars().enumerate() {
            u8::try_from(c).map_err(|_| TranscodeError {
                position,
                code_point: c as u32,
            })?;
            byte_len += 1;
        }
        Ok(Self { text, byte_len })
    }

    /// Decode back to raw bytes
    pub fn decode(&self) -> Vec<u8> {
        // Every char was validated on construction
        self.text.chars().map(|c| c as u8).collect()
    }

    /// The encoded text, as handed to the flashing engine
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of bytes this string encodes
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Whether no bytes are encoded
    pub fn is_empty(&self) -> bool {
        self.byte_len == 0
    }
}

impl fmt::Debug for BinaryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryString")
            .field("byte_len", &self.byte_len)
            .finish()
    }
}

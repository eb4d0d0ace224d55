//! Strict text encodings resolved from WHATWG labels.

use crate::error::{PatchError, Result};
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use std::borrow::Cow;
use std::fmt;

/// A declared text encoding.
///
/// Decoding never substitutes replacement characters: bytes that are not
/// valid in the encoding make the decode fail.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    pub const UTF_8: TextEncoding = TextEncoding(UTF_8);

    /// Looks up an encoding by label (`utf-8`, `windows-1252`, `utf-16le`, ...).
    pub fn for_label(label: &str) -> Result<Self> {
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) if encoding != encoding_rs::REPLACEMENT => Ok(Self(encoding)),
            _ => Err(PatchError::Config(format!("Unknown text encoding: {label}"))),
        }
    }

    /// Returns the canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Decodes bytes, returning the text and whether a byte-order mark was stripped.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<(Cow<'a, str>, bool)> {
        let (body, bom) = match Encoding::for_bom(bytes) {
            Some((encoding, len)) if encoding == self.0 => (&bytes[len..], true),
            _ => (bytes, false),
        };
        self.0
            .decode_without_bom_handling_and_without_replacement(body)
            .map(|text| (text, bom))
    }

    /// Encodes text, prefixing a byte-order mark when `bom` is set.
    ///
    /// Returns `None` if the text holds characters the encoding cannot
    /// represent.
    pub fn encode(&self, text: &str, bom: bool) -> Option<Vec<u8>> {
        if self.0 == UTF_16LE || self.0 == UTF_16BE {
            let little = self.0 == UTF_16LE;
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            if bom {
                out.extend_from_slice(if little { &[0xFF, 0xFE] } else { &[0xFE, 0xFF] });
            }
            for unit in text.encode_utf16() {
                let bytes = if little {
                    unit.to_le_bytes()
                } else {
                    unit.to_be_bytes()
                };
                out.extend_from_slice(&bytes);
            }
            return Some(out);
        }

        let (encoded, _, had_errors) = self.0.encode(text);
        if had_errors {
            return None;
        }
        let mut out = Vec::with_capacity(encoded.len() + 3);
        if bom && self.0 == UTF_8 {
            out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
        }
        out.extend_from_slice(&encoded);
        Some(out)
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::UTF_8
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

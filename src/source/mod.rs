//! Loading source files: bytes, declared encoding and line endings.

pub mod encoding;
pub mod line_ending;

pub use encoding::TextEncoding;
pub use line_ending::{LineEnding, LineEndingPolicy, Newline};

use crate::error::{PatchError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A file loaded for one pipeline pass.
///
/// Holds the raw bytes alongside the decoded text so the writer can tell
/// whether anything actually changed.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    raw: Vec<u8>,
    encoding: TextEncoding,
    bom: bool,
    line_ending: LineEnding,
    text: String,
}

impl SourceFile {
    /// Reads and decodes the file at `path`.
    pub fn load(path: &Path, encoding: TextEncoding) -> Result<Self> {
        let raw = fs::read(path).map_err(|e| PatchError::file_io(path, e))?;
        Self::from_bytes(path, raw, encoding)
    }

    /// Decodes already-read bytes as if they came from `path`.
    pub fn from_bytes(path: impl Into<PathBuf>, raw: Vec<u8>, encoding: TextEncoding) -> Result<Self> {
        let path = path.into();
        let (decoded, bom) = encoding.decode(&raw).ok_or_else(|| PatchError::Decode {
            path: path.clone(),
            encoding: encoding.name(),
        })?;
        let line_ending = LineEnding::detect(&decoded);
        let text = line_ending.normalize(&decoded).into_owned();

        Ok(Self {
            path,
            raw,
            encoding,
            bom,
            line_ending,
            text,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bytes as they were on disk.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Whether the file started with a byte-order mark.
    pub fn has_bom(&self) -> bool {
        self.bom
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// The decoded text rules operate on.
    pub fn text(&self) -> &str {
        &self.text
    }
}

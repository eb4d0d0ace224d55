//! Error types for the rewriting engine.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for rewrite runs.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot decode {path} as {encoding}")]
    Decode {
        path: PathBuf,
        encoding: &'static str,
    },

    #[error("Cannot encode {path} as {encoding}: text contains characters the encoding cannot represent")]
    Encode {
        path: PathBuf,
        encoding: &'static str,
    },

    #[error("IO error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Rule '{rule}' failed: {message}")]
    RuleFailed { rule: String, message: String },

    #[error("Rules are not idempotent for {0}: a second pass changed the output")]
    NotIdempotent(PathBuf),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] globset::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PatchError {
    /// Wraps an IO error with the path it happened on.
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PatchError::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Classifies the error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PatchError::Config(_)
            | PatchError::Regex(_)
            | PatchError::Glob(_)
            | PatchError::Json(_)
            | PatchError::Yaml(_) => ErrorKind::Configuration,
            PatchError::Decode { .. } | PatchError::Encode { .. } => ErrorKind::Encoding,
            PatchError::FileIo { .. } | PatchError::Io(_) | PatchError::Walk(_) => ErrorKind::Io,
            PatchError::RuleFailed { .. } | PatchError::NotIdempotent(_) => {
                ErrorKind::RuleExecution
            }
        }
    }

    /// Returns the file the error relates to, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            PatchError::Decode { path, .. }
            | PatchError::Encode { path, .. }
            | PatchError::FileIo { path, .. }
            | PatchError::NotIdempotent(path) => Some(path),
            PatchError::Walk(err) => err.path(),
            _ => None,
        }
    }
}

/// The four error categories a run distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad roots, rules or encodings. Aborts the run before any file is touched.
    Configuration,
    /// A file could not be decoded or re-encoded.
    Encoding,
    /// Reading, walking or writing failed.
    Io,
    /// A rule could not produce its output.
    RuleExecution,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Encoding => "encoding error",
            ErrorKind::Io => "io error",
            ErrorKind::RuleExecution => "rule execution error",
        };
        f.write_str(name)
    }
}

/// A specialized Result type for rewrite operations.
pub type Result<T> = std::result::Result<T, PatchError>;

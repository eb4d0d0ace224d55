//! File selection for a run.

pub mod file;

pub use file::{FileMatcher, FileSet};

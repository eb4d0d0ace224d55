//! # Source Patch
//!
//! Batch rewriting of source trees with ordered, idempotent text rules.
//!
//! This crate provides:
//! - Resolving the files of a run from root directories, extensions and globs
//! - Loading files with a declared encoding and their line-ending style
//! - Rules of three kinds: skip-if-present markers, first-match
//!   substitutions and anchor insertions
//! - Writing changed files back all-or-nothing, in their original encoding
//! - A report of which files were updated, skipped or failed
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use source_patch::prelude::*;
//!
//! // Put an MIT header on every Java file that does not have one yet
//! let pipeline = Pipeline::new(vec![
//!     Rule::skip_if_present("licensed", Pattern::literal("MIT License")?),
//!     Rule::substitute(
//!         "drop-old-header",
//!         Pattern::regex(r"(?s)/\*.*?Copyright.*?\*/\s*")?,
//!         Replacement::Delete,
//!     ),
//!     Rule::insert_before("add-header", Pattern::start_of_file()?, "/* MIT License */\n\n"),
//! ])?;
//!
//! let report = Rewrite::new(pipeline)
//!     .root("src/main/java")
//!     .root("src/test/java")
//!     .matching(|f| f.extension("java"))
//!     .run()?;
//!
//! println!("{report}");
//! # Ok::<(), source_patch::error::PatchError>(())
//! ```
//!
//! ## Rule Sets as Data
//!
//! ```rust,no_run
//! use source_patch::prelude::*;
//!
//! let config = RulesetConfig::load("rules/license.yaml")?;
//! let report = Rewrite::from_config(&config)?.root(".").dry_run().run()?;
//!
//! for file in &report.details {
//!     println!("{file}");
//! }
//! # Ok::<(), source_patch::error::PatchError>(())
//! ```
//!
//! ## Guarantees
//!
//! - Rules run in order; each sees the output of the ones before it.
//! - A substitution or insertion edits only the first match per pass.
//! - A file whose bytes would not change is never written.
//! - A failed write leaves the original file intact.
//! - One failing file or rule never stops the rest of the run.

pub mod config;
pub mod diff;
pub mod error;
pub mod matcher;
pub mod report;
pub mod rewrite;
pub mod rule;
pub mod source;
pub mod telemetry;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{Anchor, RuleAction, RuleSpec, RulesetConfig};
    pub use crate::diff::DiffSummary;
    pub use crate::error::{ErrorKind, PatchError, Result};
    pub use crate::matcher::{FileMatcher, FileSet};
    pub use crate::report::{FileOutcome, Outcome, RuleFailure, RunReport};
    pub use crate::rewrite::{Rewrite, StopSignal};
    pub use crate::rule::{
        Pattern, Pipeline, PipelineOutcome, Position, Replacement, Rule, RuleKind, RuleOutcome,
        RuleStatus,
    };
    pub use crate::source::{LineEnding, LineEndingPolicy, Newline, SourceFile, TextEncoding};
}

pub use prelude::*;

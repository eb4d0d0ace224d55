//! Per-file outcomes and the run summary.

use crate::diff::DiffSummary;
use crate::error::{ErrorKind, PatchError};
use crate::rule::{RuleOutcome, RuleStatus};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// The terminal state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The file was rewritten (or would be, in a dry run).
    Updated,
    /// A skip-if-present marker was found.
    AlreadyApplied { marker: String },
    /// No rule changed the content.
    Unchanged,
    /// Loading, encoding or writing failed.
    Failed { kind: ErrorKind, message: String },
}

impl Outcome {
    pub fn failed(err: &PatchError) -> Self {
        Outcome::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Returns true for both kinds of skip.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::AlreadyApplied { .. } | Outcome::Unchanged)
    }
}

/// A rule that failed on a file that was otherwise processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

/// The outcome of processing one file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub rules_applied: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_failures: Vec<RuleFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffSummary>,
    #[serde(skip)]
    pub preview: Option<String>,
}

impl FileOutcome {
    pub fn new(path: impl Into<PathBuf>, outcome: Outcome) -> Self {
        Self {
            path: path.into(),
            outcome,
            rules_applied: Vec::new(),
            rule_failures: Vec::new(),
            diff: None,
            preview: None,
        }
    }

    /// Builds an outcome from the rule statuses of a completed pass.
    pub fn with_rules(path: impl Into<PathBuf>, outcome: Outcome, rules: &[RuleOutcome]) -> Self {
        let mut file = Self::new(path, outcome);
        for rule in rules {
            match &rule.status {
                RuleStatus::Applied => file.rules_applied.push(rule.rule.clone()),
                RuleStatus::Failed { message } => file.rule_failures.push(RuleFailure {
                    rule: rule.rule.clone(),
                    message: message.clone(),
                }),
                _ => {}
            }
        }
        file
    }

    /// Builds a failed outcome from an error.
    pub fn failed(path: impl Into<PathBuf>, err: &PatchError) -> Self {
        Self::new(path, Outcome::failed(err))
    }

    /// Returns true if a rule failed even though the file was processed.
    pub fn is_partial(&self) -> bool {
        !self.rule_failures.is_empty()
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        match &self.outcome {
            Outcome::Updated => write!(f, "Updated: {path} [{}]", self.rules_applied.join(", "))?,
            Outcome::AlreadyApplied { marker } => {
                write!(f, "Skipped: {path} - already applied ({marker})")?
            }
            Outcome::Unchanged => write!(f, "Skipped: {path} - no rule applied")?,
            Outcome::Failed { kind, message } => write!(f, "Failed: {path} - {kind}: {message}")?,
        }
        for failure in &self.rule_failures {
            write!(f, "\n  rule '{}' failed: {}", failure.rule, failure.message)?;
        }
        Ok(())
    }
}

/// Aggregate result of a run.
///
/// Counters are updated as each file completes; `details` keeps the files
/// in processing order.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub details: Vec<FileOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_roots: Vec<PathBuf>,
    pub interrupted: bool,
    pub dry_run: bool,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Adds a finished file to the report.
    pub fn record(&mut self, file: FileOutcome) {
        match &file.outcome {
            Outcome::Updated => self.updated += 1,
            Outcome::AlreadyApplied { .. } | Outcome::Unchanged => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
        self.details.push(file);
    }

    /// Number of files that reached a terminal state.
    pub fn total(&self) -> usize {
        self.details.len()
    }

    /// True when at least one file was processed and every one failed.
    pub fn all_failed(&self) -> bool {
        self.failed > 0 && self.failed == self.total()
    }

    /// Looks up the outcome for a path.
    pub fn outcome_for(&self, path: &Path) -> Option<&FileOutcome> {
        self.details.iter().find(|d| d.path == path)
    }

    /// Files whose outcome matches `pred`.
    pub fn files_where<'a>(&'a self, pred: impl Fn(&Outcome) -> bool + 'a) -> impl Iterator<Item = &'a FileOutcome> + 'a {
        self.details.iter().filter(move |d| pred(&d.outcome))
    }

    /// Line statistics over every file with a recorded diff.
    pub fn diff_summary(&self) -> DiffSummary {
        let mut total = DiffSummary::default();
        for summary in self.details.iter().filter_map(|d| d.diff.as_ref()) {
            total.merge(summary);
        }
        total
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "Would update" } else { "Updated" };
        write!(
            f,
            "{verb} {} file(s), skipped {}, failed {}",
            self.updated, self.skipped, self.failed
        )?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}

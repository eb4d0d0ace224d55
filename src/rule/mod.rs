//! Transformation rules and the pipeline that runs them.
//!
//! A rule is one of three kinds:
//!
//! - **skip if present**: a marker whose presence aborts the whole pipeline
//!   for the file (the change was applied on an earlier run);
//! - **substitute**: replaces the first match of a pattern;
//! - **insert**: adds content before or after the first match of an anchor.
//!
//! Editing rules may carry their own `unless` marker and a path glob that
//! limits which files they apply to.

pub mod pattern;
pub mod pipeline;

pub use pattern::{Pattern, Replacement};
pub use pipeline::{Pipeline, PipelineOutcome};

use crate::error::{PatchError, Result};
use crate::source::Newline;
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Where insertion content goes relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Before,
    After,
}

/// The three kinds of rule.
#[derive(Debug, Clone)]
pub enum RuleKind {
    SkipIfPresent {
        marker: Pattern,
    },
    Substitute {
        target: Pattern,
        replacement: Replacement,
    },
    Insert {
        anchor: Pattern,
        content: String,
        position: Position,
    },
}

/// A named, immutable transformation unit.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    kind: RuleKind,
    unless: Option<Pattern>,
    scope: Option<GlobMatcher>,
}

/// What one rule did to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleStatus {
    /// The content was edited.
    Applied,
    /// The pattern or anchor does not occur.
    NoMatch,
    /// The rule's marker is present, or its edit is already in place.
    AlreadyApplied,
    /// The rule does not target this path.
    OutOfScope,
    /// The rule could not produce its output; the content was left as it was.
    Failed { message: String },
}

/// A rule's status, tagged with the rule's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    #[serde(flatten)]
    pub status: RuleStatus,
}

/// The effect of a single editing rule on content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Changed(String),
    Unchanged(RuleStatus),
}

impl Rule {
    /// A marker that aborts the pipeline when found.
    pub fn skip_if_present(name: impl Into<String>, marker: Pattern) -> Self {
        Self::new(name, RuleKind::SkipIfPresent { marker })
    }

    /// Replaces the first match of `target`.
    pub fn substitute(name: impl Into<String>, target: Pattern, replacement: Replacement) -> Self {
        Self::new(
            name,
            RuleKind::Substitute {
                target,
                replacement,
            },
        )
    }

    /// Inserts `content` immediately before the first match of `anchor`.
    pub fn insert_before(name: impl Into<String>, anchor: Pattern, content: impl Into<String>) -> Self {
        Self::new(
            name,
            RuleKind::Insert {
                anchor,
                content: content.into(),
                position: Position::Before,
            },
        )
    }

    /// Inserts `content` immediately after the first match of `anchor`.
    pub fn insert_after(name: impl Into<String>, anchor: Pattern, content: impl Into<String>) -> Self {
        Self::new(
            name,
            RuleKind::Insert {
                anchor,
                content: content.into(),
                position: Position::After,
            },
        )
    }

    /// Renames the first whole-word occurrence of an identifier.
    pub fn rename(name: impl Into<String>, from: &str, to: &str) -> Result<Self> {
        Ok(Self::substitute(
            name,
            Pattern::word(from)?,
            Replacement::Literal(to.to_string()),
        ))
    }

    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            unless: None,
            scope: None,
        }
    }

    /// Skips this rule (only) when `marker` is present.
    pub fn unless(mut self, marker: Pattern) -> Self {
        self.unless = Some(marker);
        self
    }

    /// Limits the rule to paths matching the glob.
    pub fn only_in(mut self, glob: &str) -> Result<Self> {
        self.scope = Some(Glob::new(glob)?.compile_matcher());
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Returns true for skip-if-present rules.
    pub fn is_marker(&self) -> bool {
        matches!(self.kind, RuleKind::SkipIfPresent { .. })
    }

    /// Returns true if the rule targets `path`.
    pub fn applies_to(&self, path: &Path) -> bool {
        self.scope.as_ref().is_none_or(|glob| glob.is_match(path))
    }

    /// Returns true if this skip rule's marker is present.
    pub fn marker_found(&self, text: &str) -> bool {
        match &self.kind {
            RuleKind::SkipIfPresent { marker } => marker.is_match(text),
            _ => false,
        }
    }

    /// Applies an editing rule to `text`.
    ///
    /// Edits at most one location: the first match in document order. A
    /// skip-if-present rule never edits; the pipeline evaluates it.
    pub fn apply(&self, text: &str) -> Result<Edit> {
        self.apply_with(text, Newline::Lf)
    }

    /// Applies the rule, writing line breaks in added text as `newline`.
    pub fn apply_with(&self, text: &str, newline: Newline) -> Result<Edit> {
        if let Some(unless) = &self.unless
            && unless.is_match(text)
        {
            return Ok(Edit::Unchanged(RuleStatus::AlreadyApplied));
        }

        match &self.kind {
            RuleKind::SkipIfPresent { .. } => Ok(Edit::Unchanged(RuleStatus::NoMatch)),
            RuleKind::Substitute {
                target,
                replacement,
            } => {
                let Some(caps) = target.captures(text) else {
                    return Ok(Edit::Unchanged(RuleStatus::NoMatch));
                };
                let Some(whole) = caps.get(0) else {
                    return Ok(Edit::Unchanged(RuleStatus::NoMatch));
                };
                let new_text = replacement
                    .render_with(&caps, newline)
                    .map_err(|message| PatchError::RuleFailed {
                        rule: self.name.clone(),
                        message,
                    })?;
                if new_text == whole.as_str() {
                    return Ok(Edit::Unchanged(RuleStatus::AlreadyApplied));
                }
                Ok(Edit::Changed(splice(text, whole.start(), whole.end(), &new_text)))
            }
            RuleKind::Insert {
                anchor,
                content,
                position,
            } => {
                let Some(found) = anchor.find(text) else {
                    return Ok(Edit::Unchanged(RuleStatus::NoMatch));
                };
                let content = newline.render(content);
                let before = text[..found.start()].ends_with(&*content);
                let after = text[found.end()..].starts_with(&*content);
                // A zero-width anchor sits on both sides of its own insertion.
                let (at, in_place) = match position {
                    Position::Before => (found.start(), before || (found.is_empty() && after)),
                    Position::After => (found.end(), after || (found.is_empty() && before)),
                };
                if in_place {
                    return Ok(Edit::Unchanged(RuleStatus::AlreadyApplied));
                }
                Ok(Edit::Changed(splice(text, at, at, &content)))
            }
        }
    }

    /// Returns a one-line description of the rule.
    pub fn describe(&self) -> String {
        let mut line = match &self.kind {
            RuleKind::SkipIfPresent { marker } => format!("Skip file if {marker} is present"),
            RuleKind::Substitute {
                target,
                replacement: Replacement::Delete,
            } => format!("Delete first match of {target}"),
            RuleKind::Substitute { target, .. } => format!("Replace first match of {target}"),
            RuleKind::Insert {
                anchor, position, ..
            } => {
                let side = match position {
                    Position::Before => "before",
                    Position::After => "after",
                };
                format!("Insert content {side} first match of {anchor}")
            }
        };
        if let Some(unless) = &self.unless {
            line.push_str(&format!(" unless {unless} is present"));
        }
        if let Some(scope) = &self.scope {
            line.push_str(&format!(" in files matching '{}'", scope.glob()));
        }
        line
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.describe())
    }
}

fn splice(text: &str, start: usize, end: usize, insert: &str) -> String {
    let mut out = String::with_capacity(text.len() - (end - start) + insert.len());
    out.push_str(&text[..start]);
    out.push_str(insert);
    out.push_str(&text[end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(edit: Edit) -> String {
        match edit {
            Edit::Changed(text) => text,
            Edit::Unchanged(status) => panic!("expected an edit, got {status:?}"),
        }
    }

    #[test]
    fn test_substitute_first_match_only() {
        let rule = Rule::substitute(
            "rename",
            Pattern::literal("ServerCommandRegister").unwrap(),
            Replacement::Literal("ServerCommandLogin".into()),
        );
        let text = "String ServerCommandRegister = \"LOGIN\";\nString ServerCommandRegister = \"LOGOUT\";\n";

        let out = changed(rule.apply(text).unwrap());

        assert_eq!(
            out,
            "String ServerCommandLogin = \"LOGIN\";\nString ServerCommandRegister = \"LOGOUT\";\n"
        );
    }

    #[test]
    fn test_substitute_no_match_is_noop() {
        let rule = Rule::substitute(
            "fix",
            Pattern::regex(r"getMenuBar\(\)").unwrap(),
            Replacement::Literal("getJMenuBar()".into()),
        );
        assert_eq!(
            rule.apply("class A {}").unwrap(),
            Edit::Unchanged(RuleStatus::NoMatch)
        );
    }

    #[test]
    fn test_substitute_identical_replacement_is_already_applied() {
        let rule = Rule::substitute(
            "noop",
            Pattern::regex(r"(\w+)\(\)").unwrap(),
            Replacement::Template("$1()".into()),
        );
        assert_eq!(
            rule.apply("run()").unwrap(),
            Edit::Unchanged(RuleStatus::AlreadyApplied)
        );
    }

    #[test]
    fn test_delete_block() {
        let rule = Rule::substitute(
            "drop-old-header",
            Pattern::regex(r"(?s)/\*.*?Copyright.*?\*/").unwrap(),
            Replacement::Delete,
        );
        let out = changed(rule.apply("/*\n * Copyright 2020\n */\nclass A {}").unwrap());
        assert_eq!(out, "\nclass A {}");
    }

    #[test]
    fn test_missing_group_is_rule_error() {
        let rule = Rule::substitute(
            "broken",
            Pattern::regex(r"class (\w+)").unwrap(),
            Replacement::Template("class $2".into()),
        );
        let err = rule.apply("class A {}").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RuleExecution);
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_insert_before_and_after() {
        let before = Rule::insert_before(
            "license",
            Pattern::literal("class A").unwrap(),
            "/* MIT License */\n",
        );
        assert_eq!(
            changed(before.apply("/* Copyright 2020 */\nclass A {}").unwrap()),
            "/* Copyright 2020 */\n/* MIT License */\nclass A {}"
        );

        let after = Rule::insert_after(
            "import",
            Pattern::regex(r"(?m)^package .*;$").unwrap(),
            "\n\nimport java.util.List;",
        );
        assert_eq!(
            changed(after.apply("package a;\nclass A {}").unwrap()),
            "package a;\n\nimport java.util.List;\nclass A {}"
        );
    }

    #[test]
    fn test_insert_is_self_guarding() {
        let rule = Rule::insert_before(
            "license",
            Pattern::literal("class A").unwrap(),
            "/* MIT License */\n",
        );
        assert_eq!(
            rule.apply("/* MIT License */\nclass A {}").unwrap(),
            Edit::Unchanged(RuleStatus::AlreadyApplied)
        );
    }

    #[test]
    fn test_start_of_file_insert_applies_once() {
        let rule = Rule::insert_before("header", Pattern::start_of_file().unwrap(), "/* H */\n");

        let once = changed(rule.apply("class A {}").unwrap());
        assert_eq!(once, "/* H */\nclass A {}");
        assert_eq!(
            rule.apply(&once).unwrap(),
            Edit::Unchanged(RuleStatus::AlreadyApplied)
        );

        let after = Rule::insert_after("header", Pattern::start_of_file().unwrap(), "/* H */\n");
        assert_eq!(
            after.apply(&once).unwrap(),
            Edit::Unchanged(RuleStatus::AlreadyApplied)
        );
    }

    #[test]
    fn test_insert_uses_given_newline() {
        let rule = Rule::insert_before("header", Pattern::literal("class A").unwrap(), "/*\n * H\n */\n");
        let text = "package a;\r\nclass A {}\r\n";

        let out = changed(rule.apply_with(text, Newline::CrLf).unwrap());
        assert_eq!(out, "package a;\r\n/*\r\n * H\r\n */\r\nclass A {}\r\n");
        assert_eq!(
            rule.apply_with(&out, Newline::CrLf).unwrap(),
            Edit::Unchanged(RuleStatus::AlreadyApplied)
        );
    }

    #[test]
    fn test_insert_missing_anchor_is_noop() {
        let rule = Rule::insert_before("license", Pattern::literal("class B").unwrap(), "x");
        assert_eq!(
            rule.apply("class A {}").unwrap(),
            Edit::Unchanged(RuleStatus::NoMatch)
        );
    }

    #[test]
    fn test_unless_marker() {
        let rule = Rule::substitute(
            "stub",
            Pattern::literal("PasswordEncoderSingleton.hashPassword()").unwrap(),
            Replacement::Literal("throw new UnsupportedOperationException();".into()),
        )
        .unless(Pattern::literal("UnsupportedOperationException").unwrap());

        let text = "PasswordEncoderSingleton.hashPassword()\nthrow new UnsupportedOperationException();";
        assert_eq!(
            rule.apply(text).unwrap(),
            Edit::Unchanged(RuleStatus::AlreadyApplied)
        );
    }

    #[test]
    fn test_scope() {
        let rule = Rule::rename("rename", "getMenuBar", "getJMenuBar")
            .unwrap()
            .only_in("**/GameClient.java")
            .unwrap();

        assert!(rule.applies_to(Path::new("/src/org/jgame/client/GameClient.java")));
        assert!(!rule.applies_to(Path::new("/src/org/jgame/server/GameServer.java")));
    }

    #[test]
    fn test_describe() {
        let rule = Rule::skip_if_present("licensed", Pattern::literal("MIT License").unwrap());
        assert_eq!(rule.to_string(), "licensed: Skip file if 'MIT License' is present");

        let rule = Rule::rename("r", "a", "b").unwrap().only_in("*.java").unwrap();
        assert!(rule.describe().ends_with("in files matching '*.java'"));
    }
}

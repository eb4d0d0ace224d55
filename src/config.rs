//! Serializable rule-set configuration.

use crate::error::{PatchError, Result};
use crate::matcher::FileMatcher;
use crate::rule::{Pattern, Pipeline, Position, Replacement, Rule, RuleKind};
use crate::source::{LineEndingPolicy, TextEncoding};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A serializable rule action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Skip the whole file when the marker is present.
    SkipIfPresent {
        marker: String,
        #[serde(default)]
        regex: bool,
    },

    /// Replace the first regex match; `$N` / `${name}` refer to captures.
    ReplacePattern { pattern: String, replacement: String },

    /// Replace the first occurrence of a literal string.
    ReplaceLiteral { from: String, to: String },

    /// Delete the first regex match.
    DeletePattern { pattern: String },

    /// Insert content before the first match of the anchor.
    InsertBefore {
        anchor: Anchor,
        content: String,
    },

    /// Insert content after the first match of the anchor.
    InsertAfter {
        anchor: Anchor,
        content: String,
    },

    /// Rename the first whole-word occurrence of an identifier.
    Rename { from: String, to: String },
}

/// Where an insertion goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Anchor {
    /// A literal string to find.
    Literal(String),
    /// A regular expression, or the start of the file.
    Search {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default)]
        start_of_file: bool,
    },
}

impl Anchor {
    fn to_pattern(&self) -> Result<Pattern> {
        match self {
            Anchor::Literal(text) => Pattern::literal(text),
            Anchor::Search {
                pattern: Some(pattern),
                start_of_file: false,
            } => Pattern::regex(pattern),
            Anchor::Search {
                pattern: None,
                start_of_file: true,
            } => Pattern::start_of_file(),
            Anchor::Search { .. } => Err(PatchError::Config(
                "an anchor needs exactly one of `pattern` or `start_of_file: true`".to_string(),
            )),
        }
    }
}

fn one() -> usize {
    1
}

fn is_one(n: &usize) -> bool {
    *n == 1
}

/// One rule of a rule set.
///
/// # Example YAML
///
/// ```yaml
/// - type: rename
///   name: login-constant
///   from: ServerCommandRegister
///   to: ServerCommandLogin
///   files: "**/GameServer.java"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule name; defaults to `<type>-<position>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Glob limiting the rule to matching paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,

    /// Literal marker that, when present, makes this rule a no-op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless: Option<String>,

    /// Number of rule instances to create, one edit site each.
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub repeat: usize,

    #[serde(flatten)]
    pub action: RuleAction,
}

impl RuleSpec {
    pub fn new(action: RuleAction) -> Self {
        Self {
            name: None,
            files: None,
            unless: None,
            repeat: 1,
            action,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn type_name(&self) -> &'static str {
        match self.action {
            RuleAction::SkipIfPresent { .. } => "skip_if_present",
            RuleAction::ReplacePattern { .. } => "replace_pattern",
            RuleAction::ReplaceLiteral { .. } => "replace_literal",
            RuleAction::DeletePattern { .. } => "delete_pattern",
            RuleAction::InsertBefore { .. } => "insert_before",
            RuleAction::InsertAfter { .. } => "insert_after",
            RuleAction::Rename { .. } => "rename",
        }
    }

    fn kind(&self) -> Result<RuleKind> {
        Ok(match &self.action {
            RuleAction::SkipIfPresent { marker, regex } => RuleKind::SkipIfPresent {
                marker: if *regex {
                    Pattern::regex(marker)?
                } else {
                    Pattern::literal(marker)?
                },
            },
            RuleAction::ReplacePattern {
                pattern,
                replacement,
            } => RuleKind::Substitute {
                target: Pattern::regex(pattern)?,
                replacement: Replacement::Template(replacement.clone()),
            },
            RuleAction::ReplaceLiteral { from, to } => RuleKind::Substitute {
                target: Pattern::literal(from)?,
                replacement: Replacement::Literal(to.clone()),
            },
            RuleAction::DeletePattern { pattern } => RuleKind::Substitute {
                target: Pattern::regex(pattern)?,
                replacement: Replacement::Delete,
            },
            RuleAction::InsertBefore { anchor, content } => RuleKind::Insert {
                anchor: anchor.to_pattern()?,
                content: content.clone(),
                position: Position::Before,
            },
            RuleAction::InsertAfter { anchor, content } => RuleKind::Insert {
                anchor: anchor.to_pattern()?,
                content: content.clone(),
                position: Position::After,
            },
            RuleAction::Rename { from, to } => RuleKind::Substitute {
                target: Pattern::word(from)?,
                replacement: Replacement::Literal(to.clone()),
            },
        })
    }

    /// Compiles this entry into one rule per `repeat`.
    pub fn to_rules(&self, index: usize) -> Result<Vec<Rule>> {
        if self.repeat == 0 {
            return Err(PatchError::Config(format!(
                "rule {} has `repeat: 0`",
                index + 1
            )));
        }
        if self.repeat > 1 && matches!(self.action, RuleAction::SkipIfPresent { .. }) {
            return Err(PatchError::Config(
                "skip_if_present rules cannot repeat".to_string(),
            ));
        }

        let base = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.type_name(), index + 1));
        let kind = self.kind()?;

        (1..=self.repeat)
            .map(|n| -> Result<Rule> {
                let name = if self.repeat == 1 {
                    base.clone()
                } else {
                    format!("{base}#{n}")
                };
                let mut rule = Rule::new(name, kind.clone());
                if let Some(unless) = &self.unless {
                    rule = rule.unless(Pattern::literal(unless)?);
                }
                if let Some(glob) = &self.files {
                    rule = rule.only_in(glob)?;
                }
                Ok(rule)
            })
            .collect()
    }
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

/// A rule set: which files to touch and what to do to them.
///
/// Can be loaded from YAML or JSON files.
///
/// # Example YAML
///
/// ```yaml
/// name: mit-license
/// description: Replace old copyright blocks with the MIT header
/// extensions:
///   - java
/// exclude:
///   - "**/target/**"
/// rules:
///   - type: skip_if_present
///     name: already-licensed
///     marker: MIT License
///   - type: delete_pattern
///     name: drop-old-header
///     pattern: '(?s)/\*.*?Copyright.*?\*/'
///   - type: insert_before
///     name: add-header
///     anchor:
///       start_of_file: true
///     content: "/* MIT License */\n\n"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetConfig {
    /// Name of the rule set.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// File extensions to target (e.g., ["java"]).
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Glob patterns a file must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Glob patterns to exclude.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// WHATWG label of the files' encoding.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Line terminators to write.
    #[serde(default)]
    pub line_ending: LineEndingPolicy,

    /// The rules, in the order they run.
    pub rules: Vec<RuleSpec>,
}

impl RulesetConfig {
    /// Create an empty rule set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            extensions: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            encoding: default_encoding(),
            line_ending: LineEndingPolicy::Preserve,
            rules: Vec::new(),
        }
    }

    /// Add a rule at the end.
    pub fn add_rule(&mut self, rule: RuleSpec) {
        self.rules.push(rule);
    }

    /// Set target extensions.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Load a rule set, choosing the format by file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            Some("yaml" | "yml") => Self::from_yaml(path),
            _ => Err(PatchError::Config(format!(
                "cannot tell the format of {}: use a .yaml, .yml or .json file",
                path.display()
            ))),
        }
    }

    /// Load a rule set from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml::from_str(&content)
            .map_err(|e| PatchError::Config(format!("Failed to parse YAML rule set: {e}")))
    }

    /// Load a rule set from a JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| PatchError::Config(format!("Failed to parse JSON rule set: {e}")))
    }

    /// Save the rule set as YAML.
    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), content).map_err(|e| PatchError::file_io(path.as_ref(), e))
    }

    /// Compile the rules into a validated pipeline.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let mut rules = Vec::new();
        for (index, spec) in self.rules.iter().enumerate() {
            rules.extend(spec.to_rules(index)?);
        }
        Pipeline::new(rules)
    }

    /// Resolve the declared encoding.
    pub fn text_encoding(&self) -> Result<TextEncoding> {
        TextEncoding::for_label(&self.encoding)
    }

    /// The file selection described by this rule set.
    pub fn file_matcher(&self) -> FileMatcher {
        let mut matcher = FileMatcher::new().extensions(self.extensions.iter().cloned());
        for pattern in &self.include {
            matcher = matcher.include(pattern.as_str());
        }
        for pattern in &self.exclude {
            matcher = matcher.exclude(pattern.as_str());
        }
        matcher
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        PatchError::Config(format!(
            "Failed to read rule set {}: {e}",
            path.display()
        ))
    })
}

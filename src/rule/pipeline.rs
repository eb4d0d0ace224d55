//! Ordered rule evaluation over one file's content.

use super::{Edit, Rule, RuleOutcome, RuleStatus};
use crate::error::{PatchError, Result};
use crate::source::Newline;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// An ordered, validated list of rules.
///
/// Later rules see the output of earlier rules. Skip-if-present rules must
/// come before every editing rule, since their result applies to the whole
/// pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    rules: Vec<Rule>,
}

/// The result of one rule pass over a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// A skip-if-present marker was found; nothing was evaluated after it.
    AlreadyApplied { rule: String },
    /// Every rule ran. `text` equals the input when nothing applied.
    Completed {
        text: String,
        rules: Vec<RuleOutcome>,
    },
}

impl PipelineOutcome {
    /// Returns the output text, if the pass was not short-circuited.
    pub fn text(&self) -> Option<&str> {
        match self {
            PipelineOutcome::AlreadyApplied { .. } => None,
            PipelineOutcome::Completed { text, .. } => Some(text),
        }
    }
}

impl Pipeline {
    /// Validates and builds a pipeline.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(PatchError::Config("the rule set is empty".to_string()));
        }

        let mut names = HashSet::new();
        let mut editing_seen = None;
        for rule in &rules {
            if !names.insert(rule.name()) {
                return Err(PatchError::Config(format!(
                    "duplicate rule name '{}'",
                    rule.name()
                )));
            }
            match (rule.is_marker(), editing_seen) {
                (true, Some(editor)) => {
                    return Err(PatchError::Config(format!(
                        "skip rule '{}' must come before editing rule '{editor}'",
                        rule.name()
                    )));
                }
                (false, None) => editing_seen = Some(rule.name()),
                _ => {}
            }
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns descriptions of all rules, in order.
    pub fn describe(&self) -> Vec<String> {
        self.rules.iter().map(ToString::to_string).collect()
    }

    /// Runs every rule over `source` in order.
    ///
    /// A rule that fails is recorded and skipped; the content it was given
    /// flows on to the next rule untouched.
    pub fn apply(&self, source: &str, path: &Path) -> PipelineOutcome {
        self.apply_with(source, path, Newline::Lf)
    }

    /// Runs every rule, writing line breaks in added text as `newline`.
    pub fn apply_with(&self, source: &str, path: &Path, newline: Newline) -> PipelineOutcome {
        let mut text = source.to_string();
        let mut outcomes = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            if !rule.applies_to(path) {
                debug!(rule = rule.name(), path = %path.display(), "rule out of scope");
                outcomes.push(outcome(rule, RuleStatus::OutOfScope));
                continue;
            }

            if rule.is_marker() {
                if rule.marker_found(&text) {
                    debug!(rule = rule.name(), path = %path.display(), "marker present, skipping file");
                    return PipelineOutcome::AlreadyApplied {
                        rule: rule.name().to_string(),
                    };
                }
                outcomes.push(outcome(rule, RuleStatus::NoMatch));
                continue;
            }

            let status = match rule.apply_with(&text, newline) {
                Ok(Edit::Changed(next)) => {
                    text = next;
                    RuleStatus::Applied
                }
                Ok(Edit::Unchanged(status)) => {
                    if status == RuleStatus::NoMatch {
                        debug!(rule = rule.name(), path = %path.display(), "pattern not found");
                    }
                    status
                }
                Err(err) => {
                    debug!(rule = rule.name(), path = %path.display(), error = %err, "rule failed");
                    RuleStatus::Failed {
                        message: err.to_string(),
                    }
                }
            };
            outcomes.push(outcome(rule, status));
        }

        PipelineOutcome::Completed {
            text,
            rules: outcomes,
        }
    }

    /// Runs the pipeline over its own output and reports whether the second
    /// pass left it unchanged.
    pub fn is_idempotent_on(&self, output: &str, path: &Path, newline: Newline) -> bool {
        match self.apply_with(output, path, newline) {
            PipelineOutcome::AlreadyApplied { .. } => true,
            PipelineOutcome::Completed { text, .. } => text == output,
        }
    }
}

fn outcome(rule: &Rule, status: RuleStatus) -> RuleOutcome {
    RuleOutcome {
        rule: rule.name().to_string(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Pattern, Replacement};

    const PATH: &str = "/project/src/A.java";

    fn license_pipeline() -> Pipeline {
        Pipeline::new(vec![
            Rule::skip_if_present("licensed", Pattern::literal("MIT License").unwrap()),
            Rule::insert_before(
                "add-license",
                Pattern::literal("class A").unwrap(),
                "/* MIT License */\n",
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_end_to_end_example() {
        let pipeline = license_pipeline();
        let input = "/* Copyright 2020 */\nclass A {}";

        let first = pipeline.apply(input, Path::new(PATH));
        assert_eq!(
            first.text(),
            Some("/* Copyright 2020 */\n/* MIT License */\nclass A {}")
        );

        let second = pipeline.apply(first.text().unwrap(), Path::new(PATH));
        assert_eq!(
            second,
            PipelineOutcome::AlreadyApplied {
                rule: "licensed".to_string()
            }
        );
    }

    #[test]
    fn test_marker_short_circuits_other_rules() {
        let pipeline = Pipeline::new(vec![
            Rule::skip_if_present("licensed", Pattern::literal("MIT License").unwrap()),
            Rule::rename("rename", "A", "B").unwrap(),
        ])
        .unwrap();

        let outcome = pipeline.apply("/* MIT License */ class A {}", Path::new(PATH));

        assert!(matches!(outcome, PipelineOutcome::AlreadyApplied { .. }));
    }

    #[test]
    fn test_later_rules_see_earlier_output() {
        let pipeline = Pipeline::new(vec![
            Rule::rename("first", "Alpha", "Beta").unwrap(),
            Rule::rename("second", "Beta", "Gamma").unwrap(),
        ])
        .unwrap();

        let outcome = pipeline.apply("class Alpha {}", Path::new(PATH));

        assert_eq!(outcome.text(), Some("class Gamma {}"));
    }

    #[test]
    fn test_failed_rule_does_not_block_the_rest() {
        let pipeline = Pipeline::new(vec![
            Rule::substitute(
                "broken",
                Pattern::regex(r"class (\w+)").unwrap(),
                Replacement::Template("class ${name}".into()),
            ),
            Rule::rename("rename", "A", "B").unwrap(),
        ])
        .unwrap();

        let PipelineOutcome::Completed { text, rules } =
            pipeline.apply("class A {}", Path::new(PATH))
        else {
            panic!("expected a completed pass");
        };

        assert_eq!(text, "class B {}");
        assert!(matches!(rules[0].status, RuleStatus::Failed { .. }));
        assert_eq!(rules[1].status, RuleStatus::Applied);
    }

    #[test]
    fn test_no_applicable_rules_leaves_content() {
        let pipeline = license_pipeline();
        let outcome = pipeline.apply("interface B {}", Path::new(PATH));

        let PipelineOutcome::Completed { text, rules } = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(text, "interface B {}");
        assert!(rules.iter().all(|r| r.status == RuleStatus::NoMatch));
    }

    #[test]
    fn test_out_of_scope_rules_are_reported() {
        let pipeline = Pipeline::new(vec![
            Rule::rename("server-only", "A", "B")
                .unwrap()
                .only_in("**/Server.java")
                .unwrap(),
        ])
        .unwrap();

        let PipelineOutcome::Completed { text, rules } =
            pipeline.apply("class A {}", Path::new(PATH))
        else {
            panic!("expected a completed pass");
        };
        assert_eq!(text, "class A {}");
        assert_eq!(rules[0].status, RuleStatus::OutOfScope);
    }

    #[test]
    fn test_first_match_bound_per_pass() {
        let pipeline = Pipeline::new(vec![Rule::rename("rename", "foo", "bar").unwrap()]).unwrap();

        let outcome = pipeline.apply("foo(); foo(); foo();", Path::new(PATH));

        assert_eq!(outcome.text(), Some("bar(); foo(); foo();"));
    }

    #[test]
    fn test_idempotence_check() {
        let pipeline = license_pipeline();
        let out = "/* MIT License */\nclass A {}";
        assert!(pipeline.is_idempotent_on(out, Path::new(PATH), Newline::Lf));

        let runaway = Pipeline::new(vec![Rule::rename("rename", "foo", "bar").unwrap()]).unwrap();
        assert!(!runaway.is_idempotent_on("bar(); foo();", Path::new(PATH), Newline::Lf));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(Pipeline::new(vec![]), Err(PatchError::Config(_))));

        let late_marker = Pipeline::new(vec![
            Rule::rename("rename", "A", "B").unwrap(),
            Rule::skip_if_present("licensed", Pattern::literal("MIT").unwrap()),
        ]);
        assert!(matches!(late_marker, Err(PatchError::Config(msg)) if msg.contains("licensed")));

        let duplicate = Pipeline::new(vec![
            Rule::rename("same", "A", "B").unwrap(),
            Rule::rename("same", "C", "D").unwrap(),
        ]);
        assert!(matches!(duplicate, Err(PatchError::Config(_))));
    }
}

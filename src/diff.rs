//! Diff rendering and change statistics for previews.

use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::fmt::{self, Write};
use std::path::Path;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Renders a unified diff of one file.
pub fn render(original: &str, modified: &str, path: &Path) -> String {
    let diff = TextDiff::from_lines(original, modified);
    let mut output = String::new();

    let _ = writeln!(output, "--- a/{}", path.display());
    let _ = writeln!(output, "+++ b/{}", path.display());

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        let _ = writeln!(output, "{}", hunk.header());
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            let _ = write!(output, "{sign}{}", change.value());
            if change.missing_newline() {
                output.push('\n');
            }
        }
    }

    output
}

/// Adds ANSI colours to a diff produced by [`render`], for terminal display.
pub fn colorize(diff: &str) -> String {
    let mut output = String::with_capacity(diff.len() + diff.len() / 4);
    for line in diff.lines() {
        let paint = if line.starts_with("---") || line.starts_with("+++") || line.starts_with("@@") {
            CYAN
        } else if line.starts_with('-') {
            RED
        } else if line.starts_with('+') {
            GREEN
        } else {
            ""
        };
        if paint.is_empty() {
            let _ = writeln!(output, "{line}");
        } else {
            let _ = writeln!(output, "{paint}{line}{RESET}");
        }
    }
    output
}

/// Line counts for the changes made to one or more files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    /// Counts inserted and deleted lines between two versions of a file.
    pub fn from_diff(original: &str, modified: &str) -> Self {
        let diff = TextDiff::from_lines(original, modified);
        let mut insertions = 0;
        let mut deletions = 0;

        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => insertions += 1,
                ChangeTag::Delete => deletions += 1,
                ChangeTag::Equal => {}
            }
        }

        Self {
            files_changed: usize::from(insertions > 0 || deletions > 0),
            insertions,
            deletions,
        }
    }

    /// Adds another summary into this one.
    pub fn merge(&mut self, other: &DiffSummary) {
        self.files_changed += other.files_changed;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s) changed, {} insertions(+), {} deletions(-)",
            self.files_changed, self.insertions, self.deletions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain() {
        let out = render(
            "class A {}\n",
            "/* MIT License */\nclass A {}\n",
            Path::new("src/A.java"),
        );

        assert!(out.starts_with("--- a/src/A.java\n+++ b/src/A.java\n"));
        assert!(out.contains("+/* MIT License */\n"));
        assert!(out.contains(" class A {}\n"));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn test_colorize() {
        let out = colorize(&render("a\n", "b\n", Path::new("x")));
        assert!(out.starts_with(&format!("{CYAN}--- a/x{RESET}\n")));
        assert!(out.contains(&format!("{RED}-a{RESET}\n")));
        assert!(out.contains(&format!("{GREEN}+b{RESET}\n")));
    }

    #[test]
    fn test_summary() {
        let mut total = DiffSummary::from_diff("a\nb\n", "a\nc\nd\n");
        assert_eq!(total.insertions, 2);
        assert_eq!(total.deletions, 1);
        assert_eq!(total.files_changed, 1);

        total.merge(&DiffSummary::from_diff("same\n", "same\n"));
        assert_eq!(total.files_changed, 1);
        assert_eq!(
            total.to_string(),
            "1 file(s) changed, 2 insertions(+), 1 deletions(-)"
        );
    }
}

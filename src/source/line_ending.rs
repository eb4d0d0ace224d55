//! Line terminator detection and restoration.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A single line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Newline {
    Lf,
    CrLf,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }

    /// Rewrites the line breaks of text a rule adds to use this terminator.
    pub fn render(self, text: &str) -> Cow<'_, str> {
        match self {
            Newline::Lf => Cow::Borrowed(text),
            Newline::CrLf if !text.contains('\n') => Cow::Borrowed(text),
            Newline::CrLf => force(text, Newline::CrLf),
        }
    }
}

/// The line terminator convention found in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum LineEnding {
    /// Every terminator is the same.
    Uniform { newline: Newline },
    /// Both kinds occur; `dominant` is the more frequent (LF on a tie).
    Mixed { dominant: Newline },
    /// No line terminators at all.
    Absent,
}

impl LineEnding {
    /// Samples the terminators of `text`. A bare `\r` is not a terminator.
    pub fn detect(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut crlf = 0usize;
        let mut lf = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                if i > 0 && bytes[i - 1] == b'\r' {
                    crlf += 1;
                } else {
                    lf += 1;
                }
            }
        }

        match (lf, crlf) {
            (0, 0) => LineEnding::Absent,
            (_, 0) => LineEnding::Uniform {
                newline: Newline::Lf,
            },
            (0, _) => LineEnding::Uniform {
                newline: Newline::CrLf,
            },
            (lf, crlf) => LineEnding::Mixed {
                dominant: if crlf > lf { Newline::CrLf } else { Newline::Lf },
            },
        }
    }

    /// The terminator new lines should use.
    pub fn dominant(&self) -> Newline {
        match self {
            LineEnding::Uniform { newline } => *newline,
            LineEnding::Mixed { dominant } => *dominant,
            LineEnding::Absent => Newline::Lf,
        }
    }

    /// The terminator for lines that rules add.
    ///
    /// Uniform files are presented to rules with LF and restored on write, so
    /// rules add LF. Mixed files are passed through as they are, so added
    /// lines take the dominant terminator.
    pub fn rule_newline(&self) -> Newline {
        match self {
            LineEnding::Mixed { dominant } => *dominant,
            _ => Newline::Lf,
        }
    }

    /// Converts file text into the form rules see.
    ///
    /// Uniform CRLF text is presented with LF terminators; everything else is
    /// passed through so mixed files are never normalized.
    pub fn normalize<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            LineEnding::Uniform {
                newline: Newline::CrLf,
            } => Cow::Owned(text.replace("\r\n", "\n")),
            _ => Cow::Borrowed(text),
        }
    }

    /// Inverse of [`LineEnding::normalize`].
    pub fn restore<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            LineEnding::Uniform {
                newline: Newline::CrLf,
            } => Cow::Owned(text.replace('\n', "\r\n")),
            _ => Cow::Borrowed(text),
        }
    }
}

/// How the writer chooses terminators for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEndingPolicy {
    /// Keep whatever the file used.
    #[default]
    Preserve,
    /// Rewrite every terminator as LF.
    Lf,
    /// Rewrite every terminator as CRLF.
    CrLf,
}

impl LineEndingPolicy {
    /// Applies the policy to rule output for a file with the given style.
    pub fn apply<'a>(&self, text: &'a str, original: LineEnding) -> Cow<'a, str> {
        match self {
            LineEndingPolicy::Preserve => original.restore(text),
            LineEndingPolicy::Lf => force(text, Newline::Lf),
            LineEndingPolicy::CrLf => force(text, Newline::CrLf),
        }
    }

    /// Returns true if writing unchanged text would leave a file of this
    /// style as it is.
    pub fn keeps(&self, original: LineEnding) -> bool {
        match self {
            LineEndingPolicy::Preserve => true,
            LineEndingPolicy::Lf => matches!(
                original,
                LineEnding::Absent
                    | LineEnding::Uniform {
                        newline: Newline::Lf
                    }
            ),
            LineEndingPolicy::CrLf => matches!(
                original,
                LineEnding::Absent
                    | LineEnding::Uniform {
                        newline: Newline::CrLf
                    }
            ),
        }
    }
}

fn force(text: &str, newline: Newline) -> Cow<'_, str> {
    let unified = text.replace("\r\n", "\n");
    match newline {
        Newline::Lf => Cow::Owned(unified),
        Newline::CrLf => Cow::Owned(unified.replace('\n', "\r\n")),
    }
}

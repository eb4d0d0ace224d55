//! Patterns that rules search for, and the replacements they produce.

use crate::error::Result;
use crate::source::Newline;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::Arc;

/// A literal or regular expression searched for in file content.
#[derive(Clone)]
pub struct Pattern {
    regex: Regex,
    literal: Option<String>,
}

impl Pattern {
    /// Matches the exact text.
    pub fn literal(text: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(&regex::escape(text))?,
            literal: Some(text.to_string()),
        })
    }

    /// Matches a regular expression (`regex` crate syntax, inline flags allowed).
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            literal: None,
        })
    }

    /// Matches an identifier as a whole word.
    pub fn word(identifier: &str) -> Result<Self> {
        Self::regex(&format!(r"\b{}\b", regex::escape(identifier)))
    }

    /// Matches the empty position at the start of the content.
    pub fn start_of_file() -> Result<Self> {
        Self::regex(r"\A")
    }

    /// Returns true if the pattern occurs anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Finds the first occurrence in document order.
    pub fn find<'t>(&self, text: &'t str) -> Option<regex::Match<'t>> {
        self.regex.find(text)
    }

    /// Captures the first occurrence in document order.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.regex.captures(text)
    }

    /// The source text of the pattern.
    pub fn as_str(&self) -> &str {
        self.literal.as_deref().unwrap_or(self.regex.as_str())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            Some(text) => write!(f, "Literal({text:?})"),
            None => write!(f, "Regex({:?})", self.regex.as_str()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            Some(text) => write!(f, "'{text}'"),
            None => write!(f, "/{}/", self.regex.as_str()),
        }
    }
}

/// A caller-supplied replacement computed from the match.
pub type ReplaceFn = dyn Fn(&Captures<'_>) -> std::result::Result<String, String> + Send + Sync;

/// What a substitution puts in place of its match.
#[derive(Clone)]
pub enum Replacement {
    /// Inserted verbatim.
    Literal(String),
    /// Expanded with `$N`, `${N}`, `${name}` and `$$`.
    Template(String),
    /// Removes the match.
    Delete,
    /// Computed by a function.
    Function(Arc<ReplaceFn>),
}

impl Replacement {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Captures<'_>) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        Replacement::Function(Arc::new(f))
    }

    /// Produces the replacement text for one match.
    pub fn render(&self, caps: &Captures<'_>) -> std::result::Result<String, String> {
        self.render_with(caps, Newline::Lf)
    }

    /// Like [`Replacement::render`], with the line breaks of literal and
    /// template text written as `newline`. Captured text is copied as it is.
    pub fn render_with(
        &self,
        caps: &Captures<'_>,
        newline: Newline,
    ) -> std::result::Result<String, String> {
        match self {
            Replacement::Literal(text) => Ok(newline.render(text).into_owned()),
            Replacement::Template(template) => expand(&newline.render(template), caps),
            Replacement::Delete => Ok(String::new()),
            Replacement::Function(f) => f(caps),
        }
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Replacement::Template(text) => f.debug_tuple("Template").field(text).finish(),
            Replacement::Delete => f.write_str("Delete"),
            Replacement::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Expands a replacement template against the captures of one match.
///
/// Unlike `Captures::expand`, a reference to a group that does not exist or
/// did not take part in the match is an error rather than empty text.
fn expand(template: &str, caps: &Captures<'_>) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];

        if let Some(tail) = rest.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }

        let (name, tail) = if let Some(braced) = rest.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], &braced[end + 1..]),
                None => return Err(format!("unterminated group reference in '{template}'")),
            }
        } else {
            let end = rest
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map_or(rest.len(), |(i, _)| i);
            if end == 0 {
                out.push('$');
                continue;
            }
            (&rest[..end], &rest[end..])
        };

        let group = match name.parse::<usize>() {
            Ok(index) => caps.get(index),
            Err(_) => caps.name(name),
        };
        match group {
            Some(m) => out.push_str(m.as_str()),
            None => return Err(format!("capture group '{name}' is absent from the match")),
        }
        rest = tail;
    }

    out.push_str(rest);
    Ok(out)
}

//! Backend query expressions
//!
//! An [`Expression`] is an opaque s-expression string handed to the
//! folder layer. The helpers here only assemble strings; evaluation
//! happens in the mail backend.

use serde::{Deserialize, Serialize};
use std::fmt;

const MATCH_ALL: &str = "(match-all ";
const MATCH_THREADS: &str = "(match-threads ";

/// A backend query string. Empty means "no search".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(String);

impl Expression {
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the expression already traverses folder content.
    #[must_use]
    pub fn is_folder_query(&self) -> bool {
        self.0.starts_with(MATCH_ALL) || self.0.contains(MATCH_THREADS)
    }

    /// Enclose a per-message expression in `(match-all …)` so it
    /// applies to every message of a folder. Empty expressions and
    /// expressions that already are folder queries pass through.
    #[must_use]
    pub fn into_folder_query(self) -> Self {
        if self.is_empty() || self.0.contains(MATCH_ALL) || self.0.contains(MATCH_THREADS) {
            self
        } else {
            Self(format!("{MATCH_ALL}{})", self.0))
        }
    }

    /// Conjoin with a per-message predicate, producing
    /// `(and self (match-all predicate))`, or just
    /// `(match-all predicate)` when `self` is empty.
    #[must_use]
    pub fn and_match_all(self, predicate: &str) -> Self {
        if self.is_empty() {
            Self(format!("{MATCH_ALL}{predicate})"))
        } else {
            Self(format!("(and {} {MATCH_ALL}{predicate}))", self.0))
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Expression {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl From<&str> for Expression {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

/// Quote a string literal for the expression language.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Split search text into words for highlighting.
///
/// Whitespace separates words; a double-quoted run is kept as one
/// word without its quotes.
#[must_use]
pub fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => {
                if quoted && !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                quoted = !quoted;
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

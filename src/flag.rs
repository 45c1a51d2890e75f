//! Message flags referenced by search expressions
//!
//! System flags are tested with `(system-flag "…")` and keyword flags
//! with `(user-flag "…")`. Keeping them as an enum avoids scattering
//! flag spellings across the filter code.

use std::fmt;

/// A message flag a quick filter can test.
///
/// # Examples
///
/// ```
/// use federated_mail_search::Flag;
///
/// assert_eq!(Flag::Seen.predicate(), "(system-flag \"Seen\")");
/// assert_eq!(Flag::HasNote.predicate(), "(user-flag \"$has_note\")");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message is flagged as important.
    Flagged,
    /// Message was classified as junk.
    Junk,
    /// Message carries at least one attachment.
    Attachments,
    /// Message has a follow-up note attached.
    HasNote,
    /// An arbitrary user keyword.
    Keyword(String),
}

impl Flag {
    /// The flag name as the expression language spells it.
    #[must_use]
    pub fn as_expr_str(&self) -> &str {
        match self {
            Self::Seen => "Seen",
            Self::Flagged => "Flagged",
            Self::Junk => "junk",
            Self::Attachments => "Attachments",
            Self::HasNote => "$has_note",
            Self::Keyword(kw) => kw,
        }
    }

    /// Whether this is a system flag rather than a user keyword.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        !matches!(self, Self::HasNote | Self::Keyword(_))
    }

    /// The predicate that matches messages carrying this flag.
    #[must_use]
    pub fn predicate(&self) -> String {
        let function = if self.is_system() {
            "system-flag"
        } else {
            "user-flag"
        };
        format!("({function} {})", crate::expression::quote(self.as_expr_str()))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_expr_str())
    }
}

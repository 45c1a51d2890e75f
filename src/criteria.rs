//! Criteria builder
//!
//! Turns the search bar state into a backend [`Expression`] in two
//! layers: the rule layer (quick-search template or explicit rule) and
//! the quick-filter layer that conjoins a flag, date, label or thread
//! predicate.

use crate::error::{Error, Result};
use crate::expression::{Expression, quote, split_words};
use crate::flag::Flag;
use crate::folder::FolderRole;
use crate::label::{Label, LabelRegistry, LabelSet};
use crate::rule::{RuleSource, SearchKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Five days, in seconds.
const LAST_DAYS_WINDOW: u32 = 5 * 24 * 60 * 60;

/// How many folders a search spans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchScope {
    #[default]
    CurrentFolder,
    CurrentFolderAndSubfolders,
    CurrentAccount,
    AllAccounts,
}

impl SearchScope {
    /// Whether the scope needs a virtual folder.
    #[must_use]
    pub const fn is_expanding(self) -> bool {
        !matches!(self, Self::CurrentFolder)
    }
}

/// The fixed quick filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    #[default]
    All,
    Unread,
    Read,
    NoLabel,
    Last5Days,
    WithAttachments,
    WithNotes,
    Important,
    NotJunk,
    Thread,
}

/// A quick filter: one of the fixed kinds, or a single label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuickFilter {
    Fixed(FilterKind),
    Label(String),
}

impl Default for QuickFilter {
    fn default() -> Self {
        Self::Fixed(FilterKind::All)
    }
}

impl From<FilterKind> for QuickFilter {
    fn from(kind: FilterKind) -> Self {
        Self::Fixed(kind)
    }
}

impl QuickFilter {
    #[must_use]
    pub fn label(tag: impl Into<String>) -> Self {
        Self::Label(tag.into())
    }

    #[must_use]
    pub const fn is_thread(&self) -> bool {
        matches!(self, Self::Fixed(FilterKind::Thread))
    }
}

/// Everything the search bar holds at the moment of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub text: String,
    pub kind: SearchKind,
    /// Explicitly selected rule id, used by advanced searches.
    pub rule: Option<String>,
    pub filter: QuickFilter,
    pub scope: SearchScope,
}

impl SearchCriteria {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// An advanced search with a saved rule.
    #[must_use]
    pub fn advanced(rule: impl Into<String>) -> Self {
        Self {
            kind: SearchKind::Advanced,
            rule: Some(rule.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn kind(mut self, kind: SearchKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<QuickFilter>) -> Self {
        self.filter = filter.into();
        self
    }

    #[must_use]
    pub const fn scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Whether the user asked for a text or rule search, as opposed
    /// to only a quick filter.
    #[must_use]
    pub const fn has_search(&self) -> bool {
        !self.text.is_empty() || self.rule.is_some()
    }
}

/// Folder-dependent inputs to [`CriteriaBuilder::build`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContext<'a> {
    /// Role of the folder selected in the folder tree.
    pub folder_role: FolderRole,
    /// Message uids captured when the thread filter was selected.
    pub thread_uids: Option<&'a [String]>,
}

/// Output of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltQuery {
    pub expression: Expression,
    /// Words to highlight in message bodies.
    pub search_words: Vec<String>,
}

/// Builds expressions from search criteria.
///
/// Keeps the label list in sync through a registry subscription and
/// caches the "no label" predicate until the labels change.
pub struct CriteriaBuilder {
    rules: Arc<dyn RuleSource>,
    labels: watch::Receiver<LabelSet>,
    no_label: Option<String>,
}

impl CriteriaBuilder {
    #[must_use]
    pub fn new(rules: Arc<dyn RuleSource>, registry: &LabelRegistry) -> Self {
        Self {
            rules,
            labels: registry.subscribe(),
            no_label: None,
        }
    }

    /// Build the expression for `criteria`.
    ///
    /// Identical inputs (criteria, context and label list) always give
    /// byte-identical output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRule`] if the selected rule or the
    /// template for the search kind does not exist.
    pub fn build(&mut self, criteria: &SearchCriteria, ctx: &BuildContext<'_>) -> Result<BuiltQuery> {
        let mut search_words = Vec::new();

        let base = if criteria.kind == SearchKind::Advanced || criteria.text.is_empty() {
            match &criteria.rule {
                Some(id) => self
                    .rules
                    .rule(id)
                    .ok_or_else(|| Error::UnknownRule(id.clone()))?
                    .serialize(),
                None => Expression::empty(),
            }
        } else {
            let template = self
                .rules
                .template(criteria.kind)
                .ok_or_else(|| Error::UnknownRule(format!("{:?}", criteria.kind)))?;
            if template.searches_body() {
                search_words = split_words(&criteria.text);
            }
            template.with_text(&criteria.text).serialize()
        };

        let expression = self.apply_filter(base.into_folder_query(), &criteria.filter, ctx);
        debug!("Built search expression: {}", expression);

        Ok(BuiltQuery {
            expression,
            search_words,
        })
    }

    fn apply_filter(&mut self, query: Expression, filter: &QuickFilter, ctx: &BuildContext<'_>) -> Expression {
        let kind = match filter {
            QuickFilter::Label(tag) => {
                return query.and_match_all(&Label::new(tag.as_str(), "").predicate());
            }
            QuickFilter::Fixed(kind) => *kind,
        };

        match kind {
            FilterKind::All => query,
            FilterKind::Unread => query.and_match_all(&format!("(not {})", Flag::Seen.predicate())),
            FilterKind::Read => query.and_match_all(&Flag::Seen.predicate()),
            FilterKind::NoLabel => {
                let predicate = self.no_label_predicate();
                query.and_match_all(&predicate)
            }
            FilterKind::Last5Days => {
                let date = if ctx.folder_role == FolderRole::Sent {
                    "get-sent-date"
                } else {
                    "get-received-date"
                };
                query.and_match_all(&format!(
                    "(> ({date}) (- (get-current-date) {LAST_DAYS_WINDOW}))"
                ))
            }
            FilterKind::WithAttachments => query.and_match_all(&Flag::Attachments.predicate()),
            FilterKind::WithNotes => query.and_match_all(&Flag::HasNote.predicate()),
            FilterKind::Important => query.and_match_all(&Flag::Flagged.predicate()),
            FilterKind::NotJunk => query.and_match_all(&format!("(not {})", Flag::Junk.predicate())),
            FilterKind::Thread => thread_query(&query, ctx.thread_uids.unwrap_or(&[])),
        }
    }

    fn no_label_predicate(&mut self) -> String {
        if self.labels.has_changed().unwrap_or(false) {
            self.labels.mark_unchanged();
            self.no_label = None;
            debug!("Labels changed, dropping cached predicate");
        }

        self.no_label
            .get_or_insert_with(|| {
                let labels = self.labels.borrow();
                let mut predicate = String::from("(and");
                for label in labels.iter() {
                    predicate.push_str(" (not ");
                    predicate.push_str(&label.predicate());
                    predicate.push(')');
                }
                predicate.push(')');
                predicate
            })
            .clone()
    }
}

/// Restrict `query` to the threads of the captured messages.
fn thread_query(query: &Expression, uids: &[String]) -> Expression {
    let mut threads = String::from("(match-threads \"all\" (match-all (uid");
    if uids.is_empty() {
        threads.push_str(" \"\"");
    }
    for uid in uids {
        threads.push(' ');
        threads.push_str(&quote(uid));
    }
    threads.push_str(")))");

    if query.is_empty() {
        Expression::new(threads)
    } else if query.is_folder_query() {
        Expression::new(format!("(and {query} {threads})"))
    } else {
        Expression::new(format!("(and (match-all {query}) {threads})"))
    }
}

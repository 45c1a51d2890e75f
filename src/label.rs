//! Message labels
//!
//! The registry holds the ordered `(tag, name)` list and publishes
//! every change through a `watch` channel, so the criteria builder can
//! drop cached label predicates without any menu or action plumbing.

use crate::expression::quote;
use crate::flag::Flag;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

const LEGACY_PREFIX: &str = "$Label";

/// A label known to the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub tag: String,
    pub name: String,
}

impl Label {
    #[must_use]
    pub fn new(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
        }
    }

    /// The tag without the legacy `$Label` prefix.
    #[must_use]
    pub fn bare_tag(&self) -> &str {
        self.tag.strip_prefix(LEGACY_PREFIX).unwrap_or(&self.tag)
    }

    /// Predicate matching messages carrying this label in any of its
    /// representations: the legacy `label` user tag, the legacy
    /// `$Label<tag>` keyword, or the plain `<tag>` keyword.
    #[must_use]
    pub fn predicate(&self) -> String {
        let tag = self.bare_tag();
        format!(
            "(or (= (user-tag \"label\") {}) {} {})",
            quote(tag),
            Flag::Keyword(format!("{LEGACY_PREFIX}{tag}")).predicate(),
            Flag::Keyword(tag.to_string()).predicate(),
        )
    }
}

/// Snapshot of the registered labels, in display order.
pub type LabelSet = Arc<[Label]>;

/// Ordered, observable label registry.
#[derive(Debug)]
pub struct LabelRegistry {
    tx: watch::Sender<LabelSet>,
}

impl LabelRegistry {
    #[must_use]
    pub fn new(labels: Vec<Label>) -> Self {
        let (tx, _rx) = watch::channel(LabelSet::from(labels));
        Self { tx }
    }

    /// The stock labels every profile starts with.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Label::new("$Labelimportant", "Important"),
            Label::new("$Labelwork", "Work"),
            Label::new("$Labelpersonal", "Personal"),
            Label::new("$Labeltodo", "To Do"),
            Label::new("$Labellater", "Later"),
        ])
    }

    #[must_use]
    pub fn snapshot(&self) -> LabelSet {
        self.tx.borrow().clone()
    }

    /// Subscribe to label changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LabelSet> {
        self.tx.subscribe()
    }

    /// Append a label, or rename it if the tag already exists.
    pub fn upsert(&self, label: Label) {
        self.tx.send_modify(|set| {
            let mut labels = set.to_vec();
            match labels.iter_mut().find(|l| l.tag == label.tag) {
                Some(existing) => existing.name = label.name,
                None => labels.push(label),
            }
            *set = LabelSet::from(labels);
        });
        debug!("Label registry changed ({} labels)", self.tx.borrow().len());
    }

    /// Remove a label by tag. Returns whether it existed.
    pub fn remove(&self, tag: &str) -> bool {
        self.tx.send_if_modified(|set| {
            let before = set.len();
            let labels: Vec<Label> = set.iter().filter(|l| l.tag != tag).cloned().collect();
            if labels.len() == before {
                return false;
            }
            *set = LabelSet::from(labels);
            true
        })
    }
}

impl Default for LabelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

//! Search rules and quick-search templates
//!
//! A [`FilterRule`] is an ordered list of parts combined with `or`
//! (any) or `and` (all). Quick searches use built-in templates whose
//! text parts receive the user's search text; saved rules are loaded
//! from JSON and used as-is for advanced searches.

use crate::error::{Error, Result};
use crate::expression::{Expression, quote};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// What a rule part matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartRole {
    Subject,
    Body,
    Sender,
    Recipient,
    /// Free-form expression typed by the user.
    FreeForm,
    /// Literal expression code, never substituted.
    Code,
}

impl PartRole {
    /// Whether quick-search text is substituted into this role.
    #[must_use]
    pub const fn accepts_text(self) -> bool {
        !matches!(self, Self::Code)
    }
}

/// One condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePart {
    pub role: PartRole,
    #[serde(default)]
    pub value: String,
}

impl RulePart {
    #[must_use]
    pub const fn template(role: PartRole) -> Self {
        Self {
            role,
            value: String::new(),
        }
    }

    #[must_use]
    pub fn new(role: PartRole, value: impl Into<String>) -> Self {
        Self {
            role,
            value: value.into(),
        }
    }

    /// Serialize this part to expression code.
    #[must_use]
    pub fn code(&self) -> String {
        let v = quote(&self.value);
        match self.role {
            PartRole::Subject => format!("(header-contains \"subject\" {v})"),
            PartRole::Body => format!("(body-contains {v})"),
            PartRole::Sender => format!("(header-contains \"from\" {v})"),
            PartRole::Recipient => {
                format!("(or (header-contains \"to\" {v}) (header-contains \"cc\" {v}))")
            }
            PartRole::FreeForm | PartRole::Code => self.value.clone(),
        }
    }
}

/// How the parts of a rule combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    #[default]
    Any,
    All,
}

/// A named, parametrized search rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub grouping: Grouping,
    pub parts: Vec<RulePart>,
}

impl FilterRule {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, grouping: Grouping) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            grouping,
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn part(mut self, part: RulePart) -> Self {
        self.parts.push(part);
        self
    }

    /// Copy of this rule with `text` substituted into every part that
    /// takes search text.
    #[must_use]
    pub fn with_text(&self, text: &str) -> Self {
        let mut rule = self.clone();
        for part in rule.parts.iter_mut().filter(|p| p.role.accepts_text()) {
            part.value = text.to_string();
        }
        rule
    }

    /// Whether any part searches message bodies.
    #[must_use]
    pub fn searches_body(&self) -> bool {
        self.parts.iter().any(|p| p.role == PartRole::Body)
    }

    /// Serialize the rule to an expression.
    #[must_use]
    pub fn serialize(&self) -> Expression {
        let codes: Vec<String> = self
            .parts
            .iter()
            .map(RulePart::code)
            .filter(|c| !c.is_empty())
            .collect();

        match codes.len() {
            0 => Expression::empty(),
            1 => Expression::new(codes.concat()),
            _ => {
                let op = match self.grouping {
                    Grouping::Any => "or",
                    Grouping::All => "and",
                };
                Expression::new(format!("({op} {})", codes.join(" ")))
            }
        }
    }
}

/// Quick-search kinds offered next to the search entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchKind {
    #[default]
    SubjectOrAddressesContain,
    SubjectContains,
    SenderContains,
    RecipientsContain,
    BodyContains,
    MessageContains,
    FreeFormExpr,
    /// Use the explicitly selected rule; the search text is ignored.
    Advanced,
}

impl SearchKind {
    /// The built-in template for this kind. `None` for
    /// [`SearchKind::Advanced`].
    #[must_use]
    pub fn builtin_template(self) -> Option<FilterRule> {
        use PartRole::{Body, FreeForm, Recipient, Sender, Subject};

        let (id, name, roles): (&str, &str, &[PartRole]) = match self {
            Self::SubjectOrAddressesContain => (
                "subject-or-addresses-contain",
                "Subject or Addresses contain",
                &[Subject, Sender, Recipient],
            ),
            Self::SubjectContains => ("subject-contains", "Subject contains", &[Subject]),
            Self::SenderContains => ("sender-contains", "Sender contains", &[Sender]),
            Self::RecipientsContain => ("recipients-contain", "Recipients contain", &[Recipient]),
            Self::BodyContains => ("body-contains", "Body contains", &[Body]),
            Self::MessageContains => (
                "message-contains",
                "Message contains",
                &[Subject, Sender, Recipient, Body],
            ),
            Self::FreeFormExpr => ("free-form-expr", "Free form expression", &[FreeForm]),
            Self::Advanced => return None,
        };

        Some(
            roles
                .iter()
                .fold(FilterRule::new(id, name, Grouping::Any), |rule, role| {
                    rule.part(RulePart::template(*role))
                }),
        )
    }
}

/// Where the criteria builder loads rules from.
pub trait RuleSource: Send + Sync {
    /// A saved rule by id.
    fn rule(&self, id: &str) -> Option<FilterRule>;

    /// The template for a quick-search kind.
    fn template(&self, kind: SearchKind) -> Option<FilterRule> {
        kind.builtin_template()
    }
}

/// Built-in templates plus saved rules.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    saved: BTreeMap<String, FilterRule>,
}

impl RuleBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse saved rules from a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleFile`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Vec<FilterRule> = serde_json::from_str(json)?;
        let mut book = Self::new();
        for rule in rules {
            book.insert(rule);
        }
        Ok(book)
    }

    /// Load saved rules from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid rule JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {e}", path.display())))?;
        let book = Self::from_json(&json)?;
        info!("Loaded {} saved rules from {}", book.len(), path.display());
        Ok(book)
    }

    pub fn insert(&mut self, rule: FilterRule) {
        self.saved.insert(rule.id.clone(), rule);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

impl RuleSource for RuleBook {
    fn rule(&self, id: &str) -> Option<FilterRule> {
        self.saved.get(id).cloned()
    }
}

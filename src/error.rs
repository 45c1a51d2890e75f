//! Error types for federated-mail-search

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    /// One store's folder-info fetch or one folder open failed.
    #[error("Store '{store}' unavailable: {reason}")]
    TransientIo { store: String, reason: String },

    /// The synthetic aggregation service could not be reached.
    #[error("Search folder service unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Unknown search rule '{0}'")]
    UnknownRule(String),

    #[error("Invalid rule file: {0}")]
    RuleFile(#[from] serde_json::Error),

    /// The work was superseded. Never shown to the user.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for a [`Error::TransientIo`] against `store`.
    #[must_use]
    pub fn transient(store: impl Into<String>, reason: impl ToString) -> Self {
        Self::TransientIo {
            store: store.into(),
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

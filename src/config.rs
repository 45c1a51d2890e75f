//! Account configuration
//!
//! Accounts are read from environment variables (a `.env` file is
//! honoured). A single unnamed account uses the plain `IMAP_*`
//! variables; several accounts are listed in `MAIL_ACCOUNTS` and each
//! reads `IMAP_<NAME>_*`.

use crate::error::{Error, Result};
use std::env;

/// IMAP connection configuration for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Skip server certificate verification. Only for local bridges
    /// serving self-signed certificates.
    pub insecure: bool,
}

/// A named account whose store takes part in searches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConfig {
    pub name: String,
    pub imap: ImapConfig,
}

impl ImapConfig {
    /// Build a configuration from `<prefix>_*` variables as returned by
    /// `lookup`.
    ///
    /// Required: `<prefix>_USERNAME`, `<prefix>_PASSWORD`.
    ///
    /// Optional (with defaults):
    /// - `<prefix>_HOST` (default: `127.0.0.1`)
    /// - `<prefix>_PORT` (default: `1143`)
    /// - `<prefix>_INSECURE` (default: off; `1`, `true` or `yes`
    ///   accepts any certificate)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or
    /// the port is not a number.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{prefix}_{name}"));

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("PORT")
                .unwrap_or_else(|| "1143".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid {prefix}_PORT: {e}")))?,
            username: var("USERNAME")
                .ok_or_else(|| Error::Config(format!("{prefix}_USERNAME not set")))?,
            password: var("PASSWORD")
                .ok_or_else(|| Error::Config(format!("{prefix}_PASSWORD not set")))?,
            insecure: var("INSECURE").is_some_and(|v| {
                matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
            }),
        })
    }
}

impl AccountConfig {
    /// Load every configured account from the environment
    ///
    /// When `MAIL_ACCOUNTS` is set (comma separated names), each name
    /// `work` reads `IMAP_WORK_HOST`, `IMAP_WORK_PORT`, and so on.
    /// Otherwise a single account named `default` is read from the
    /// plain `IMAP_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any account is incomplete or the
    /// account list is empty.
    pub fn all_from_env() -> Result<Vec<Self>> {
        dotenvy::dotenv().ok();
        Self::all_from_lookup(|key| env::var(key).ok())
    }

    /// [`AccountConfig::all_from_env`] over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`AccountConfig::all_from_env`].
    pub fn all_from_lookup<F>(lookup: F) -> Result<Vec<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(names) = lookup("MAIL_ACCOUNTS") else {
            return Ok(vec![Self {
                name: "default".to_string(),
                imap: ImapConfig::from_lookup("IMAP", &lookup)?,
            }]);
        };

        let accounts = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                let prefix = format!("IMAP_{}", name.to_ascii_uppercase());
                Ok(Self {
                    name: name.to_string(),
                    imap: ImapConfig::from_lookup(&prefix, &lookup)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if accounts.is_empty() {
            return Err(Error::Config("MAIL_ACCOUNTS lists no accounts".into()));
        }
        Ok(accounts)
    }
}

//! Collaborator interfaces
//!
//! The engine never talks to a mail backend directly. Stores, the
//! synthetic aggregation service and the UI are reached through the
//! traits below.

use crate::error::Result;
use crate::folder::{FolderHandle, FolderInfo};
use async_trait::async_trait;
use std::sync::Arc;

/// A mail account's backing store.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Stable identifier of the store.
    fn uid(&self) -> &str;

    /// Human readable account name.
    fn display_name(&self) -> &str;

    /// Whether this is the synthetic store that hosts search folders.
    fn is_aggregate(&self) -> bool {
        false
    }

    /// Fetch the folder hierarchy recursively.
    ///
    /// With `top == None` every root folder is returned. With a path,
    /// the single subtree rooted at that folder is returned.
    async fn folder_info(&self, top: Option<&str>) -> Result<Vec<FolderInfo>>;

    /// Open a folder by full path.
    async fn open_folder(&self, full_name: &str) -> Result<FolderHandle>;
}

/// The set of stores known to the application.
pub trait StoreProvider: Send + Sync {
    /// Every enabled store, in folder-tree order.
    fn stores(&self) -> Vec<Arc<dyn MailStore>>;

    /// Look a store up by uid.
    fn store(&self, uid: &str) -> Option<Arc<dyn MailStore>> {
        self.stores().into_iter().find(|s| s.uid() == uid)
    }
}

impl StoreProvider for Vec<Arc<dyn MailStore>> {
    fn stores(&self) -> Vec<Arc<dyn MailStore>> {
        self.clone()
    }
}

/// The synthetic service hosting ephemeral search folders.
#[async_trait]
pub trait AggregationService: Send + Sync {
    /// Uid of the synthetic store, excluded from enumeration.
    fn store_uid(&self) -> &str;

    /// Make sure the service is reachable.
    async fn connect(&self) -> Result<()>;
}

/// Severity of a user-visible alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Error,
            message: message.into(),
        }
    }
}

/// Every user-visible failure goes through here.
pub trait AlertSink: Send + Sync {
    fn alert(&self, alert: Alert);
}

/// Alert sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn alert(&self, alert: Alert) {
        match alert.level {
            AlertLevel::Info => tracing::info!("{}", alert.message),
            AlertLevel::Warning => tracing::warn!("{}", alert.message),
            AlertLevel::Error => tracing::error!("{}", alert.message),
        }
    }
}

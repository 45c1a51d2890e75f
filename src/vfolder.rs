//! Ephemeral search folders
//!
//! One [`VirtualFolder`] per aggregate scope, created on the first
//! expanding search and reused while the session lives. Membership is
//! an immutable snapshot replaced wholesale through a `watch` channel,
//! so readers see either the old set or the new one.

use crate::backend::AggregationService;
use crate::criteria::SearchScope;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::folder::FolderHandle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};

/// Scopes that are served by a virtual folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AggregateScope {
    FolderAndSubfolders,
    Account,
    AllAccounts,
}

impl AggregateScope {
    #[must_use]
    pub const fn from_scope(scope: SearchScope) -> Option<Self> {
        match scope {
            SearchScope::CurrentFolder => None,
            SearchScope::CurrentFolderAndSubfolders => Some(Self::FolderAndSubfolders),
            SearchScope::CurrentAccount => Some(Self::Account),
            SearchScope::AllAccounts => Some(Self::AllAccounts),
        }
    }

    /// Display name of the scope's search folder.
    #[must_use]
    pub const fn folder_name(self) -> &'static str {
        match self {
            Self::FolderAndSubfolders => "Current Folder and Subfolders Search",
            Self::Account => "Account Search",
            Self::AllAccounts => "All Account Search",
        }
    }
}

/// The folders a virtual folder aggregates, as of one accepted build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    /// Generation of the build that produced this set. Zero before
    /// the first build is accepted.
    pub generation: u64,
    pub folders: Vec<FolderHandle>,
    pub built_at: Option<DateTime<Utc>>,
}

impl Membership {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            generation: 0,
            folders: Vec::new(),
            built_at: None,
        }
    }

    #[must_use]
    pub fn built(generation: u64, folders: Vec<FolderHandle>) -> Self {
        Self {
            generation,
            folders,
            built_at: Some(Utc::now()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Outcome of [`VirtualFolder::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// Same expression as before; nothing to do.
    Unchanged,
    /// New expression applied; membership awaits a rebuild.
    Applied,
}

/// An ephemeral, never-persisted search folder.
#[derive(Debug)]
pub struct VirtualFolder {
    scope: AggregateScope,
    expression: Expression,
    sources: Vec<String>,
    stale: bool,
    membership: watch::Sender<Arc<Membership>>,
}

impl VirtualFolder {
    fn new(scope: AggregateScope) -> Self {
        let (membership, _rx) = watch::channel(Arc::new(Membership::empty()));
        Self {
            scope,
            expression: Expression::empty(),
            sources: Vec::new(),
            stale: true,
            membership,
        }
    }

    #[must_use]
    pub const fn scope(&self) -> AggregateScope {
        self.scope
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.scope.folder_name()
    }

    /// The last applied expression.
    #[must_use]
    pub const fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Whether membership lags behind the expression or sources.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    /// Current membership snapshot.
    #[must_use]
    pub fn membership(&self) -> Arc<Membership> {
        self.membership.borrow().clone()
    }

    /// Watch membership replacements.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Membership>> {
        self.membership.subscribe()
    }

    /// Apply `expression`. Equal expressions are a no-op.
    pub fn update(&mut self, expression: &Expression) -> Update {
        if &self.expression == expression {
            return Update::Unchanged;
        }
        debug!("{}: expression changed", self.name());
        self.expression = expression.clone();
        self.stale = true;
        Update::Applied
    }

    /// Record which sources the next build will cover. Returns whether
    /// they differ from the previous ones.
    pub fn set_sources(&mut self, sources: Vec<String>) -> bool {
        if self.sources == sources {
            return false;
        }
        self.sources = sources;
        self.stale = true;
        true
    }

    /// Swap in a new membership snapshot.
    fn install(&mut self, membership: Membership) {
        info!(
            "{}: installed {} folders (generation {})",
            self.name(),
            membership.len(),
            membership.generation
        );
        self.membership.send_replace(Arc::new(membership));
        self.stale = false;
    }
}

/// Owns the session's virtual folders, at most one per scope.
pub struct VirtualFolderManager {
    service: Arc<dyn AggregationService>,
    folders: HashMap<AggregateScope, VirtualFolder>,
}

impl VirtualFolderManager {
    #[must_use]
    pub fn new(service: Arc<dyn AggregationService>) -> Self {
        Self {
            service,
            folders: HashMap::new(),
        }
    }

    /// Uid of the synthetic store hosting the folders.
    #[must_use]
    pub fn aggregation_uid(&self) -> &str {
        self.service.store_uid()
    }

    /// The scope's folder, allocating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the aggregation
    /// service cannot allocate a folder.
    pub async fn get_or_create(&mut self, scope: AggregateScope) -> Result<&mut VirtualFolder> {
        match self.folders.entry(scope) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                self.service.connect().await.map_err(|e| match e {
                    Error::BackendUnavailable(_) => e,
                    other => Error::BackendUnavailable(other.to_string()),
                })?;
                info!("Created search folder '{}'", scope.folder_name());
                Ok(entry.insert(VirtualFolder::new(scope)))
            }
        }
    }

    #[must_use]
    pub fn get(&self, scope: AggregateScope) -> Option<&VirtualFolder> {
        self.folders.get(&scope)
    }

    /// Install a membership snapshot into the scope's folder, if it
    /// still exists.
    pub fn install(&mut self, scope: AggregateScope, membership: Membership) -> bool {
        self.folders.get_mut(&scope).is_some_and(|folder| {
            folder.install(membership);
            true
        })
    }

    /// Drop the scope's folder.
    pub fn teardown(&mut self, scope: AggregateScope) -> bool {
        let removed = self.folders.remove(&scope).is_some();
        if removed {
            debug!("Released search folder '{}'", scope.folder_name());
        }
        removed
    }

    pub fn teardown_all(&mut self) {
        if !self.folders.is_empty() {
            debug!("Releasing {} search folders", self.folders.len());
        }
        self.folders.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// In-process aggregation service.
///
/// Availability can be toggled, which is how the owner reports the
/// backing service going away.
#[derive(Debug)]
pub struct LocalAggregation {
    uid: String,
    available: AtomicBool,
}

impl LocalAggregation {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for LocalAggregation {
    fn default() -> Self {
        Self::new("vfolder")
    }
}

#[async_trait]
impl AggregationService for LocalAggregation {
    fn store_uid(&self) -> &str {
        &self.uid
    }

    async fn connect(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::BackendUnavailable(format!(
                "service '{}' is offline",
                self.uid
            )))
        }
    }
}

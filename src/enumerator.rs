//! Folder enumeration
//!
//! Walks the folder trees of one or more stores and opens every
//! searchable folder. The walk uses an explicit stack, polls the
//! cancellation token at every node, and races each backend call
//! against it. Per-store and per-folder failures are collected and the
//! walk carries on.

use crate::backend::MailStore;
use crate::error::{Error, Result};
use crate::folder::{FolderHandle, FolderInfo};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One store to walk, optionally restricted to a subtree.
#[derive(Clone)]
pub struct EnumerationSource {
    pub store: Arc<dyn MailStore>,
    /// Full path of the subtree root. `None` walks the whole store.
    pub root: Option<String>,
}

impl EnumerationSource {
    #[must_use]
    pub fn store(store: Arc<dyn MailStore>) -> Self {
        Self { store, root: None }
    }

    #[must_use]
    pub fn subtree(store: Arc<dyn MailStore>, root: impl Into<String>) -> Self {
        Self {
            store,
            root: Some(root.into()),
        }
    }

    /// Key identifying what this source covers.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.root {
            Some(root) => format!("{}:{root}", self.store.uid()),
            None => self.store.uid().to_string(),
        }
    }
}

impl std::fmt::Debug for EnumerationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumerationSource")
            .field("store", &self.store.uid())
            .field("root", &self.root)
            .finish()
    }
}

/// Result of a complete, uncancelled walk.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub folders: Vec<FolderHandle>,
    /// Non-fatal failures, in the order they happened.
    pub failures: Vec<Error>,
}

/// Walk `sources` and open every searchable folder.
///
/// Stores flagged as aggregate, or whose uid is `exclude_uid`, are
/// skipped.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if `cancel` fires; nothing collected
/// so far escapes in that case.
pub async fn enumerate(
    sources: &[EnumerationSource],
    exclude_uid: Option<&str>,
    cancel: &CancellationToken,
) -> Result<Enumeration> {
    let mut result = Enumeration::default();

    for source in sources {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let store = &source.store;
        if store.is_aggregate() || exclude_uid == Some(store.uid()) {
            debug!("Skipping aggregate store {}", store.uid());
            continue;
        }

        let roots = match cancellable(cancel, store.folder_info(source.root.as_deref())).await {
            Ok(roots) => roots,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!("Failed to list folders of {}: {}", store.uid(), e);
                result.failures.push(as_transient(store.as_ref(), e));
                continue;
            }
        };

        walk(store.as_ref(), &roots, cancel, &mut result).await?;
    }

    info!(
        "Enumerated {} folders from {} stores ({} failures)",
        result.folders.len(),
        sources.len(),
        result.failures.len()
    );
    Ok(result)
}

/// Pre-order walk of one store's trees.
async fn walk(
    store: &dyn MailStore,
    roots: &[FolderInfo],
    cancel: &CancellationToken,
    result: &mut Enumeration,
) -> Result<()> {
    let mut stack: Vec<&FolderInfo> = roots.iter().rev().collect();

    while let Some(node) = stack.pop() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        stack.extend(node.children.iter().rev());

        if !node.is_searchable() {
            continue;
        }

        match cancellable(cancel, store.open_folder(&node.full_name)).await {
            Ok(handle) if handle.is_virtual() => {
                debug!("Skipping virtual folder {}", handle.folder);
            }
            Ok(handle) => result.folders.push(handle),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!("Failed to open {}:{}: {}", store.uid(), node.full_name, e);
                result.failures.push(as_transient(store, e));
            }
        }
    }
    Ok(())
}

/// Run `fut` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        r = fut => r,
    }
}

fn as_transient(store: &dyn MailStore, e: Error) -> Error {
    match e {
        Error::TransientIo { .. } => e,
        other => Error::transient(store.uid(), other),
    }
}

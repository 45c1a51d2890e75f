//! IMAP-backed mail store

use crate::backend::MailStore;
use crate::config::{AccountConfig, ImapConfig};
use crate::connection::{self, ListedFolder};
use crate::error::{Error, Result};
use crate::folder::{FolderHandle, FolderInfo, FolderRole};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A [`MailStore`] reading one IMAP account.
///
/// Every call opens its own session and logs out afterwards.
pub struct ImapStore {
    uid: String,
    name: String,
    config: ImapConfig,
}

impl ImapStore {
    #[must_use]
    pub fn new(uid: impl Into<String>, config: ImapConfig) -> Self {
        let uid = uid.into();
        Self {
            name: format!("{}@{}", config.username, config.host),
            uid,
            config,
        }
    }

    #[must_use]
    pub fn from_account(account: AccountConfig) -> Self {
        Self::new(account.name, account.imap)
    }

    /// List the account's folders as a flat, sorted name list.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or LIST command fails.
    pub async fn list_folders(&self) -> Result<Vec<String>> {
        let mut session = connection::connect(&self.config).await?;
        let listed = connection::list(&mut session, "").await;
        session.logout().await.ok();

        let mut names: Vec<String> = listed?.into_iter().map(|f| f.name).collect();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl MailStore for ImapStore {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    async fn folder_info(&self, top: Option<&str>) -> Result<Vec<FolderInfo>> {
        let mut session = connection::connect(&self.config).await?;
        let listed = connection::list(&mut session, "").await;
        session.logout().await.ok();
        let listed = listed?;

        debug!("{}: LIST returned {} folders", self.uid, listed.len());
        let roots = build_tree(&listed);

        match top {
            None => Ok(roots),
            Some(top) => find(&roots, top)
                .map(|node| vec![node.clone()])
                .ok_or_else(|| Error::Imap(format!("No such folder: {top}"))),
        }
    }

    async fn open_folder(&self, full_name: &str) -> Result<FolderHandle> {
        let mut session = connection::connect(&self.config).await?;
        let summary = connection::examine(&mut session, full_name).await;
        session.logout().await.ok();
        let summary = summary?;

        info!(
            "{}: opened {} ({} messages)",
            self.uid, full_name, summary.total
        );
        Ok(FolderHandle::regular(&self.uid, full_name, summary))
    }
}

/// Arrange a flat LIST response into a tree.
///
/// Ancestors the server did not report are added as non-selectable
/// placeholders.
fn build_tree(listed: &[ListedFolder]) -> Vec<FolderInfo> {
    let mut nodes: BTreeMap<String, (Option<char>, FolderInfo)> = BTreeMap::new();

    for entry in listed {
        let info = node(&entry.name, entry.delimiter, entry.role, entry.no_select);
        nodes.insert(entry.name.clone(), (entry.delimiter, info));

        if let Some(delim) = entry.delimiter {
            let mut path = entry.name.as_str();
            while let Some((parent, _)) = path.rsplit_once(delim) {
                nodes
                    .entry(parent.to_string())
                    .or_insert_with(|| (Some(delim), node(parent, Some(delim), None, true)));
                path = parent;
            }
        }
    }

    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut roots = Vec::new();
    for (name, (delim, _)) in &nodes {
        match delim.and_then(|d| name.rsplit_once(d)) {
            Some((parent, _)) => children
                .entry(parent.to_string())
                .or_default()
                .push(name.clone()),
            None => roots.push(name.clone()),
        }
    }

    let mut order: Vec<String> = nodes.keys().cloned().collect();
    // Deepest first, so every child is complete when it is moved.
    order.sort_by_key(|name| std::cmp::Reverse(depth(name, nodes[name].0)));
    for name in order {
        if let Some(kids) = children.remove(&name) {
            let attached: Vec<FolderInfo> = kids
                .iter()
                .filter_map(|kid| nodes.remove(kid).map(|(_, info)| info))
                .collect();
            if let Some((_, parent)) = nodes.get_mut(&name) {
                parent.children = attached;
            }
        }
    }

    roots
        .iter()
        .filter_map(|name| nodes.remove(name).map(|(_, info)| info))
        .collect()
}

fn depth(name: &str, delimiter: Option<char>) -> usize {
    delimiter.map_or(0, |d| name.matches(d).count())
}

fn node(full_name: &str, delimiter: Option<char>, role: Option<FolderRole>, no_select: bool) -> FolderInfo {
    let delim = delimiter.unwrap_or('/');
    let mut info = FolderInfo::new(full_name).with_role(
        role.unwrap_or_else(|| FolderRole::from_path(full_name, delim)),
    );
    info.display_name = full_name
        .rsplit(delim)
        .next()
        .unwrap_or(full_name)
        .to_string();
    if no_select {
        info = info.no_select();
    }
    info
}

fn find<'a>(roots: &'a [FolderInfo], full_name: &str) -> Option<&'a FolderInfo> {
    let mut stack: Vec<&FolderInfo> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.full_name == full_name {
            return Some(node);
        }
        stack.extend(node.children.iter().rev());
    }
    None
}

//! Folder types shared by stores, the enumerator and the coordinator
//!
//! A store describes its hierarchy as a tree of [`FolderInfo`] nodes.
//! Opening a folder yields a [`FolderHandle`] carrying summary counts.
//! Well-known folders are recognised through [`FolderRole`].

use serde::Serialize;
use std::fmt;

/// The role of a mailbox folder.
///
/// Well-known folders have dedicated variants. Anything else is
/// [`FolderRole::Custom`].
///
/// # Examples
///
/// ```
/// use federated_mail_search::FolderRole;
///
/// assert_eq!(FolderRole::from("inbox"), FolderRole::Inbox);
/// assert_eq!(FolderRole::from("Projects"), FolderRole::Custom);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum FolderRole {
    /// The INBOX folder (case-insensitive).
    Inbox,
    /// Sent messages.
    Sent,
    /// Draft messages.
    Drafts,
    /// Deleted messages.
    Trash,
    /// Spam / junk messages.
    Junk,
    /// Archived messages.
    Archive,
    /// A user-defined folder.
    #[default]
    Custom,
}

impl FolderRole {
    /// Guess a role from the last segment of a folder path.
    #[must_use]
    pub fn from_path(full_name: &str, delimiter: char) -> Self {
        let leaf = full_name.rsplit(delimiter).next().unwrap_or(full_name);
        if full_name.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            Self::from(leaf)
        }
    }
}

impl From<&str> for FolderRole {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            match s {
                "Sent" | "Sent Items" | "Sent Messages" => Self::Sent,
                "Drafts" => Self::Drafts,
                "Trash" | "Deleted Items" => Self::Trash,
                "Spam" | "Junk" => Self::Junk,
                "Archive" => Self::Archive,
                _ => Self::Custom,
            }
        }
    }
}

/// Flags a store reports for a folder-info node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderFlags {
    /// The node exists only as a hierarchy level and cannot be opened.
    pub no_select: bool,
    /// The folder is itself a virtual/aggregate folder.
    pub is_virtual: bool,
}

/// One node of a store's folder hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderInfo {
    pub full_name: String,
    pub display_name: String,
    pub role: FolderRole,
    pub flags: FolderFlags,
    pub children: Vec<FolderInfo>,
}

impl FolderInfo {
    #[must_use]
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let display_name = full_name.rsplit('/').next().unwrap_or(&full_name).to_string();
        let role = FolderRole::from_path(&full_name, '/');
        Self {
            full_name,
            display_name,
            role,
            flags: FolderFlags::default(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub const fn no_select(mut self) -> Self {
        self.flags.no_select = true;
        self
    }

    #[must_use]
    pub const fn virtual_folder(mut self) -> Self {
        self.flags.is_virtual = true;
        self
    }

    #[must_use]
    pub const fn with_role(mut self, role: FolderRole) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Whether the enumerator may open this node.
    #[must_use]
    pub const fn is_searchable(&self) -> bool {
        !self.flags.no_select && !self.flags.is_virtual
    }
}

/// What kind of folder an opened handle refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum FolderKind {
    /// A concrete folder holding its own messages.
    #[default]
    Regular,
    /// A search/aggregate folder.
    Virtual,
    /// A virtual Trash or Junk folder. Has no subfolders.
    VirtualTrash,
}

/// Summary counts exposed by an opened folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub total: u32,
    pub recent: u32,
}

/// A store-qualified folder path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FolderRef {
    pub store_uid: String,
    pub full_name: String,
}

impl FolderRef {
    #[must_use]
    pub fn new(store_uid: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            store_uid: store_uid.into(),
            full_name: full_name.into(),
        }
    }
}

impl fmt::Display for FolderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.store_uid, self.full_name)
    }
}

/// An opened folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderHandle {
    pub folder: FolderRef,
    pub role: FolderRole,
    pub kind: FolderKind,
    pub summary: FolderSummary,
}

impl FolderHandle {
    #[must_use]
    pub fn regular(store_uid: &str, full_name: &str, summary: FolderSummary) -> Self {
        Self {
            folder: FolderRef::new(store_uid, full_name),
            role: FolderRole::from_path(full_name, '/'),
            kind: FolderKind::Regular,
            summary,
        }
    }

    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        !matches!(self.kind, FolderKind::Regular)
    }
}

//! Federated mail search library
//!
//! Runs one search across a folder, a folder subtree, an account or
//! every configured account. Cross-folder searches are served by
//! ephemeral virtual folders whose membership is enumerated in the
//! background and replaced atomically once complete.
//!
//! The entry point is [`SearchCoordinator`]. Mail accounts plug in
//! through [`MailStore`]; [`ImapStore`] reads real IMAP servers over
//! STARTTLS.

mod backend;
mod config;
mod connection;
mod coordinator;
mod criteria;
mod enumerator;
mod error;
mod expression;
mod flag;
mod folder;
mod imap_store;
mod label;
mod rule;
mod session;
mod vfolder;

pub use backend::{AggregationService, Alert, AlertLevel, AlertSink, LogAlerts, MailStore, StoreProvider};
pub use config::{AccountConfig, ImapConfig};
pub use coordinator::{
    BoundFolder, FolderSelection, NoObserver, SearchCoordinator, SearchObserver, SearchState,
};
pub use criteria::{
    BuildContext, BuiltQuery, CriteriaBuilder, FilterKind, QuickFilter, SearchCriteria, SearchScope,
};
pub use enumerator::{Enumeration, EnumerationSource, enumerate};
pub use error::{Error, Result};
pub use expression::{Expression, quote, split_words};
pub use flag::Flag;
pub use folder::{
    FolderFlags, FolderHandle, FolderInfo, FolderKind, FolderRef, FolderRole, FolderSummary,
};
pub use imap_store::ImapStore;
pub use label::{Label, LabelRegistry, LabelSet};
pub use rule::{FilterRule, Grouping, PartRole, RuleBook, RulePart, RuleSource, SearchKind};
pub use session::{Completion, EnumerationTask, SearchSession};
pub use vfolder::{AggregateScope, LocalAggregation, Membership, Update, VirtualFolder, VirtualFolderManager};

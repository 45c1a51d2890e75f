//! Search coordinator
//!
//! Drives the search state machine for one view:
//!
//! ```text
//!   IDLE ──expanding search──▶ BUILDING ──matching completion──▶ READY
//!    ▲                          │    ▲                            │
//!    │                          └────┘ newer request (SUPERSEDED) │
//!    └──── text cleared / per-folder scope / backend lost ────────┘
//! ```
//!
//! Enumeration results arrive on a channel tagged with the generation
//! that launched them. Anything but the current generation is dropped.

use crate::backend::{Alert, AlertSink, StoreProvider};
use crate::criteria::{BuildContext, CriteriaBuilder, SearchCriteria, SearchScope};
use crate::enumerator::EnumerationSource;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::folder::{FolderInfo, FolderKind, FolderRef, FolderRole};
use crate::session::{Completion, SearchSession};
use crate::vfolder::{AggregateScope, Membership, Update, VirtualFolder, VirtualFolderManager};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Where the coordinator stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchState {
    /// Message list shows the folder-tree selection.
    Idle,
    /// A virtual folder's membership is being built.
    Building {
        scope: AggregateScope,
        generation: u64,
    },
    /// Only ever reported to observers: a build was replaced by a
    /// newer request.
    Superseded {
        scope: AggregateScope,
        generation: u64,
    },
    /// The virtual folder's membership matches the expression.
    Ready {
        scope: AggregateScope,
        generation: u64,
    },
}

impl SearchState {
    #[must_use]
    pub const fn is_building(self) -> bool {
        matches!(self, Self::Building { .. })
    }
}

/// What the message list is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BoundFolder {
    Nothing,
    Folder(FolderRef),
    Virtual(AggregateScope),
}

/// The folder selected in the folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSelection {
    pub folder: FolderRef,
    pub role: FolderRole,
    pub kind: FolderKind,
}

impl FolderSelection {
    /// A selection known only by path. The role is guessed from the
    /// last `/`-separated segment; prefer [`FolderSelection::from_info`]
    /// when the store's folder info is at hand.
    #[must_use]
    pub fn new(store_uid: impl Into<String>, full_name: impl Into<String>) -> Self {
        let folder = FolderRef::new(store_uid, full_name);
        let role = FolderRole::from_path(&folder.full_name, '/');
        Self {
            folder,
            role,
            kind: FolderKind::Regular,
        }
    }

    /// A selection carrying the role the store reported for `info`,
    /// whatever its hierarchy delimiter or special-use attribute.
    #[must_use]
    pub fn from_info(store_uid: impl Into<String>, info: &FolderInfo) -> Self {
        Self {
            folder: FolderRef::new(store_uid, info.full_name.clone()),
            role: info.role,
            kind: if info.flags.is_virtual {
                FolderKind::Virtual
            } else {
                FolderKind::Regular
            },
        }
    }

    #[must_use]
    pub const fn with_role(mut self, role: FolderRole) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: FolderKind) -> Self {
        self.kind = kind;
        self
    }
}

/// UI notifications besides alerts.
pub trait SearchObserver: Send + Sync {
    fn scope_selector_enabled(&self, _enabled: bool) {}
    fn state_changed(&self, _state: SearchState) {}
    fn rebound(&self, _folder: &BoundFolder) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObserver;

impl SearchObserver for NoObserver {}

/// Orchestrates criteria building, virtual folders and enumeration for
/// one view.
pub struct SearchCoordinator {
    stores: Arc<dyn StoreProvider>,
    builder: CriteriaBuilder,
    alerts: Arc<dyn AlertSink>,
    observer: Arc<dyn SearchObserver>,
    session: SearchSession,
    state: SearchState,
    bound: BoundFolder,
    selection: Option<FolderSelection>,
    selected_messages: Vec<String>,
    search_words: Vec<String>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl SearchCoordinator {
    #[must_use]
    pub fn new(
        stores: Arc<dyn StoreProvider>,
        builder: CriteriaBuilder,
        folders: VirtualFolderManager,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            stores,
            builder,
            alerts,
            observer: Arc::new(NoObserver),
            session: SearchSession::new(folders),
            state: SearchState::Idle,
            bound: BoundFolder::Nothing,
            selection: None,
            selected_messages: Vec::new(),
            search_words: Vec::new(),
            completions_tx,
            completions_rx,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    // -- accessors --

    #[must_use]
    pub const fn state(&self) -> SearchState {
        self.state
    }

    /// The folder the message list should show.
    #[must_use]
    pub const fn bound_folder(&self) -> &BoundFolder {
        &self.bound
    }

    /// The expression the message list should apply.
    #[must_use]
    pub const fn applied_expression(&self) -> &Expression {
        &self.session.expression
    }

    /// Words to highlight for body searches.
    #[must_use]
    pub fn search_words(&self) -> &[String] {
        &self.search_words
    }

    #[must_use]
    pub const fn session(&self) -> &SearchSession {
        &self.session
    }

    #[must_use]
    pub fn virtual_folder(&self, scope: AggregateScope) -> Option<&VirtualFolder> {
        self.session.folders.get(scope)
    }

    /// Membership of the bound virtual folder.
    #[must_use]
    pub fn membership(&self) -> Option<Arc<Membership>> {
        match &self.bound {
            BoundFolder::Virtual(scope) => self.virtual_folder(*scope).map(VirtualFolder::membership),
            _ => None,
        }
    }

    /// Watch membership replacements of a scope's virtual folder.
    #[must_use]
    pub fn subscribe_membership(&self, scope: AggregateScope) -> Option<watch::Receiver<Arc<Membership>>> {
        self.virtual_folder(scope).map(VirtualFolder::subscribe)
    }

    // -- UI input --

    /// The folder tree selection changed.
    pub fn select_folder(&mut self, selection: FolderSelection) {
        debug!("Folder tree selection: {}", selection.folder);
        self.selection = Some(selection);
        if self.state == SearchState::Idle {
            self.rebind_to_selection();
        }
    }

    /// The message list selection changed.
    pub fn set_selected_messages(&mut self, uids: Vec<String>) {
        self.selected_messages = uids;
    }

    /// Run a search.
    ///
    /// Per-folder searches and cleared searches return to
    /// [`SearchState::Idle`] synchronously. Expanding searches return
    /// [`SearchState::Building`] unless the scope's folder is already
    /// current for the same expression.
    pub async fn submit(&mut self, criteria: &SearchCriteria) -> SearchState {
        if criteria.filter.is_thread() {
            if self.session.thread_uids.is_none() {
                debug!("Capturing {} messages for thread filter", self.selected_messages.len());
                self.session.thread_uids = Some(self.selected_messages.clone());
            }
        } else {
            self.session.thread_uids = None;
        }

        let ctx = BuildContext {
            folder_role: self.selection.as_ref().map_or(FolderRole::Custom, |s| s.role),
            thread_uids: self.session.thread_uids.as_deref(),
        };
        let built = match self.builder.build(criteria, &ctx) {
            Ok(built) => built,
            Err(e) => {
                warn!("Cannot build search: {}", e);
                self.alerts.alert(alert_for(&e));
                return self.state;
            }
        };
        self.search_words = built.search_words;

        let mut scope = criteria.scope;
        if scope == SearchScope::CurrentFolderAndSubfolders
            && self
                .selection
                .as_ref()
                .is_some_and(|s| s.kind == FolderKind::VirtualTrash)
        {
            scope = SearchScope::CurrentFolder;
        }

        let Some(aggregate) = AggregateScope::from_scope(scope).filter(|_| criteria.has_search())
        else {
            self.revert_to_folder(built.expression);
            return self.state;
        };

        match self.sources_for(aggregate) {
            Ok(sources) => self.expand(scope, aggregate, built.expression, sources).await,
            Err(e) => {
                self.session.expression = built.expression;
                self.fail(&e);
            }
        }
        self.state
    }

    /// Wait for the next completion and process it.
    ///
    /// Every launched build reports exactly once, even when a store
    /// panics. With no build in flight this waits indefinitely; use
    /// [`SearchCoordinator::settle`] to stop once nothing is building.
    pub async fn next_completion(&mut self) -> Option<SearchState> {
        let completion = self.completions_rx.recv().await?;
        self.accept(completion);
        Some(self.state)
    }

    /// Process completions until no build is in flight.
    pub async fn settle(&mut self) -> SearchState {
        while self.state.is_building() {
            if self.next_completion().await.is_none() {
                break;
            }
        }
        self.state
    }

    /// Apply a completion if it belongs to the current generation.
    /// Returns whether it was applied.
    pub fn accept(&mut self, completion: Completion) -> bool {
        let Completion {
            scope,
            generation,
            result,
        } = completion;

        if self.session.finish_task(generation).is_none() {
            debug!("Discarding stale result of generation {}", generation);
            return false;
        }

        match result {
            Ok(enumeration) => {
                if !enumeration.failures.is_empty() {
                    self.alerts.alert(Alert::warning(failure_summary(&enumeration.failures)));
                }
                self.session
                    .folders
                    .install(scope, Membership::built(generation, enumeration.folders));
                self.set_state(SearchState::Ready { scope, generation });
                self.observer.scope_selector_enabled(true);
                true
            }
            Err(Error::Cancelled) => {
                debug!("Generation {} cancelled", generation);
                false
            }
            Err(e) => {
                self.fail(&e);
                false
            }
        }
    }

    /// The aggregation service went away.
    pub fn aggregation_lost(&mut self) {
        self.fail(&Error::BackendUnavailable("search folder service stopped".into()));
    }

    /// Drop every virtual folder and cancel pending work.
    pub fn shutdown(&mut self) {
        info!("Shutting down search session");
        self.session.reset();
        self.set_state(SearchState::Idle);
        self.observer.scope_selector_enabled(true);
    }

    // -- internals --

    fn sources_for(&self, scope: AggregateScope) -> Result<Vec<EnumerationSource>> {
        let aggregation_uid = self.session.folders.aggregation_uid();

        if scope == AggregateScope::AllAccounts {
            let sources: Vec<_> = self
                .stores
                .stores()
                .into_iter()
                .filter(|s| !s.is_aggregate() && s.uid() != aggregation_uid)
                .map(EnumerationSource::store)
                .collect();
            if sources.is_empty() {
                return Err(Error::Config("No accounts are configured for searching".into()));
            }
            return Ok(sources);
        }

        let selection = self
            .selection
            .as_ref()
            .ok_or_else(|| Error::Config("No folder is selected".into()))?;
        let store = self
            .stores
            .store(&selection.folder.store_uid)
            .filter(|s| !s.is_aggregate())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Account '{}' is not available",
                    selection.folder.store_uid
                ))
            })?;

        Ok(vec![if scope == AggregateScope::FolderAndSubfolders {
            EnumerationSource::subtree(store, selection.folder.full_name.clone())
        } else {
            EnumerationSource::store(store)
        }])
    }

    async fn expand(
        &mut self,
        scope: SearchScope,
        aggregate: AggregateScope,
        expression: Expression,
        sources: Vec<EnumerationSource>,
    ) {
        let keys: Vec<String> = sources.iter().map(EnumerationSource::key).collect();

        let prepared = match self.session.folders.get_or_create(aggregate).await {
            Ok(folder) => {
                let update = folder.update(&expression);
                let sources_changed = folder.set_sources(keys);
                Ok((update, sources_changed, folder.is_stale(), folder.membership().generation))
            }
            Err(e) => Err(e),
        };
        let (update, sources_changed, stale, built_generation) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.session.expression = expression;
                self.fail(&e);
                return;
            }
        };

        self.session.scope = scope;
        self.session.expression = expression;
        self.bind(BoundFolder::Virtual(aggregate));

        if !stale {
            debug!("{:?} search folder is current, nothing to rebuild", aggregate);
            if self.session.task.as_ref().is_some_and(|t| t.scope != aggregate) {
                self.session.cancel_task();
            }
            self.set_state(SearchState::Ready {
                scope: aggregate,
                generation: built_generation,
            });
            self.observer.scope_selector_enabled(true);
            return;
        }

        let same_task = self.session.task.as_ref().is_some_and(|t| t.scope == aggregate);
        if same_task && update == Update::Unchanged && !sources_changed {
            debug!("Identical search already building for {:?}", aggregate);
            return;
        }

        if let SearchState::Building { scope, generation } = self.state {
            self.observer
                .state_changed(SearchState::Superseded { scope, generation });
        }
        let generation = self
            .session
            .launch(aggregate, sources, self.completions_tx.clone());
        self.set_state(SearchState::Building {
            scope: aggregate,
            generation,
        });
        self.observer.scope_selector_enabled(false);
    }

    /// Leave any expanded search and show the folder-tree selection.
    fn revert_to_folder(&mut self, expression: Expression) {
        self.session.collapse();
        self.session.expression = expression;
        self.rebind_to_selection();
        self.set_state(SearchState::Idle);
        self.observer.scope_selector_enabled(true);
    }

    /// Abort the current attempt and report `e`. The applied
    /// expression stays, against the folder-tree selection.
    fn fail(&mut self, e: &Error) {
        warn!("Search aborted: {}", e);
        self.alerts.alert(alert_for(e));

        let expression = std::mem::take(&mut self.session.expression);
        self.revert_to_folder(expression);
    }

    fn rebind_to_selection(&mut self) {
        let target = self
            .selection
            .as_ref()
            .map_or(BoundFolder::Nothing, |s| BoundFolder::Folder(s.folder.clone()));
        self.bind(target);
    }

    fn bind(&mut self, target: BoundFolder) {
        if self.bound != target {
            debug!("Message list bound to {:?}", target);
            self.bound = target;
            self.observer.rebound(&self.bound);
        }
    }

    fn set_state(&mut self, state: SearchState) {
        if self.state != state {
            debug!("Search state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.observer.state_changed(state);
        }
    }
}

fn alert_for(e: &Error) -> Alert {
    match e {
        Error::Config(_) | Error::UnknownRule(_) => Alert::info(e.to_string()),
        Error::TransientIo { .. } => Alert::warning(e.to_string()),
        _ => Alert::error(e.to_string()),
    }
}

fn failure_summary(failures: &[Error]) -> String {
    match failures {
        [only] => format!("Some folders could not be searched: {only}"),
        [first, rest @ ..] => format!(
            "{} folders or accounts could not be searched, first: {first}",
            rest.len() + 1
        ),
        [] => String::new(),
    }
}

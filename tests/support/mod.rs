//! In-memory collaborators for coordinator and enumerator tests
//!
//! - `MemoryStore` -- a `MailStore` over a fixed folder tree, with call
//!   counters, failure injection and a gate that holds folder-info
//!   fetches until opened.
//! - `RecordingAlerts` / `RecordingObserver` -- capture what the
//!   coordinator tells the UI.

#![allow(dead_code)]

use async_trait::async_trait;
use federated_mail_search::{
    Alert, AlertLevel, AlertSink, BoundFolder, CriteriaBuilder, Error, FolderHandle, FolderInfo,
    FolderKind, FolderSummary, LabelRegistry, LocalAggregation, MailStore, Result, RuleBook,
    SearchCoordinator, SearchObserver, SearchState, StoreProvider, VirtualFolderManager,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Holds folder-info fetches until opened.
#[derive(Debug)]
pub struct Gate(watch::Sender<bool>);

impl Gate {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self(watch::channel(false).0))
    }

    pub fn open(&self) {
        self.0.send_replace(true);
    }

    pub fn close(&self) {
        self.0.send_replace(false);
    }

    async fn pass(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// A store backed by a fixed folder tree.
pub struct MemoryStore {
    uid: String,
    aggregate: bool,
    roots: Vec<FolderInfo>,
    broken: HashSet<String>,
    virtual_folders: HashSet<String>,
    panicking: HashSet<String>,
    fail_listing: bool,
    gate: Option<Arc<Gate>>,
    pub folder_info_calls: AtomicUsize,
    pub open_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            aggregate: false,
            roots: Vec::new(),
            broken: HashSet::new(),
            virtual_folders: HashSet::new(),
            panicking: HashSet::new(),
            fail_listing: false,
            gate: None,
            folder_info_calls: AtomicUsize::new(0),
            open_calls: AtomicUsize::new(0),
        }
    }

    /// A store with `INBOX`, `Sent` and `Archive/{2023,2024}` where
    /// `Archive` is not selectable.
    pub fn standard(uid: &str) -> Self {
        Self::new(uid)
            .root(FolderInfo::new("INBOX"))
            .root(FolderInfo::new("Sent"))
            .root(
                FolderInfo::new("Archive")
                    .no_select()
                    .with_child(FolderInfo::new("Archive/2023"))
                    .with_child(FolderInfo::new("Archive/2024")),
            )
    }

    pub fn root(mut self, info: FolderInfo) -> Self {
        self.roots.push(info);
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.aggregate = true;
        self
    }

    /// Opening `full_name` fails.
    pub fn broken(mut self, full_name: &str) -> Self {
        self.broken.insert(full_name.to_string());
        self
    }

    /// Opening `full_name` yields a virtual handle.
    pub fn opens_virtual(mut self, full_name: &str) -> Self {
        self.virtual_folders.insert(full_name.to_string());
        self
    }

    /// Opening `full_name` panics.
    pub fn panics_on_open(mut self, full_name: &str) -> Self {
        self.panicking.insert(full_name.to_string());
        self
    }

    /// Fetching the folder tree fails.
    pub fn failing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn gated(mut self, gate: &Arc<Gate>) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    pub fn listings(&self) -> usize {
        self.folder_info_calls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }
}

fn find<'a>(roots: &'a [FolderInfo], full_name: &str) -> Option<&'a FolderInfo> {
    let mut stack: Vec<&FolderInfo> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        if node.full_name == full_name {
            return Some(node);
        }
        stack.extend(&node.children);
    }
    None
}

#[async_trait]
impl MailStore for MemoryStore {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn display_name(&self) -> &str {
        &self.uid
    }

    fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    async fn folder_info(&self, top: Option<&str>) -> Result<Vec<FolderInfo>> {
        self.folder_info_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if self.fail_listing {
            return Err(Error::Imap("connection refused".into()));
        }
        match top {
            None => Ok(self.roots.clone()),
            Some(top) => find(&self.roots, top)
                .map(|n| vec![n.clone()])
                .ok_or_else(|| Error::Imap(format!("No such folder: {top}"))),
        }
    }

    async fn open_folder(&self, full_name: &str) -> Result<FolderHandle> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        assert!(
            !self.panicking.contains(full_name),
            "store bug while opening {full_name}"
        );
        if self.broken.contains(full_name) {
            return Err(Error::Imap(format!("cannot open {full_name}")));
        }
        let mut handle = FolderHandle::regular(&self.uid, full_name, FolderSummary::default());
        if self.virtual_folders.contains(full_name) {
            handle.kind = FolderKind::Virtual;
        }
        Ok(handle)
    }
}

/// Alerts raised so far.
#[derive(Default)]
pub struct RecordingAlerts(Mutex<Vec<Alert>>);

impl RecordingAlerts {
    pub fn take(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn levels(&self) -> Vec<AlertLevel> {
        self.0.lock().unwrap().iter().map(|a| a.level).collect()
    }
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, alert: Alert) {
        self.0.lock().unwrap().push(alert);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Selector(bool),
    State(SearchState),
    Rebound(BoundFolder),
}

/// Observer notifications, in order.
#[derive(Default)]
pub struct RecordingObserver(Mutex<Vec<Event>>);

impl RecordingObserver {
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn selector(&self) -> Option<bool> {
        self.0.lock().unwrap().iter().rev().find_map(|e| match e {
            Event::Selector(enabled) => Some(*enabled),
            _ => None,
        })
    }
}

impl SearchObserver for RecordingObserver {
    fn scope_selector_enabled(&self, enabled: bool) {
        self.0.lock().unwrap().push(Event::Selector(enabled));
    }

    fn state_changed(&self, state: SearchState) {
        self.0.lock().unwrap().push(Event::State(state));
    }

    fn rebound(&self, folder: &BoundFolder) {
        self.0.lock().unwrap().push(Event::Rebound(folder.clone()));
    }
}

/// A coordinator wired to recording collaborators.
pub struct Harness {
    pub coordinator: SearchCoordinator,
    pub alerts: Arc<RecordingAlerts>,
    pub observer: Arc<RecordingObserver>,
    pub aggregation: Arc<LocalAggregation>,
    pub labels: LabelRegistry,
}

impl Harness {
    pub fn new(stores: Vec<Arc<dyn MailStore>>) -> Self {
        Self::with_rules(stores, RuleBook::new())
    }

    pub fn with_rules(stores: Vec<Arc<dyn MailStore>>, rules: RuleBook) -> Self {
        let provider: Arc<dyn StoreProvider> = Arc::new(stores);
        let labels = LabelRegistry::with_defaults();
        let alerts = Arc::new(RecordingAlerts::default());
        let observer = Arc::new(RecordingObserver::default());
        let aggregation = Arc::new(LocalAggregation::default());

        let coordinator = SearchCoordinator::new(
            provider,
            CriteriaBuilder::new(Arc::new(rules), &labels),
            VirtualFolderManager::new(aggregation.clone()),
            alerts.clone(),
        )
        .with_observer(observer.clone());

        Self {
            coordinator,
            alerts,
            observer,
            aggregation,
            labels,
        }
    }
}

/// `store:folder` names of a membership, in order.
pub fn names(folders: &[FolderHandle]) -> Vec<String> {
    folders.iter().map(|h| h.folder.to_string()).collect()
}

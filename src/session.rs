//! Per-view search session state
//!
//! The session owns the virtual folders, the single in-flight
//! enumeration task and the generation counter. Only the coordinator
//! touches it.

use crate::criteria::SearchScope;
use crate::enumerator::{Enumeration, EnumerationSource, enumerate};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::vfolder::{AggregateScope, VirtualFolderManager};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Outcome of one enumeration task, tagged with its generation.
#[derive(Debug)]
pub struct Completion {
    pub scope: AggregateScope,
    pub generation: u64,
    pub result: Result<Enumeration>,
}

/// The running enumeration.
#[derive(Debug)]
pub struct EnumerationTask {
    pub scope: AggregateScope,
    pub generation: u64,
    cancel: CancellationToken,
}

impl EnumerationTask {
    /// Ask the task to stop. It still reports a completion, which the
    /// coordinator drops.
    fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// State of one search view.
pub struct SearchSession {
    pub(crate) scope: SearchScope,
    pub(crate) expression: Expression,
    pub(crate) folders: VirtualFolderManager,
    pub(crate) task: Option<EnumerationTask>,
    generation: u64,
    /// Message uids captured for the thread filter.
    pub(crate) thread_uids: Option<Vec<String>>,
}

impl SearchSession {
    pub(crate) const fn new(folders: VirtualFolderManager) -> Self {
        Self {
            scope: SearchScope::CurrentFolder,
            expression: Expression::empty(),
            folders,
            task: None,
            generation: 0,
            thread_uids: None,
        }
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` belongs to the task the session waits for.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
            && self
                .task
                .as_ref()
                .is_some_and(|task| task.generation == generation)
    }

    /// Spawn an enumeration under a fresh generation.
    ///
    /// Exactly one completion is sent per launch. A panicking store
    /// surfaces as [`Error::BackendUnavailable`].
    pub(crate) fn launch(
        &mut self,
        scope: AggregateScope,
        sources: Vec<EnumerationSource>,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> u64 {
        self.cancel_task();
        self.generation += 1;
        let generation = self.generation;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let exclude = self.folders.aggregation_uid().to_string();

        debug!(
            "Launching enumeration for {:?} over {} sources (generation {})",
            scope,
            sources.len(),
            generation
        );
        tokio::spawn(async move {
            let walk =
                tokio::spawn(async move { enumerate(&sources, Some(&exclude), &token).await });
            let result = match walk.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    error!("Enumeration generation {} panicked", generation);
                    Err(Error::BackendUnavailable(
                        "folder enumeration stopped unexpectedly".into(),
                    ))
                }
                Err(_) => Err(Error::Cancelled),
            };
            let completion = Completion {
                scope,
                generation,
                result,
            };
            if completions.send(completion).is_err() {
                debug!("Search view gone, dropping generation {}", generation);
            }
        });

        self.task = Some(EnumerationTask {
            scope,
            generation,
            cancel,
        });
        generation
    }

    /// Cancel the in-flight task, if any, and invalidate its
    /// generation.
    pub(crate) fn cancel_task(&mut self) -> Option<EnumerationTask> {
        let task = self.task.take()?;
        task.cancel();
        self.generation += 1;
        debug!("Cancelled enumeration generation {}", task.generation);
        Some(task)
    }

    /// Take the finished task whose completion was accepted.
    pub(crate) fn finish_task(&mut self, generation: u64) -> Option<EnumerationTask> {
        if self.is_current(generation) {
            self.task.take()
        } else {
            None
        }
    }

    /// Cancel the task and drop every virtual folder. Captured thread
    /// uids survive.
    pub(crate) fn collapse(&mut self) {
        self.cancel_task();
        self.folders.teardown_all();
        self.scope = SearchScope::CurrentFolder;
    }

    /// Return to the state of a fresh session.
    pub(crate) fn reset(&mut self) {
        self.collapse();
        self.expression = Expression::empty();
        self.thread_uids = None;
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.cancel();
        }
    }
}

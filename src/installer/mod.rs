//! Install coordinator
//!
//! [`Installer::install`] runs fetch → extract → continuation for one target in a
//! background task and returns immediately with an [`InstallHandle`].
//!
//! - At most one sequence per [`TargetId`] runs at a time; a second request for the
//!   same identifier waits behind the first on a lazily created per-target lock.
//! - Across targets, concurrency is bounded by a semaphore sized from
//!   `install.max_concurrent_installs`.
//! - The [`TaskStore`] entry for the target is published before the task is spawned
//!   and always removed when it ends.
//! - Cancellation is honored while waiting for the lock or permit and during the
//!   download. Extraction and the continuation always run to completion.

mod run;


use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::state::{TaskSlot, TaskState, TaskStore};
use crate::types::{Event, TargetId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What to install and where
#[derive(Clone, Debug)]
pub struct InstallRequest {
    /// Target identifier (lock and task store key)
    pub id: TargetId,
    /// Download URL; its extension selects the archive format
    pub url: String,
    /// Directory the payload is extracted into
    pub target_dir: PathBuf,
    /// Protected prerequisite install: never overwrite, never delete on failure
    pub protect: bool,
}

impl InstallRequest {
    /// Regular mod install
    pub fn new(id: impl Into<TargetId>, url: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            target_dir: target_dir.into(),
            protect: false,
        }
    }

    /// Protected prerequisite install
    pub fn prerequisite(
        id: impl Into<TargetId>,
        url: impl Into<String>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            protect: true,
            ..Self::new(id, url, target_dir)
        }
    }

    /// Task store slot this request reports into
    pub fn slot(&self) -> TaskSlot {
        if self.protect {
            TaskSlot::Prerequisite
        } else {
            TaskSlot::Mod(self.id.clone())
        }
    }
}

/// Handle to an install running in the background
#[derive(Debug)]
pub struct InstallHandle {
    id: TargetId,
    cancel: CancellationToken,
    join: JoinHandle<Result<()>>,
}

impl InstallHandle {
    /// Target this install belongs to
    pub fn id(&self) -> &TargetId {
        &self.id
    }

    /// Request cancellation
    ///
    /// Has no effect once extraction has started.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the background task has ended
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the install to end
    ///
    /// Returns [`Error::Cancelled`] when the install was cancelled.
    pub async fn wait(self) -> Result<()> {
        self.join
            .await
            .map_err(|e| Error::Other(format!("install task panicked: {}", e)))?
    }
}

/// Install coordinator
///
/// Cloning yields another handle sharing the same locks, store and event channel.
#[derive(Clone)]
pub struct Installer {
    fetcher: Fetcher,
    store: TaskStore,
    /// One lock per target identifier, created on first use and never removed
    locks: Arc<Mutex<HashMap<TargetId, Arc<Mutex<()>>>>>,
    /// Bounds concurrent fetch/extract sequences across targets
    concurrent_limit: Arc<Semaphore>,
    event_tx: broadcast::Sender<Event>,
}

impl Installer {
    /// Create a coordinator
    ///
    /// `max_concurrent` is clamped to at least one.
    pub fn new(
        fetcher: Fetcher,
        store: TaskStore,
        max_concurrent: usize,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            fetcher,
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
            concurrent_limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
            event_tx,
        }
    }

    /// Task store this coordinator reports into
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Subscribe to install lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Start an install in the background
    ///
    /// Publishes the initial `Downloading` state before returning. `continuation`
    /// runs on a blocking thread after a successful extraction, while the target's
    /// lock is still held; an error from it fails the install. Must be called from
    /// within a Tokio runtime.
    pub fn install<C>(&self, request: InstallRequest, continuation: C) -> InstallHandle
    where
        C: FnOnce() -> Result<()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let slot = request.slot();
        let owner = self.store.next_owner();

        self.store.publish(
            &slot,
            TaskState::downloading(owner, Some(0.0), cancel.clone()),
        );
        self.event_tx
            .send(Event::InstallQueued {
                id: request.id.clone(),
            })
            .ok();

        tracing::debug!(
            target_id = %request.id,
            url = %request.url,
            protect = request.protect,
            "install queued"
        );

        let id = request.id.clone();
        let installer = self.clone();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            installer
                .run(request, slot, owner, task_cancel, continuation)
                .await
        });

        InstallHandle { id, cancel, join }
    }

    async fn target_lock(&self, id: &TargetId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(id.clone()).or_default())
    }
}

//! Observable install state
//!
//! The [`TaskStore`] holds one [`TaskState`] per in-flight install. Entries are
//! inserted when an install is requested and removed when it ends, whatever the
//! outcome. A failed install publishes a terminal snapshot with `error` set
//! immediately before its entry is removed, so observers that hold a
//! [`tokio::sync::watch::Receiver`] see the failure once.
//!
//! The protected prerequisite has a single slot of its own rather than an entry
//! in the per-mod map.
//!
//! Each entry belongs to one install. A request for a target that already has an
//! entry is queued behind it instead of replacing it, so the visible state keeps
//! tracking the install that is actually running. The install that acquires the
//! target lock becomes the visible one; when the visible install ends, the oldest
//! queued request takes its place. Removing a queued request leaves the visible
//! entry untouched.

use crate::types::TargetId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Phase of an in-flight install
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Fetching the payload; cancellable
    Downloading,
    /// Writing the payload to disk; not cancellable
    Extracting,
}

/// Snapshot of one in-flight install
#[derive(Clone, Debug)]
pub struct TaskState {
    /// Current phase
    pub phase: Phase,
    /// Fraction downloaded, when the server announced a size
    pub progress: Option<f32>,
    /// Terminal error, present only in the last snapshot before removal
    pub error: Option<String>,
    /// Whether [`TaskState::cancel`] has any effect
    pub cancellable: bool,
    cancel: Option<CancellationToken>,
    owner: u64,
}

impl TaskState {
    pub(crate) fn downloading(owner: u64, progress: Option<f32>, cancel: CancellationToken) -> Self {
        Self {
            phase: Phase::Downloading,
            progress,
            error: None,
            cancellable: true,
            cancel: Some(cancel),
            owner,
        }
    }

    pub(crate) fn extracting(owner: u64) -> Self {
        Self {
            phase: Phase::Extracting,
            progress: None,
            error: None,
            cancellable: false,
            cancel: None,
            owner,
        }
    }

    pub(crate) fn failed(owner: u64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::extracting(owner)
        }
    }

    /// Request cancellation of the install this state belongs to
    ///
    /// Returns false, doing nothing, once the install has left the downloading phase.
    pub fn cancel(&self) -> bool {
        match (&self.cancel, self.cancellable, self.phase) {
            (Some(token), true, Phase::Downloading) => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

/// Key into the store
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskSlot {
    /// The protected prerequisite
    Prerequisite,
    /// A regular mod
    Mod(TargetId),
}

/// All in-flight installs at one point in time
#[derive(Clone, Debug, Default)]
pub struct TaskSnapshot {
    /// Prerequisite install, if one is running
    pub prerequisite: Option<TaskState>,
    /// Mod installs by identifier
    pub mods: HashMap<TargetId, TaskState>,
    /// Requests waiting behind the visible entry of a slot, oldest first
    queued: HashMap<TaskSlot, Vec<TaskState>>,
}

impl TaskSnapshot {
    /// State for one slot
    pub fn get(&self, slot: &TaskSlot) -> Option<&TaskState> {
        match slot {
            TaskSlot::Prerequisite => self.prerequisite.as_ref(),
            TaskSlot::Mod(id) => self.mods.get(id),
        }
    }

    /// Number of requests waiting behind the visible entry of `slot`
    pub fn queued(&self, slot: &TaskSlot) -> usize {
        self.queued.get(slot).map_or(0, Vec::len)
    }

    /// True when nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.prerequisite.is_none() && self.mods.is_empty()
    }

    fn visible_mut(&mut self, slot: &TaskSlot) -> Option<&mut TaskState> {
        match slot {
            TaskSlot::Prerequisite => self.prerequisite.as_mut(),
            TaskSlot::Mod(id) => self.mods.get_mut(id),
        }
    }

    fn set_visible(&mut self, slot: &TaskSlot, state: Option<TaskState>) {
        match (slot, state) {
            (TaskSlot::Prerequisite, state) => self.prerequisite = state,
            (TaskSlot::Mod(id), Some(state)) => {
                self.mods.insert(id.clone(), state);
            }
            (TaskSlot::Mod(id), None) => {
                self.mods.remove(id);
            }
        }
    }

    /// Entry for `owner`, visible or queued
    fn owned_mut(&mut self, slot: &TaskSlot, owner: u64) -> Option<&mut TaskState> {
        if self.visible_mut(slot).is_some_and(|state| state.owner == owner) {
            return self.visible_mut(slot);
        }
        self.queued
            .get_mut(slot)?
            .iter_mut()
            .find(|state| state.owner == owner)
    }

    fn enqueue(&mut self, slot: &TaskSlot, state: TaskState) {
        let queue = self.queued.entry(slot.clone()).or_default();
        let at = queue.partition_point(|queued| queued.owner < state.owner);
        queue.insert(at, state);
    }

    fn dequeue(&mut self, slot: &TaskSlot, owner: u64) -> Option<TaskState> {
        let queue = self.queued.get_mut(slot)?;
        let at = queue.iter().position(|state| state.owner == owner)?;
        let state = queue.remove(at);
        if queue.is_empty() {
            self.queued.remove(slot);
        }
        Some(state)
    }

    fn dequeue_oldest(&mut self, slot: &TaskSlot) -> Option<TaskState> {
        let owner = self.queued.get(slot)?.first()?.owner;
        self.dequeue(slot, owner)
    }
}

/// Observable store of in-flight install state
///
/// Cloning yields another handle to the same store.
#[derive(Clone, Debug)]
pub struct TaskStore {
    tx: Arc<watch::Sender<TaskSnapshot>>,
    next_owner: Arc<AtomicU64>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TaskSnapshot::default());
        Self {
            tx: Arc::new(tx),
            next_owner: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to every change of the store
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.tx.subscribe()
    }

    /// Current contents
    pub fn snapshot(&self) -> TaskSnapshot {
        self.tx.borrow().clone()
    }

    /// Current state for one slot
    pub fn get(&self, slot: &TaskSlot) -> Option<TaskState> {
        self.tx.borrow().get(slot).cloned()
    }

    /// Allocate the token an install uses to own its entry
    pub(crate) fn next_owner(&self) -> u64 {
        self.next_owner.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert the entry for `slot`, or queue it behind the one already there
    pub(crate) fn publish(&self, slot: &TaskSlot, state: TaskState) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.visible_mut(slot).is_some() {
                snapshot.enqueue(slot, state);
                false
            } else {
                snapshot.set_visible(slot, Some(state));
                true
            }
        });
    }

    /// Make `owner` the visible entry of `slot`, queueing the previous one
    ///
    /// Called by the install that holds the target lock.
    pub(crate) fn activate(&self, slot: &TaskSlot, owner: u64) {
        self.tx.send_if_modified(|snapshot| {
            let Some(state) = snapshot.dequeue(slot, owner) else {
                return false;
            };
            if let Some(previous) = snapshot.visible_mut(slot).cloned() {
                snapshot.enqueue(slot, previous);
            }
            snapshot.set_visible(slot, Some(state));
            true
        });
    }

    /// Replace the entry owned by `state.owner`
    pub(crate) fn update(&self, slot: &TaskSlot, state: TaskState) {
        self.tx.send_if_modified(|snapshot| {
            let visible = snapshot
                .visible_mut(slot)
                .is_some_and(|current| current.owner == state.owner);
            match snapshot.owned_mut(slot, state.owner) {
                Some(current) => {
                    *current = state;
                    visible
                }
                None => false,
            }
        });
    }

    /// Update download progress, keeping the rest of the entry
    pub(crate) fn set_progress(&self, slot: &TaskSlot, owner: u64, progress: Option<f32>) {
        self.tx.send_if_modified(|snapshot| {
            let visible = snapshot
                .visible_mut(slot)
                .is_some_and(|current| current.owner == owner);
            match snapshot.owned_mut(slot, owner) {
                Some(state) if state.phase == Phase::Downloading && state.progress != progress => {
                    state.progress = progress;
                    visible
                }
                _ => false,
            }
        });
    }

    /// Remove the entry owned by `owner`
    ///
    /// When it was the visible entry, the oldest queued request replaces it.
    pub(crate) fn clear(&self, slot: &TaskSlot, owner: u64) {
        self.tx.send_if_modified(|snapshot| {
            let visible = snapshot
                .visible_mut(slot)
                .is_some_and(|state| state.owner == owner);
            if !visible {
                snapshot.dequeue(slot, owner);
                return false;
            }
            let next = snapshot.dequeue_oldest(slot);
            snapshot.set_visible(slot, next);
            true
        });
    }
}

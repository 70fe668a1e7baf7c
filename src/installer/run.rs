//! Background lifecycle of a single install

use crate::error::{Error, Result};
use crate::extraction::{ExtractSummary, extract_payload};
use crate::state::{TaskSlot, TaskState};
use crate::types::Event;
use tokio_util::sync::CancellationToken;

use super::{InstallRequest, Installer};

impl Installer {
    /// Run one install and settle its task store entry
    ///
    /// Failures other than cancellation are published as a terminal state first.
    /// The entry is removed on every path.
    pub(super) async fn run<C>(
        self,
        request: InstallRequest,
        slot: TaskSlot,
        owner: u64,
        cancel: CancellationToken,
        continuation: C,
    ) -> Result<()>
    where
        C: FnOnce() -> Result<()> + Send + 'static,
    {
        let id = request.id.clone();
        let result = self
            .run_locked(&request, &slot, owner, &cancel, continuation)
            .await;

        match &result {
            Ok(()) => {
                tracing::info!(target_id = %id, target_dir = ?request.target_dir, "install complete");
                self.event_tx.send(Event::InstallCompleted { id: id.clone() }).ok();
            }
            Err(Error::Cancelled) => {
                tracing::info!(target_id = %id, "install cancelled");
                self.event_tx.send(Event::InstallCancelled { id: id.clone() }).ok();
            }
            Err(e) => {
                tracing::error!(target_id = %id, url = %request.url, error = %e, "install failed");
                self.store.update(&slot, TaskState::failed(owner, e.to_string()));
                self.event_tx
                    .send(Event::InstallFailed {
                        id: id.clone(),
                        error: e.to_string(),
                    })
                    .ok();
            }
        }

        self.store.clear(&slot, owner);
        result
    }

    async fn run_locked<C>(
        &self,
        request: &InstallRequest,
        slot: &TaskSlot,
        owner: u64,
        cancel: &CancellationToken,
        continuation: C,
    ) -> Result<()>
    where
        C: FnOnce() -> Result<()> + Send + 'static,
    {
        let lock = self.target_lock(&request.id).await;
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = lock.lock_owned() => guard,
        };
        self.store.activate(slot, owner);

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = self.concurrent_limit.clone().acquire_owned() => permit
                .map_err(|_| Error::Other("install concurrency limiter closed".to_string()))?,
        };

        // Phase 1: download
        let fetched = self
            .fetcher
            .fetch(&request.url, cancel, |progress| {
                self.store.set_progress(slot, owner, progress.fraction())
            })
            .await;
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => {
                if !request.protect {
                    remove_target(&request.target_dir).await;
                }
                return Err(e);
            }
        };

        // Phase 2: extract; no longer cancellable
        self.store.update(slot, TaskState::extracting(owner));

        let url = request.url.clone();
        let target_dir = request.target_dir.clone();
        let protect = request.protect;
        let summary = tokio::task::spawn_blocking(move || -> Result<ExtractSummary> {
            std::fs::create_dir_all(&target_dir)?;
            extract_payload(&bytes, &url, &target_dir, protect)
        })
        .await
        .map_err(|e| Error::Other(format!("extraction task panicked: {}", e)))??;

        tracing::debug!(
            target_id = %request.id,
            written = summary.files_written,
            kept = summary.files_kept,
            skipped_unsafe = summary.unsafe_entries,
            "payload extracted"
        );

        // Phase 3: caller's finalize step, still under the target lock
        tokio::task::spawn_blocking(continuation)
            .await
            .map_err(|e| Error::Other(format!("install continuation panicked: {}", e)))??;

        Ok(())
    }
}

/// Delete an unprotected target whose payload never arrived
async fn remove_target(target_dir: &std::path::Path) {
    match tokio::fs::remove_dir_all(target_dir).await {
        Ok(()) => tracing::debug!(?target_dir, "removed target directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(?target_dir, error = %e, "failed to remove target directory"),
    }
}

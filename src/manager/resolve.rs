//! Dependency resolution
//!
//! A resolution walk is a depth-first traversal of a mod's dependencies and
//! `extends` base. Every branch is dispatched to the install coordinator before
//! the mod that needs it, but the installs themselves run concurrently: a
//! dependency is *dispatched* first, not necessarily *finished* first.
//!
//! A [`ProcessingSet`] scoped to one top-level call stops cycles and duplicate
//! work. Branches that cannot be installed are skipped without affecting their
//! siblings; each skip is logged, broadcast as [`Event::ResolutionAborted`] and
//! listed in the [`ResolveReport`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ResolutionAbort, Result};
use crate::installer::{InstallHandle, InstallRequest};
use crate::metadata::InstallMetadata;
use crate::registry::LocalModRegistry;
use crate::types::{Artifact, CatalogEntry, Event, TargetId, Version};

use super::ModManager;

/// Identifiers already visited by one resolution walk
#[derive(Debug, Default)]
pub struct ProcessingSet {
    seen: HashSet<TargetId>,
}

impl ProcessingSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as visited; false if it already was
    pub fn insert(&mut self, id: &TargetId) -> bool {
        self.seen.insert(id.clone())
    }

    /// Whether `id` was visited
    pub fn contains(&self, id: &TargetId) -> bool {
        self.seen.contains(id)
    }

    /// Number of identifiers visited
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True before anything was visited
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// What one resolution walk did
#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Installs started, in dispatch order (dependencies before dependents)
    pub dispatched: Vec<InstallHandle>,
    /// Mods already installed at the selected version
    pub skipped: Vec<TargetId>,
    /// Branches that could not be installed
    pub aborted: Vec<ResolutionAbort>,
}

impl ResolveReport {
    /// Identifiers of the dispatched installs, in dispatch order
    pub fn dispatched_ids(&self) -> Vec<TargetId> {
        self.dispatched.iter().map(|h| h.id().clone()).collect()
    }

    /// True when the walk started no installs
    pub fn is_noop(&self) -> bool {
        self.dispatched.is_empty()
    }

    /// Wait for every dispatched install to end
    pub async fn wait_all(self) -> Vec<(TargetId, Result<()>)> {
        futures::future::join_all(self.dispatched.into_iter().map(|handle| async move {
            let id = handle.id().clone();
            (id, handle.wait().await)
        }))
        .await
    }
}

/// Result of [`ModManager::install_mod`]
#[derive(Debug)]
pub enum ResolveOutcome {
    /// The prerequisite was missing and its install was started instead
    ///
    /// The requested mod was not resolved. Re-issue the request once the
    /// prerequisite install has finished.
    PrerequisiteMissing(InstallHandle),
    /// The walk ran
    Dispatched(ResolveReport),
}

impl ModManager {
    /// Install a mod and, first, everything it depends on or extends
    ///
    /// Without `version` the newest published artifact is selected, and a mod
    /// already installed at that version is left alone. With `version` the
    /// artifact must be published, and it is installed even if already present.
    ///
    /// Returns as soon as every install has been dispatched; must be called from
    /// within a Tokio runtime.
    pub fn install_mod(&self, id: &TargetId, version: Option<&Version>) -> ResolveOutcome {
        if !self.layout.prerequisite_present() {
            tracing::info!(
                target_id = %id,
                prerequisite = ?self.layout.prerequisite_root,
                "prerequisite missing; installing it instead"
            );
            return ResolveOutcome::PrerequisiteMissing(self.install_prerequisite());
        }

        let mut processing = ProcessingSet::new();
        let mut report = ResolveReport::default();
        self.resolve(id, version, &mut processing, &mut report);

        tracing::debug!(
            target_id = %id,
            visited = processing.len(),
            dispatched = report.dispatched.len(),
            skipped = report.skipped.len(),
            aborted = report.aborted.len(),
            "resolution walk finished"
        );

        ResolveOutcome::Dispatched(report)
    }

    fn resolve(
        &self,
        id: &TargetId,
        version: Option<&Version>,
        processing: &mut ProcessingSet,
        report: &mut ResolveReport,
    ) {
        if !processing.insert(id) {
            return;
        }

        let Some(entry) = self.catalog.find(id) else {
            self.abort(report, ResolutionAbort::UnknownMod { id: id.clone() });
            return;
        };

        let artifact = match version {
            Some(version) => match entry.artifact(version) {
                Some(artifact) => artifact.clone(),
                None => {
                    self.abort(
                        report,
                        ResolutionAbort::VersionNotPublished {
                            id: id.clone(),
                            version: version.clone(),
                        },
                    );
                    return;
                }
            },
            None => match entry.latest() {
                Some(artifact) => artifact.clone(),
                None => {
                    self.abort(report, ResolutionAbort::NoArtifacts { id: id.clone() });
                    return;
                }
            },
        };

        if version.is_none()
            && self.registry.installed_version(id).as_ref() == Some(&artifact.version)
        {
            tracing::debug!(target_id = %id, version = %artifact.version, "already installed");
            report.skipped.push(id.clone());
            return;
        }

        for dependency in &artifact.dependencies {
            self.resolve(&dependency.id, dependency.version.as_ref(), processing, report);
        }
        if let Some(base) = &artifact.extends {
            self.resolve(&base.id, base.version.as_ref(), processing, report);
        }

        let target_dir = self.layout.staging_target(id);
        if let Err(e) = prepare_target(&target_dir) {
            self.abort(
                report,
                ResolutionAbort::TargetDirectory {
                    id: id.clone(),
                    path: target_dir,
                    reason: e.to_string(),
                },
            );
            return;
        }

        tracing::info!(target_id = %id, version = %artifact.version, "dispatching install");
        let request = InstallRequest::new(id.clone(), artifact.download_url.clone(), &target_dir);
        let continuation = finalize(Arc::clone(&self.registry), entry, artifact, target_dir);
        let handle = self.installer.install(request, continuation);
        report.dispatched.push(handle);
    }

    fn abort(&self, report: &mut ResolveReport, abort: ResolutionAbort) {
        tracing::warn!(target_id = %abort.id(), reason = %abort, "skipping install branch");
        self.event_tx
            .send(Event::ResolutionAborted {
                id: abort.id().clone(),
                reason: abort.to_string(),
            })
            .ok();
        report.aborted.push(abort);
    }
}

/// Continuation run after a successful extraction: persist metadata, rescan,
/// then enable the staged mod
fn finalize(
    registry: Arc<dyn LocalModRegistry>,
    entry: CatalogEntry,
    artifact: Artifact,
    target_dir: PathBuf,
) -> impl FnOnce() -> Result<()> + Send + 'static {
    move || {
        InstallMetadata::new(&entry, &artifact).write(&target_dir)?;
        registry.refresh()?;
        registry.enable(&entry.id)
    }
}

/// Replace any previous staging directory with an empty one
fn prepare_target(target_dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(target_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::create_dir_all(target_dir)
}

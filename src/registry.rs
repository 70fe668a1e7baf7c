//! Installed-mod registry
//!
//! The installer only needs three things from the registry: the version of a mod
//! that is already installed, a way to rescan the disk after an install, and a way
//! to enable the freshly staged mod. [`LocalModRegistry`] is that seam;
//! [`DirectoryRegistry`] implements it over the prerequisite's folder layout:
//!
//! ```text
//! <game>/BepInEx/plugins/<id>/          enabled mods
//! <game>/BepInEx/disabledPlugins/<id>/  disabled (and freshly staged) mods
//! ```

use crate::config::Layout;
use crate::error::{Error, Result};
use crate::metadata::InstallMetadata;
use crate::types::{TargetId, Version};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Local-mod registry as seen by the installer
///
/// Methods are blocking; the installer calls them from a blocking thread.
pub trait LocalModRegistry: Send + Sync {
    /// Version of `id` currently on disk, if it is installed with metadata
    fn installed_version(&self, id: &TargetId) -> Option<Version>;

    /// Rescan installed mods
    fn refresh(&self) -> Result<()>;

    /// Enable an installed mod
    fn enable(&self, id: &TargetId) -> Result<()>;
}

/// A mod found on disk
#[derive(Clone, Debug, PartialEq)]
pub struct LocalMod {
    /// Identifier (the directory name)
    pub id: TargetId,
    /// Directory holding the mod's files
    pub dir: PathBuf,
    /// True when the mod lives in the plugins folder
    pub enabled: bool,
    /// Install metadata, absent for mods copied in by hand
    pub metadata: Option<InstallMetadata>,
}

impl LocalMod {
    /// Installed version, if known
    pub fn version(&self) -> Option<&Version> {
        self.metadata.as_ref().map(|meta| &meta.artifact.version)
    }
}

/// Registry backed by the `plugins` and `disabledPlugins` folders
#[derive(Debug)]
pub struct DirectoryRegistry {
    layout: Layout,
    mods: watch::Sender<Arc<HashMap<TargetId, LocalMod>>>,
}

impl DirectoryRegistry {
    /// Create a registry and scan the disk once
    ///
    /// A failed initial scan is logged and leaves the registry empty.
    pub fn new(layout: Layout) -> Self {
        let (mods, _rx) = watch::channel(Arc::new(HashMap::new()));
        let registry = Self { layout, mods };
        if let Err(e) = registry.refresh() {
            warn!(error = %e, "initial scan of installed mods failed");
        }
        registry
    }

    /// Installed mods as of the last scan
    pub fn mods(&self) -> Arc<HashMap<TargetId, LocalMod>> {
        Arc::clone(&self.mods.borrow())
    }

    /// One installed mod as of the last scan
    pub fn get(&self, id: &TargetId) -> Option<LocalMod> {
        self.mods.borrow().get(id).cloned()
    }

    /// Subscribe to rescans
    pub fn subscribe(&self) -> watch::Receiver<Arc<HashMap<TargetId, LocalMod>>> {
        self.mods.subscribe()
    }

    /// Move an enabled mod back into the staging folder
    pub fn disable(&self, id: &TargetId) -> Result<()> {
        let enabled = self.enabled_dir(id);
        let staged = self.staged_dir(id);
        if enabled.is_dir() {
            replace_dir(&enabled, &staged)?;
            info!(target_id = %id, "mod disabled");
        } else if !staged.is_dir() {
            return Err(Error::NotFound(format!("mod {} is not installed", id)));
        }
        self.refresh()
    }

    /// Delete a mod (and its metadata) from disk
    pub fn uninstall(&self, id: &TargetId) -> Result<()> {
        let mut removed = false;
        for dir in [self.enabled_dir(id), self.staged_dir(id)] {
            if dir.is_dir() {
                std::fs::remove_dir_all(&dir)?;
                removed = true;
            }
        }
        if !removed {
            return Err(Error::NotFound(format!("mod {} is not installed", id)));
        }
        info!(target_id = %id, "mod uninstalled");
        self.refresh()
    }

    fn enabled_dir(&self, id: &TargetId) -> PathBuf {
        self.layout.plugins_dir().join(id.as_str())
    }

    fn staged_dir(&self, id: &TargetId) -> PathBuf {
        self.layout.staging_target(id)
    }

    fn scan(&self) -> Result<HashMap<TargetId, LocalMod>> {
        let mut mods = HashMap::new();
        // Disabled first so an enabled copy of the same id wins
        for (root, enabled) in [
            (self.layout.staging_dir(), false),
            (self.layout.plugins_dir(), true),
        ] {
            for local in scan_folder(&root, enabled)? {
                mods.insert(local.id.clone(), local);
            }
        }
        Ok(mods)
    }
}

impl LocalModRegistry for DirectoryRegistry {
    fn installed_version(&self, id: &TargetId) -> Option<Version> {
        self.mods.borrow().get(id)?.version().cloned()
    }

    fn refresh(&self) -> Result<()> {
        // Scan while holding the channel's write lock so concurrent refreshes
        // cannot publish out of order
        let mut scanned = Ok(0);
        self.mods.send_if_modified(|mods| match self.scan() {
            Ok(found) => {
                scanned = Ok(found.len());
                *mods = Arc::new(found);
                true
            }
            Err(e) => {
                scanned = Err(e);
                false
            }
        });
        let count = scanned?;
        debug!(count, "installed mods rescanned");
        Ok(())
    }

    fn enable(&self, id: &TargetId) -> Result<()> {
        let enabled = self.enabled_dir(id);
        let staged = self.staged_dir(id);
        if staged.is_dir() {
            replace_dir(&staged, &enabled)?;
            info!(target_id = %id, "mod enabled");
        } else if !enabled.is_dir() {
            return Err(Error::NotFound(format!("mod {} is not installed", id)));
        }
        self.refresh()
    }
}

fn scan_folder(root: &Path, enabled: bool) -> Result<Vec<LocalMod>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut mods = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(?dir, "skipping mod directory with non-UTF-8 name");
            continue;
        };

        let metadata = match InstallMetadata::read(&dir) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(?dir, error = %e, "ignoring unreadable mod metadata");
                None
            }
        };

        mods.push(LocalMod {
            id: TargetId::from(name),
            dir,
            enabled,
            metadata,
        });
    }
    Ok(mods)
}

/// Move `from` to `to`, replacing whatever is at `to`
fn replace_dir(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        std::fs::remove_dir_all(to)?;
    }
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(from, to)?;
    Ok(())
}

//! Install metadata persisted next to every installed mod (`meta.json`)

use crate::error::Result;
use crate::types::{Artifact, CatalogEntry, TargetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the metadata record inside a mod directory
pub const METADATA_FILE: &str = "meta.json";

/// What was installed into a mod directory, and from which catalog entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMetadata {
    /// Mod identifier
    pub id: TargetId,
    /// The installed artifact
    pub artifact: Artifact,
    /// Catalog entry as it was when the mod was installed
    pub cached_entry: CatalogEntry,
    /// When the install finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

impl InstallMetadata {
    /// Record for a fresh install, stamped with the current time
    pub fn new(entry: &CatalogEntry, artifact: &Artifact) -> Self {
        Self {
            id: entry.id.clone(),
            artifact: artifact.clone(),
            cached_entry: entry.clone(),
            installed_at: Some(Utc::now()),
        }
    }

    /// Path of the metadata file inside `mod_dir`
    pub fn path(mod_dir: &Path) -> PathBuf {
        mod_dir.join(METADATA_FILE)
    }

    /// Write pretty-printed JSON into `mod_dir`, replacing any previous record
    pub fn write(&self, mod_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(mod_dir), json)?;
        Ok(())
    }

    /// Read the record from `mod_dir`
    ///
    /// Returns `Ok(None)` when the directory has no metadata file. Unknown fields
    /// are ignored.
    pub fn read(mod_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(mod_dir);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

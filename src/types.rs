//! Core types for modman

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Identifier of an installable target (a mod, or the protected prerequisite)
///
/// Used as the per-target lock key and as the task store key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl TargetId {
    /// Create a new TargetId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for TargetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TargetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for TargetId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A version string could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version: {0:?}")]
pub struct InvalidVersion(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Segment {
    Number(u64),
    Text(String),
}

/// Published version of a mod artifact
///
/// Versions are split into segments on `.`, `-`, `+` and `_`. Numeric segments
/// compare numerically, text segments lexically, and a text segment sorts after
/// any number. Trailing zero segments are insignificant, so `1.2` == `1.2.0`.
/// The original spelling is preserved for display and serialization.
#[derive(Clone, Debug)]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
}

impl Version {
    /// Parse a version string
    pub fn parse(raw: &str) -> Result<Self, InvalidVersion> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        if body.is_empty() {
            return Err(InvalidVersion(raw.to_string()));
        }

        let mut segments: Vec<Segment> = body
            .split(['.', '-', '+', '_'])
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<u64>() {
                Ok(n) => Segment::Number(n),
                Err(_) => Segment::Text(s.to_ascii_lowercase()),
            })
            .collect();

        if segments.is_empty() {
            return Err(InvalidVersion(raw.to_string()));
        }

        while segments.len() > 1 && segments.last() == Some(&Segment::Number(0)) {
            segments.pop();
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The version as it was published
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::str::FromStr for Version {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Manifests are hand-written; accept `1.2` as well as `"1.2"`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Float(f64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Unsigned(n) => n.to_string(),
            Raw::Float(f) => f.to_string(),
        };
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Reference from one artifact to another mod, optionally pinned to a version
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModReference {
    /// Referenced mod identifier
    pub id: TargetId,
    /// Required version (None = newest published)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

/// A specific installable version of a mod
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Published version
    pub version: Version,
    /// Where the archive (or single file) can be downloaded
    pub download_url: String,
    /// Mods that must be installed alongside this one
    #[serde(default)]
    pub dependencies: Vec<ModReference>,
    /// Base mod this artifact augments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<ModReference>,
}

/// Catalog entry for one mod, as published in the remote manifest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Unique mod identifier
    pub id: TargetId,
    /// Human-readable name
    #[serde(default)]
    pub display_name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Project page
    #[serde(default)]
    pub url: String,
    /// Author names
    #[serde(default)]
    pub authors: Vec<String>,
    /// Published artifacts, in any order
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl CatalogEntry {
    /// Artifact with the greatest version
    pub fn latest(&self) -> Option<&Artifact> {
        self.artifacts.iter().max_by(|a, b| a.version.cmp(&b.version))
    }

    /// Artifact published with exactly `version`
    pub fn artifact(&self, version: &Version) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| &a.version == version)
    }
}

/// Archive type detected by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// RAR archive (.rar)
    Rar,
    /// 7-Zip archive (.7z)
    SevenZip,
    /// ZIP archive (.zip)
    Zip,
}

/// Event emitted during the install lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Install requested; task state published
    InstallQueued {
        /// Target identifier
        id: TargetId,
    },

    /// Fetch, extraction and continuation finished
    InstallCompleted {
        /// Target identifier
        id: TargetId,
    },

    /// Install failed (network or extraction)
    InstallFailed {
        /// Target identifier
        id: TargetId,
        /// Error message
        error: String,
    },

    /// Install cancelled before extraction started
    InstallCancelled {
        /// Target identifier
        id: TargetId,
    },

    /// A branch of a dependency walk was skipped
    ResolutionAborted {
        /// Target identifier of the skipped branch
        id: TargetId,
        /// Why the branch was skipped
        reason: String,
    },

    /// Catalog manifest was refreshed
    CatalogUpdated {
        /// Number of entries in the new catalog
        entries: usize,
    },
}

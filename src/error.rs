//! Error types for modman
//!
//! The install engine distinguishes three kinds of failure:
//! - [`Error::Network`] - transport or HTTP failure, raised after retries are exhausted
//! - [`Error::Extraction`] - malformed archive or I/O failure while writing entries
//! - [`ResolutionAbort`] - a branch of a dependency walk that cannot be installed
//!
//! Cancellation is not a failure: it is reported as [`Error::Cancelled`] so it can be
//! propagated with `?`, but it is never retried and never recorded as a task error.

use crate::types::{TargetId, Version};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for modman operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modman
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// Network error (connection, timeout, or non-success HTTP status)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Archive extraction error
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation was cancelled by its owner
    #[error("operation cancelled")]
    Cancelled,

    /// Requested item does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the cancellation control signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The payload could not be read as the archive format its name claims
    #[error("malformed {format} archive {source_name}: {reason}")]
    Malformed {
        /// Name or URL the payload came from
        source_name: String,
        /// Archive format (zip, 7z, rar)
        format: &'static str,
        /// Why the archive could not be read
        reason: String,
    },

    /// Writing an entry to disk failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination path being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A non-archive payload has no usable file name
    #[error("cannot derive a file name from {source_name}")]
    UnnamedPayload {
        /// Name or URL the payload came from
        source_name: String,
    },
}

impl ExtractionError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractionError::Write {
            path: path.into(),
            source,
        }
    }
}

/// Reasons a branch of a dependency walk is skipped without installing
///
/// These never abort sibling branches. They are logged, broadcast as
/// [`Event::ResolutionAborted`](crate::types::Event::ResolutionAborted) and
/// collected into the walk's report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionAbort {
    /// No catalog entry for the identifier
    #[error("{id} is not in the catalog")]
    UnknownMod {
        /// The missing identifier
        id: TargetId,
    },

    /// The requested version is not among the entry's artifacts
    #[error("{id} has no published version {version}")]
    VersionNotPublished {
        /// Mod identifier
        id: TargetId,
        /// The version that was requested
        version: Version,
    },

    /// The catalog entry has no artifacts at all
    #[error("{id} has no published artifacts")]
    NoArtifacts {
        /// Mod identifier
        id: TargetId,
    },

    /// The staging directory could not be prepared
    #[error("cannot prepare {path} for {id}: {reason}")]
    TargetDirectory {
        /// Mod identifier
        id: TargetId,
        /// Staging directory
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },
}

impl ResolutionAbort {
    /// Identifier of the skipped branch
    pub fn id(&self) -> &TargetId {
        match self {
            ResolutionAbort::UnknownMod { id }
            | ResolutionAbort::VersionNotPublished { id, .. }
            | ResolutionAbort::NoArtifacts { id }
            | ResolutionAbort::TargetDirectory { id, .. } => id,
        }
    }
}

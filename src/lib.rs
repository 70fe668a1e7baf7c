//! # modman
//!
//! Install engine for a BepInEx-based game mod manager.
//!
//! ## Overview
//!
//! Given a mod identifier, modman:
//! - looks the mod up in a remote JSON catalog,
//! - walks its dependencies and `extends` base, skipping cycles and mods that are
//!   already installed at the selected version,
//! - downloads every artifact with retry and cancellable progress reporting,
//! - extracts ZIP, 7z and RAR archives (or writes single files verbatim) into a
//!   per-mod staging directory,
//! - writes `meta.json` and hands the mod to the local-mod registry to enable.
//!
//! At most one install per identifier runs at any time. In-flight installs are
//! observable through the [`TaskStore`]; lifecycle events are broadcast as [`Event`]s.
//!
//! ## Quick Start
//!
//! ```no_run
//! use modman::{Config, DirectoryRegistry, ModManager, ResolveOutcome};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.game_dir = "/games/NuclearOption".into();
//!     config.catalog.manifest_url = Some("https://example.com/manifest.json".into());
//!
//!     let registry = Arc::new(DirectoryRegistry::new(config.layout()));
//!     let manager = ModManager::new(config, registry)?;
//!     manager.refresh_catalog().await?;
//!
//!     match manager.install_mod(&"MapTools".into(), None) {
//!         ResolveOutcome::PrerequisiteMissing(handle) => {
//!             handle.wait().await?;
//!             // Re-issue the request now that the mod loader is present
//!         }
//!         ResolveOutcome::Dispatched(report) => {
//!             for (id, result) in report.wait_all().await {
//!                 println!("{id}: {:?}", result);
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote mod catalog
pub mod catalog;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// HTTP retrieval with retry and progress
pub mod fetch;
/// Install coordinator
pub mod installer;
/// Dependency-resolving facade
pub mod manager;
/// Persisted install metadata
pub mod metadata;
/// Installed-mod registry
pub mod registry;
/// Retry logic with linear backoff
pub mod retry;
/// Observable install state
pub mod state;
/// Core types and events
pub mod types;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use catalog::Catalog;
pub use config::{CatalogConfig, Config, InstallConfig, Layout, PrerequisiteConfig, RetryConfig};
pub use error::{Error, ExtractionError, ResolutionAbort, Result};
pub use extraction::{ExtractSummary, extract_payload};
pub use fetch::{FetchProgress, Fetcher};
pub use installer::{InstallHandle, InstallRequest, Installer};
pub use manager::{ModManager, ProcessingSet, ResolveOutcome, ResolveReport};
pub use metadata::InstallMetadata;
pub use registry::{DirectoryRegistry, LocalMod, LocalModRegistry};
pub use state::{Phase, TaskSlot, TaskSnapshot, TaskState, TaskStore};
pub use types::{
    Artifact, ArchiveType, CatalogEntry, Event, InvalidVersion, ModReference, TargetId, Version,
};

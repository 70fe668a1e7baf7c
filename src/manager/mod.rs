//! Mod manager facade
//!
//! [`ModManager`] wires the catalog, the install coordinator, the task store and
//! a local-mod registry together, and exposes the dependency-resolving install
//! entry point ([`ModManager::install_mod`]).

mod resolve;


pub use resolve::{ProcessingSet, ResolveOutcome, ResolveReport};

use crate::catalog::Catalog;
use crate::config::{Config, Layout};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::installer::{InstallHandle, InstallRequest, Installer};
use crate::registry::LocalModRegistry;
use crate::state::TaskStore;
use crate::types::{Event, TargetId};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Entry point for installing mods
///
/// Cloning is cheap; clones share the catalog, locks, task store and registry.
#[derive(Clone)]
pub struct ModManager {
    config: Arc<Config>,
    layout: Layout,
    installer: Installer,
    catalog: Arc<Catalog>,
    registry: Arc<dyn LocalModRegistry>,
    event_tx: broadcast::Sender<Event>,
}

impl ModManager {
    /// Create a manager with a fresh task store
    ///
    /// The catalog starts empty; call [`ModManager::refresh_catalog`] to load it.
    pub fn new(config: Config, registry: Arc<dyn LocalModRegistry>) -> Result<Self> {
        Self::with_store(config, registry, TaskStore::new())
    }

    /// Create a manager reporting into an existing task store
    pub fn with_store(
        config: Config,
        registry: Arc<dyn LocalModRegistry>,
        store: TaskStore,
    ) -> Result<Self> {
        config.validate()?;

        let fetcher = Fetcher::new(&config.install, config.retry.clone())?;
        let (event_tx, _rx) = broadcast::channel(1000);
        let installer = Installer::new(
            fetcher.clone(),
            store,
            config.install.max_concurrent_installs,
            event_tx.clone(),
        );
        let catalog = Arc::new(Catalog::new(
            fetcher,
            config.catalog.clone(),
            event_tx.clone(),
        ));

        Ok(Self {
            layout: config.layout(),
            config: Arc::new(config),
            installer,
            catalog,
            registry,
            event_tx,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Install locations
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Remote catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Observable state of in-flight installs
    pub fn store(&self) -> &TaskStore {
        self.installer.store()
    }

    /// Subscribe to install and catalog events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Reload the catalog manifest
    ///
    /// See [`Catalog::refresh`].
    pub async fn refresh_catalog(&self) -> Result<Option<usize>> {
        self.catalog.refresh().await
    }

    /// Install the protected prerequisite into the game directory
    ///
    /// Existing game files are never overwritten and nothing is deleted if the
    /// install fails. The registry is rescanned on success.
    pub fn install_prerequisite(&self) -> InstallHandle {
        let prerequisite = &self.config.prerequisite;
        let registry = Arc::clone(&self.registry);

        tracing::info!(
            target_id = %prerequisite.id,
            game_dir = ?self.layout.game_dir,
            "installing prerequisite"
        );

        self.installer.install(
            InstallRequest::prerequisite(
                prerequisite.id.clone(),
                prerequisite.download_url.clone(),
                self.layout.game_dir.clone(),
            ),
            move || registry.refresh(),
        )
    }

    /// Bring an installed mod to the newest published version
    ///
    /// Same as [`ModManager::install_mod`] without a version: a no-op when the
    /// newest artifact is already installed.
    pub fn update(&self, id: &TargetId) -> ResolveOutcome {
        self.install_mod(id, None)
    }
}

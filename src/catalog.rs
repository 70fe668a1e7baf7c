//! Remote mod catalog
//!
//! The catalog is a JSON array of [`CatalogEntry`] published at
//! `catalog.manifest_url`. Decoding is permissive: unknown fields are ignored and
//! missing optional fields take their defaults. A failed refresh keeps the
//! previously loaded list.
//!
//! Setting `catalog.manifest_path` reads the manifest from a local file instead,
//! which is handy when authoring a manifest.

use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::types::{CatalogEntry, Event, TargetId};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{info, warn};

/// In-memory copy of the remote catalog
pub struct Catalog {
    fetcher: Fetcher,
    config: CatalogConfig,
    entries: watch::Sender<Arc<Vec<CatalogEntry>>>,
    loading: watch::Sender<bool>,
    refresh_lock: Mutex<()>,
    event_tx: broadcast::Sender<Event>,
}

impl Catalog {
    /// Create an empty catalog; call [`Catalog::refresh`] to load it
    pub fn new(fetcher: Fetcher, config: CatalogConfig, event_tx: broadcast::Sender<Event>) -> Self {
        let (entries, _) = watch::channel(Arc::new(Vec::new()));
        let (loading, _) = watch::channel(false);
        Self {
            fetcher,
            config,
            entries,
            loading,
            refresh_lock: Mutex::new(()),
            event_tx,
        }
    }

    /// Reload the manifest
    ///
    /// Returns `Ok(None)` without doing anything when another refresh is already
    /// running, and `Ok(Some(count))` once the new list is in place. On error the
    /// previous list is kept.
    pub async fn refresh(&self) -> Result<Option<usize>> {
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            return Ok(None);
        };

        self.loading.send_replace(true);
        let result = self.load().await;
        self.loading.send_replace(false);

        match result {
            Ok(entries) => {
                let count = entries.len();
                self.entries.send_replace(Arc::new(entries));
                info!(entries = count, "catalog refreshed");
                self.event_tx.send(Event::CatalogUpdated { entries: count }).ok();
                Ok(Some(count))
            }
            Err(e) => {
                warn!(error = %e, "catalog refresh failed; keeping previous entries");
                Err(e)
            }
        }
    }

    async fn load(&self) -> Result<Vec<CatalogEntry>> {
        if let Some(path) = &self.config.manifest_path {
            let contents = tokio::fs::read(path).await?;
            return Ok(serde_json::from_slice(&contents)?);
        }

        match &self.config.manifest_url {
            Some(url) => self.fetcher.get_json(url).await,
            None => Err(Error::Config {
                message: "no catalog manifest URL or path configured".to_string(),
                key: Some("catalog.manifest_url".to_string()),
            }),
        }
    }

    /// Replace the entries directly
    pub fn set_entries(&self, entries: Vec<CatalogEntry>) {
        let count = entries.len();
        self.entries.send_replace(Arc::new(entries));
        self.event_tx.send(Event::CatalogUpdated { entries: count }).ok();
    }

    /// Current entries
    pub fn entries(&self) -> Arc<Vec<CatalogEntry>> {
        Arc::clone(&self.entries.borrow())
    }

    /// Entry for one mod
    pub fn find(&self, id: &TargetId) -> Option<CatalogEntry> {
        self.entries.borrow().iter().find(|entry| &entry.id == id).cloned()
    }

    /// True while a refresh is running
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Subscribe to catalog replacements
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<CatalogEntry>>> {
        self.entries.subscribe()
    }
}

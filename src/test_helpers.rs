//! Shared test helpers: in-memory archives, directory snapshots and fast installers.

use crate::config::RetryConfig;
use crate::fetch::Fetcher;
use crate::installer::Installer;
use crate::state::TaskStore;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;

/// Build a ZIP archive in memory from (name, content) files and directory names
pub(crate) fn zip_bytes(files: &[(&str, &[u8])], dirs: &[&str]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    for dir in dirs {
        writer.add_directory(*dir, options).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Snapshot of a directory: relative path -> Some(contents) for files, None for directories
pub(crate) fn tree(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| entry.unwrap())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            let contents = if entry.file_type().is_file() {
                Some(std::fs::read(entry.path()).unwrap())
            } else {
                None
            };
            (relative, contents)
        })
        .collect()
}

/// Retry settings that keep tests fast
pub(crate) fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(10),
    }
}

/// Installer with a plain client, fast retries and a fresh store
pub(crate) fn test_installer(max_concurrent: usize) -> Installer {
    let fetcher = Fetcher::with_client(reqwest::Client::new(), fast_retry(2));
    let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
    Installer::new(fetcher, TaskStore::new(), max_concurrent, event_tx)
}

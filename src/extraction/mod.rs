//! Archive extraction
//!
//! This module extracts an in-memory payload into a target directory. The format
//! is chosen from the lowercase extension of the payload's source name or URL:
//! ZIP, 7z and RAR archives are walked entry by entry; anything else is written
//! verbatim as a single file named after the source's last path segment.
//!
//! In protect mode existing files are never overwritten and a failed extraction
//! leaves the target as it was. Otherwise existing files are replaced, and a
//! failure deletes the whole target directory before the error is returned.

mod rar;
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use rar::RarExtractor;
pub use sevenz::SevenZipExtractor;
pub use shared::{ExtractSummary, detect_archive_type, is_archive, payload_file_name};
pub use zip::ZipExtractor;

use crate::error::{ExtractionError, Result};
use crate::types::ArchiveType;
use shared::{EntryOutcome, write_entry};
use std::path::Path;
use tracing::{info, warn};

/// Unified payload extraction dispatcher
///
/// # Arguments
/// * `bytes` - The downloaded payload
/// * `source_name` - URL or file name the payload came from (selects the format)
/// * `dest_path` - Target directory; must already exist
/// * `protect` - Keep existing files and never delete the target on failure
///
/// # Example
/// ```no_run
/// use modman::extraction::extract_payload;
/// use std::path::Path;
///
/// # fn example(bytes: &[u8]) -> modman::Result<()> {
/// let summary = extract_payload(
///     bytes,
///     "https://example.com/MapTools-1.2.0.zip",
///     Path::new("/games/no/BepInEx/disabledPlugins/MapTools"),
///     false,
/// )?;
/// println!("wrote {} files", summary.files_written);
/// # Ok(())
/// # }
/// ```
pub fn extract_payload(
    bytes: &[u8],
    source_name: &str,
    dest_path: &Path,
    protect: bool,
) -> Result<ExtractSummary> {
    let archive_type = detect_archive_type(source_name);

    info!(
        source_name,
        ?dest_path,
        ?archive_type,
        protect,
        size = bytes.len(),
        "extracting payload"
    );

    let result = match archive_type {
        Some(ArchiveType::Zip) => ZipExtractor::extract(bytes, source_name, dest_path, protect),
        Some(ArchiveType::SevenZip) => {
            SevenZipExtractor::extract(bytes, source_name, dest_path, protect)
        }
        Some(ArchiveType::Rar) => RarExtractor::extract(bytes, source_name, dest_path, protect),
        None => write_verbatim(bytes, source_name, dest_path, protect),
    };

    if let Err(e) = &result {
        if protect {
            warn!(error = %e, ?dest_path, "extraction failed; protected target left in place");
        } else {
            warn!(error = %e, ?dest_path, "extraction failed; removing target directory");
            if let Err(cleanup) = std::fs::remove_dir_all(dest_path) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %cleanup, ?dest_path, "failed to remove target directory");
                }
            }
        }
    }

    result
}

/// Write a non-archive payload as a single file named after the source
fn write_verbatim(
    bytes: &[u8],
    source_name: &str,
    dest_path: &Path,
    protect: bool,
) -> Result<ExtractSummary> {
    let file_name =
        payload_file_name(source_name).ok_or_else(|| ExtractionError::UnnamedPayload {
            source_name: source_name.to_string(),
        })?;

    let mut summary = ExtractSummary::default();
    let mut reader = bytes;
    let outcome = write_entry(&mut reader, &dest_path.join(&file_name), protect)?;
    summary.record(outcome);

    if outcome == EntryOutcome::Written {
        info!(source_name, file_name = %file_name, "payload written verbatim");
    }
    Ok(summary)
}

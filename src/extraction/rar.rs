use crate::error::{ExtractionError, Result};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use super::shared::{ExtractSummary, create_directory, sanitize_entry_path};

/// Archive extractor for RAR files
///
/// The unrar library only reads archives from disk, so the payload is spooled to
/// a temporary file that is removed when extraction ends.
pub struct RarExtractor;

impl RarExtractor {
    fn malformed(source_name: &str, e: unrar::error::UnrarError) -> ExtractionError {
        ExtractionError::Malformed {
            source_name: source_name.to_string(),
            format: "rar",
            reason: e.to_string(),
        }
    }

    /// Extract an in-memory RAR archive into `dest_path`, entry by entry in archive order
    pub fn extract(
        bytes: &[u8],
        source_name: &str,
        dest_path: &Path,
        protect: bool,
    ) -> Result<ExtractSummary> {
        Self::extract_spooled(bytes, source_name, dest_path, protect, &std::env::temp_dir())
    }

    /// Same as [`RarExtractor::extract`], spooling the archive into `spool_dir`
    pub(super) fn extract_spooled(
        bytes: &[u8],
        source_name: &str,
        dest_path: &Path,
        protect: bool,
        spool_dir: &Path,
    ) -> Result<ExtractSummary> {
        let mut spool = tempfile::Builder::new()
            .prefix("modman-")
            .suffix(".rar")
            .tempfile_in(spool_dir)
            .map_err(|e| ExtractionError::write(spool_dir, e))?;
        spool
            .write_all(bytes)
            .and_then(|()| spool.flush())
            .map_err(|e| ExtractionError::write(spool.path(), e))?;

        let mut at_header = unrar::Archive::new(spool.path())
            .open_for_processing()
            .map_err(|e| Self::malformed(source_name, e))?;

        let mut summary = ExtractSummary::default();

        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => return Err(Self::malformed(source_name, e).into()),
            };

            let header = at_file.entry();
            let entry_name = header.filename.to_string_lossy().into_owned();
            let is_directory = header.is_directory();

            let Some(relative) = sanitize_entry_path(&entry_name) else {
                warn!(entry = %entry_name, "skipping entry with unsafe path");
                summary.unsafe_entries += 1;
                at_header = at_file.skip().map_err(|e| Self::malformed(source_name, e))?;
                continue;
            };
            let file_path = dest_path.join(relative);

            if is_directory {
                summary.record(create_directory(&file_path)?);
                at_header = at_file.skip().map_err(|e| Self::malformed(source_name, e))?;
            } else if protect && file_path.exists() {
                debug!(?file_path, "keeping existing file");
                summary.files_kept += 1;
                at_header = at_file.skip().map_err(|e| Self::malformed(source_name, e))?;
            } else {
                if let Some(parent) = file_path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| ExtractionError::write(parent, e))?;
                }
                if file_path.is_file() {
                    std::fs::remove_file(&file_path)
                        .map_err(|e| ExtractionError::write(&file_path, e))?;
                }
                at_header = at_file
                    .extract_to(&file_path)
                    .map_err(|e| Self::malformed(source_name, e))?;
                summary.files_written += 1;
            }
        }

        info!(
            source_name,
            written = summary.files_written,
            kept = summary.files_kept,
            "RAR extraction successful"
        );

        Ok(summary)
    }
}

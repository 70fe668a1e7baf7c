use crate::error::{Error, ExtractionError, Result};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{info, warn};

use super::shared::{
    EntryOutcome, ExtractSummary, create_directory, sanitize_entry_path, write_entry,
};

/// Archive extractor for 7z files
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract an in-memory 7z archive into `dest_path`, entry by entry in archive order
    ///
    /// Entries are streamed through our own writer rather than the crate's default
    /// so that protect mode and path sanitization apply the same way as for ZIP.
    pub fn extract(
        bytes: &[u8],
        source_name: &str,
        dest_path: &Path,
        protect: bool,
    ) -> Result<ExtractSummary> {
        let mut summary = ExtractSummary::default();
        let mut failure: Option<Error> = None;

        let result = sevenz_rust::decompress_with_extract_fn(
            Cursor::new(bytes),
            dest_path,
            |entry, reader, _default_path| {
                let Some(relative) = sanitize_entry_path(entry.name()) else {
                    if !entry.name().is_empty() {
                        warn!(entry = entry.name(), "skipping entry with unsafe path");
                        summary.unsafe_entries += 1;
                    }
                    return match drain(reader, source_name) {
                        Ok(()) => Ok(true),
                        Err(e) => {
                            failure = Some(e);
                            Ok(false)
                        }
                    };
                };
                let file_path = dest_path.join(relative);

                let outcome = if entry.is_directory() {
                    create_directory(&file_path)
                } else {
                    write_entry(&mut *reader, &file_path, protect)
                };

                // Solid blocks are decoded sequentially; consume the skipped entry
                let outcome = outcome.and_then(|outcome| match outcome {
                    EntryOutcome::Kept => drain(reader, source_name).map(|()| outcome),
                    _ => Ok(outcome),
                });

                match outcome {
                    Ok(outcome) => {
                        summary.record(outcome);
                        Ok(true)
                    }
                    Err(e) => {
                        failure = Some(e);
                        Ok(false)
                    }
                }
            },
        );

        if let Some(e) = failure {
            return Err(e);
        }
        result.map_err(|e| ExtractionError::Malformed {
            source_name: source_name.to_string(),
            format: "7z",
            reason: e.to_string(),
        })?;

        info!(
            source_name,
            written = summary.files_written,
            kept = summary.files_kept,
            "7z extraction successful"
        );

        Ok(summary)
    }
}

/// Read an entry to its end without writing it, so its checksum is still verified
fn drain(reader: &mut dyn Read, source_name: &str) -> Result<()> {
    std::io::copy(reader, &mut std::io::sink())
        .map(|_| ())
        .map_err(|e| {
            ExtractionError::Malformed {
                source_name: source_name.to_string(),
                format: "7z",
                reason: e.to_string(),
            }
            .into()
        })
}

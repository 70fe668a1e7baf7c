use crate::error::{ExtractionError, Result};
use std::io::Cursor;
use std::path::Path;
use tracing::{info, warn};

use super::shared::{ExtractSummary, create_directory, write_entry};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    fn malformed(source_name: &str, e: zip::result::ZipError) -> ExtractionError {
        ExtractionError::Malformed {
            source_name: source_name.to_string(),
            format: "zip",
            reason: e.to_string(),
        }
    }

    /// Extract an in-memory ZIP archive into `dest_path`, entry by entry in archive order
    pub fn extract(
        bytes: &[u8],
        source_name: &str,
        dest_path: &Path,
        protect: bool,
    ) -> Result<ExtractSummary> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Self::malformed(source_name, e))?;

        let mut summary = ExtractSummary::default();

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Self::malformed(source_name, e))?;

            let Some(relative) = file.enclosed_name().map(|p| p.to_path_buf()) else {
                warn!(entry = file.name(), "skipping entry with unsafe path");
                summary.unsafe_entries += 1;
                continue;
            };
            let file_path = dest_path.join(relative);

            let outcome = if file.is_dir() {
                create_directory(&file_path)?
            } else {
                write_entry(&mut file, &file_path, protect)?
            };
            summary.record(outcome);
        }

        info!(
            source_name,
            written = summary.files_written,
            kept = summary.files_kept,
            "ZIP extraction successful"
        );

        Ok(summary)
    }
}

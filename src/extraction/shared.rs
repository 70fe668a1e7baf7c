use crate::error::{ExtractionError, Result};
use crate::types::ArchiveType;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use url::Url;

/// What happened to a single archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryOutcome {
    /// File written (created or overwritten)
    Written,
    /// File already existed and protect mode kept it
    Kept,
    /// Directory created
    Directory,
}

/// Counts of what an extraction did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files written to disk
    pub files_written: usize,
    /// Existing files left untouched in protect mode
    pub files_kept: usize,
    /// Directory entries created
    pub directories: usize,
    /// Entries skipped because their path escapes the target
    pub unsafe_entries: usize,
}

impl ExtractSummary {
    pub(crate) fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Written => self.files_written += 1,
            EntryOutcome::Kept => self.files_kept += 1,
            EntryOutcome::Directory => self.directories += 1,
        }
    }
}

/// Last path segment of a URL or file name, percent-decoded
///
/// Query strings and fragments are ignored. Returns None when the source ends in
/// a separator or the segment is not a plain file name (`.`, `..`).
pub fn payload_file_name(source: &str) -> Option<String> {
    let segment = match Url::parse(source) {
        Ok(url) if !url.cannot_be_a_base() => {
            let raw = url.path_segments()?.next_back()?.to_string();
            urlencoding::decode(&raw)
                .map(|s| s.into_owned())
                .unwrap_or(raw)
        }
        _ => source.rsplit(['/', '\\']).next()?.to_string(),
    };

    let name = Path::new(&segment).file_name()?.to_str()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Detect archive type from the lowercase extension of a URL or file name
///
/// Returns None for anything that is not a zip, 7z or rar archive; such payloads
/// are written verbatim.
pub fn detect_archive_type(source: &str) -> Option<ArchiveType> {
    let name = payload_file_name(source)?;
    let extension = Path::new(&name).extension()?.to_str()?.to_ascii_lowercase();

    match extension.as_str() {
        "zip" => Some(ArchiveType::Zip),
        "7z" => Some(ArchiveType::SevenZip),
        "rar" => Some(ArchiveType::Rar),
        _ => None,
    }
}

/// Check if a source name refers to a supported archive
pub fn is_archive(source: &str) -> bool {
    detect_archive_type(source).is_some()
}

/// Relative path of an archive entry with every non-normal component dropped
///
/// Strips root, prefix, `.` and `..` components so entries such as
/// `../../etc/passwd` cannot escape the target. Returns None when nothing remains.
pub(crate) fn sanitize_entry_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let sanitized = Path::new(&normalized)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect::<PathBuf>();

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Create a directory entry (and its parents)
pub(crate) fn create_directory(path: &Path) -> Result<EntryOutcome> {
    std::fs::create_dir_all(path).map_err(|e| ExtractionError::write(path, e))?;
    Ok(EntryOutcome::Directory)
}

/// Stream one file entry to `dest`, creating parent directories as needed
///
/// In protect mode an existing file is kept and `reader` is left unread.
pub(crate) fn write_entry<R: Read + ?Sized>(
    reader: &mut R,
    dest: &Path,
    protect: bool,
) -> Result<EntryOutcome> {
    if protect && dest.exists() {
        debug!(?dest, "keeping existing file");
        return Ok(EntryOutcome::Kept);
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExtractionError::write(parent, e))?;
    }

    let mut file = std::fs::File::create(dest).map_err(|e| ExtractionError::write(dest, e))?;
    std::io::copy(reader, &mut file).map_err(|e| ExtractionError::write(dest, e))?;
    Ok(EntryOutcome::Written)
}

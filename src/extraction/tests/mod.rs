use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use crate::types::ArchiveType;
use crate::test_helpers::{tree, zip_bytes};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a 7z archive in memory from a directory tree on disk
fn sevenz_bytes(source_dir: &Path) -> Vec<u8> {
    let scratch = TempDir::new().unwrap();
    let archive_path = scratch.path().join("tree.7z");
    sevenz_rust::compress_to_path(source_dir, &archive_path).unwrap();
    std::fs::read(&archive_path).unwrap()
}

fn sample_tree() -> BTreeMap<String, Option<Vec<u8>>> {
    BTreeMap::from([
        ("a".to_string(), None),
        ("a/b.txt".to_string(), Some(b"hello from b".to_vec())),
        ("c".to_string(), None),
    ])
}

// ===========================================================================
// Format detection and file naming
// ===========================================================================

#[test]
fn detect_archive_type_by_lowercase_extension() {
    assert_eq!(detect_archive_type("https://h/mod.zip"), Some(ArchiveType::Zip));
    assert_eq!(detect_archive_type("https://h/MOD.ZIP"), Some(ArchiveType::Zip));
    assert_eq!(detect_archive_type("https://h/pack.7z"), Some(ArchiveType::SevenZip));
    assert_eq!(detect_archive_type("https://h/pack.Rar"), Some(ArchiveType::Rar));
    assert_eq!(detect_archive_type("local/pack.rar"), Some(ArchiveType::Rar));
}

#[test]
fn detect_archive_type_ignores_query_string() {
    assert_eq!(
        detect_archive_type("https://cdn.example.com/files/mod.zip?token=abc.def"),
        Some(ArchiveType::Zip)
    );
}

#[test]
fn detect_archive_type_non_archive_returns_none() {
    assert_eq!(detect_archive_type("https://h/Plugin.dll"), None);
    assert_eq!(detect_archive_type("https://h/download/Plugin"), None);
    assert_eq!(detect_archive_type("https://h/archive.tar.gz"), None);
    assert!(!is_archive("https://h/"));
}

#[test]
fn payload_file_name_uses_last_segment() {
    assert_eq!(
        payload_file_name("https://h/releases/v1/MapTools.dll").as_deref(),
        Some("MapTools.dll")
    );
    assert_eq!(
        payload_file_name("https://h/My%20Plugin.dll?x=1").as_deref(),
        Some("My Plugin.dll")
    );
    assert_eq!(payload_file_name("plain-name").as_deref(), Some("plain-name"));
    assert_eq!(payload_file_name("https://h/dir/"), None);
    assert_eq!(payload_file_name("https://h/dir/.."), None);
}

// ===========================================================================
// ZIP
// ===========================================================================

#[test]
fn zip_extracts_files_and_empty_directories() {
    let temp_dir = TempDir::new().unwrap();
    let bytes = zip_bytes(&[("a/b.txt", b"hello from b")], &["c/"]);

    let summary = extract_payload(&bytes, "https://h/mod.zip", temp_dir.path(), false).unwrap();

    assert_eq!(tree(temp_dir.path()), sample_tree());
    assert_eq!(summary.files_written, 1);
    assert_eq!(summary.directories, 1);
}

#[test]
fn zip_overwrites_existing_files_in_normal_mode() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("config.cfg"), b"old").unwrap();
    let bytes = zip_bytes(&[("config.cfg", b"new")], &[]);

    extract_payload(&bytes, "mod.zip", temp_dir.path(), false).unwrap();

    assert_eq!(
        std::fs::read(temp_dir.path().join("config.cfg")).unwrap(),
        b"new"
    );
}

#[test]
fn zip_protect_mode_keeps_existing_file_bytes() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("winhttp.dll"), b"user-patched").unwrap();
    let bytes = zip_bytes(
        &[("winhttp.dll", b"stock"), ("BepInEx/core/BepInEx.dll", b"core")],
        &[],
    );

    let summary = extract_payload(&bytes, "loader.zip", temp_dir.path(), true).unwrap();

    assert_eq!(
        std::fs::read(temp_dir.path().join("winhttp.dll")).unwrap(),
        b"user-patched"
    );
    assert_eq!(
        std::fs::read(temp_dir.path().join("BepInEx/core/BepInEx.dll")).unwrap(),
        b"core"
    );
    assert_eq!(summary.files_kept, 1);
    assert_eq!(summary.files_written, 1);
}

#[test]
fn zip_skips_entries_escaping_the_target() {
    let outer = TempDir::new().unwrap();
    let target = outer.path().join("target");
    std::fs::create_dir(&target).unwrap();
    let bytes = zip_bytes(&[("../evil.txt", b"x"), ("ok.txt", b"fine")], &[]);

    let summary = extract_payload(&bytes, "mod.zip", &target, false).unwrap();

    assert!(!outer.path().join("evil.txt").exists());
    assert!(target.join("ok.txt").exists());
    assert_eq!(summary.unsafe_entries, 1);
}

#[test]
fn malformed_zip_removes_unprotected_target() {
    let outer = TempDir::new().unwrap();
    let target = outer.path().join("MapTools");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("partial.txt"), b"partial").unwrap();

    let result = extract_payload(b"not a zip at all", "mod.zip", &target, false);

    match result {
        Err(Error::Extraction(ExtractionError::Malformed { format, .. })) => {
            assert_eq!(format, "zip");
        }
        other => panic!("expected malformed zip error, got {:?}", other),
    }
    assert!(!target.exists(), "unprotected target should be deleted");
}

#[test]
fn malformed_zip_leaves_protected_target() {
    let outer = TempDir::new().unwrap();
    let target = outer.path().join("game");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("game.exe"), b"exe").unwrap();

    let result = extract_payload(b"garbage", "loader.zip", &target, true);

    assert!(result.is_err());
    assert_eq!(std::fs::read(target.join("game.exe")).unwrap(), b"exe");
}

// ===========================================================================
// 7z
// ===========================================================================

#[test]
fn sevenz_produces_same_tree_as_zip() {
    let source = TempDir::new().unwrap();
    std::fs::create_dir_all(source.path().join("a")).unwrap();
    std::fs::create_dir_all(source.path().join("c")).unwrap();
    std::fs::write(source.path().join("a/b.txt"), b"hello from b").unwrap();
    let bytes = sevenz_bytes(source.path());

    let target = TempDir::new().unwrap();
    let summary = extract_payload(&bytes, "https://h/pack.7z", target.path(), false).unwrap();

    assert_eq!(tree(target.path()), sample_tree());
    assert_eq!(summary.files_written, 1);
}

#[test]
fn sevenz_protect_mode_keeps_existing_file_and_writes_the_rest() {
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("first.txt"), b"archive first").unwrap();
    std::fs::write(source.path().join("second.txt"), b"archive second").unwrap();
    let bytes = sevenz_bytes(source.path());

    let target = TempDir::new().unwrap();
    std::fs::write(target.path().join("first.txt"), b"local").unwrap();

    extract_payload(&bytes, "pack.7z", target.path(), true).unwrap();

    assert_eq!(std::fs::read(target.path().join("first.txt")).unwrap(), b"local");
    assert_eq!(
        std::fs::read(target.path().join("second.txt")).unwrap(),
        b"archive second"
    );
}

#[test]
fn malformed_sevenz_removes_unprotected_target() {
    let outer = TempDir::new().unwrap();
    let target = outer.path().join("Pack");
    std::fs::create_dir(&target).unwrap();

    let result = extract_payload(b"definitely not 7z", "pack.7z", &target, false);

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::Malformed { format: "7z", .. }))
    ));
    assert!(!target.exists());
}

#[test]
fn sevenz_corrupt_entry_skipped_in_protect_mode_is_reported() {
    // Incompressible content, so the packed stream is mostly raw entry bytes
    let mut seed: u32 = 0x1234_5678;
    let content: Vec<u8> = (0..4096)
        .map(|_| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (seed >> 24) as u8
        })
        .collect();
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("first.txt"), &content).unwrap();
    let mut bytes = sevenz_bytes(source.path());

    // Packed streams sit between the 32-byte start header and the next header
    let packed_len = u64::from_le_bytes(bytes[12..20].try_into().unwrap()) as usize;
    bytes[32 + packed_len / 2] ^= 0xFF;

    let target = TempDir::new().unwrap();
    std::fs::write(target.path().join("first.txt"), b"local").unwrap();

    let result = extract_payload(&bytes, "pack.7z", target.path(), true);

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::Malformed { format: "7z", .. }))
    ));
    assert_eq!(std::fs::read(target.path().join("first.txt")).unwrap(), b"local");
}

// ===========================================================================
// RAR
// ===========================================================================

/// Stored (uncompressed) RAR 4 archive holding `a/b.txt` and an empty `c/`
const SAMPLE_RAR: &[u8] = include_bytes!("fixtures/sample.rar");

#[test]
fn rar_produces_same_tree_as_zip() {
    let target = TempDir::new().unwrap();
    let summary =
        extract_payload(SAMPLE_RAR, "https://h/pack.rar?dl=1", target.path(), false).unwrap();

    assert_eq!(tree(target.path()), sample_tree());
    assert_eq!(summary.files_written, 1);
    assert_eq!(summary.files_kept, 0);
}

#[test]
fn rar_overwrites_existing_file() {
    let target = TempDir::new().unwrap();
    std::fs::create_dir_all(target.path().join("a")).unwrap();
    std::fs::write(target.path().join("a/b.txt"), b"old").unwrap();

    extract_payload(SAMPLE_RAR, "pack.rar", target.path(), false).unwrap();

    assert_eq!(tree(target.path()), sample_tree());
}

#[test]
fn rar_protect_mode_keeps_existing_file() {
    let target = TempDir::new().unwrap();
    std::fs::create_dir_all(target.path().join("a")).unwrap();
    std::fs::write(target.path().join("a/b.txt"), b"local").unwrap();

    let summary = extract_payload(SAMPLE_RAR, "pack.rar", target.path(), true).unwrap();

    assert_eq!(std::fs::read(target.path().join("a/b.txt")).unwrap(), b"local");
    assert!(target.path().join("c").is_dir());
    assert_eq!(summary.files_kept, 1);
    assert_eq!(summary.files_written, 0);
}

#[test]
fn rar_spool_failure_is_an_extraction_error() {
    let scratch = TempDir::new().unwrap();
    let missing = scratch.path().join("no-such-dir");
    let target = TempDir::new().unwrap();

    let result =
        RarExtractor::extract_spooled(SAMPLE_RAR, "pack.rar", target.path(), false, &missing);

    match result {
        Err(Error::Extraction(ExtractionError::Write { path, .. })) => assert_eq!(path, missing),
        other => panic!("expected write error, got {:?}", other),
    }
}

#[test]
fn malformed_rar_removes_unprotected_target() {
    let outer = TempDir::new().unwrap();
    let target = outer.path().join("RarMod");
    std::fs::create_dir(&target).unwrap();

    let result = extract_payload(b"this is not a rar archive", "mod.rar", &target, false);

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::Malformed { format: "rar", .. }))
    ));
    assert!(!target.exists());
}

#[test]
fn malformed_rar_leaves_protected_target() {
    let target = TempDir::new().unwrap();
    std::fs::write(target.path().join("keep.txt"), b"keep").unwrap();

    let result = extract_payload(b"junk", "loader.rar", target.path(), true);

    assert!(result.is_err());
    assert_eq!(std::fs::read(target.path().join("keep.txt")).unwrap(), b"keep");
}

// ===========================================================================
// Verbatim payloads
// ===========================================================================

#[test]
fn extensionless_payload_is_written_as_single_file() {
    let target = TempDir::new().unwrap();

    let summary = extract_payload(
        b"hello from b",
        "https://h/releases/latest/download/MapTools",
        target.path(),
        false,
    )
    .unwrap();

    assert_eq!(
        tree(target.path()),
        BTreeMap::from([("MapTools".to_string(), Some(b"hello from b".to_vec()))])
    );
    assert_eq!(summary.files_written, 1);
}

#[test]
fn dll_payload_is_written_verbatim_even_though_it_has_an_extension() {
    let target = TempDir::new().unwrap();

    extract_payload(b"MZ\x90\x00", "https://h/Plugin.dll", target.path(), false).unwrap();

    assert_eq!(std::fs::read(target.path().join("Plugin.dll")).unwrap(), b"MZ\x90\x00");
}

#[test]
fn verbatim_protect_mode_keeps_existing_file() {
    let target = TempDir::new().unwrap();
    std::fs::write(target.path().join("Plugin.dll"), b"existing").unwrap();

    let summary =
        extract_payload(b"replacement", "https://h/Plugin.dll", target.path(), true).unwrap();

    assert_eq!(
        std::fs::read(target.path().join("Plugin.dll")).unwrap(),
        b"existing"
    );
    assert_eq!(summary.files_kept, 1);
}

#[test]
fn payload_without_file_name_is_an_extraction_error() {
    let outer = TempDir::new().unwrap();
    let target = outer.path().join("Nameless");
    std::fs::create_dir(&target).unwrap();

    let result = extract_payload(b"data", "https://h/dir/", &target, false);

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::UnnamedPayload { .. }))
    ));
    assert!(!target.exists());
}

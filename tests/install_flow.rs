//! End-to-end install flow against a mock mod host.
//!
//! Drives the public API only: bootstrap the prerequisite, load the catalog
//! from a served manifest, install a mod with a dependency, then update it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use modman::{
    Config, DirectoryRegistry, Event, InstallMetadata, LocalModRegistry, ModManager,
    ResolveOutcome, ResolveReport, RetryConfig, TargetId, TaskSlot, Version,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn zip_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

async fn serve(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

fn manifest(server: &MockServer, map_tools_versions: &[&str]) -> String {
    let artifacts: Vec<String> = map_tools_versions
        .iter()
        .map(|version| {
            format!(
                r#"{{"version": "{version}", "downloadUrl": "{uri}/MapTools-{version}.zip",
                    "dependencies": [{{"id": "Core"}}]}}"#,
                uri = server.uri()
            )
        })
        .collect();

    format!(
        r#"[
            {{"id": "Core", "displayName": "Core Library",
              "artifacts": [{{"version": "1.0.0", "downloadUrl": "{uri}/Core.dll"}}]}},
            {{"id": "MapTools", "displayName": "Map Tools", "authors": ["someone"],
              "artifacts": [{artifacts}]}}
        ]"#,
        uri = server.uri(),
        artifacts = artifacts.join(",")
    )
}

async fn dispatched(manager: &ModManager, id: &str) -> ResolveReport {
    match manager.install_mod(&TargetId::from(id), None) {
        ResolveOutcome::Dispatched(report) => report,
        ResolveOutcome::PrerequisiteMissing(_) => panic!("prerequisite should be present"),
    }
}

#[tokio::test]
async fn bootstrap_then_install_with_dependency() {
    let game = TempDir::new().unwrap();
    let server = MockServer::start().await;

    std::fs::write(game.path().join("game.exe"), b"original").unwrap();
    serve(
        &server,
        "/BepInEx.zip",
        zip_archive(&[
            ("BepInEx/core/BepInEx.dll", b"loader"),
            ("game.exe", b"replacement"),
        ]),
    )
    .await;
    serve(&server, "/Core.dll", b"core library".to_vec()).await;
    serve(
        &server,
        "/MapTools-2.0.0.zip",
        zip_archive(&[("MapTools.dll", b"v2"), ("assets/icons.txt", b"icons")]),
    )
    .await;
    serve(&server, "/manifest.json", manifest(&server, &["1.0.0", "2.0.0"]).into_bytes()).await;

    let mut config = Config {
        game_dir: game.path().to_path_buf(),
        retry: RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        },
        ..Config::default()
    };
    config.catalog.manifest_url = Some(format!("{}/manifest.json", server.uri()));
    config.prerequisite.download_url = format!("{}/BepInEx.zip", server.uri());

    let registry = Arc::new(DirectoryRegistry::new(config.layout()));
    let manager = ModManager::new(config, registry.clone()).unwrap();
    let mut events = manager.subscribe();

    assert_eq!(manager.refresh_catalog().await.unwrap(), Some(2));
    assert!(manager.catalog().find(&TargetId::from("MapTools")).is_some());

    // No mod loader yet: the request turns into a prerequisite install
    let handle = match manager.install_mod(&TargetId::from("MapTools"), None) {
        ResolveOutcome::PrerequisiteMissing(handle) => handle,
        ResolveOutcome::Dispatched(_) => panic!("prerequisite should be installed first"),
    };
    assert!(manager.store().get(&TaskSlot::Prerequisite).is_some());
    handle.wait().await.unwrap();

    assert!(manager.layout().prerequisite_present());
    assert_eq!(
        std::fs::read(game.path().join("game.exe")).unwrap(),
        b"original",
        "protected install must not overwrite game files"
    );

    // Second attempt resolves the dependency first
    let report = dispatched(&manager, "MapTools").await;
    assert_eq!(
        report.dispatched_ids(),
        vec![TargetId::from("Core"), TargetId::from("MapTools")]
    );
    for (id, result) in report.wait_all().await {
        assert!(result.is_ok(), "{id} failed: {result:?}");
    }

    let plugins = manager.layout().plugins_dir();
    assert_eq!(std::fs::read(plugins.join("Core/Core.dll")).unwrap(), b"core library");
    assert_eq!(std::fs::read(plugins.join("MapTools/MapTools.dll")).unwrap(), b"v2");
    assert_eq!(
        std::fs::read(plugins.join("MapTools/assets/icons.txt")).unwrap(),
        b"icons"
    );
    assert!(!manager.layout().staging_target(&TargetId::from("MapTools")).exists());

    let meta = InstallMetadata::read(&plugins.join("MapTools")).unwrap().unwrap();
    assert_eq!(meta.id, TargetId::from("MapTools"));
    assert_eq!(meta.artifact.version, Version::parse("2.0.0").unwrap());
    assert_eq!(meta.cached_entry.display_name, "Map Tools");

    let installed = registry.get(&TargetId::from("MapTools")).unwrap();
    assert!(installed.enabled);
    assert_eq!(
        registry.installed_version(&TargetId::from("Core")),
        Some(Version::parse("1.0.0").unwrap())
    );
    assert!(manager.store().snapshot().is_empty());

    // Already current: nothing to do
    let report = dispatched(&manager, "MapTools").await;
    assert!(report.is_noop());
    assert_eq!(report.skipped, vec![TargetId::from("MapTools")]);

    let mut completed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::InstallCompleted { id } = event {
            completed.push(id);
        }
    }
    assert_eq!(completed.len(), 3);
    assert!(completed.contains(&TargetId::from("BepInEx")));
}

#[tokio::test]
async fn update_replaces_enabled_copy() {
    let game = TempDir::new().unwrap();
    let server = MockServer::start().await;

    serve(&server, "/Core.dll", b"core library".to_vec()).await;
    serve(
        &server,
        "/MapTools-1.0.0.zip",
        zip_archive(&[("MapTools.dll", b"v1"), ("old.cfg", b"stale")]),
    )
    .await;
    serve(
        &server,
        "/MapTools-1.1.0.zip",
        zip_archive(&[("MapTools.dll", b"v1.1")]),
    )
    .await;

    let manifest_dir = TempDir::new().unwrap();
    let manifest_path = manifest_dir.path().join("manifest.json");
    std::fs::write(&manifest_path, manifest(&server, &["1.0.0"])).unwrap();

    let mut config = Config {
        game_dir: game.path().to_path_buf(),
        ..Config::default()
    };
    config.catalog.manifest_path = Some(manifest_path.clone());
    std::fs::create_dir_all(config.layout().prerequisite_root).unwrap();

    let registry = Arc::new(DirectoryRegistry::new(config.layout()));
    let manager = ModManager::new(config, registry.clone()).unwrap();
    manager.refresh_catalog().await.unwrap();

    for (_, result) in dispatched(&manager, "MapTools").await.wait_all().await {
        result.unwrap();
    }
    let enabled = manager.layout().plugins_dir().join("MapTools");
    assert!(enabled.join("old.cfg").exists());

    // A newer version is published
    std::fs::write(&manifest_path, manifest(&server, &["1.0.0", "1.1.0"])).unwrap();
    manager.refresh_catalog().await.unwrap();

    let report = match manager.update(&TargetId::from("MapTools")) {
        ResolveOutcome::Dispatched(report) => report,
        ResolveOutcome::PrerequisiteMissing(_) => panic!("prerequisite is present"),
    };
    assert_eq!(report.dispatched_ids(), vec![TargetId::from("MapTools")]);
    assert_eq!(report.skipped, vec![TargetId::from("Core")]);
    for (_, result) in report.wait_all().await {
        result.unwrap();
    }

    assert_eq!(std::fs::read(enabled.join("MapTools.dll")).unwrap(), b"v1.1");
    assert!(!enabled.join("old.cfg").exists());
    assert_eq!(
        registry.installed_version(&TargetId::from("MapTools")),
        Some(Version::parse("1.1.0").unwrap())
    );
}

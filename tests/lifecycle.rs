use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use monkemod_lib::core::downloader::Downloader;
use monkemod_lib::core::error::ErrorKind;
use monkemod_lib::core::manifest::HttpManifestSource;
use monkemod_lib::core::mods::{
    is_installed, LifecycleController, ModDescriptor, ModRegistry, UninstallOutcome,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

const FOO_BYTES: &[u8] = b"MZ\x90\x00foo-plugin";

struct Harness {
    server: MockServer,
    game: TempDir,
    staging: TempDir,
    controller: LifecycleController,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let game = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(reqwest::Client::new(), staging.path().join("downloads"));
        let controller = LifecycleController::new(game.path().to_path_buf(), downloader);
        Self {
            server,
            game,
            staging,
            controller,
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.server.uri(), route)
    }

    fn plugins(&self) -> PathBuf {
        self.game.path().join("BepInEx").join("plugins")
    }

    async fn serve(&self, route: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }
}

fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

#[tokio::test]
async fn manifest_to_installed_scenario() {
    let h = Harness::start().await;
    let manifest = format!(
        r#"[{{ "name": "Foo", "version": "1.0", "download_url": "{}" }}]"#,
        h.url("/Foo.dll")
    );
    h.serve("/modinfo.json", manifest.into_bytes()).await;
    h.serve("/Foo.dll", FOO_BYTES.to_vec()).await;

    let registry = ModRegistry::new();
    let source = HttpManifestSource::new(reqwest::Client::new(), h.url("/modinfo.json"));
    let mods = registry.sync(&source).await.unwrap();
    assert_eq!(mods.len(), 1);

    let foo = registry.get("Foo").unwrap();
    std::fs::create_dir_all(h.plugins()).unwrap();
    assert!(!is_installed(&foo, &h.plugins()));

    let report = h.controller.install(foo.clone()).await.unwrap();
    assert!(report.state.is_installed());
    assert_eq!(std::fs::read(h.plugins().join("Foo.dll")).unwrap(), FOO_BYTES);
    assert!(is_installed(&foo, &h.plugins()));
}

#[tokio::test]
async fn manifest_404_keeps_previous_set() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/modinfo.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;

    let registry = ModRegistry::new();
    registry.replace(vec![ModDescriptor::new("Old", "1.0", "https://x/Old.dll")]);

    let source = HttpManifestSource::new(reqwest::Client::new(), h.url("/modinfo.json"));
    let err = registry.sync(&source).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert_eq!(registry.snapshot().len(), 1);
    assert!(registry.get("Old").is_some());
}

#[tokio::test]
async fn install_twice_is_idempotent() {
    let h = Harness::start().await;
    h.serve("/Foo.dll", FOO_BYTES.to_vec()).await;
    let foo = ModDescriptor::new("Foo", "1.0", h.url("/Foo.dll"));

    h.controller.install(foo.clone()).await.unwrap();
    let after_first = files_under(&h.plugins());
    h.controller.install(foo.clone()).await.unwrap();
    let after_second = files_under(&h.plugins());

    assert_eq!(after_first, after_second);
    assert_eq!(after_second, vec![h.plugins().join("Foo.dll")]);
    assert_eq!(std::fs::read(h.plugins().join("Foo.dll")).unwrap(), FOO_BYTES);
}

#[tokio::test]
async fn concurrent_installs_of_one_mod_do_not_collide() {
    let h = Harness::start().await;
    h.serve("/Foo.dll", FOO_BYTES.to_vec()).await;
    let foo = ModDescriptor::new("Foo", "1.0", h.url("/Foo.dll"));

    let Harness {
        server: _server,
        game,
        staging: _staging,
        controller,
    } = h;
    let controller = Arc::new(controller);

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        let foo = foo.clone();
        async move { controller.install(foo).await }
    });
    let second = tokio::spawn({
        let controller = Arc::clone(&controller);
        let foo = foo.clone();
        async move { controller.install(foo).await }
    });

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());

    let plugins = game.path().join("BepInEx/plugins");
    assert_eq!(files_under(&plugins), vec![plugins.join("Foo.dll")]);
}

#[tokio::test]
async fn different_mods_sharing_a_file_name_keep_their_own_bytes() {
    let h = Harness::start().await;
    h.serve("/a/Plugin.dll", b"AAAA".to_vec()).await;
    h.serve("/b/Plugin.dll", b"BB".to_vec()).await;

    let mut first = ModDescriptor::new("First", "1.0", h.url("/a/Plugin.dll"));
    first.install_location = Some("BepInEx/plugins/First".into());
    let mut second = ModDescriptor::new("Second", "1.0", h.url("/b/Plugin.dll"));
    second.install_location = Some("BepInEx/plugins/Second".into());

    let Harness {
        server: _server,
        game,
        staging,
        controller,
    } = h;
    let controller = Arc::new(controller);

    let tasks: Vec<_> = [first, second]
        .into_iter()
        .map(|descriptor| {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.install(descriptor).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    let plugins = game.path().join("BepInEx/plugins");
    assert_eq!(std::fs::read(plugins.join("First/Plugin.dll")).unwrap(), b"AAAA");
    assert_eq!(std::fs::read(plugins.join("Second/Plugin.dll")).unwrap(), b"BB");
    assert!(files_under(staging.path()).is_empty());
}

#[tokio::test]
async fn install_then_uninstall_round_trip() {
    let h = Harness::start().await;
    h.serve("/Foo.dll", FOO_BYTES.to_vec()).await;
    let foo = ModDescriptor::new("Foo", "1.0", h.url("/Foo.dll"));

    h.controller.install(foo.clone()).await.unwrap();
    let report = h.controller.uninstall(foo.clone()).await.unwrap();

    assert!(matches!(report.outcome, UninstallOutcome::Removed { .. }));
    assert!(!report.state.is_installed());
    assert!(!is_installed(&foo, &h.plugins()));

    let again = h.controller.uninstall(foo).await.unwrap();
    assert_eq!(again.outcome, UninstallOutcome::NothingToUninstall);
}

#[tokio::test]
async fn archive_contents_keep_their_layout() {
    let h = Harness::start().await;
    h.serve(
        "/Bundle.zip",
        zip_with(&[("a/b.dll", "MZ-b"), ("a/c.txt", "notes")]),
    )
    .await;
    let bundle = ModDescriptor::new("Bundle", "1.0", h.url("/Bundle.zip"));

    let report = h.controller.install(bundle).await.unwrap();

    assert_eq!(report.placement.paths().len(), 2);
    assert_eq!(std::fs::read(h.plugins().join("a/b.dll")).unwrap(), b"MZ-b");
    assert!(files_under(h.staging.path()).is_empty());
}

#[tokio::test]
async fn url_without_file_name_uses_mod_name() {
    let h = Harness::start().await;
    h.serve("/", FOO_BYTES.to_vec()).await;
    let foo = ModDescriptor::new("Foo", "1.0", h.url("/"));

    let report = h.controller.install(foo.clone()).await.unwrap();

    assert!(h.plugins().join("Foo.dll").is_file());
    assert!(report.state.is_installed());
    assert!(is_installed(&foo, &h.plugins()));
}

#[tokio::test]
async fn custom_install_location_is_honoured() {
    let h = Harness::start().await;
    h.serve("/Patch.dll", b"MZ-patch".to_vec()).await;
    let mut patch = ModDescriptor::new("Patch", "1.0", h.url("/Patch.dll"));
    patch.install_location = Some("BepInEx/patchers".into());

    let report = h.controller.install(patch).await.unwrap();

    let expected_dir = h.game.path().join("BepInEx/patchers");
    assert_eq!(report.target_dir, expected_dir);
    assert!(expected_dir.join("Patch.dll").is_file());
    assert!(!h.plugins().exists());
}

#[tokio::test]
async fn failed_download_changes_nothing() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/Foo.dll"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;
    let foo = ModDescriptor::new("Foo", "1.0", h.url("/Foo.dll"));

    let err = h.controller.install(foo.clone()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert!(files_under(&h.plugins()).is_empty());
    assert!(!h.controller.observe(&foo).await.is_installed());
}

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;

use crate::core::downloader::Downloader;
use crate::core::error::ModManagerResult;
use crate::core::http::build_http_client;
use crate::core::loader::BepInExInstaller;
use crate::core::manifest::{FileManifestSource, HttpManifestSource, ManifestSource};
use crate::core::mods::{LifecycleController, ModRegistry};

/// Where the manifest is read from for this session.
#[derive(Debug, Clone)]
pub enum ManifestLocation {
    Url(String),
    File(PathBuf),
}

/// Session settings resolved before the engine starts.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub game_root: PathBuf,
    pub manifest: ManifestLocation,
    /// Overrides `<cwd>/downloads` when set.
    pub staging_dir: Option<PathBuf>,
}

/// Everything a presentation layer needs to drive the engine.
pub struct AppState {
    pub game_root: PathBuf,
    pub http_client: Client,
    pub downloader: Downloader,
    pub registry: Arc<ModRegistry>,
    pub controller: Arc<LifecycleController>,
    manifest_source: Box<dyn ManifestSource>,
}

impl AppState {
    pub fn new(options: SessionOptions) -> ModManagerResult<Self> {
        let http_client = build_http_client()?;

        let downloader = match options.staging_dir {
            Some(dir) => Downloader::new(http_client.clone(), dir),
            None => Downloader::with_default_staging(http_client.clone())?,
        };

        let manifest_source: Box<dyn ManifestSource> = match options.manifest {
            ManifestLocation::Url(url) => Box::new(HttpManifestSource::new(http_client.clone(), url)),
            ManifestLocation::File(path) => Box::new(FileManifestSource::new(path)),
        };

        let controller = Arc::new(LifecycleController::new(
            options.game_root.clone(),
            downloader.clone(),
        ));

        Ok(Self {
            game_root: options.game_root,
            http_client,
            downloader,
            registry: Arc::new(ModRegistry::new()),
            controller,
            manifest_source,
        })
    }

    pub fn manifest_source(&self) -> &dyn ManifestSource {
        self.manifest_source.as_ref()
    }

    pub fn loader_installer(&self) -> BepInExInstaller {
        BepInExInstaller::new(self.downloader.clone())
    }
}

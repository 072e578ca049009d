use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::archive;
use crate::core::downloader::Downloader;
use crate::core::error::{ModManagerError, ModManagerResult};

pub const BEPINEX_ARCHIVE_URL: &str =
    "https://github.com/BepInEx/BepInEx/releases/download/v5.4.23.3/BepInEx_win_x64_5.4.23.3.zip";

pub const BEPINEX_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/arielthemonke/ModInfo/main/BepInEx.cfg";

const BEPINEX_DIR: &str = "BepInEx";

/// Where the loader archive and its config come from.
#[derive(Debug, Clone)]
pub struct LoaderSource {
    pub archive_url: String,
    pub config_url: String,
}

impl Default for LoaderSource {
    fn default() -> Self {
        Self {
            archive_url: BEPINEX_ARCHIVE_URL.to_string(),
            config_url: BEPINEX_CONFIG_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoaderStatus {
    AlreadyInstalled,
    Installed,
    /// Loader files are in place but the config could not be fetched.
    InstalledWithoutConfig { reason: String },
}

pub fn loader_dir(game_root: &Path) -> PathBuf {
    game_root.join(BEPINEX_DIR)
}

pub fn config_path(game_root: &Path) -> PathBuf {
    loader_dir(game_root).join("config").join("BepInEx.cfg")
}

/// One-time loader bootstrap for a game root.
pub struct BepInExInstaller {
    downloader: Downloader,
    source: LoaderSource,
}

impl BepInExInstaller {
    pub fn new(downloader: Downloader) -> Self {
        Self::with_source(downloader, LoaderSource::default())
    }

    pub fn with_source(downloader: Downloader, source: LoaderSource) -> Self {
        Self { downloader, source }
    }

    /// Install the loader unless `<game_root>/BepInEx` already exists.
    pub async fn ensure(&self, game_root: &Path) -> ModManagerResult<LoaderStatus> {
        if loader_dir(game_root).is_dir() {
            info!("BepInEx already installed in {:?}", game_root);
            return Ok(LoaderStatus::AlreadyInstalled);
        }

        info!("BepInEx not found, downloading...");
        let temp_zip = std::env::temp_dir().join(format!("BepInEx_{}.zip", Uuid::new_v4()));
        self.downloader
            .download_file(&self.source.archive_url, &temp_zip)
            .await?;

        info!("Extracting BepInEx into {:?}", game_root);
        let extracted = {
            let zip = temp_zip.clone();
            let root = game_root.to_path_buf();
            tokio::task::spawn_blocking(move || archive::extract_zip(&zip, &root)).await
        };
        if let Err(e) = tokio::fs::remove_file(&temp_zip).await {
            warn!("Could not remove {:?}: {}", temp_zip, e);
        }
        let written = extracted??;
        info!("Extracted {} loader files", written.len());

        match self.write_config(game_root).await {
            Ok(()) => Ok(LoaderStatus::Installed),
            Err(e) => {
                warn!("BepInEx config could not be applied: {}", e);
                Ok(LoaderStatus::InstalledWithoutConfig {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Replace the loader config with the published one.
    pub async fn write_config(&self, game_root: &Path) -> ModManagerResult<()> {
        let content = self.downloader.download_text(&self.source.config_url).await?;
        let path = config_path(game_root);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ModManagerError::install(parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ModManagerError::install(&path, e))
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{ModManagerError, ModManagerResult};

const APP_DIR_NAME: &str = "MonkeModManager";
const CONFIG_FILE: &str = "config.json";

/// Persisted user configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "gamePath", default)]
    pub game_path: Option<String>,
}

impl AppConfig {
    /// The configured game root, if it names an existing directory.
    pub fn game_root(&self) -> Option<PathBuf> {
        let raw = self.game_path.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let path = PathBuf::from(raw);
        path.is_dir().then_some(path)
    }
}

/// `<config dir>/MonkeModManager/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE)
}

/// Reads and writes the config file at a fixed location.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(default_config_path())
    }
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config; a missing or unreadable file yields the default.
    pub fn load(&self) -> AppConfig {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return AppConfig::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Error reading the config at {:?}: {}", self.path, e);
                AppConfig::default()
            }
        }
    }

    /// Persist `game_root` as the configured game path.
    pub fn save_game_path(&self, game_root: &Path) -> ModManagerResult<AppConfig> {
        if !game_root.is_dir() {
            return Err(ModManagerError::Config(format!(
                "game path {game_root:?} is not a directory"
            )));
        }

        let config = AppConfig {
            game_path: Some(game_root.to_string_lossy().to_string()),
        };
        let json = serde_json::to_string_pretty(&config)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ModManagerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.path, json).map_err(|source| ModManagerError::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(config)
    }
}

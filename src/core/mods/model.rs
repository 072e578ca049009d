use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{ModManagerError, ModManagerResult};

/// Relative directory under the game root used when a mod names none.
pub const DEFAULT_INSTALL_LOCATION: &str = "BepInEx/plugins";

/// Native binary-plugin extension recognised by the loader.
pub const PLUGIN_EXTENSION: &str = "dll";

/// Container format that is unpacked instead of moved.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Immutable description of one installable mod, as read from the manifest.
///
/// Identity is `name`. `dependencies` and `source_repo_path` are carried as
/// metadata only; nothing installs or resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModDescriptor {
    pub name: String,
    pub version: String,
    pub author: Option<String>,
    pub group: Option<String>,
    pub dependencies: Vec<String>,
    pub install_location: Option<String>,
    pub download_url: String,
    pub source_repo_path: Option<String>,
}

impl ModDescriptor {
    /// Minimal descriptor with every optional field empty.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        download_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            author: None,
            group: None,
            dependencies: Vec::new(),
            install_location: None,
            download_url: download_url.into(),
            source_repo_path: None,
        }
    }

    /// `"<name> v<version>"`
    pub fn display_name(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    /// `"by <author>"`, or empty when the manifest names no author.
    pub fn author_info(&self) -> String {
        match self.author.as_deref() {
            Some(author) if !author.is_empty() => format!("by {author}"),
            _ => String::new(),
        }
    }

    pub fn install_location(&self) -> &str {
        match self.install_location.as_deref() {
            Some(location) if !location.trim().is_empty() => location,
            _ => DEFAULT_INSTALL_LOCATION,
        }
    }

    /// Final path segment of `download_url`, percent-decoded.
    ///
    /// `None` when the URL has no usable segment, or when decoding yields a
    /// name containing a path separator.
    pub fn url_file_name(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.download_url).ok()?;
        let segment = parsed.path_segments()?.next_back()?;
        let decoded = urlencoding::decode(segment).ok()?;
        if decoded.is_empty() || decoded.contains(|c: char| c == '/' || c == '\\') {
            None
        } else {
            Some(decoded.into_owned())
        }
    }

    /// Name the artifact is staged, placed and detected under.
    ///
    /// Falls back to `<name>.dll` when the URL yields no file name.
    pub fn expected_file_name(&self) -> String {
        self.url_file_name()
            .unwrap_or_else(|| self.fallback_file_name())
    }

    /// `<name>.dll`, the name uninstall probes for first.
    pub fn fallback_file_name(&self) -> String {
        format!("{}.{}", self.name, PLUGIN_EXTENSION)
    }

    pub fn target(&self, game_root: &Path) -> ModManagerResult<InstallTarget> {
        InstallTarget::resolve(self, game_root)
    }
}

/// Derived placement target: absolute directory plus expected artifact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub directory: PathBuf,
    pub file_name: String,
}

impl InstallTarget {
    pub fn resolve(descriptor: &ModDescriptor, game_root: &Path) -> ModManagerResult<Self> {
        let location = descriptor.install_location();
        let relative = Path::new(location);

        let escapes_root = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes_root {
            return Err(ModManagerError::InvalidInstallLocation(location.to_string()));
        }

        Ok(Self {
            directory: game_root.join(relative),
            file_name: descriptor.expected_file_name(),
        })
    }

    /// Whether the artifact is unpacked rather than moved into place.
    pub fn is_archive(&self) -> bool {
        has_extension(&self.file_name, ARCHIVE_EXTENSION)
    }
}

/// Observed install state of one mod, recomputed from the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstalledState {
    NotInstalled,
    Installed {
        /// File whose name matched the expected artifact.
        evidence: PathBuf,
    },
}

impl InstalledState {
    pub fn is_installed(&self) -> bool {
        matches!(self, InstalledState::Installed { .. })
    }
}

/// What a presentation layer shows for a mod, including in-flight transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModStatus {
    NotInstalled,
    Installed,
    Installing,
    Uninstalling,
}

impl std::fmt::Display for ModStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModStatus::NotInstalled => write!(f, "Not installed"),
            ModStatus::Installed => write!(f, "\u{2713} Installed"),
            ModStatus::Installing => write!(f, "Installing..."),
            ModStatus::Uninstalling => write!(f, "Uninstalling..."),
        }
    }
}

impl From<&InstalledState> for ModStatus {
    fn from(state: &InstalledState) -> Self {
        if state.is_installed() {
            ModStatus::Installed
        } else {
            ModStatus::NotInstalled
        }
    }
}

/// Case-insensitive extension check on a bare file name.
pub fn has_extension(file_name: &str, extension: &str) -> bool {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::model::{has_extension, InstalledState, ModDescriptor, PLUGIN_EXTENSION};

/// Decide whether `descriptor` is installed under `install_root`.
///
/// Scans every `.dll` below the root for a case-insensitive match on the
/// expected artifact name. A missing root, or any read error during the
/// walk, yields `NotInstalled`.
pub fn detect(descriptor: &ModDescriptor, install_root: &Path) -> InstalledState {
    let expected = descriptor.expected_file_name();
    if !install_root.is_dir() {
        return InstalledState::NotInstalled;
    }

    for entry in WalkDir::new(install_root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Scan of {:?} failed, treating as not installed: {}", install_root, e);
                return InstalledState::NotInstalled;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = {
            let file_name = entry.file_name().to_string_lossy();
            has_extension(&file_name, PLUGIN_EXTENSION) && file_name.eq_ignore_ascii_case(&expected)
        };
        if matches {
            return InstalledState::Installed {
                evidence: entry.into_path(),
            };
        }
    }

    InstalledState::NotInstalled
}

pub fn is_installed(descriptor: &ModDescriptor, install_root: &Path) -> bool {
    detect(descriptor, install_root).is_installed()
}

/// Detector with a per-mod result cache.
///
/// The filesystem stays the source of truth: entries are dropped whenever a
/// transition touches the mod, and `clear` forces a full rescan.
#[derive(Debug, Default)]
pub struct InstallStateDetector {
    cache: Mutex<HashMap<String, (PathBuf, InstalledState)>>,
}

impl InstallStateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached state when available for the same root, otherwise a fresh scan.
    pub async fn detect(&self, descriptor: &ModDescriptor, install_root: &Path) -> InstalledState {
        if let Some(state) = self.cached(&descriptor.name, install_root) {
            return state;
        }
        let state = self.rescan(descriptor, install_root).await;
        self.store(&descriptor.name, install_root, state.clone());
        state
    }

    /// Always scan the filesystem, bypassing and refreshing the cache.
    pub async fn rescan(&self, descriptor: &ModDescriptor, install_root: &Path) -> InstalledState {
        let owned = descriptor.clone();
        let root = install_root.to_path_buf();
        let state = match tokio::task::spawn_blocking(move || detect(&owned, &root)).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Install-state scan for {} did not finish: {}", descriptor.name, e);
                InstalledState::NotInstalled
            }
        };
        self.store(&descriptor.name, install_root, state.clone());
        state
    }

    pub fn invalidate(&self, mod_name: &str) {
        self.lock().remove(mod_name);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn cached(&self, mod_name: &str, install_root: &Path) -> Option<InstalledState> {
        self.lock()
            .get(mod_name)
            .filter(|(root, _)| root == install_root)
            .map(|(_, state)| state.clone())
    }

    fn store(&self, mod_name: &str, install_root: &Path, state: InstalledState) {
        self.lock()
            .insert(mod_name.to_string(), (install_root.to_path_buf(), state));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (PathBuf, InstalledState)>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn foo() -> ModDescriptor {
        ModDescriptor::new("Foo", "1.0", "https://x/Foo.dll")
    }

    #[test]
    fn missing_root_is_not_installed() {
        let game = tempfile::tempdir().unwrap();
        assert!(!is_installed(&foo(), &game.path().join("BepInEx/plugins")));
    }

    #[test]
    fn empty_root_is_not_installed() {
        let plugins = tempfile::tempdir().unwrap();
        assert_eq!(detect(&foo(), plugins.path()), InstalledState::NotInstalled);
    }

    #[test]
    fn nested_match_ignores_case() {
        let plugins = tempfile::tempdir().unwrap();
        let nested = plugins.path().join("Foo/bin");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("FOO.DLL"), b"x").unwrap();

        assert_eq!(
            detect(&foo(), plugins.path()),
            InstalledState::Installed {
                evidence: nested.join("FOO.DLL")
            }
        );
    }

    #[test]
    fn only_plugin_binaries_count() {
        let plugins = tempfile::tempdir().unwrap();
        fs::write(plugins.path().join("Foo.zip"), b"x").unwrap();
        let zipped = ModDescriptor::new("Foo", "1.0", "https://x/Foo.zip");
        assert!(!is_installed(&zipped, plugins.path()));
    }

    #[test]
    fn url_without_file_name_matches_fallback_name() {
        let plugins = tempfile::tempdir().unwrap();
        fs::write(plugins.path().join("Foo.dll"), b"x").unwrap();
        let m = ModDescriptor::new("Foo", "1.0", "https://x/");
        assert!(is_installed(&m, plugins.path()));
    }

    #[tokio::test]
    async fn cache_is_refreshed_after_invalidate() {
        let plugins = tempfile::tempdir().unwrap();
        let detector = InstallStateDetector::new();

        assert!(!detector.detect(&foo(), plugins.path()).await.is_installed());
        fs::write(plugins.path().join("Foo.dll"), b"x").unwrap();
        assert!(
            !detector.detect(&foo(), plugins.path()).await.is_installed(),
            "cached answer until invalidated"
        );

        detector.invalidate("Foo");
        assert!(detector.detect(&foo(), plugins.path()).await.is_installed());
    }
}

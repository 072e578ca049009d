use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, OwnedMutexGuard};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::detector::InstallStateDetector;
use super::model::{has_extension, InstalledState, ModDescriptor, ModStatus, PLUGIN_EXTENSION};
use crate::core::archive::{self, Placement};
use crate::core::downloader::Downloader;
use crate::core::error::{ModManagerError, ModManagerResult};

/// Parallel scans when reporting status for a whole manifest.
const STATUS_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Install,
    Uninstall,
}

/// Progress notifications for presentation layers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Started {
        mod_name: String,
        transition: Transition,
    },
    Finished {
        mod_name: String,
        transition: Transition,
        /// Observed status afterwards, or the error text.
        result: Result<ModStatus, String>,
    },
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub mod_name: String,
    pub version: String,
    pub target_dir: PathBuf,
    pub placement: Placement,
    /// Fresh detector verdict taken after placement.
    pub state: InstalledState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed { files: Vec<PathBuf> },
    /// No matching artifact existed; not a failure.
    NothingToUninstall,
}

#[derive(Debug, Clone)]
pub struct UninstallReport {
    pub mod_name: String,
    pub outcome: UninstallOutcome,
    pub state: InstalledState,
}

/// Drives install and uninstall transitions for mods under one game root.
///
/// Transitions on the same mod name are serialised; different mods proceed
/// concurrently. Descriptors are taken by value so a registry sync during a
/// transition cannot change what is being installed.
pub struct LifecycleController {
    game_root: PathBuf,
    downloader: Downloader,
    detector: InstallStateDetector,
    mod_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    in_flight: Mutex<HashMap<String, Transition>>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleController {
    pub fn new(game_root: PathBuf, downloader: Downloader) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            game_root,
            downloader,
            detector: InstallStateDetector::new(),
            mod_locks: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn game_root(&self) -> &Path {
        &self.game_root
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    // ── Observation ─────────────────────────────────────

    /// Installed state as found on disk (possibly served from cache).
    pub async fn observe(&self, descriptor: &ModDescriptor) -> InstalledState {
        match descriptor.target(&self.game_root) {
            Ok(target) => self.detector.detect(descriptor, &target.directory).await,
            Err(e) => {
                warn!("Cannot resolve target for {}: {}", descriptor.name, e);
                InstalledState::NotInstalled
            }
        }
    }

    /// Status for display, including a transition currently running.
    pub async fn status(&self, descriptor: &ModDescriptor) -> ModStatus {
        match self.in_flight_transition(&descriptor.name) {
            Some(Transition::Install) => ModStatus::Installing,
            Some(Transition::Uninstall) => ModStatus::Uninstalling,
            None => ModStatus::from(&self.observe(descriptor).await),
        }
    }

    /// Status of every descriptor, in input order.
    pub async fn status_all(&self, descriptors: &[ModDescriptor]) -> Vec<ModStatus> {
        stream::iter(descriptors)
            .map(|descriptor| self.status(descriptor))
            .buffered(STATUS_CONCURRENCY)
            .collect::<Vec<_>>()
            .await
    }

    /// Forget cached detector answers so the next query rescans.
    pub fn refresh(&self) {
        self.detector.clear();
    }

    // ── Install ─────────────────────────────────────────

    pub async fn install(&self, descriptor: ModDescriptor) -> ModManagerResult<InstallReport> {
        let _guard = self.lock_mod(&descriptor.name).await;
        self.begin(&descriptor.name, Transition::Install);

        let result = self.run_install(&descriptor).await;

        let outcome = result
            .as_ref()
            .map(|report| ModStatus::from(&report.state))
            .map_err(|e| e.to_string());
        self.finish(&descriptor.name, Transition::Install, outcome);
        result
    }

    async fn run_install(&self, descriptor: &ModDescriptor) -> ModManagerResult<InstallReport> {
        let target = descriptor.target(&self.game_root)?;
        tokio::fs::create_dir_all(&target.directory)
            .await
            .map_err(|e| ModManagerError::install(&target.directory, e))?;

        info!("Installing {} into {:?}", descriptor.display_name(), target.directory);

        let staged = self
            .downloader
            .fetch(&descriptor.download_url, &target.file_name)
            .await?;
        let placement = archive::place(staged.path(), &target.directory).await;
        staged.discard().await;

        self.detector.invalidate(&descriptor.name);
        let placement = placement?;

        let state = self.detector.rescan(descriptor, &target.directory).await;
        if !state.is_installed() {
            warn!(
                "{} was placed but no {} named {} was found afterwards",
                descriptor.name, PLUGIN_EXTENSION, target.file_name
            );
        }

        info!("Installed {}", descriptor.display_name());
        Ok(InstallReport {
            mod_name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            target_dir: target.directory,
            placement,
            state,
        })
    }

    // ── Uninstall ───────────────────────────────────────

    pub async fn uninstall(&self, descriptor: ModDescriptor) -> ModManagerResult<UninstallReport> {
        let _guard = self.lock_mod(&descriptor.name).await;
        self.begin(&descriptor.name, Transition::Uninstall);

        let result = self.run_uninstall(&descriptor).await;

        let outcome = result
            .as_ref()
            .map(|report| ModStatus::from(&report.state))
            .map_err(|e| e.to_string());
        self.finish(&descriptor.name, Transition::Uninstall, outcome);
        result
    }

    async fn run_uninstall(&self, descriptor: &ModDescriptor) -> ModManagerResult<UninstallReport> {
        let target = descriptor.target(&self.game_root)?;

        let removed = if target.directory.is_dir() {
            let owned = descriptor.clone();
            let dir = target.directory.clone();
            let removed = tokio::task::spawn_blocking(move || remove_artifacts(&owned, &dir)).await;
            self.detector.invalidate(&descriptor.name);
            removed??
        } else {
            Vec::new()
        };

        let state = self.detector.rescan(descriptor, &target.directory).await;

        let outcome = if removed.is_empty() {
            info!("Nothing to uninstall for {}", descriptor.name);
            UninstallOutcome::NothingToUninstall
        } else {
            info!("Uninstalled {} ({} files)", descriptor.name, removed.len());
            UninstallOutcome::Removed { files: removed }
        };

        Ok(UninstallReport {
            mod_name: descriptor.name.clone(),
            outcome,
            state,
        })
    }

    // ── Bookkeeping ─────────────────────────────────────

    async fn lock_mod(&self, mod_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .mod_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(mod_name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn in_flight_transition(&self, mod_name: &str) -> Option<Transition> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(mod_name)
            .copied()
    }

    fn begin(&self, mod_name: &str, transition: Transition) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(mod_name.to_string(), transition);
        let _ = self.events.send(LifecycleEvent::Started {
            mod_name: mod_name.to_string(),
            transition,
        });
    }

    fn finish(&self, mod_name: &str, transition: Transition, result: Result<ModStatus, String>) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(mod_name);
        let _ = self.events.send(LifecycleEvent::Finished {
            mod_name: mod_name.to_string(),
            transition,
            result,
        });
    }
}

/// Delete every artifact belonging to `descriptor` under `dir`.
///
/// Probes `<name>.dll` directly, then walks the tree for plugin binaries whose
/// stem equals the mod name or whose file name equals the expected artifact
/// name, both case-insensitively. Every match is removed so the detector can
/// no longer find the mod afterwards.
fn remove_artifacts(descriptor: &ModDescriptor, dir: &Path) -> ModManagerResult<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let direct = dir.join(descriptor.fallback_file_name());
    if direct.is_file() {
        std::fs::remove_file(&direct).map_err(|e| ModManagerError::install(&direct, e))?;
        removed.push(direct);
    }

    let expected = descriptor.expected_file_name();
    let mut matches = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ModManagerError::install(path, std::io::Error::from(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();
        if !has_extension(&file_name, PLUGIN_EXTENSION) {
            continue;
        }
        let stem_matches = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().eq_ignore_ascii_case(&descriptor.name))
            .unwrap_or(false);
        if stem_matches || file_name.eq_ignore_ascii_case(&expected) {
            matches.push(path.to_path_buf());
        }
    }

    for path in matches {
        std::fs::remove_file(&path).map_err(|e| ModManagerError::install(&path, e))?;
        removed.push(path);
    }

    Ok(removed)
}

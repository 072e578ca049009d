use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::model::ModDescriptor;
use crate::core::error::ModManagerResult;
use crate::core::manifest::{parse_manifest, ManifestSource};

/// One complete, immutable view of the manifest.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    mods: Vec<ModDescriptor>,
    /// Name -> index of the last descriptor carrying that name.
    by_name: HashMap<String, usize>,
    synced_at: Option<DateTime<Utc>>,
}

impl RegistrySnapshot {
    fn new(mods: Vec<ModDescriptor>) -> Self {
        let by_name = mods
            .iter()
            .enumerate()
            .map(|(index, m)| (m.name.clone(), index))
            .collect();
        Self {
            mods,
            by_name,
            synced_at: Some(Utc::now()),
        }
    }

    /// Descriptors in manifest order.
    pub fn mods(&self) -> &[ModDescriptor] {
        &self.mods
    }

    pub fn get(&self, name: &str) -> Option<&ModDescriptor> {
        self.by_name.get(name).map(|&index| &self.mods[index])
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }
}

/// In-memory catalog of available mods for the session.
///
/// A sync replaces the whole set in one swap; readers hold an `Arc` to the
/// snapshot they started with and never see a half-built set.
#[derive(Debug, Default)]
pub struct ModRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch and parse the manifest, then replace the current set.
    ///
    /// On failure the previous set is left untouched and the error returned.
    pub async fn sync(&self, source: &dyn ManifestSource) -> ModManagerResult<Vec<ModDescriptor>> {
        let payload = source.fetch_payload().await.map_err(|e| {
            debug!("Manifest fetch from {} failed: {}", source.describe(), e);
            e
        })?;
        let mods = parse_manifest(&payload)?;

        self.replace(mods.clone());
        info!("Loaded {} mods from {}", mods.len(), source.describe());
        Ok(mods)
    }

    /// Swap in a new descriptor set.
    pub fn replace(&self, mods: Vec<ModDescriptor>) {
        let snapshot = Arc::new(RegistrySnapshot::new(mods));
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = snapshot;
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Copy of the descriptor named `name`, detached from later syncs.
    pub fn get(&self, name: &str) -> Option<ModDescriptor> {
        self.snapshot().get(name).cloned()
    }
}

// ─── Manifest wire format ───
// A JSON array of mod objects. Every field is optional on the wire; absent
// or null values become empty defaults instead of parse errors, and numeric
// or boolean values in text fields are read as their JSON text.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::core::error::{ModManagerError, ModManagerResult};
use crate::core::mods::ModDescriptor;

/// A single entry of the remote manifest, exactly as published.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestEntry {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub name: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub author: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub install_location: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub git_path: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub group: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub download_url: String,
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(D::Error::custom(format!("expected text, found {other}"))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl From<ManifestEntry> for ModDescriptor {
    fn from(entry: ManifestEntry) -> Self {
        ModDescriptor {
            name: entry.name,
            version: entry.version,
            author: non_empty(entry.author),
            group: non_empty(entry.group),
            dependencies: entry.dependencies,
            install_location: non_empty(entry.install_location),
            download_url: entry.download_url,
            source_repo_path: non_empty(entry.git_path),
        }
    }
}

/// Parse a manifest payload into descriptors, preserving manifest order.
pub fn parse_manifest(payload: &str) -> ModManagerResult<Vec<ModDescriptor>> {
    let entries: Option<Vec<ManifestEntry>> = serde_json::from_str(payload)
        .map_err(|e| ModManagerError::Format(format!("manifest is not a list of mods: {e}")))?;

    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(ModDescriptor::from)
        .collect())
}

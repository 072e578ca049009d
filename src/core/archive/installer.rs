use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{ModManagerError, ModManagerResult};
use crate::core::mods::model::{has_extension, ARCHIVE_EXTENSION};

/// What ended up in the target directory after a placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A single file moved into place.
    File(PathBuf),
    /// Files written out of an archive, in archive order.
    Extracted(Vec<PathBuf>),
}

impl Placement {
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Placement::File(path) => std::slice::from_ref(path),
            Placement::Extracted(paths) => paths,
        }
    }
}

/// Place a staged artifact into `target_dir`.
///
/// Archives are unpacked (then the staged archive is deleted); anything else
/// is moved in under its own name. Runs on the blocking pool.
pub async fn place(staged: &Path, target_dir: &Path) -> ModManagerResult<Placement> {
    let staged = staged.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    tokio::task::spawn_blocking(move || place_blocking(&staged, &target_dir)).await?
}

pub fn place_blocking(staged: &Path, target_dir: &Path) -> ModManagerResult<Placement> {
    let file_name = staged
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ModManagerError::Other(format!("Staged path has no file name: {staged:?}")))?;

    fs::create_dir_all(target_dir).map_err(|e| ModManagerError::install(target_dir, e))?;

    if has_extension(&file_name, ARCHIVE_EXTENSION) {
        let written = extract_zip(staged, target_dir)?;
        fs::remove_file(staged).map_err(|e| ModManagerError::install(staged, e))?;
        Ok(Placement::Extracted(written))
    } else {
        let dest = target_dir.join(&file_name);
        move_replacing(staged, &dest)?;
        Ok(Placement::File(dest))
    }
}

/// Extract every file entry of `zip_path` under `target_dir`.
///
/// Entry paths are kept relative, intermediate directories are created and
/// existing files are overwritten. Directory entries are skipped. A failure
/// midway leaves already written entries in place.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> ModManagerResult<Vec<PathBuf>> {
    let zip_file = fs::File::open(zip_path).map_err(|e| ModManagerError::install(zip_path, e))?;
    let mut archive = zip::ZipArchive::new(zip_file)?;
    let mut written = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ModManagerError::InvalidArchiveEntry(entry.name().to_string()))?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let out_path = target_dir.join(relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ModManagerError::install(parent, e))?;
        }

        let mut out = fs::File::create(&out_path).map_err(|e| ModManagerError::install(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| ModManagerError::install(&out_path, e))?;

        debug!("Extracted {} -> {:?}", entry.name(), out_path);
        written.push(out_path);
    }

    Ok(written)
}

/// Move `from` to `to`, deleting whatever sits at `to` first.
/// Falls back to copy + delete when a rename crosses filesystems.
fn move_replacing(from: &Path, to: &Path) -> ModManagerResult<()> {
    if to.is_file() {
        fs::remove_file(to).map_err(|e| ModManagerError::install(to, e))?;
    }

    if let Err(rename_err) = fs::rename(from, to) {
        warn!(
            "Rename {:?} -> {:?} failed ({}), copying instead",
            from, to, rename_err
        );
        fs::copy(from, to).map_err(|e| ModManagerError::install(to, e))?;
        fs::remove_file(from).map_err(|e| ModManagerError::install(from, e))?;
    }

    debug!("Moved {:?} -> {:?}", from, to);
    Ok(())
}

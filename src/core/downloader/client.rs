use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{ModManagerError, ModManagerResult};

/// Staging folder created under the working directory.
pub const STAGING_DIR_NAME: &str = "downloads";

/// A fetched artifact, alone in its own folder under the staging directory.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    dir: PathBuf,
    path: PathBuf,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove the per-fetch folder and whatever placement left in it.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Could not clean staging folder {:?}: {}", self.dir, e);
            }
        }
    }
}

/// Fetches artifacts into a staging directory.
///
/// Bodies are buffered in memory and written in one go, so a failed
/// transfer never leaves a partial file behind.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    staging_dir: PathBuf,
}

impl Downloader {
    pub fn new(client: Client, staging_dir: PathBuf) -> Self {
        Self {
            client,
            staging_dir,
        }
    }

    /// Downloader staging into `<cwd>/downloads`.
    pub fn with_default_staging(client: Client) -> ModManagerResult<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::new(client, cwd.join(STAGING_DIR_NAME)))
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // ── Staged fetch ────────────────────────────────────

    /// Download `url` as `file_name` into a fresh `<staging>/<uuid>/` folder.
    ///
    /// Concurrent fetches of artifacts sharing a file name never touch the
    /// same path.
    pub async fn fetch(&self, url: &str, file_name: &str) -> ModManagerResult<StagedArtifact> {
        let dir = self.staging_dir.join(Uuid::new_v4().to_string());
        let path = dir.join(file_name);

        if let Err(e) = self.download_file(url, &path).await {
            tokio::fs::remove_dir_all(&dir).await.ok();
            return Err(e);
        }
        Ok(StagedArtifact { dir, path })
    }

    // ── Single file download ────────────────────────────

    /// Download a single file to `dest`, creating parent directories as needed.
    pub async fn download_file(&self, url: &str, dest: &Path) -> ModManagerResult<()> {
        let bytes = self.download_bytes(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ModManagerError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        // Scoped so the handle is closed before the file is moved elsewhere
        {
            let mut file =
                tokio::fs::File::create(dest)
                    .await
                    .map_err(|source| ModManagerError::Io {
                        path: dest.to_path_buf(),
                        source,
                    })?;
            file.write_all(&bytes)
                .await
                .map_err(|source| ModManagerError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;
            file.flush().await.map_err(|source| ModManagerError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, bytes.len());
        Ok(())
    }

    /// GET `url` and return the full body.
    pub async fn download_bytes(&self, url: &str) -> ModManagerResult<Vec<u8>> {
        let parsed = url::Url::parse(url).map_err(|e| ModManagerError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self.client.get(parsed).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModManagerError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// GET `url` and return the body as text.
    pub async fn download_text(&self, url: &str) -> ModManagerResult<String> {
        let bytes = self.download_bytes(url).await?;
        String::from_utf8(bytes)
            .map_err(|e| ModManagerError::Other(format!("{url} returned non UTF-8 text: {e}")))
    }
}

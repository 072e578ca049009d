use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::core::error::{ModManagerError, ModManagerResult};

/// Published mod catalog.
pub const MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/The-Graze/MonkeModInfo/master/modinfo.json";

/// Where a manifest payload comes from.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Raw manifest text. Transport failures map to fetch errors.
    async fn fetch_payload(&self) -> ModManagerResult<String>;

    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;
}

/// Manifest served over plain HTTPS GET.
pub struct HttpManifestSource {
    client: Client,
    url: String,
}

impl HttpManifestSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn official(client: Client) -> Self {
        Self::new(client, MANIFEST_URL)
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch_payload(&self) -> ModManagerResult<String> {
        info!("Fetching mod manifest from {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModManagerError::DownloadFailed {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Manifest read from a local JSON file.
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ManifestSource for FileManifestSource {
    async fn fetch_payload(&self) -> ModManagerResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ModManagerError::ManifestUnavailable {
                path: self.path.clone(),
                source,
            })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn http_source_returns_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/modinfo.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let source = HttpManifestSource::new(Client::new(), format!("{}/modinfo.json", server.uri()));
        assert_eq!(source.fetch_payload().await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn http_404_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpManifestSource::new(Client::new(), format!("{}/modinfo.json", server.uri()));
        let err = source.fetch_payload().await.unwrap_err();
        assert!(matches!(err, ModManagerError::DownloadFailed { status: 404, .. }));
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn file_source_reads_local_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("modinfo.json");
        tokio::fs::write(&file, r#"[{"name":"Foo"}]"#).await.unwrap();

        let source = FileManifestSource::new(&file);
        assert!(source.fetch_payload().await.unwrap().contains("Foo"));
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileManifestSource::new(dir.path().join("missing.json"));

        let err = source.fetch_payload().await.unwrap_err();
        assert!(matches!(err, ModManagerError::ManifestUnavailable { .. }));
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }
}

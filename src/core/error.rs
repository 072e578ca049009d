use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the mod manager backend.
/// Every module returns `Result<T, ModManagerError>`.
#[derive(Debug, Error)]
pub enum ModManagerError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // ── Manifest ────────────────────────────────────────
    #[error("Manifest unavailable at {path:?}: {source}")]
    ManifestUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest format error: {0}")]
    Format(String),

    // ── Placement ───────────────────────────────────────
    #[error("Install failed at {path:?}: {source}")]
    Install {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive entry escapes the target directory: {0}")]
    InvalidArchiveEntry(String),

    #[error("Install location must stay under the game root: {0}")]
    InvalidInstallLocation(String),

    // ── Registry ────────────────────────────────────────
    #[error("Mod not found in manifest: {0}")]
    ModNotFound(String),

    // ── Configuration ───────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Generic ─────────────────────────────────────────
    #[error("Background task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type ModManagerResult<T> = Result<T, ModManagerError>;

/// Coarse classification of failures as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or transport failure reaching a URL.
    Fetch,
    /// Manifest payload does not parse into descriptors.
    Format,
    /// Filesystem failure while placing or removing artifacts.
    Install,
    /// A requested mod is not known.
    NotFound,
    Other,
}

impl ModManagerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModManagerError::Http(_)
            | ModManagerError::DownloadFailed { .. }
            | ModManagerError::InvalidUrl { .. }
            | ModManagerError::ManifestUnavailable { .. } => ErrorKind::Fetch,
            ModManagerError::Json(_) | ModManagerError::Format(_) => ErrorKind::Format,
            ModManagerError::Io { .. }
            | ModManagerError::Install { .. }
            | ModManagerError::Zip(_)
            | ModManagerError::InvalidArchiveEntry(_)
            | ModManagerError::InvalidInstallLocation(_) => ErrorKind::Install,
            ModManagerError::ModNotFound(_) => ErrorKind::NotFound,
            ModManagerError::Config(_) | ModManagerError::Task(_) | ModManagerError::Other(_) => {
                ErrorKind::Other
            }
        }
    }

    pub(crate) fn install(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModManagerError::Install {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for ModManagerError {
    fn from(source: std::io::Error) -> Self {
        ModManagerError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for ModManagerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ModManagerError::Task(err.to_string())
    }
}

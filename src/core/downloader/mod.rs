pub mod client;

pub use client::{Downloader, StagedArtifact, STAGING_DIR_NAME};

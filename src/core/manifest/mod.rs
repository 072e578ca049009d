pub mod format;
pub mod source;

pub use format::{parse_manifest, ManifestEntry};
pub use source::{FileManifestSource, HttpManifestSource, ManifestSource, MANIFEST_URL};

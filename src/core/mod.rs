// ─── MonkeModManager Core ───
// Mod lifecycle and reconciliation engine.
//
// Architecture:
//   core/
//     manifest/   — Manifest wire format + HTTP / file sources
//     mods/       — Descriptors, registry, install-state detector, lifecycle controller
//     downloader/ — Buffered artifact fetches into a staging folder
//     archive/    — Zip extraction and file placement
//     loader/     — One-time BepInEx bootstrap
//     state/      — Persisted config + session wiring

pub mod archive;
pub mod downloader;
pub mod error;
pub mod http;
pub mod loader;
pub mod manifest;
pub mod mods;
pub mod state;

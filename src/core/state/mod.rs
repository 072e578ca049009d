pub mod app_state;
pub mod config;

pub use app_state::{AppState, ManifestLocation, SessionOptions};
pub use config::{AppConfig, ConfigStore};

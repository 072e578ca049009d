pub mod bepinex;

pub use bepinex::{BepInExInstaller, LoaderSource, LoaderStatus};

pub mod controller;
pub mod detector;
pub mod model;
pub mod registry;

pub use controller::{
    InstallReport, LifecycleController, LifecycleEvent, Transition, UninstallOutcome,
    UninstallReport,
};
pub use detector::{detect, is_installed, InstallStateDetector};
pub use model::{InstallTarget, InstalledState, ModDescriptor, ModStatus};
pub use registry::{ModRegistry, RegistrySnapshot};

pub mod context;
pub mod fabric;
pub mod forge;
pub mod installer;
pub mod version;

pub use context::InstallContext;
pub use installer::{Installer, LoaderInstallResult, LoaderInstaller};
pub use version::{LoaderType, LoaderVersion};

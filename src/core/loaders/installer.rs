use async_trait::async_trait;
use tracing::info;

use crate::core::config::LoaderEndpoints;
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::pack::{ArgumentBlock, LibraryEntry};

use super::{
    context::InstallContext, fabric::FabricInstaller, forge::ForgeInstaller,
    version::{LoaderType, LoaderVersion},
};

/// What a loader contributes on top of the runtime.
#[derive(Debug, Clone)]
pub struct LoaderInstallResult {
    pub version: LoaderVersion,
    pub main_class: String,
    pub arguments: ArgumentBlock,
    pub libraries: Vec<LibraryEntry>,
    /// Whether the runtime's own arguments and libraries still apply.
    pub uses_runtime_arguments: bool,
}

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    /// Builds published for `runtime_version`, newest first.
    async fn versions(
        &self,
        runtime_version: &str,
        downloader: &Downloader,
    ) -> LauncherResult<Vec<LoaderVersion>>;

    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult>;
}

/// Dispatcher sin Box<dyn>
pub enum Installer {
    Fabric(FabricInstaller),
    Forge(ForgeInstaller),
}

impl Installer {
    pub fn new(family: LoaderType, endpoints: &LoaderEndpoints) -> Self {
        match family {
            LoaderType::Fabric => {
                Self::Fabric(FabricInstaller::new(family, &endpoints.fabric_meta))
            }
            LoaderType::LegacyFabric => {
                Self::Fabric(FabricInstaller::new(family, &endpoints.legacy_fabric_meta))
            }
            LoaderType::Quilt => Self::Fabric(FabricInstaller::new(family, &endpoints.quilt_meta)),
            LoaderType::Forge => Self::Forge(ForgeInstaller::new(family, &endpoints.forge_maven)),
            LoaderType::NeoForge => {
                Self::Forge(ForgeInstaller::new(family, &endpoints.neoforge_maven))
            }
        }
    }

    pub async fn versions(
        &self,
        runtime_version: &str,
        downloader: &Downloader,
    ) -> LauncherResult<Vec<LoaderVersion>> {
        match self {
            Installer::Fabric(i) => i.versions(runtime_version, downloader).await,
            Installer::Forge(i) => i.versions(runtime_version, downloader).await,
        }
    }

    pub async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        match self {
            Installer::Fabric(i) => i.install(ctx).await,
            Installer::Forge(i) => i.install(ctx).await,
        }
    }

    /// Turn `latest` / `recommended` into a concrete build; anything else is
    /// taken literally.
    pub async fn pick_version(
        &self,
        requested: &str,
        runtime_version: &str,
        downloader: &Downloader,
    ) -> LauncherResult<String> {
        let wants_recommended = requested.eq_ignore_ascii_case("recommended");
        if !wants_recommended && !requested.eq_ignore_ascii_case("latest") {
            return Ok(requested.to_string());
        }

        let versions = self.versions(runtime_version, downloader).await?;
        let picked = versions
            .iter()
            .find(|v| wants_recommended && v.recommended)
            .or_else(|| versions.first())
            .ok_or_else(|| {
                LauncherError::LoaderIncompatible(format!(
                    "No loader builds published for {runtime_version}"
                ))
            })?;

        info!("Loader version '{}' resolved to {}", requested, picked);
        Ok(picked.version.clone())
    }
}

/// Remap a missing remote document to a loader-incompatibility error.
pub(crate) fn incompatible(err: LauncherError, what: &str) -> LauncherError {
    match err {
        LauncherError::DownloadFailed { url, status } => LauncherError::LoaderIncompatible(
            format!("{what} unavailable ({status} for {url})"),
        ),
        other => other,
    }
}

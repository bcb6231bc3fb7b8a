use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use super::context::InstallContext;
use super::installer::{incompatible, LoaderInstallResult, LoaderInstaller};
use super::version::{LoaderType, LoaderVersion};
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{MavenArtifact, FABRIC_MAVEN, QUILT_MAVEN};
use crate::core::pack::{Argument, ArgumentBlock, DownloadSpec, LibraryEntry};

/// Launch profile served by the Fabric-style meta APIs.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricProfile {
    pub id: Option<String>,
    #[serde(default)]
    pub inherits_from: Option<String>,
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<FabricLibrary>,
    pub arguments: Option<FabricArguments>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FabricLibrary {
    pub name: String,
    pub url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FabricArguments {
    #[serde(default)]
    pub jvm: Vec<Argument>,
    #[serde(default)]
    pub game: Vec<Argument>,
}

#[derive(Debug, Deserialize)]
struct MetaLoaderListing {
    loader: MetaLoader,
}

#[derive(Debug, Deserialize)]
struct MetaLoader {
    version: String,
    #[serde(default)]
    stable: bool,
}

/// Fabric, Legacy Fabric and Quilt all speak the same meta protocol.
pub struct FabricInstaller {
    family: LoaderType,
    meta_base: String,
}

impl FabricInstaller {
    pub fn new(family: LoaderType, meta_base: &str) -> Self {
        Self {
            family,
            meta_base: meta_base.trim_end_matches('/').to_string(),
        }
    }

    fn default_repository(&self) -> &'static str {
        match self.family {
            LoaderType::Quilt => QUILT_MAVEN,
            _ => FABRIC_MAVEN,
        }
    }

    fn loader_coordinate(&self, loader_version: &str) -> String {
        match self.family {
            LoaderType::Quilt => format!("org.quiltmc:quilt-loader:{}", loader_version),
            _ => format!("net.fabricmc:fabric-loader:{}", loader_version),
        }
    }

    async fn fetch_profile(&self, ctx: &InstallContext<'_>) -> LauncherResult<FabricProfile> {
        let url = format!(
            "{}/versions/loader/{}/{}/{}/json",
            self.meta_base,
            ctx.runtime_version,
            ctx.loader_version,
            if ctx.server { "server" } else { "profile" }
        );

        let raw = ctx
            .downloader
            .fetch_text(&url)
            .await
            .map_err(|e| incompatible(e, &format!("{} profile", self.family)))?;

        let profile: FabricProfile = serde_json::from_str(&raw)?;

        if profile.main_class.is_empty() {
            return Err(LauncherError::LoaderIncompatible(format!(
                "{} profile missing mainClass",
                self.family
            )));
        }

        if let Some(parent) = &profile.inherits_from {
            if !parent.eq_ignore_ascii_case(ctx.runtime_version) {
                return Err(LauncherError::LoaderIncompatible(format!(
                    "{} {} targets {}, pack uses {}",
                    self.family, ctx.loader_version, parent, ctx.runtime_version
                )));
            }
        }

        Ok(profile)
    }

    fn ensure_loader_artifact(libraries: &mut Vec<FabricLibrary>, coordinate: &str) {
        if libraries.iter().any(|lib| lib.name == coordinate) {
            return;
        }
        libraries.push(FabricLibrary {
            name: coordinate.to_string(),
            url: None,
            sha1: None,
            size: None,
        });
    }

    fn to_entries(&self, libraries: &[FabricLibrary]) -> LauncherResult<Vec<LibraryEntry>> {
        libraries
            .iter()
            .map(|lib| {
                let artifact = MavenArtifact::parse(&lib.name)?;
                let repo = lib.url.as_deref().unwrap_or(self.default_repository());
                let path = artifact.relative_path();

                Ok(LibraryEntry::new(&lib.name, path).with_download(DownloadSpec {
                    url: artifact.url(repo),
                    hash: lib.sha1.clone(),
                    size: lib.size.unwrap_or(0),
                }))
            })
            .collect()
    }
}

#[async_trait]
impl LoaderInstaller for FabricInstaller {
    async fn versions(
        &self,
        runtime_version: &str,
        downloader: &Downloader,
    ) -> LauncherResult<Vec<LoaderVersion>> {
        let url = format!("{}/versions/loader/{}", self.meta_base, runtime_version);
        let raw = downloader
            .fetch_text(&url)
            .await
            .map_err(|e| incompatible(e, &format!("{} versions", self.family)))?;
        let listing: Vec<MetaLoaderListing> = serde_json::from_str(&raw)?;

        let mut seen_stable = false;
        Ok(listing
            .into_iter()
            .map(|entry| {
                // First stable build is the recommended one.
                let recommended = entry.loader.stable && !seen_stable;
                seen_stable |= entry.loader.stable;
                LoaderVersion::new(self.family, entry.loader.version).recommended(recommended)
            })
            .collect())
    }

    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        info!(
            "Resolving {} {} for {}",
            self.family, ctx.loader_version, ctx.runtime_version
        );

        // 1️⃣ Fetch profile
        let mut profile = self.fetch_profile(&ctx).await?;

        // 2️⃣ Keep a copy in the scratch area
        fs::create_dir_all(ctx.scratch_dir)
            .await
            .map_err(|e| LauncherError::io(ctx.scratch_dir, e))?;
        let profile_path = ctx.scratch_dir.join(format!(
            "{}-{}-{}.json",
            self.family, ctx.runtime_version, ctx.loader_version
        ));
        let profile_json = serde_json::to_string_pretty(&profile)?;
        fs::write(&profile_path, profile_json)
            .await
            .map_err(|e| LauncherError::io(&profile_path, e))?;

        // 3️⃣ Libraries
        Self::ensure_loader_artifact(
            &mut profile.libraries,
            &self.loader_coordinate(ctx.loader_version),
        );
        let libraries = self.to_entries(&profile.libraries)?;

        // 4️⃣ Arguments
        let arguments = profile
            .arguments
            .map(|args| ArgumentBlock {
                jvm: args.jvm,
                game: args.game,
            })
            .unwrap_or_default();

        info!(
            "{} resolved: {} libraries, main class {}",
            self.family,
            libraries.len(),
            profile.main_class
        );

        Ok(LoaderInstallResult {
            version: LoaderVersion::new(self.family, ctx.loader_version),
            main_class: profile.main_class,
            arguments,
            libraries,
            uses_runtime_arguments: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::downloader::testing::MemoryTransport;

    const META: &str = "https://meta.test/v2";

    fn profile_body(inherits: &str) -> String {
        serde_json::json!({
            "id": "fabric-loader-0.15.11-1.20.1",
            "inheritsFrom": inherits,
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "arguments": { "game": [], "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "] },
            "libraries": [
                { "name": "net.fabricmc:intermediary:1.20.1", "url": "https://maven.fabricmc.net/" }
            ]
        })
        .to_string()
    }

    #[test]
    fn ensure_loader_artifact_keeps_existing_coordinate_unique() {
        let mut libs = vec![FabricLibrary {
            name: "net.fabricmc:fabric-loader:0.16.10".into(),
            url: None,
            sha1: None,
            size: None,
        }];

        FabricInstaller::ensure_loader_artifact(&mut libs, "net.fabricmc:fabric-loader:0.16.10");
        FabricInstaller::ensure_loader_artifact(&mut libs, "net.fabricmc:intermediary:1.21.1");

        assert_eq!(libs.len(), 2);
    }

    #[tokio::test]
    async fn profile_resolves_into_libraries_and_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new().with(
            &format!("{META}/versions/loader/1.20.1/0.15.11/profile/json"),
            profile_body("1.20.1"),
        );
        let downloader = Downloader::new(Arc::new(transport));
        let installer = FabricInstaller::new(LoaderType::Fabric, META);

        let result = installer
            .install(InstallContext {
                runtime_version: "1.20.1",
                loader_version: "0.15.11",
                scratch_dir: dir.path(),
                downloader: &downloader,
                server: false,
            })
            .await
            .unwrap();

        assert_eq!(result.main_class, "net.fabricmc.loader.impl.launch.knot.KnotClient");
        assert!(result.uses_runtime_arguments);
        assert_eq!(result.arguments.jvm.len(), 1);
        assert_eq!(result.libraries.len(), 2);
        assert_eq!(
            result.libraries[1].download.as_ref().unwrap().url,
            "https://maven.fabricmc.net/net/fabricmc/fabric-loader/0.15.11/fabric-loader-0.15.11.jar"
        );
    }

    #[tokio::test]
    async fn runtime_mismatch_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new().with(
            &format!("{META}/versions/loader/1.20.1/0.15.11/profile/json"),
            profile_body("1.19.4"),
        );
        let downloader = Downloader::new(Arc::new(transport));

        let err = FabricInstaller::new(LoaderType::Fabric, META)
            .install(InstallContext {
                runtime_version: "1.20.1",
                loader_version: "0.15.11",
                scratch_dir: dir.path(),
                downloader: &downloader,
                server: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::LoaderIncompatible(_)));
    }

    #[tokio::test]
    async fn missing_profile_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(Arc::new(MemoryTransport::new()));

        let err = FabricInstaller::new(LoaderType::Quilt, META)
            .install(InstallContext {
                runtime_version: "1.20.1",
                loader_version: "0.0.0",
                scratch_dir: dir.path(),
                downloader: &downloader,
                server: true,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::LoaderIncompatible(_)));
    }

    #[tokio::test]
    async fn first_stable_build_is_recommended() {
        let transport = MemoryTransport::new().with(
            &format!("{META}/versions/loader/1.20.1"),
            serde_json::json!([
                { "loader": { "version": "0.16.0-beta.1", "stable": false } },
                { "loader": { "version": "0.15.11", "stable": true } },
                { "loader": { "version": "0.15.10", "stable": true } }
            ])
            .to_string(),
        );
        let downloader = Downloader::new(Arc::new(transport));

        let versions = FabricInstaller::new(LoaderType::Fabric, META)
            .versions("1.20.1", &downloader)
            .await
            .unwrap();

        let recommended: Vec<_> = versions.iter().filter(|v| v.recommended).collect();
        assert_eq!(recommended.len(), 1);
        assert_eq!(recommended[0].version, "0.15.11");
    }
}

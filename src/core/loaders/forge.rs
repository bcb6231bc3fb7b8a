use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::context::InstallContext;
use super::installer::{incompatible, LoaderInstallResult, LoaderInstaller};
use super::version::{LoaderType, LoaderVersion};
use crate::core::downloader::{ContentReference, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{MavenArtifact, MavenMetadata};
use crate::core::pack::{ArgumentBlock, LibraryEntry};
use crate::core::version::version_file::{Arguments, VersionLibrary};

/// Resolves Forge and NeoForge from their official installer jars.
///
/// The installer is downloaded into the scratch area and read in place:
/// `version.json` gives the launch profile, and anything under `maven/`
/// is unpacked so libraries that are only shipped inside the installer
/// can be copied into the libraries directory later. Installer processors
/// are not executed.
pub struct ForgeInstaller {
    family: LoaderType,
    maven_base: String,
}

/// Subset of `install_profile.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeInstallProfile {
    #[serde(default)]
    pub minecraft: Option<String>,
    #[serde(default)]
    pub processors: Vec<serde_json::Value>,
    /// Pre-1.13 installers embed the launch profile here.
    #[serde(default)]
    pub version_info: Option<ForgeVersionJson>,
    #[serde(default)]
    pub install: Option<LegacyInstall>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyInstall {
    /// Coordinate of the universal jar.
    pub path: String,
    /// Entry name of the universal jar inside the installer.
    pub file_path: String,
    #[serde(default)]
    pub minecraft: Option<String>,
}

/// The loader's launch profile (`version.json` inside the installer).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeVersionJson {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub inherits_from: Option<String>,
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<VersionLibrary>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
}

impl ForgeInstaller {
    pub fn new(family: LoaderType, maven_base: &str) -> Self {
        Self {
            family,
            maven_base: maven_base.trim_end_matches('/').to_string(),
        }
    }

    fn metadata_url(&self) -> String {
        match self.family {
            LoaderType::NeoForge => format!(
                "{}/net/neoforged/neoforge/maven-metadata.xml",
                self.maven_base
            ),
            _ => format!(
                "{}/net/minecraftforge/forge/maven-metadata.xml",
                self.maven_base
            ),
        }
    }

    fn installer_coordinate(&self, runtime_version: &str, loader_version: &str) -> String {
        match self.family {
            LoaderType::NeoForge => format!("net.neoforged:neoforge:{}:installer", loader_version),
            _ => {
                let full = if loader_version.starts_with(&format!("{runtime_version}-")) {
                    loader_version.to_string()
                } else {
                    format!("{}-{}", runtime_version, loader_version)
                };
                format!("net.minecraftforge:forge:{}:installer", full)
            }
        }
    }

    /// Map a published maven version to the loader version for `runtime`.
    fn version_for_runtime(&self, published: &str, runtime_version: &str) -> Option<String> {
        match self.family {
            LoaderType::NeoForge => {
                // 1.20.4 → 20.4.x, 1.21 → 21.0.x
                let trimmed = runtime_version.strip_prefix("1.")?;
                let prefix = if trimmed.contains('.') {
                    format!("{trimmed}.")
                } else {
                    format!("{trimmed}.0.")
                };
                published.starts_with(&prefix).then(|| published.to_string())
            }
            _ => published
                .strip_prefix(&format!("{runtime_version}-"))
                .map(str::to_string),
        }
    }

    async fn download_installer(&self, ctx: &InstallContext<'_>) -> LauncherResult<PathBuf> {
        let coordinate =
            MavenArtifact::parse(&self.installer_coordinate(ctx.runtime_version, ctx.loader_version))?;
        let url = coordinate.url(&self.maven_base);
        let dest = ctx.scratch_dir.join(coordinate.filename());

        ctx.downloader
            .fetch_one(&ContentReference::new(&url, &dest))
            .await
            .map_err(|e| incompatible(e, &format!("{} installer", self.family)))?;

        Ok(dest)
    }

    fn check_runtime(&self, declared: Option<&str>, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        match declared {
            Some(runtime) if !runtime.eq_ignore_ascii_case(ctx.runtime_version) => {
                Err(LauncherError::LoaderIncompatible(format!(
                    "{} {} targets {}, pack uses {}",
                    self.family, ctx.loader_version, runtime, ctx.runtime_version
                )))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl LoaderInstaller for ForgeInstaller {
    async fn versions(
        &self,
        runtime_version: &str,
        downloader: &Downloader,
    ) -> LauncherResult<Vec<LoaderVersion>> {
        let xml = downloader
            .fetch_text(&self.metadata_url())
            .await
            .map_err(|e| incompatible(e, &format!("{} version list", self.family)))?;
        let metadata = MavenMetadata::parse(&xml)?;
        let release = metadata.release();

        Ok(metadata
            .versions()
            .iter()
            .rev()
            .filter_map(|published| {
                let version = self.version_for_runtime(published, runtime_version)?;
                Some(
                    LoaderVersion::new(self.family, version)
                        .with_raw_version(published.as_str())
                        .recommended(release == Some(published.as_str())),
                )
            })
            .collect())
    }

    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        info!(
            "Resolving {} {} for {}",
            self.family, ctx.loader_version, ctx.runtime_version
        );

        tokio::fs::create_dir_all(ctx.scratch_dir)
            .await
            .map_err(|e| LauncherError::io(ctx.scratch_dir, e))?;
        let installer_path = self.download_installer(&ctx).await?;

        let bundle_dir = ctx.scratch_dir.join("maven");
        let contents = read_installer(&installer_path, &bundle_dir)?;
        let profile = contents.install_profile.unwrap_or_default();

        let version_json = match (contents.version_json, profile.version_info) {
            (Some(v), _) | (None, Some(v)) => v,
            (None, None) => {
                return Err(LauncherError::LoaderIncompatible(format!(
                    "{} installer has no version.json",
                    self.family
                )))
            }
        };

        self.check_runtime(
            profile
                .minecraft
                .as_deref()
                .or(profile.install.as_ref().and_then(|i| i.minecraft.as_deref()))
                .or(version_json.inherits_from.as_deref()),
            &ctx,
        )?;

        if !profile.processors.is_empty() {
            warn!(
                "{} installer declares {} processors; they are not run",
                self.family,
                profile.processors.len()
            );
        }

        // Legacy installers carry the universal jar outside `maven/`.
        if let Some(install) = &profile.install {
            extract_legacy_universal(&installer_path, install, &bundle_dir)?;
        }

        let mut libraries = Vec::with_capacity(version_json.libraries.len());
        for lib in &version_json.libraries {
            if !lib.is_allowed_for_current_os() {
                continue;
            }
            libraries.push(attach_bundled(lib.to_library_entry()?, &bundle_dir));
        }

        let declared = (&version_json.arguments, &version_json.minecraft_arguments);
        let (arguments, uses_runtime_arguments) = match declared {
            (Some(args), _) => (
                ArgumentBlock {
                    jvm: args.jvm.clone(),
                    game: args.game.clone(),
                },
                true,
            ),
            // Legacy profiles restate the full argument line and library list.
            (None, Some(legacy)) => {
                let mut block = ArgumentBlock::default();
                block.append_game_tokens(legacy);
                (block, false)
            }
            (None, None) => (ArgumentBlock::default(), true),
        };

        info!(
            "{} {} resolved: {} libraries",
            self.family,
            ctx.loader_version,
            libraries.len()
        );

        Ok(LoaderInstallResult {
            version: LoaderVersion::new(self.family, ctx.loader_version),
            main_class: version_json.main_class,
            arguments,
            libraries,
            uses_runtime_arguments,
        })
    }
}

struct InstallerContents {
    version_json: Option<ForgeVersionJson>,
    install_profile: Option<ForgeInstallProfile>,
}

/// Read the profiles and unpack `maven/` from the installer jar.
fn read_installer(installer_path: &Path, bundle_dir: &Path) -> LauncherResult<InstallerContents> {
    let file = File::open(installer_path).map_err(|e| LauncherError::io(installer_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    let version_json = read_json_entry::<ForgeVersionJson>(&mut archive, "version.json")?;
    let install_profile =
        read_json_entry::<ForgeInstallProfile>(&mut archive, "install_profile.json")?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry
            .enclosed_name()
            .and_then(|p| p.strip_prefix("maven").ok().map(Path::to_path_buf))
        else {
            continue;
        };

        let dest = bundle_dir.join(relative);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&dest).map_err(|e| LauncherError::io(&dest, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&dest, e))?;
        debug!("Unpacked bundled library {:?}", dest);
    }

    Ok(InstallerContents {
        version_json,
        install_profile,
    })
}

fn read_json_entry<T: serde::de::DeserializeOwned>(
    archive: &mut zip::ZipArchive<File>,
    name: &str,
) -> LauncherResult<Option<T>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut raw = String::new();
    entry
        .read_to_string(&mut raw)
        .map_err(|e| LauncherError::Extraction {
            archive: PathBuf::from(name),
            reason: e.to_string(),
        })?;
    Ok(Some(serde_json::from_str(&raw)?))
}

fn extract_legacy_universal(
    installer_path: &Path,
    install: &LegacyInstall,
    bundle_dir: &Path,
) -> LauncherResult<()> {
    let coordinate = MavenArtifact::parse(&install.path)?;
    let dest = bundle_dir.join(coordinate.local_path());
    if dest.exists() {
        return Ok(());
    }

    let file = File::open(installer_path).map_err(|e| LauncherError::io(installer_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = archive.by_name(&install.file_path).map_err(|_| {
        LauncherError::LoaderIncompatible(format!(
            "Installer is missing {}",
            install.file_path
        ))
    })?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let mut out = File::create(&dest).map_err(|e| LauncherError::io(&dest, e))?;
    std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&dest, e))?;
    Ok(())
}

/// Point libraries without a usable download at their bundled copy.
fn attach_bundled(mut entry: LibraryEntry, bundle_dir: &Path) -> LibraryEntry {
    let bundled = bundle_dir.join(&entry.path);
    let has_url = entry
        .download
        .as_ref()
        .is_some_and(|d| !d.url.trim().is_empty());

    if bundled.is_file() {
        entry.bundled = Some(bundled);
    }
    if !has_url {
        entry.download = None;
    }
    entry
}

// ─── Pack Version Manifest ───
// The pack's own `Configs.json` for one version: runtime, loader, mods,
// extra libraries and the conditional launch tweaks.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::depends::Predicate;
use super::library::{DownloadSpec, LibraryEntry, LibrarySide};
use crate::core::downloader::{Downloader, ExpectedHash};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::loaders::LoaderType;

/// Immutable description of one pack version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackVersionManifest {
    #[serde(default)]
    pub version: Option<String>,
    /// Runtime version this pack targets (catalog id).
    pub minecraft: String,
    #[serde(default)]
    pub loader: Option<LoaderRef>,
    #[serde(default)]
    pub libraries: Vec<PackLibrary>,
    #[serde(default)]
    pub mods: Vec<ModEntry>,
    #[serde(default)]
    pub extra_arguments: Option<ExtraArguments>,
    #[serde(default)]
    pub main_class: Option<OneOrMany<MainClassOverride>>,
    #[serde(default)]
    pub case_all_files: CaseType,
    #[serde(default)]
    pub actions: Vec<PackAction>,
    #[serde(default)]
    pub messages: Option<PackMessages>,
    #[serde(default)]
    pub no_configs: bool,
    #[serde(default)]
    pub configs: Option<DownloadSpec>,
    #[serde(default)]
    pub colours: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }
}

/// Loader declared by the pack.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoaderRef {
    #[serde(rename = "type")]
    pub family: LoaderType,
    pub version: String,
}

/// Extra library shipped by the pack repository.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackLibrary {
    pub file: String,
    pub url: String,
    #[serde(default, alias = "md5", alias = "sha1")]
    pub hash: Option<String>,
    #[serde(default)]
    pub filesize: u64,
    #[serde(default)]
    pub path: Option<String>,
    /// Server-side path; its presence marks the library as server-capable.
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub depends: Option<String>,
    #[serde(default)]
    pub depends_group: Option<String>,
}

impl PackLibrary {
    pub fn for_server(&self) -> bool {
        self.server.is_some()
    }

    pub fn predicate(&self) -> Predicate {
        Predicate::from_fields(self.depends.as_deref(), self.depends_group.as_deref())
    }

    /// Convert into a library entry fetched from the pack repository.
    pub fn to_library_entry(&self, repository_url: &str) -> LibraryEntry {
        let path = self
            .path
            .clone()
            .or_else(|| self.server.clone())
            .unwrap_or_else(|| self.file.clone());

        let mut entry = LibraryEntry::new(&self.file, path).with_download(DownloadSpec {
            url: repository_file_url(repository_url, &self.url),
            hash: self.hash.clone(),
            size: self.filesize,
        });
        entry.predicate = self.predicate();
        entry.side = if self.for_server() {
            LibrarySide::Both
        } else {
            LibrarySide::Client
        };
        entry
    }
}

/// Join a repository-relative path onto the repository base. Absolute
/// URLs pass through.
pub fn repository_file_url(repository_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!(
            "{}/{}",
            repository_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

/// One declared component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub url: String,
    pub file: String,
    #[serde(default, alias = "md5", alias = "sha1")]
    pub hash: Option<String>,
    #[serde(default)]
    pub filesize: u64,
    #[serde(rename = "type", default)]
    pub category: ModCategory,
    #[serde(default)]
    pub optional: bool,
    /// Enabled by default in the chooser.
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default)]
    pub group: Option<String>,
    /// Components that must be installed alongside this one.
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default = "default_true")]
    pub client: bool,
    #[serde(default = "default_true")]
    pub server: bool,
    #[serde(default)]
    pub colour: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub curse_mod_id: Option<u64>,
    #[serde(default)]
    pub curse_file_id: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl ModEntry {
    pub fn applies_to(&self, server: bool) -> bool {
        if server {
            self.server
        } else {
            self.client
        }
    }

    pub fn has_depends(&self) -> bool {
        !self.depends.is_empty()
    }

    pub fn depends_on(&self, other: &ModEntry) -> bool {
        self.depends.iter().any(|d| d.eq_ignore_ascii_case(&other.name))
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Destination kind of a component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModCategory {
    #[default]
    Mods,
    Coremods,
    Jar,
    Dependency,
    #[serde(rename = "texturepack")]
    TexturePack,
    #[serde(rename = "texturepackextract")]
    TexturePackExtract,
    #[serde(rename = "resourcepack")]
    ResourcePack,
    #[serde(rename = "resourcepackextract")]
    ResourcePackExtract,
    #[serde(rename = "shaderpack")]
    ShaderPack,
    Plugins,
    Extract,
}

impl fmt::Display for ModCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModCategory::Mods => "mods",
            ModCategory::Coremods => "coremods",
            ModCategory::Jar => "jar",
            ModCategory::Dependency => "dependency",
            ModCategory::TexturePack => "texturepack",
            ModCategory::TexturePackExtract => "texturepackextract",
            ModCategory::ResourcePack => "resourcepack",
            ModCategory::ResourcePackExtract => "resourcepackextract",
            ModCategory::ShaderPack => "shaderpack",
            ModCategory::Plugins => "plugins",
            ModCategory::Extract => "extract",
        };
        f.write_str(name)
    }
}

/// Conditional game arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraArguments {
    pub arguments: String,
    #[serde(default)]
    pub depends: Option<String>,
    #[serde(default)]
    pub depends_group: Option<String>,
}

impl ExtraArguments {
    pub fn predicate(&self) -> Predicate {
        Predicate::from_fields(self.depends.as_deref(), self.depends_group.as_deref())
    }
}

/// Conditional replacement for the runtime's main class.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainClassOverride {
    pub main_class: String,
    #[serde(default)]
    pub depends: Option<String>,
    #[serde(default)]
    pub depends_group: Option<String>,
}

impl MainClassOverride {
    pub fn predicate(&self) -> Predicate {
        Predicate::from_fields(self.depends.as_deref(), self.depends_group.as_deref())
    }
}

/// File-name casing applied to installed mods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseType {
    #[default]
    None,
    Upper,
    Lower,
}

impl CaseType {
    /// Re-case the stem of `file`, keeping the extension untouched.
    pub fn apply(self, file: &str) -> String {
        let (stem, ext) = match file.rfind('.') {
            Some(idx) if idx > 0 => file.split_at(idx),
            _ => (file, ""),
        };

        match self {
            CaseType::None => file.to_string(),
            CaseType::Upper => format!("{}{}", stem.to_uppercase(), ext),
            CaseType::Lower => format!("{}{}", stem.to_lowercase(), ext),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackMessages {
    #[serde(default)]
    pub install: Option<String>,
    #[serde(default)]
    pub update: Option<String>,
}

/// Post-install file action over a set of components.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackAction {
    #[serde(rename = "mod")]
    pub mods: Vec<String>,
    pub action: ActionKind,
    #[serde(rename = "type", default)]
    pub target: ModCategory,
    #[serde(default)]
    pub after: Option<AfterAction>,
    pub save_as: String,
    #[serde(default = "default_true")]
    pub client: bool,
    #[serde(default = "default_true")]
    pub server: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    CreateZip,
    Rename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AfterAction {
    Delete,
    Keep,
}

impl PackVersionManifest {
    /// Download `Configs.json` for `pack`/`version` from the pack repository.
    pub async fn fetch(
        downloader: &Downloader,
        repository_url: &str,
        pack: &str,
        version: &str,
    ) -> LauncherResult<Self> {
        let url = format!(
            "{}/packs/{}/versions/{}/Configs.json",
            repository_url.trim_end_matches('/'),
            pack,
            version
        );
        info!("Fetching pack manifest {}", url);

        let raw = downloader.fetch_text(&url).await.map_err(|e| match e {
            LauncherError::DownloadFailed { status, .. } => LauncherError::Resolution(format!(
                "Pack {pack} has no version {version} (HTTP {status})"
            )),
            other => other,
        })?;

        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> LauncherResult<Self> {
        let manifest: Self = serde_json::from_str(raw)
            .map_err(|e| LauncherError::Resolution(format!("Invalid pack manifest: {e}")))?;
        manifest.check_hashes()?;
        Ok(manifest)
    }

    /// Every declared digest must be one the integrity check can verify.
    fn check_hashes(&self) -> LauncherResult<()> {
        let declared = self
            .mods
            .iter()
            .map(|m| m.hash.as_deref())
            .chain(self.libraries.iter().map(|l| l.hash.as_deref()))
            .chain(self.configs.iter().map(|c| c.hash.as_deref()));

        for hash in declared.flatten() {
            ExpectedHash::parse(hash)?;
        }
        Ok(())
    }

    pub fn main_class_overrides(&self) -> &[MainClassOverride] {
        self.main_class.as_ref().map(OneOrMany::as_slice).unwrap_or(&[])
    }

    /// Components installable on the given side.
    pub fn install_mods(&self, server: bool) -> Vec<ModEntry> {
        self.mods
            .iter()
            .filter(|m| m.applies_to(server))
            .cloned()
            .collect()
    }

    /// Pack libraries for the given side, predicates not yet evaluated.
    pub fn library_entries(&self, repository_url: &str, server: bool) -> Vec<LibraryEntry> {
        self.libraries
            .iter()
            .filter(|lib| !server || lib.for_server())
            .map(|lib| lib.to_library_entry(repository_url))
            .collect()
    }

    /// Resolve a colour tag to its hex value.
    pub fn colour(&self, tag: Option<&str>) -> Option<String> {
        let tag = tag?;
        self.colours
            .get(tag)
            .cloned()
            .or_else(|| tag.starts_with('#').then(|| tag.to_string()))
    }

    pub fn has_jar_mods(&self, selected: &[ModEntry]) -> bool {
        selected.iter().any(|m| m.category == ModCategory::Jar)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::config::JavaOverrides;
use crate::core::loaders::LoaderVersion;
use crate::core::pack::{ArgumentBlock, ModCategory, ModEntry};

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Files are being written. An instance left in this state is corrupt.
    Installing,
    /// Installed and safe to use.
    Ready,
}

/// One component as recorded in `instance.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledMod {
    pub name: String,
    pub version: String,
    pub optional: bool,
    /// File name after the pack's case policy.
    pub file: String,
    #[serde(rename = "type")]
    pub category: ModCategory,
    pub colour: Option<String>,
    pub description: Option<String>,
    /// Deselected components are recorded but disabled.
    pub enabled: bool,
    /// Added by the user, not by the pack.
    #[serde(default)]
    pub user_added: bool,
    pub curse_mod_id: Option<u64>,
    pub curse_file_id: Option<u64>,
}

impl InstalledMod {
    pub fn from_entry(entry: &ModEntry, file: String, colour: Option<String>, enabled: bool) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version.clone(),
            optional: entry.optional,
            file,
            category: entry.category,
            colour,
            description: entry.description.clone(),
            enabled,
            user_added: false,
            curse_mod_id: entry.curse_mod_id,
            curse_file_id: entry.curse_file_id,
        }
    }
}

/// Full instance representation persisted to disk as `instance.json`.
///
/// Each instance has its own folder under `instances/<uuid>/` holding the
/// runtime jar, `natives/`, `mods/`, `config/` and, for servers,
/// `libraries/` plus the launch scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub pack: String,
    pub pack_version: String,
    pub runtime_version: String,
    pub loader: Option<LoaderVersion>,
    pub is_server: bool,

    // ── Internal state ──
    pub state: InstanceState,
    pub created_at: DateTime<Utc>,
    pub installed_at: Option<DateTime<Utc>>,
    /// Main class after overrides were applied.
    pub main_class: Option<String>,
    /// Entry point declared by the mod loader, if one is installed.
    #[serde(default)]
    pub loader_main_class: Option<String>,
    /// Asset index ID (e.g. "17" for 1.21.x).
    pub asset_index: Option<String>,
    /// Library paths relative to the libraries directory.
    pub libraries: Vec<String>,
    pub arguments: ArgumentBlock,
    pub mods: Vec<InstalledMod>,
    #[serde(default)]
    pub java: JavaOverrides,
}

impl Instance {
    /// Create a new instance in the `Installing` state.
    pub fn new(
        name: String,
        pack: String,
        pack_version: String,
        runtime_version: String,
        is_server: bool,
        base_dir: &Path,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let instance_dir = base_dir.join(&id);

        Self {
            id,
            name,
            path: instance_dir,
            pack,
            pack_version,
            runtime_version,
            loader: None,
            is_server,
            state: InstanceState::Installing,
            created_at: Utc::now(),
            installed_at: None,
            main_class: None,
            loader_main_class: None,
            asset_index: None,
            libraries: Vec::new(),
            arguments: ArgumentBlock::default(),
            mods: Vec::new(),
            java: JavaOverrides::default(),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        self.state == InstanceState::Installing
    }

    /// `<id>.jar` for clients, `minecraft_server.<id>.jar` for servers.
    pub fn runtime_jar_name(runtime_id: &str, server: bool) -> String {
        if server {
            format!("minecraft_server.{runtime_id}.jar")
        } else {
            format!("{runtime_id}.jar")
        }
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.path.join("mods")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.path.join("config")
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.path.join("natives")
    }

    /// Server-side copy of the libraries.
    pub fn libraries_dir(&self) -> PathBuf {
        self.path.join("libraries")
    }

    /// Where a component of `category` lands.
    pub fn category_dir(&self, category: ModCategory) -> PathBuf {
        match category {
            ModCategory::Mods | ModCategory::Dependency => self.mods_dir(),
            ModCategory::Coremods => self.path.join("coremods"),
            ModCategory::Jar => self.path.join("jarmods"),
            ModCategory::TexturePack => self.path.join("texturepacks"),
            ModCategory::ResourcePack => self.path.join("resourcepacks"),
            ModCategory::ShaderPack => self.path.join("shaderpacks"),
            ModCategory::Plugins => self.path.join("plugins"),
            ModCategory::TexturePackExtract
            | ModCategory::ResourcePackExtract
            | ModCategory::Extract => self.path.clone(),
        }
    }

    /// Path to this instance's config file.
    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instance_starts_corrupt() {
        let instance = Instance::new(
            "Skyfactory".into(),
            "skyfactory".into(),
            "4.2.4".into(),
            "1.12.2".into(),
            false,
            Path::new("/tmp/instances"),
        );
        assert!(instance.is_corrupt());
        assert_eq!(instance.path, Path::new("/tmp/instances").join(&instance.id));
    }

    #[test]
    fn runtime_jar_names() {
        assert_eq!(Instance::runtime_jar_name("1.20.1", false), "1.20.1.jar");
        assert_eq!(
            Instance::runtime_jar_name("1.20.1", true),
            "minecraft_server.1.20.1.jar"
        );
    }

    #[test]
    fn categories_map_to_directories() {
        let instance = Instance::new(
            "x".into(),
            "x".into(),
            "1".into(),
            "1.7.10".into(),
            true,
            Path::new("/srv"),
        );
        assert_eq!(instance.category_dir(ModCategory::Jar), instance.path.join("jarmods"));
        assert_eq!(instance.category_dir(ModCategory::Dependency), instance.mods_dir());
        assert_eq!(instance.category_dir(ModCategory::Extract), instance.path);
    }
}

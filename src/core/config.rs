// ─── Installer Configuration ───
// Settings and directory roots consumed by the installer. Loaded once by the
// caller and passed into the orchestrator by value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::downloader::DEFAULT_CONCURRENCY;
use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "Packsmith";
const SETTINGS_FILE: &str = "installer_settings.json";

pub const DEFAULT_PACK_REPOSITORY: &str = "https://download.nodecdn.net/containers/atl";
pub const DEFAULT_VERSION_CATALOG: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest.json";
pub const DEFAULT_RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Remote endpoints for loader metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderEndpoints {
    pub fabric_meta: String,
    pub legacy_fabric_meta: String,
    pub quilt_meta: String,
    pub forge_maven: String,
    pub neoforge_maven: String,
}

impl Default for LoaderEndpoints {
    fn default() -> Self {
        Self {
            fabric_meta: "https://meta.fabricmc.net/v2".into(),
            legacy_fabric_meta: "https://meta.legacyfabric.net/v2".into(),
            quilt_meta: "https://meta.quiltmc.org/v3".into(),
            forge_maven: "https://maven.minecraftforge.net".into(),
            neoforge_maven: "https://maven.neoforged.net/releases".into(),
        }
    }
}

/// Launcher-wide Java defaults. Instances only store what differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaDefaults {
    /// MB.
    pub initial_memory: u32,
    /// MB.
    pub maximum_memory: u32,
    /// MB.
    pub permgen: u32,
    pub java_path: Option<PathBuf>,
    pub java_parameters: String,
}

impl Default for JavaDefaults {
    fn default() -> Self {
        Self {
            initial_memory: 512,
            maximum_memory: 4096,
            permgen: 256,
            java_path: None,
            java_parameters: String::new(),
        }
    }
}

/// Per-instance Java settings; `None` means "use the launcher default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaOverrides {
    pub initial_memory: Option<u32>,
    pub maximum_memory: Option<u32>,
    pub permgen: Option<u32>,
    pub java_path: Option<PathBuf>,
    pub java_parameters: Option<String>,
}

impl JavaOverrides {
    /// Clear every value equal to its default and cap memory at
    /// `system_memory_mb`.
    pub fn normalized(self, defaults: &JavaDefaults, system_memory_mb: u32) -> Self {
        let cap = |v: Option<u32>| v.map(|mb| mb.min(system_memory_mb.max(1)));
        let differs = |v: Option<u32>, default: u32| v.filter(|mb| *mb != default);

        Self {
            initial_memory: differs(cap(self.initial_memory), defaults.initial_memory),
            maximum_memory: differs(cap(self.maximum_memory), defaults.maximum_memory),
            permgen: differs(self.permgen, defaults.permgen),
            java_path: self
                .java_path
                .filter(|p| Some(p) != defaults.java_path.as_ref()),
            java_parameters: self
                .java_parameters
                .filter(|p| p.trim() != defaults.java_parameters.trim()),
        }
    }
}

/// Total physical memory in MB.
pub fn system_memory_mb() -> u32 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    u32::try_from(sys.total_memory() / (1024 * 1024)).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub concurrent_connections: usize,
    pub java: JavaDefaults,
    pub pack_repository_url: String,
    pub version_catalog_url: String,
    pub resources_url: String,
    pub loaders: LoaderEndpoints,
    /// Files in an instance root that survive a reinstall.
    pub preserved_files: Vec<String>,
    /// Overrides `<data_dir>/instances`.
    pub instances_dir: Option<PathBuf>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            concurrent_connections: DEFAULT_CONCURRENCY,
            java: JavaDefaults::default(),
            pack_repository_url: DEFAULT_PACK_REPOSITORY.into(),
            version_catalog_url: DEFAULT_VERSION_CATALOG.into(),
            resources_url: DEFAULT_RESOURCES_URL.into(),
            loaders: LoaderEndpoints::default(),
            preserved_files: vec![
                "options.txt".into(),
                "servers.dat".into(),
                "optionsof.txt".into(),
                "optionsshaders.txt".into(),
            ],
            instances_dir: None,
        }
    }
}

impl InstallerConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read `installer_settings.json` from `data_dir`. A missing file yields
    /// defaults; an unreadable one is reported and replaced by defaults.
    pub fn load(data_dir: &Path) -> LauncherResult<Self> {
        let path = data_dir.join(SETTINGS_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<InstallerConfig>(&raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Ignoring invalid settings at {:?}: {}", path, e);
                    InstallerConfig::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", path);
                InstallerConfig::default()
            }
            Err(e) => return Err(LauncherError::io(&path, e)),
        };

        config.data_dir = data_dir.to_path_buf();
        config.concurrent_connections = config.concurrent_connections.max(1);
        Ok(config)
    }

    pub fn save(&self) -> LauncherResult<()> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| LauncherError::io(&self.data_dir, e))?;
        let path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| LauncherError::io(&path, e))
    }

    // ── Derived paths ───────────────────────────────────

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.assets_dir().join("objects")
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.assets_dir().join("indexes")
    }

    pub fn virtual_assets_dir(&self) -> PathBuf {
        self.assets_dir().join("virtual")
    }

    pub fn log_configs_dir(&self) -> PathBuf {
        self.assets_dir().join("log_configs")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn common_configs_dir(&self) -> PathBuf {
        self.data_dir.join("configs").join("common")
    }

    /// Where `LaunchServer.bat` / `LaunchServer.sh` templates live.
    pub fn server_scripts_dir(&self) -> PathBuf {
        self.libraries_dir()
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.instances_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("instances"))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("temp")
    }

    /// Shared cache of downloaded pack components.
    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

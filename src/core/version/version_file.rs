// ─── Version File ───
// Parses a runtime version descriptor and evaluates OS rules for libraries.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{MavenArtifact, MOJANG_LIBRARIES};
use crate::core::pack::{
    Argument, ArgumentBlock, DownloadSpec, LibraryEntry, NativeArtifact,
};

/// A fully parsed runtime version descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: String,
    pub main_class: String,
    #[serde(default)]
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub libraries: Vec<VersionLibrary>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub logging: Option<LoggingInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
    pub server: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingInfo {
    #[serde(default)]
    pub client: Option<LoggingClient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingClient {
    #[serde(default)]
    pub argument: Option<String>,
    pub file: LoggingFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingFile {
    pub id: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

// ─── Library Entry with Rules ───

#[derive(Debug, Clone, Deserialize)]
pub struct VersionLibrary {
    pub name: String,
    /// Repository base for libraries without a `downloads` block.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default)]
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibDownloadArtifact {
    pub path: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

impl LibDownloadArtifact {
    fn to_spec(&self) -> DownloadSpec {
        DownloadSpec {
            url: self.url.clone(),
            hash: self.sha1.clone(),
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
}

impl VersionLibrary {
    /// Evaluate whether this library should be included for the current OS.
    ///
    /// No rules → allowed. Otherwise start disallowed and let each matching
    /// rule (no OS constraint, or the current OS) set the state.
    pub fn is_allowed_for_current_os(&self) -> bool {
        let rules = match &self.rules {
            Some(r) => r,
            None => return true,
        };

        let current_os = current_os_name();
        let mut allowed = false;

        for rule in rules {
            let os_matches = match rule.os.as_ref().and_then(|os| os.name.as_deref()) {
                None => true,
                Some(name) => name == current_os,
            };

            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }

        allowed
    }

    /// Classifier key for the current OS, `${arch}` substituted.
    pub fn native_classifier_for_current_os(&self) -> Option<String> {
        let classifier = self.natives.as_ref()?.get(current_os_name())?;
        let arch = if cfg!(target_pointer_width = "64") {
            "64"
        } else {
            "32"
        };
        Some(classifier.replace("${arch}", arch))
    }

    fn native_artifact(&self) -> Option<NativeArtifact> {
        let classifier = self.native_classifier_for_current_os()?;
        let artifact = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier)?;

        Some(NativeArtifact {
            path: artifact.path.clone(),
            download: artifact.to_spec(),
            exclude: self
                .extract
                .as_ref()
                .map(|e| e.exclude.clone())
                .unwrap_or_default(),
        })
    }

    /// Resolve into a [`LibraryEntry`] rooted in the libraries directory.
    pub fn to_library_entry(&self) -> LauncherResult<LibraryEntry> {
        let artifact = self.downloads.as_ref().and_then(|d| d.artifact.as_ref());
        let native = self.native_artifact();

        let mut entry = match artifact {
            Some(artifact) => LibraryEntry::new(&self.name, &artifact.path)
                .with_download(artifact.to_spec()),
            None => {
                let coordinate = MavenArtifact::parse(&self.name)?;
                let path = coordinate.relative_path();
                let entry = LibraryEntry::new(&self.name, path);
                if native.is_some() && self.downloads.is_some() {
                    // Natives-only library.
                    entry
                } else {
                    let repo = self.url.as_deref().unwrap_or(MOJANG_LIBRARIES);
                    entry.with_download(DownloadSpec {
                        url: coordinate.url(repo),
                        hash: None,
                        size: 0,
                    })
                }
            }
        };
        entry.native = native;
        Ok(entry)
    }
}

/// Get the runtime OS name for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

impl VersionJson {
    pub async fn fetch(downloader: &Downloader, url: &str) -> LauncherResult<Self> {
        let raw = downloader.fetch_text(url).await?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> LauncherResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| LauncherError::Resolution(format!("Invalid runtime descriptor: {e}")))
    }

    /// The descriptor's own launch arguments.
    pub fn base_arguments(&self) -> ArgumentBlock {
        match &self.arguments {
            Some(args) => ArgumentBlock {
                jvm: args.jvm.clone(),
                game: args.game.clone(),
            },
            None => {
                let mut block = ArgumentBlock::default();
                if let Some(legacy) = &self.minecraft_arguments {
                    block.append_game_tokens(legacy);
                }
                block
            }
        }
    }

    /// Libraries allowed on this OS, in declaration order.
    pub fn library_entries(&self) -> LauncherResult<Vec<LibraryEntry>> {
        let mut entries = Vec::with_capacity(self.libraries.len());
        for lib in &self.libraries {
            if !lib.is_allowed_for_current_os() {
                debug!("Skipping library (OS rule): {}", lib.name);
                continue;
            }
            entries.push(lib.to_library_entry()?);
        }
        Ok(entries)
    }

    pub fn runtime_download(&self, server: bool) -> Option<&DownloadArtifact> {
        let downloads = self.downloads.as_ref()?;
        if server {
            downloads.server.as_ref()
        } else {
            downloads.client.as_ref()
        }
    }

    pub fn logging_file(&self) -> Option<&LoggingFile> {
        Some(&self.logging.as_ref()?.client.as_ref()?.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib(json: serde_json::Value) -> VersionLibrary {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn no_rules_means_allowed() {
        let lib = lib(serde_json::json!({ "name": "test:lib:1.0" }));
        assert!(lib.is_allowed_for_current_os());
    }

    #[test]
    fn allow_only_current_os() {
        let lib = lib(serde_json::json!({
            "name": "test:lib:1.0",
            "rules": [{ "action": "allow", "os": { "name": current_os_name() } }]
        }));
        assert!(lib.is_allowed_for_current_os());
    }

    #[test]
    fn disallow_current_os() {
        let lib = lib(serde_json::json!({
            "name": "test:lib:1.0",
            "rules": [
                { "action": "allow" },
                { "action": "disallow", "os": { "name": current_os_name() } }
            ]
        }));
        assert!(!lib.is_allowed_for_current_os());
    }

    #[test]
    fn native_classifier_carries_exclusions() {
        let os = current_os_name();
        let classifier = format!("natives-{os}");
        let lib = lib(serde_json::json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
            "natives": { os: classifier.clone() },
            "extract": { "exclude": ["META-INF/"] },
            "downloads": {
                "classifiers": {
                    classifier.clone(): {
                        "path": "org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives.jar",
                        "sha1": "aa", "size": 10, "url": "https://libs.test/natives.jar"
                    }
                }
            }
        }));

        let entry = lib.to_library_entry().unwrap();
        let native = entry.native.unwrap();
        assert_eq!(native.exclude, vec!["META-INF/".to_string()]);
        assert_eq!(native.download.url, "https://libs.test/natives.jar");
        assert!(entry.download.is_none());
    }

    #[test]
    fn maven_only_library_uses_repository_url() {
        let lib = lib(serde_json::json!({
            "name": "net.minecraft:launchwrapper:1.12",
        }));

        let entry = lib.to_library_entry().unwrap();
        assert_eq!(entry.path, "net/minecraft/launchwrapper/1.12/launchwrapper-1.12.jar");
        assert_eq!(
            entry.download.unwrap().url,
            "https://libraries.minecraft.net/net/minecraft/launchwrapper/1.12/launchwrapper-1.12.jar"
        );
    }

    #[test]
    fn legacy_arguments_become_game_tokens() {
        let parsed = VersionJson::parse(
            r#"{ "id": "1.7.10", "mainClass": "net.minecraft.client.main.Main",
                 "minecraftArguments": "--username ${auth_player_name} --version ${version_name}" }"#,
        )
        .unwrap();

        let args = parsed.base_arguments();
        assert_eq!(args.game.len(), 4);
        assert!(args.jvm.is_empty());
    }

    #[test]
    fn logging_and_downloads_parse() {
        let parsed = VersionJson::parse(
            r#"{
                "id": "1.20.1", "mainClass": "net.minecraft.client.main.Main",
                "downloads": {
                    "client": { "sha1": "c", "size": 3, "url": "https://cdn.test/client.jar" },
                    "server": { "sha1": "s", "size": 4, "url": "https://cdn.test/server.jar" }
                },
                "logging": { "client": { "argument": "-Dlog4j.configurationFile=${path}",
                    "file": { "id": "client-1.12.xml", "sha1": "l", "size": 5, "url": "https://cdn.test/log.xml" } } },
                "assetIndex": { "id": "5", "url": "https://cdn.test/5.json", "sha1": "i", "size": 7 }
            }"#,
        )
        .unwrap();

        assert_eq!(parsed.runtime_download(true).map(|d| d.size), Some(4));
        assert_eq!(parsed.logging_file().map(|f| f.id.as_str()), Some("client-1.12.xml"));
        assert_eq!(parsed.asset_index.map(|a| a.size), Some(7));
    }
}

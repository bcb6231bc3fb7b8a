// ─── Version Catalog ───
// Fetches the runtime version catalog and resolves a runtime id into its
// full descriptor.

use serde::Deserialize;
use tracing::info;

use super::version_file::VersionJson;
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

/// Top-level runtime version catalog.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionEntry>,
}

/// A single entry in the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    #[serde(default)]
    pub release_time: Option<String>,
    pub url: String,
}

impl VersionManifest {
    pub async fn fetch(downloader: &Downloader, catalog_url: &str) -> LauncherResult<Self> {
        info!("Fetching runtime version catalog...");

        let raw = downloader.fetch_text(catalog_url).await?;
        let manifest: VersionManifest = serde_json::from_str(&raw)?;

        info!("Loaded {} versions from catalog", manifest.versions.len());
        Ok(manifest)
    }

    /// Exact, case-insensitive id match.
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id.eq_ignore_ascii_case(id))
    }

    /// Catalog lookup followed by the descriptor fetch.
    pub async fn resolve(&self, downloader: &Downloader, id: &str) -> LauncherResult<VersionJson> {
        let entry = self.find_version(id).ok_or_else(|| {
            LauncherError::Resolution(format!("Failed to find runtime version {id}"))
        })?;

        VersionJson::fetch(downloader, &entry.url).await
    }
}

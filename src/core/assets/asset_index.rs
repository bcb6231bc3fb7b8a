use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

use crate::core::downloader::{BatchReport, ContentReference, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::AssetIndexInfo;

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
    /// Pre-1.7 indexes want objects laid out by name under `virtual/<id>`.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    /// Pre-1.6 indexes want objects copied into the instance `resources/`.
    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// `ab/abcdef…`
    pub fn object_path(&self) -> String {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        format!("{}/{}", prefix, self.hash)
    }
}

/// Where the resources phase reads from and writes to.
pub struct AssetLayout {
    pub resources_url: String,
    pub indexes_dir: PathBuf,
    pub objects_dir: PathBuf,
    pub virtual_dir: PathBuf,
    pub instance_root: PathBuf,
}

pub struct AssetManager;

impl AssetManager {
    /// Fetch the asset index (kept on disk as `<id>.json`) and every object
    /// it references. Objects already present with the right hash are not
    /// transferred again.
    pub async fn download_assets(
        info: &AssetIndexInfo,
        layout: &AssetLayout,
        downloader: &Downloader,
    ) -> LauncherResult<BatchReport> {
        let index_path = layout.indexes_dir.join(format!("{}.json", info.id));
        let index_ref = ContentReference::new(&info.url, &index_path)
            .with_size(info.size)
            .with_hash(info.sha1.as_deref())?;
        downloader.fetch_one(&index_ref).await?;

        let raw = tokio::fs::read_to_string(&index_path)
            .await
            .map_err(|e| LauncherError::io(&index_path, e))?;
        let index: AssetIndex = serde_json::from_str(&raw)?;

        let references = Self::object_references(&index, &info.id, layout)?;
        info!(
            "Asset index {}: {} objects (virtual={}, resources={})",
            info.id,
            references.len(),
            index.is_virtual,
            index.map_to_resources
        );

        downloader.fetch_batch(references).await
    }

    fn object_references(
        index: &AssetIndex,
        index_id: &str,
        layout: &AssetLayout,
    ) -> LauncherResult<Vec<ContentReference>> {
        let base = layout.resources_url.trim_end_matches('/');

        index
            .objects
            .iter()
            .map(|(name, object)| {
                let path = object.object_path();
                let reference = ContentReference::new(
                    format!("{}/{}", base, path),
                    layout.objects_dir.join(&path),
                )
                .with_size(object.size)
                .with_hash(Some(&object.hash))?;

                Ok(if index.map_to_resources {
                    reference.with_copy_to(layout.instance_root.join("resources").join(name))
                } else if index.is_virtual {
                    reference.with_copy_to(layout.virtual_dir.join(index_id).join(name))
                } else {
                    reference
                })
            })
            .collect()
    }
}

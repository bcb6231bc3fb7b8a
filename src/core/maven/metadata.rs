use quick_xml::de::from_str;
use serde::Deserialize;

use crate::core::error::LauncherResult;

/// Minimal `maven-metadata.xml` model: the published version list.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MavenMetadata {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub versioning: MavenVersioning,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MavenVersioning {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub versions: MavenVersions,
}

#[derive(Debug, Deserialize, Default)]
pub struct MavenVersions {
    #[serde(default, rename = "version")]
    pub items: Vec<String>,
}

impl MavenMetadata {
    pub fn parse(xml: &str) -> LauncherResult<Self> {
        Ok(from_str(xml)?)
    }

    /// Published versions, oldest first as listed.
    pub fn versions(&self) -> &[String] {
        &self.versioning.versions.items
    }

    pub fn release(&self) -> Option<&str> {
        self.versioning.release.as_deref()
    }
}

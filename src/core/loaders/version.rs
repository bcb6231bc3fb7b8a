use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported mod loaders — strongly typed, no magic strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Forge,
    NeoForge,
    Fabric,
    LegacyFabric,
    Quilt,
}

impl LoaderType {
    pub fn is_forge_like(self) -> bool {
        matches!(self, LoaderType::Forge | LoaderType::NeoForge)
    }
}

impl fmt::Display for LoaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderType::Forge => write!(f, "forge"),
            LoaderType::NeoForge => write!(f, "neoforge"),
            LoaderType::Fabric => write!(f, "fabric"),
            LoaderType::LegacyFabric => write!(f, "legacyfabric"),
            LoaderType::Quilt => write!(f, "quilt"),
        }
    }
}

/// One installable loader build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderVersion {
    pub version: String,
    /// Version as published upstream (e.g. `1.12.2-14.23.5.2860` for Forge).
    pub raw_version: String,
    pub recommended: bool,
    #[serde(rename = "type")]
    pub family: LoaderType,
}

impl LoaderVersion {
    pub fn new(family: LoaderType, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            raw_version: version.clone(),
            version,
            recommended: false,
            family,
        }
    }

    pub fn with_raw_version(mut self, raw: impl Into<String>) -> Self {
        self.raw_version = raw.into();
        self
    }

    pub fn recommended(mut self, recommended: bool) -> Self {
        self.recommended = recommended;
        self
    }

    /// Forge 37+ and NeoForge ship their own server start scripts.
    pub fn uses_server_starter_jar(&self) -> bool {
        match self.family {
            LoaderType::NeoForge => true,
            LoaderType::Forge => self
                .version
                .split('.')
                .next()
                .and_then(|major| major.parse::<u32>().ok())
                .is_some_and(|major| major >= 37),
            _ => false,
        }
    }

    pub fn should_install_server_scripts(&self) -> bool {
        !self.uses_server_starter_jar()
    }
}

impl fmt::Display for LoaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.recommended {
            write!(f, "{} (Recommended)", self.version)
        } else {
            f.write_str(&self.version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_marks_recommended() {
        let v = LoaderVersion::new(LoaderType::Fabric, "0.15.11").recommended(true);
        assert_eq!(v.to_string(), "0.15.11 (Recommended)");
        assert_eq!(LoaderVersion::new(LoaderType::Quilt, "0.26.0").to_string(), "0.26.0");
    }

    #[test]
    fn server_starter_jar_detection() {
        assert!(LoaderVersion::new(LoaderType::Forge, "47.2.0").uses_server_starter_jar());
        assert!(!LoaderVersion::new(LoaderType::Forge, "14.23.5.2860").uses_server_starter_jar());
        assert!(LoaderVersion::new(LoaderType::NeoForge, "20.4.80").uses_server_starter_jar());
        assert!(LoaderVersion::new(LoaderType::Fabric, "0.15.0").should_install_server_scripts());
    }

    #[test]
    fn family_tags_deserialize() {
        let family: LoaderType = serde_json::from_str("\"legacyfabric\"").unwrap();
        assert_eq!(family, LoaderType::LegacyFabric);
        assert_eq!(LoaderType::NeoForge.to_string(), "neoforge");
    }
}

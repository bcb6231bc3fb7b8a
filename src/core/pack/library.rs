use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::depends::Predicate;

/// Where a remote artifact lives and how to verify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSpec {
    pub url: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// Which install targets a library applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibrarySide {
    #[default]
    Both,
    Client,
    Server,
}

impl LibrarySide {
    pub fn applies_to(self, server: bool) -> bool {
        match self {
            LibrarySide::Both => true,
            LibrarySide::Client => !server,
            LibrarySide::Server => server,
        }
    }
}

/// Native archive for the current OS plus the entries to leave out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArtifact {
    pub path: String,
    pub download: DownloadSpec,
    pub exclude: Vec<String>,
}

/// A library after merging pack, loader and runtime sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub name: String,
    /// Path relative to the libraries root.
    pub path: String,
    /// `None` when the artifact only exists inside a loader installer.
    pub download: Option<DownloadSpec>,
    pub native: Option<NativeArtifact>,
    pub predicate: Predicate,
    pub side: LibrarySide,
    /// Copy of the artifact shipped inside an unpacked loader installer.
    pub bundled: Option<PathBuf>,
}

impl LibraryEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            download: None,
            native: None,
            predicate: Predicate::Always,
            side: LibrarySide::Both,
            bundled: None,
        }
    }

    pub fn with_download(mut self, download: DownloadSpec) -> Self {
        self.download = Some(download);
        self
    }

    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }
}

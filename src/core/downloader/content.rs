use std::path::{Path, PathBuf};

use super::hash::ExpectedHash;
use crate::core::error::LauncherResult;

/// One remote artifact and where it belongs on disk.
#[derive(Debug, Clone)]
pub struct ContentReference {
    pub url: String,
    pub dest: PathBuf,
    /// `None` skips verification: an existing file is accepted as-is.
    pub hash: Option<ExpectedHash>,
    pub size: u64,
    /// Second location that receives a copy once `dest` is satisfied.
    pub copy_to: Option<PathBuf>,
}

impl ContentReference {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            hash: None,
            size: 0,
            copy_to: None,
        }
    }

    /// Attach an expected digest; a malformed one is a `HashFormat` error.
    pub fn with_hash(mut self, hash: Option<&str>) -> LauncherResult<Self> {
        self.hash = match hash {
            Some(value) => ExpectedHash::parse(value)?,
            None => None,
        };
        Ok(self)
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_copy_to(mut self, copy_to: impl Into<PathBuf>) -> Self {
        self.copy_to = Some(copy_to.into());
        self
    }

    /// Whether a transfer is required: the file is absent, or a hash is
    /// known and the local bytes do not match it.
    pub async fn needs_fetch(&self) -> LauncherResult<bool> {
        if !tokio::fs::try_exists(&self.dest).await.unwrap_or(false) {
            return Ok(true);
        }

        match &self.hash {
            None => Ok(false),
            Some(hash) => Ok(!hash.matches_file(&self.dest).await?),
        }
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.dest)
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::hash::HashAlgorithm;

    #[tokio::test]
    async fn matching_local_copy_is_satisfied() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("lib.jar");
        std::fs::write(&dest, b"payload").unwrap();

        let digest = HashAlgorithm::Sha1.digest_hex(b"payload");
        let reference = ContentReference::new("https://example.invalid/lib.jar", &dest)
            .with_size(7)
            .with_hash(Some(&digest))
            .unwrap();

        assert!(!reference.needs_fetch().await.unwrap());
    }

    #[tokio::test]
    async fn mismatched_local_copy_needs_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("lib.jar");
        std::fs::write(&dest, b"stale").unwrap();

        let digest = HashAlgorithm::Sha1.digest_hex(b"payload");
        let reference = ContentReference::new("https://example.invalid/lib.jar", &dest)
            .with_hash(Some(&digest))
            .unwrap();

        assert!(reference.needs_fetch().await.unwrap());
    }

    #[tokio::test]
    async fn unhashed_existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("options.txt");
        std::fs::write(&dest, b"anything").unwrap();

        let reference = ContentReference::new("https://example.invalid/options.txt", &dest);
        assert!(!reference.needs_fetch().await.unwrap());
        assert_eq!(reference.file_name(), "options.txt");
    }
}

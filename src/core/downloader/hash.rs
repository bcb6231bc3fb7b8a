// ─── Integrity ───
// Expected-hash handling for content references. The algorithm is picked
// from the digest length, since pack manifests carry MD5 sums while
// runtime descriptors carry SHA-1.

use std::path::Path;

use md5::Md5;
use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Infer the algorithm from a hex digest length.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }

    pub fn digest_hex(self, bytes: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(bytes)),
            Self::Sha1 => hex::encode(Sha1::digest(bytes)),
            Self::Sha256 => hex::encode(Sha256::digest(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedHash {
    algorithm: HashAlgorithm,
    hex: String,
}

impl ExpectedHash {
    /// Parse a hex digest. Empty values and the `-` placeholder mean
    /// "no hash" and yield `None`; anything that is not an MD5, SHA-1 or
    /// SHA-256 hex digest is a `HashFormat` error.
    pub fn parse(value: &str) -> LauncherResult<Option<Self>> {
        let hex = value.trim().to_ascii_lowercase();
        if hex.is_empty() || hex == "-" {
            return Ok(None);
        }

        let algorithm = HashAlgorithm::from_hex_len(hex.len())
            .filter(|_| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| LauncherError::HashFormat(value.to_string()))?;
        Ok(Some(Self { algorithm, hex }))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.algorithm.digest_hex(bytes) == self.hex
    }

    /// Verify an in-memory buffer destined for `path`.
    pub fn verify(&self, bytes: &[u8], path: &Path) -> LauncherResult<()> {
        let actual = self.algorithm.digest_hex(bytes);
        if actual != self.hex {
            return Err(LauncherError::HashMismatch {
                path: path.to_path_buf(),
                expected: self.hex.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Check an existing file. A missing file never matches.
    pub async fn matches_file(&self, path: &Path) -> LauncherResult<bool> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(self.matches(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LauncherError::io(path, e)),
        }
    }
}

impl std::fmt::Display for ExpectedHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex)
    }
}

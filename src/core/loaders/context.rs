use std::path::Path;

use crate::core::downloader::Downloader;

/// Everything a loader needs to resolve itself into a scratch area.
pub struct InstallContext<'a> {
    pub runtime_version: &'a str,
    pub loader_version: &'a str,
    /// Throwaway directory; nothing here ends up in the instance directly.
    pub scratch_dir: &'a Path,
    pub downloader: &'a Downloader,
    pub server: bool,
}

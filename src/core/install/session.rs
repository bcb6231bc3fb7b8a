use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use super::progress::ProgressTracker;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{Instance, InstanceManager, InstanceState};

/// Mutable state of one run from the moment the target directory may be
/// touched. Owned by the orchestrator.
pub struct InstallationSession {
    pub instance: Instance,
    pub temp_dir: PathBuf,
    pub tracker: ProgressTracker,
    pub extracted_texture_pack: bool,
    pub extracted_resource_pack: bool,
    corrupt: bool,
    backed_up: Vec<String>,
}

impl InstallationSession {
    pub fn new(
        instance: Instance,
        temp_dir: PathBuf,
        tracker: ProgressTracker,
    ) -> Self {
        Self {
            instance,
            temp_dir,
            tracker,
            extracted_texture_pack: false,
            extracted_resource_pack: false,
            corrupt: false,
            backed_up: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.instance.path
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.instance.natives_dir()
    }

    /// Unpacked server jar awaiting jar mods.
    pub fn jar_work_dir(&self) -> PathBuf {
        self.temp_dir.join("jar")
    }

    pub fn texture_pack_dir(&self) -> PathBuf {
        self.temp_dir.join("texturepack")
    }

    pub fn resource_pack_dir(&self) -> PathBuf {
        self.temp_dir.join("resourcepack")
    }

    fn backup_dir(&self) -> PathBuf {
        self.temp_dir.join("backup")
    }

    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    /// Flag the instance as mid-mutation and persist that before anything
    /// in its directory changes.
    pub async fn mark_corrupt(&mut self, manager: &InstanceManager) -> LauncherResult<()> {
        self.corrupt = true;
        manager
            .set_state(&mut self.instance, InstanceState::Installing)
            .await
    }

    /// Clear the corrupt flag and persist the final metadata.
    pub async fn commit(&mut self, manager: &InstanceManager) -> LauncherResult<()> {
        self.instance.installed_at = Some(Utc::now());
        manager
            .set_state(&mut self.instance, InstanceState::Ready)
            .await?;
        self.corrupt = false;
        info!(
            "Instance '{}' committed at {:?}",
            self.instance.name, self.instance.path
        );
        Ok(())
    }

    /// Copy root-level files that must survive the reinstall into the
    /// temp area.
    pub async fn back_up(&mut self, names: &[String]) -> LauncherResult<()> {
        let backup_dir = self.backup_dir();
        for name in names {
            let source = self.root().join(name);
            if !source.is_file() {
                continue;
            }
            let dest = backup_dir.join(name);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| LauncherError::io(parent, e))?;
            }
            tokio::fs::copy(&source, &dest)
                .await
                .map_err(|e| LauncherError::io(&dest, e))?;
            debug!("Set aside {}", name);
            self.backed_up.push(name.clone());
        }
        Ok(())
    }

    pub async fn restore(&self) -> LauncherResult<()> {
        let backup_dir = self.backup_dir();
        for name in &self.backed_up {
            let dest = self.root().join(name);
            tokio::fs::copy(backup_dir.join(name), &dest)
                .await
                .map_err(|e| LauncherError::io(&dest, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(base: &Path) -> (InstallationSession, InstanceManager) {
        let manager = InstanceManager::new(base.join("instances"));
        let instance = Instance::new(
            "Pack".into(),
            "pack".into(),
            "1".into(),
            "1.20.1".into(),
            false,
            manager.instances_dir(),
        );
        let session = InstallationSession::new(
            instance,
            base.join("temp/run"),
            ProgressTracker::new(None),
        );
        (session, manager)
    }

    #[tokio::test]
    async fn corrupt_flag_is_persisted_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, manager) = session(dir.path());

        session.mark_corrupt(&manager).await.unwrap();
        assert!(session.is_corrupt());
        let on_disk = manager.load(&session.instance.id).await.unwrap();
        assert!(on_disk.is_corrupt());

        session.commit(&manager).await.unwrap();
        assert!(!session.is_corrupt());
        let on_disk = manager.load(&session.instance.id).await.unwrap();
        assert_eq!(on_disk.state, InstanceState::Ready);
        assert!(on_disk.installed_at.is_some());
    }

    #[tokio::test]
    async fn preserved_files_survive_a_wipe() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = session(dir.path());
        std::fs::create_dir_all(session.root()).unwrap();
        std::fs::write(session.root().join("options.txt"), "fov:90").unwrap();

        session
            .back_up(&["options.txt".to_string(), "servers.dat".to_string()])
            .await
            .unwrap();
        std::fs::write(session.root().join("options.txt"), "fov:70").unwrap();
        session.restore().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(session.root().join("options.txt")).unwrap(),
            "fov:90"
        );
        assert!(!session.root().join("servers.dat").exists());
    }
}

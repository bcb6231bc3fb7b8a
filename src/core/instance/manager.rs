use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::model::{Instance, InstanceState};
use crate::core::error::{LauncherError, LauncherResult};

/// Reads and writes `instance.json` files under the instances directory.
pub struct InstanceManager {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self { instances_dir }
    }

    pub fn instances_dir(&self) -> &Path {
        &self.instances_dir
    }

    /// Save instance metadata to disk.
    pub async fn save(&self, instance: &Instance) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(instance)?;
        let config_path = instance.config_path();

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| LauncherError::io(&config_path, e))?;

        Ok(())
    }

    /// Load a single instance by ID.
    pub async fn load(&self, id: &str) -> LauncherResult<Instance> {
        let config_path = self.instances_dir.join(id).join("instance.json");
        if !config_path.exists() {
            return Err(LauncherError::InstanceNotFound(id.to_string()));
        }

        let json = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| LauncherError::io(&config_path, e))?;

        Ok(serde_json::from_str(&json)?)
    }

    /// List all instances. Unreadable `instance.json` files are skipped.
    pub async fn list(&self) -> LauncherResult<Vec<Instance>> {
        let mut instances = Vec::new();

        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(|e| LauncherError::io(&self.instances_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&self.instances_dir, e))?
        {
            let config_path = entry.path().join("instance.json");
            if !config_path.is_file() {
                continue;
            }
            match tokio::fs::read_to_string(&config_path).await {
                Ok(json) => match serde_json::from_str::<Instance>(&json) {
                    Ok(inst) => instances.push(inst),
                    Err(e) => warn!("Corrupt instance.json at {:?}: {}", config_path, e),
                },
                Err(e) => warn!("Cannot read {:?}: {}", config_path, e),
            }
        }

        Ok(instances)
    }

    /// Find an instance by its display name (case-insensitive).
    pub async fn find_by_name(&self, name: &str) -> LauncherResult<Option<Instance>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|i| i.name.eq_ignore_ascii_case(name)))
    }

    /// Delete an instance from disk.
    pub async fn delete(&self, id: &str) -> LauncherResult<()> {
        let instance_dir = self.instances_dir.join(id);
        if !instance_dir.exists() {
            return Err(LauncherError::InstanceNotFound(id.to_string()));
        }

        tokio::fs::remove_dir_all(&instance_dir)
            .await
            .map_err(|e| LauncherError::io(&instance_dir, e))?;

        info!("Deleted instance {}", id);
        Ok(())
    }

    /// Update instance state and persist.
    pub async fn set_state(
        &self,
        instance: &mut Instance,
        state: InstanceState,
    ) -> LauncherResult<()> {
        instance.state = state;
        self.save(instance).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(name: &str, base: &Path) -> Instance {
        Instance::new(
            name.into(),
            "pack".into(),
            "1.0".into(),
            "1.20.1".into(),
            false,
            base,
        )
    }

    #[tokio::test]
    async fn save_load_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let manager = InstanceManager::new(dir.path().to_path_buf());

        let mut inst = instance("My Pack", dir.path());
        manager.save(&inst).await.unwrap();
        manager.set_state(&mut inst, InstanceState::Ready).await.unwrap();

        let loaded = manager.load(&inst.id).await.unwrap();
        assert_eq!(loaded.state, InstanceState::Ready);

        let found = manager.find_by_name("my pack").await.unwrap().unwrap();
        assert_eq!(found.id, inst.id);
        assert!(manager.find_by_name("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_instances_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = InstanceManager::new(dir.path().to_path_buf());

        manager.save(&instance("good", dir.path())).await.unwrap();
        std::fs::create_dir_all(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken/instance.json"), "{").unwrap();

        assert_eq!(manager.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_instance_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let manager = InstanceManager::new(dir.path().to_path_buf());

        assert!(matches!(
            manager.load("nope").await,
            Err(LauncherError::InstanceNotFound(_))
        ));
        assert!(matches!(
            manager.delete("nope").await,
            Err(LauncherError::InstanceNotFound(_))
        ));
    }
}

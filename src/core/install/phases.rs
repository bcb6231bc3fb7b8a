// ─── Installing Phases ───
// Each phase runs to completion before the next starts; cancellation is
// only observed between them.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::plan::InstallPlan;
use super::progress::Phase;
use super::session::InstallationSession;
use super::state::Halt;
use crate::core::archive::{
    copy_dir, extract_natives, pack_dir, strip_meta_inf, unpack_dir, ExclusionRules,
};
use crate::core::assets::{AssetLayout, AssetManager};
use crate::core::config::InstallerConfig;
use crate::core::downloader::{ContentReference, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{Instance, InstanceManager};
use crate::core::pack::manifest::repository_file_url;
use crate::core::pack::{ActionKind, AfterAction, CaseType, ModCategory, ModEntry, PackAction};

/// Runs the mutation window of one resolved plan.
pub(crate) struct Pipeline<'a> {
    pub config: &'a InstallerConfig,
    pub downloader: &'a Downloader,
    pub manager: &'a InstanceManager,
    pub plan: &'a InstallPlan,
    pub cancel: &'a CancellationToken,
}

impl Pipeline<'_> {
    pub async fn run(&self, session: &mut InstallationSession) -> Result<(), Halt> {
        // The flag goes to disk before the directory is touched.
        session.mark_corrupt(self.manager).await?;
        self.prepare_directories(session).await?;
        self.checkpoint()?;

        self.download_resources(session).await?;
        self.checkpoint()?;

        self.download_runtime(session).await?;
        self.checkpoint()?;

        self.download_logging_config(session).await?;
        self.checkpoint()?;

        self.download_libraries(session).await?;
        self.checkpoint()?;

        self.organise_libraries(session).await?;
        self.checkpoint()?;

        self.prepare_runtime_jar(session)?;
        self.checkpoint()?;

        if self.plan.selection.selected.is_empty() {
            session.tracker.enter(Phase::ModDownload);
            session.tracker.enter(Phase::ModInstall);
        } else {
            self.download_mods(session).await?;
            self.checkpoint()?;
            self.install_mods(session).await?;
        }
        self.checkpoint()?;

        self.convert_case(session)?;
        self.checkpoint()?;

        self.package(session)?;
        self.checkpoint()?;

        self.run_actions(session)?;
        self.checkpoint()?;

        self.configure_pack(session).await?;
        self.checkpoint()?;

        self.finalize(session).await?;
        Ok(())
    }

    fn checkpoint(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            info!("Cancellation requested; stopping between phases");
            return Err(Halt::Cancelled);
        }
        Ok(())
    }

    pub(super) fn server(&self) -> bool {
        self.plan.is_server()
    }

    fn runtime_jar(&self, session: &InstallationSession) -> PathBuf {
        session
            .root()
            .join(Instance::runtime_jar_name(&self.plan.runtime.id, self.server()))
    }

    fn cached_component(&self, entry: &ModEntry) -> PathBuf {
        self.config.downloads_dir().join(&entry.file)
    }

    // ── Directory setup ─────────────────────────────────

    async fn prepare_directories(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::DirectorySetup);

        tokio::fs::create_dir_all(&session.temp_dir)
            .await
            .map_err(|e| LauncherError::io(&session.temp_dir, e))?;
        session.back_up(&self.config.preserved_files).await?;

        // Pack-owned files from the previous install are replaced, user
        // additions stay.
        if let Some(previous) = &self.plan.previous {
            for m in previous.mods.iter().filter(|m| !m.user_added) {
                let stale = session.instance.category_dir(m.category).join(&m.file);
                if stale.is_file() {
                    tokio::fs::remove_file(&stale)
                        .await
                        .map_err(|e| LauncherError::io(&stale, e))?;
                    debug!("Removed previous pack file {:?}", stale);
                }
            }
        }

        let mut dirs = vec![
            session.root().to_path_buf(),
            session.instance.mods_dir(),
            session.instance.config_dir(),
        ];
        if self.server() {
            dirs.push(session.instance.libraries_dir());
        } else {
            dirs.push(session.natives_dir());
        }
        for dir in dirs {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| LauncherError::io(&dir, e))?;
        }
        Ok(())
    }

    // ── Downloads ───────────────────────────────────────

    async fn download_resources(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::Resources);
        if self.server() {
            return Ok(());
        }
        let Some(info) = &self.plan.runtime.asset_index else {
            return Ok(());
        };

        let layout = AssetLayout {
            resources_url: self.config.resources_url.clone(),
            indexes_dir: self.config.indexes_dir(),
            objects_dir: self.config.objects_dir(),
            virtual_dir: self.config.virtual_assets_dir(),
            instance_root: session.root().to_path_buf(),
        };
        AssetManager::download_assets(info, &layout, self.downloader).await?;
        session.instance.asset_index = Some(info.id.clone());
        Ok(())
    }

    async fn download_runtime(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::RuntimeJar);
        let server = self.server();
        let id = &self.plan.runtime.id;
        let download = self.plan.runtime.runtime_download(server).ok_or_else(|| {
            LauncherError::Resolution(format!(
                "Runtime {id} has no {} download",
                if server { "server" } else { "client" }
            ))
        })?;

        // Shared versioned copy, duplicated into the instance root.
        let side = if server { "server" } else { "client" };
        let cached = self
            .config
            .libraries_dir()
            .join("net/minecraft")
            .join(side)
            .join(id)
            .join(format!("{side}-{id}.jar"));
        let reference = ContentReference::new(&download.url, cached)
            .with_size(download.size)
            .with_copy_to(self.runtime_jar(session))
            .with_hash(Some(&download.sha1))?;

        self.downloader.fetch_batch(vec![reference]).await?;
        Ok(())
    }

    async fn download_logging_config(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::Logging);
        if self.server() {
            return Ok(());
        }
        let Some(file) = self.plan.runtime.logging_file() else {
            return Ok(());
        };

        let reference =
            ContentReference::new(&file.url, self.config.log_configs_dir().join(&file.id))
                .with_size(file.size)
                .with_hash(Some(&file.sha1))?;
        self.downloader.fetch_batch(vec![reference]).await?;
        Ok(())
    }

    async fn download_libraries(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::Libraries);
        let libraries_dir = self.config.libraries_dir();
        let mut references = Vec::new();

        for lib in &self.plan.libraries {
            let dest = libraries_dir.join(&lib.path);
            match (&lib.bundled, &lib.download) {
                (Some(bundled), _) => {
                    if !dest.is_file() {
                        copy_file(bundled, &dest).await?;
                    }
                }
                (None, Some(download)) if !download.url.trim().is_empty() => references.push(
                    ContentReference::new(&download.url, &dest)
                        .with_size(download.size)
                        .with_hash(download.hash.as_deref())?,
                ),
                _ if lib.has_native() => {}
                _ => warn!("Library {} has no download source", lib.name),
            }

            if self.server() {
                continue;
            }
            if let Some(native) = &lib.native {
                references.push(
                    ContentReference::new(&native.download.url, libraries_dir.join(&native.path))
                        .with_size(native.download.size)
                        .with_hash(native.download.hash.as_deref())?,
                );
            }
        }

        let report = self.downloader.fetch_batch(references).await?;
        info!(
            "Libraries: {} fetched, {} already present",
            report.fetched, report.satisfied
        );
        Ok(())
    }

    // ── Library organisation ────────────────────────────

    async fn organise_libraries(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::Organization);
        let libraries_dir = self.config.libraries_dir();

        for lib in &self.plan.libraries {
            if self.server() {
                let source = libraries_dir.join(&lib.path);
                if source.is_file() {
                    copy_file(&source, &session.instance.libraries_dir().join(&lib.path)).await?;
                } else if !lib.has_native() {
                    warn!("Library {} missing from {:?}", lib.name, source);
                }
            } else if let Some(native) = &lib.native {
                let archive = libraries_dir.join(&native.path);
                let rules = ExclusionRules::new(&native.exclude)?;
                let written = extract_natives(&archive, &session.natives_dir(), &rules)?;
                debug!("Extracted {} native files from {}", written, lib.name);
            }
        }
        Ok(())
    }

    fn prepare_runtime_jar(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        if !self.plan.has_jar_mods() {
            return Ok(());
        }
        let jar = self.runtime_jar(session);
        if self.server() {
            session.tracker.task("Extracting server jar");
            unpack_dir(&jar, &session.jar_work_dir())?;
        } else if !self.plan.has_forge() {
            strip_meta_inf(&jar)?;
        }
        Ok(())
    }

    // ── Components ──────────────────────────────────────

    async fn download_mods(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::ModDownload);
        let repository = &self.config.pack_repository_url;

        let references = self
            .plan
            .selection
            .selected
            .iter()
            .map(|m| {
                ContentReference::new(repository_file_url(repository, &m.url), self.cached_component(m))
                    .with_size(m.filesize)
                    .with_hash(m.hash.as_deref())
            })
            .collect::<LauncherResult<Vec<_>>>()?;

        self.downloader.fetch_batch(references).await?;
        Ok(())
    }

    async fn install_mods(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::ModInstall);

        for entry in &self.plan.selection.selected {
            let cached = self.cached_component(entry);
            session.tracker.task(format!("Installing {}", entry.name));

            match entry.category {
                ModCategory::Jar if self.server() => {
                    unpack_dir(&cached, &session.jar_work_dir())?;
                }
                ModCategory::TexturePackExtract => {
                    unpack_dir(&cached, &session.texture_pack_dir())?;
                    session.extracted_texture_pack = true;
                }
                ModCategory::ResourcePackExtract => {
                    unpack_dir(&cached, &session.resource_pack_dir())?;
                    session.extracted_resource_pack = true;
                }
                ModCategory::Extract => {
                    unpack_dir(&cached, session.root())?;
                }
                category => {
                    let dest = session.instance.category_dir(category).join(&entry.file);
                    copy_file(&cached, &dest).await?;
                }
            }
        }
        Ok(())
    }

    /// Apply the pack's casing policy to every file in the mods directory.
    fn convert_case(&self, session: &InstallationSession) -> LauncherResult<()> {
        let case = self.plan.manifest.case_all_files;
        if case == CaseType::None {
            return Ok(());
        }
        let mods_dir = session.instance.mods_dir();
        let entries = std::fs::read_dir(&mods_dir).map_err(|e| LauncherError::io(&mods_dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| LauncherError::io(&mods_dir, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let cased = case.apply(&name);
            if cased != name {
                let dest = mods_dir.join(&cased);
                std::fs::rename(entry.path(), &dest).map_err(|e| LauncherError::io(&dest, e))?;
            }
        }
        Ok(())
    }

    fn package(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.enter(Phase::Packaging);

        if self.server() && self.plan.has_jar_mods() {
            session.tracker.task("Zipping server jar");
            pack_dir(&session.jar_work_dir(), &self.runtime_jar(session))?;
        }
        if session.extracted_texture_pack {
            session.tracker.task("Zipping texture pack files");
            let target = session
                .instance
                .category_dir(ModCategory::TexturePack)
                .join("TexturePack.zip");
            pack_dir(&session.texture_pack_dir(), &target)?;
        }
        if session.extracted_resource_pack {
            session.tracker.task("Zipping resource pack files");
            let target = session
                .instance
                .category_dir(ModCategory::ResourcePack)
                .join("ResourcePack.zip");
            pack_dir(&session.resource_pack_dir(), &target)?;
        }
        Ok(())
    }

    // ── Actions and pack configuration ──────────────────

    fn run_actions(&self, session: &InstallationSession) -> LauncherResult<()> {
        let server = self.server();
        for (index, action) in self.plan.manifest.actions.iter().enumerate() {
            if !(if server { action.server } else { action.client }) {
                continue;
            }
            let Some(sources) = self.action_sources(action, session) else {
                debug!("Skipping action {}: components not installed", action.save_as);
                continue;
            };
            if sources.is_empty() {
                continue;
            }

            let target = session.instance.category_dir(action.target).join(&action.save_as);
            match action.action {
                ActionKind::CreateZip => {
                    let staging = session.temp_dir.join(format!("action-{index}"));
                    for source in &sources {
                        if let Some(name) = source.file_name() {
                            let dest = staging.join(name);
                            std::fs::create_dir_all(&staging)
                                .map_err(|e| LauncherError::io(&staging, e))?;
                            std::fs::copy(source, &dest).map_err(|e| LauncherError::io(&dest, e))?;
                        }
                    }
                    pack_dir(&staging, &target)?;
                }
                ActionKind::Rename => {
                    let [source] = sources.as_slice() else {
                        warn!("Rename action {} needs exactly one component", action.save_as);
                        continue;
                    };
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
                    }
                    std::fs::copy(source, &target).map_err(|e| LauncherError::io(&target, e))?;
                }
            }

            if action.after.unwrap_or(AfterAction::Delete) == AfterAction::Delete {
                for source in sources.iter().filter(|s| **s != target) {
                    std::fs::remove_file(source).map_err(|e| LauncherError::io(source, e))?;
                }
            }
            info!("Action {:?} produced {:?}", action.action, target);
        }
        Ok(())
    }

    /// On-disk files of the action's components, or `None` unless every
    /// one of them was installed.
    fn action_sources(&self, action: &PackAction, session: &InstallationSession) -> Option<Vec<PathBuf>> {
        action
            .mods
            .iter()
            .map(|name| {
                let entry = self.plan.selection.selected.iter().find(|m| m.is_named(name))?;
                let path = session
                    .instance
                    .category_dir(entry.category)
                    .join(self.plan.installed_file(entry));
                path.is_file().then_some(path)
            })
            .collect()
    }

    /// Download and unpack the pack's `Configs.zip` over the instance.
    async fn configure_pack(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        let manifest = &self.plan.manifest;
        if manifest.no_configs {
            return Ok(());
        }
        session.tracker.task("Configuring pack");

        let repository = &self.config.pack_repository_url;
        let archive = session.temp_dir.join("Configs.zip");
        let reference = match &manifest.configs {
            Some(spec) => ContentReference::new(repository_file_url(repository, &spec.url), &archive)
                .with_size(spec.size)
                .with_hash(spec.hash.as_deref())?,
            None => ContentReference::new(
                format!(
                    "{}/packs/{}/versions/{}/Configs.zip",
                    repository.trim_end_matches('/'),
                    self.plan.request.pack,
                    self.plan.request.version
                ),
                &archive,
            ),
        };

        self.downloader.fetch_batch(vec![reference]).await?;
        let written = unpack_dir(&archive, session.root())?;
        debug!("Pack configuration: {} files", written);
        Ok(())
    }
}

/// Copy a file, creating the destination's parents.
pub(crate) async fn copy_file(source: &Path, dest: &Path) -> LauncherResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    tokio::fs::copy(source, dest)
        .await
        .map_err(|e| LauncherError::io(dest, e))?;
    Ok(())
}

/// Copy shared configuration into the instance when any exists.
pub(crate) fn copy_common_configs(common: &Path, root: &Path) -> LauncherResult<usize> {
    let has_files = std::fs::read_dir(common)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if !has_files {
        return Ok(0);
    }
    copy_dir(common, root)
}

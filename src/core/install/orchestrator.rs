// ─── Install Orchestrator ───
// Resolve everything first, then hand one immutable plan to the pipeline.
// Cancellation is cooperative and checked between phases.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::events::{emit, EventSink, InstallEvent};
use super::phases::Pipeline;
use super::plan::{InstallPlan, InstallRequest};
use super::progress::{Phase, ProgressTracker};
use super::session::InstallationSession;
use super::state::{Halt, InstallOutcome, InstallState};
use crate::core::config::InstallerConfig;
use crate::core::downloader::{Downloader, FetchTransport};
use crate::core::error::LauncherResult;
use crate::core::instance::{Instance, InstanceManager};
use crate::core::loaders::{
    InstallContext, Installer, LoaderInstallResult, LoaderType, LoaderVersion,
};
use crate::core::pack::selection::{select_components, sort_mods};
use crate::core::pack::{InstallInteraction, LoaderRef, PackVersionManifest, PresetChooser};
use crate::core::version::{VersionJson, VersionManifest};

pub struct Orchestrator {
    config: InstallerConfig,
    transport: Arc<dyn FetchTransport>,
    downloader: Downloader,
    interaction: Arc<dyn InstallInteraction>,
    events: Option<EventSink>,
    cancel: CancellationToken,
    instances: InstanceManager,
}

impl Orchestrator {
    pub fn new(
        config: InstallerConfig,
        transport: Arc<dyn FetchTransport>,
        interaction: Arc<dyn InstallInteraction>,
    ) -> Self {
        let downloader = Downloader::new(Arc::clone(&transport))
            .with_concurrency(config.concurrent_connections);
        let instances = InstanceManager::new(config.instances_dir());

        Self {
            config,
            transport,
            downloader,
            interaction,
            events: None,
            cancel: CancellationToken::new(),
            instances,
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.downloader = Downloader::new(Arc::clone(&self.transport))
            .with_concurrency(self.config.concurrent_connections)
            .with_events(Some(events.clone()));
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancelling this token stops the run at the next phase boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn instances(&self) -> &InstanceManager {
        &self.instances
    }

    /// Loader builds published for `runtime_version`, newest first.
    pub async fn loader_versions(
        &self,
        family: LoaderType,
        runtime_version: &str,
    ) -> LauncherResult<Vec<LoaderVersion>> {
        Installer::new(family, &self.config.loaders)
            .versions(runtime_version, &self.downloader)
            .await
    }

    /// Install or reinstall one pack version. Never panics on failure;
    /// every path ends in a terminal outcome.
    pub async fn run(&self, request: InstallRequest) -> InstallOutcome {
        let run_dir = self.config.temp_dir().join(Uuid::new_v4().to_string());
        let mut tracker = ProgressTracker::new(self.events.clone());
        tracker.state(InstallState::Pending);

        info!(
            "Installing {} {} as '{}' ({})",
            request.pack,
            request.version,
            request.name,
            if request.server { "server" } else { "client" }
        );

        let outcome = match self.resolve(request, &mut tracker, &run_dir).await {
            Ok(plan) => self.install(plan, tracker, &run_dir).await,
            Err(halt) => halt.into(),
        };

        discard_run_dir(&run_dir).await;
        match &outcome {
            InstallOutcome::Committed(instance) => info!("Installed '{}'", instance.name),
            InstallOutcome::Cancelled => warn!("Installation cancelled"),
            InstallOutcome::Failed(e) => error!("Installation failed: {}", e),
        }
        emit(
            self.events.as_ref(),
            InstallEvent::StateChanged {
                state: outcome.state(),
            },
        );
        outcome
    }

    fn checkpoint(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        Ok(())
    }

    // ── Resolution ──────────────────────────────────────

    async fn resolve(
        &self,
        request: InstallRequest,
        tracker: &mut ProgressTracker,
        run_dir: &Path,
    ) -> Result<InstallPlan, Halt> {
        // 1️⃣ Pack manifest
        tracker.state(InstallState::ResolvingManifest);
        tracker.enter(Phase::PackManifest);
        let manifest = PackVersionManifest::fetch(
            &self.downloader,
            &self.config.pack_repository_url,
            &request.pack,
            &request.version,
        )
        .await?;
        self.checkpoint()?;

        // 2️⃣ Runtime descriptor
        tracker.enter(Phase::RuntimeDescriptor);
        let runtime = self.resolve_runtime(&manifest.minecraft).await?;
        self.checkpoint()?;

        // 3️⃣ Loader
        let loader = match &manifest.loader {
            Some(loader_ref) => {
                tracker.state(InstallState::ResolvingLoader);
                tracker.enter(Phase::Loader);
                let scratch = run_dir.join("loader");
                Some(
                    self.resolve_loader(loader_ref, &runtime, &scratch, request.server)
                        .await?,
                )
            }
            None => {
                tracker.enter(Phase::Loader);
                None
            }
        };
        self.checkpoint()?;

        // 4️⃣ Messages
        let previous = self.instances.find_by_name(&request.name).await?;
        if let Some(message) = pack_message(&manifest, previous.is_some()) {
            let title = format!("{} {}", request.pack, request.version);
            if !self.interaction.confirm_message(&title, message).await {
                info!("Pack message declined");
                return Err(Halt::Cancelled);
            }
        }

        // 5️⃣ Components
        tracker.state(InstallState::AwaitingComponentSelection);
        let preset = PresetChooser::default();
        let chooser: &dyn InstallInteraction = if request.show_chooser {
            self.interaction.as_ref()
        } else {
            &preset
        };
        let components = sort_mods(manifest.install_mods(request.server));
        let selection = select_components(
            chooser,
            &request.pack,
            &request.version,
            components,
            request.share_code.as_deref(),
        )
        .await
        .ok_or(Halt::Cancelled)?;
        self.checkpoint()?;

        let repository = self.config.pack_repository_url.clone();
        Ok(InstallPlan::build(
            request,
            manifest,
            runtime,
            loader,
            selection,
            previous,
            &repository,
        )?)
    }

    async fn resolve_runtime(&self, runtime_id: &str) -> LauncherResult<VersionJson> {
        let catalog = VersionManifest::fetch(&self.downloader, &self.config.version_catalog_url).await?;
        catalog.resolve(&self.downloader, runtime_id).await
    }

    async fn resolve_loader(
        &self,
        loader_ref: &LoaderRef,
        runtime: &VersionJson,
        scratch: &Path,
        server: bool,
    ) -> LauncherResult<LoaderInstallResult> {
        let installer = Installer::new(loader_ref.family, &self.config.loaders);
        let version = installer
            .pick_version(&loader_ref.version, &runtime.id, &self.downloader)
            .await?;

        installer
            .install(InstallContext {
                runtime_version: &runtime.id,
                loader_version: &version,
                scratch_dir: scratch,
                downloader: &self.downloader,
                server,
            })
            .await
    }

    // ── Mutation ────────────────────────────────────────

    async fn install(
        &self,
        plan: InstallPlan,
        tracker: ProgressTracker,
        run_dir: &Path,
    ) -> InstallOutcome {
        tracker.state(InstallState::Installing);

        let instance = match &plan.previous {
            Some(previous) => previous.clone(),
            None => Instance::new(
                plan.request.name.clone(),
                plan.request.pack.clone(),
                plan.request.version.clone(),
                plan.runtime.id.clone(),
                plan.is_server(),
                self.instances.instances_dir(),
            ),
        };
        let mut session = InstallationSession::new(
            instance,
            run_dir.to_path_buf(),
            tracker,
        );

        let pipeline = Pipeline {
            config: &self.config,
            downloader: &self.downloader,
            manager: &self.instances,
            plan: &plan,
            cancel: &self.cancel,
        };

        match pipeline.run(&mut session).await {
            Ok(()) => InstallOutcome::Committed(Box::new(session.instance)),
            Err(halt) => {
                if session.is_corrupt() {
                    warn!(
                        "Instance '{}' left marked corrupt at {:?}",
                        session.instance.name,
                        session.root()
                    );
                }
                halt.into()
            }
        }
    }
}

/// Update message for reinstalls when the pack has one, install message
/// otherwise.
fn pack_message(manifest: &PackVersionManifest, reinstall: bool) -> Option<&str> {
    let messages = manifest.messages.as_ref()?;
    reinstall
        .then(|| messages.update.as_deref())
        .flatten()
        .or(messages.install.as_deref())
        .filter(|m| !m.trim().is_empty())
}

async fn discard_run_dir(run_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(run_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove temp dir {:?}: {}", run_dir, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::core::downloader::testing::MemoryTransport;
    use crate::core::downloader::HashAlgorithm;
    use crate::core::error::LauncherError;
    use crate::core::instance::{InstalledMod, InstanceState};
    use crate::core::pack::{ComponentChoiceRequest, ModCategory};

    const REPO: &str = "https://repo.test";
    const CATALOG: &str = "https://meta.test/catalog.json";
    const SERVER_JAR: &[u8] = b"server jar bytes";

    /// Cancels `token` when `trigger` is requested, after serving it.
    struct CancelOnFetch {
        inner: MemoryTransport,
        trigger: String,
        token: CancellationToken,
    }

    #[async_trait]
    impl FetchTransport for CancelOnFetch {
        async fn fetch(&self, url: &str) -> LauncherResult<Vec<u8>> {
            let body = self.inner.fetch(url).await;
            if url == self.trigger {
                self.token.cancel();
            }
            body
        }
    }

    /// Answers messages with a fixed verdict and records every chooser call.
    struct Scripted {
        accept: bool,
        choose: Option<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn accepting(choose: Option<Vec<String>>) -> Arc<Self> {
            Arc::new(Self {
                accept: true,
                choose,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl InstallInteraction for Scripted {
        async fn confirm_message(&self, _title: &str, message: &str) -> bool {
            self.prompts.lock().unwrap().push(message.to_string());
            self.accept
        }

        async fn choose_components(&self, request: &ComponentChoiceRequest) -> Option<Vec<String>> {
            self.choose
                .clone()
                .or_else(|| Some(request.preselected.clone()))
        }
    }

    fn manifest_json() -> serde_json::Value {
        serde_json::json!({
            "minecraft": "1.20.1",
            "noConfigs": true,
            "caseAllFiles": "lower",
            "messages": { "install": "Welcome", "update": "Back again" },
            "mods": [
                { "name": "Core", "url": "mods/Core.jar", "file": "Core.jar" },
                { "name": "Extras", "url": "mods/Extras.jar", "file": "Extras.jar",
                  "optional": true, "colour": "green" }
            ],
            "colours": { "green": "#00FF00" }
        })
    }

    fn transport(manifest: serde_json::Value) -> MemoryTransport {
        let sha1 = HashAlgorithm::Sha1.digest_hex(SERVER_JAR);
        MemoryTransport::new()
            .with(
                &format!("{REPO}/packs/demo/versions/1.0/Configs.json"),
                manifest.to_string(),
            )
            .with(
                CATALOG,
                serde_json::json!({ "versions": [
                    { "id": "1.20.1", "url": "https://meta.test/1.20.1.json" }
                ] })
                .to_string(),
            )
            .with(
                "https://meta.test/1.20.1.json",
                serde_json::json!({
                    "id": "1.20.1",
                    "mainClass": "net.minecraft.server.Main",
                    "downloads": { "server": {
                        "sha1": sha1, "size": SERVER_JAR.len(), "url": "https://dl.test/server.jar"
                    } },
                    "libraries": []
                })
                .to_string(),
            )
            .with("https://dl.test/server.jar", SERVER_JAR)
            .with(&format!("{REPO}/mods/Core.jar"), "core")
            .with(&format!("{REPO}/mods/Extras.jar"), "extras")
    }

    fn orchestrator(
        data_dir: &Path,
        transport: impl FetchTransport + 'static,
        interaction: Arc<dyn InstallInteraction>,
    ) -> Orchestrator {
        let mut config = InstallerConfig::with_data_dir(data_dir);
        config.pack_repository_url = REPO.into();
        config.version_catalog_url = CATALOG.into();
        Orchestrator::new(config, Arc::new(transport), interaction)
    }

    fn server_request() -> InstallRequest {
        InstallRequest::new("demo", "1.0").named("Demo Server").server(true)
    }

    #[tokio::test]
    async fn server_install_commits_a_complete_instance() {
        let dir = tempfile::tempdir().unwrap();
        let interaction = Scripted::accepting(None);
        let orchestrator = orchestrator(dir.path(), transport(manifest_json()), interaction.clone());

        let outcome = orchestrator.run(server_request()).await;

        let instance = match outcome {
            InstallOutcome::Committed(instance) => instance,
            other => panic!("expected commit, got {other:?}"),
        };
        let root = &instance.path;
        assert_eq!(std::fs::read(root.join("minecraft_server.1.20.1.jar")).unwrap(), SERVER_JAR);
        assert!(root.join("mods/core.jar").is_file());
        assert!(!root.join("mods/extras.jar").exists());
        assert!(root.join("LaunchServer.sh").is_file());
        assert!(root.join("LaunchServer.bat").is_file());

        assert_eq!(instance.state, InstanceState::Ready);
        assert_eq!(instance.main_class.as_deref(), Some("net.minecraft.server.Main"));
        let recorded: Vec<(&str, &str, bool)> = instance
            .mods
            .iter()
            .map(|m| (m.name.as_str(), m.file.as_str(), m.enabled))
            .collect();
        assert_eq!(
            recorded,
            vec![("Core", "core.jar", true), ("Extras", "Extras.jar", false)]
        );
        assert_eq!(instance.mods[1].colour.as_deref(), Some("#00FF00"));
        assert_eq!(*interaction.prompts.lock().unwrap(), vec!["Welcome".to_string()]);

        let on_disk = orchestrator.instances().load(&instance.id).await.unwrap();
        assert!(!on_disk.is_corrupt());
        assert!(std::fs::read_dir(dir.path().join("temp")).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn reinstall_keeps_user_components_and_shows_update_message() {
        let dir = tempfile::tempdir().unwrap();
        let interaction = Scripted::accepting(Some(vec!["Extras".into()]));
        let orchestrator = orchestrator(dir.path(), transport(manifest_json()), interaction.clone());

        let InstallOutcome::Committed(first) = orchestrator.run(server_request()).await else {
            panic!("first install failed");
        };
        assert!(first.path.join("mods/extras.jar").is_file());

        // The user drops in their own mod between installs.
        let mut edited = orchestrator.instances().load(&first.id).await.unwrap();
        std::fs::write(first.path.join("mods/mine.jar"), "mine").unwrap();
        edited.mods.push(InstalledMod {
            name: "Mine".into(),
            version: "1".into(),
            optional: true,
            file: "mine.jar".into(),
            category: ModCategory::Mods,
            colour: None,
            description: None,
            enabled: true,
            user_added: true,
            curse_mod_id: None,
            curse_file_id: None,
        });
        orchestrator.instances().save(&edited).await.unwrap();

        let again = Scripted::accepting(Some(Vec::new()));
        let orchestrator = Orchestrator {
            interaction: again.clone(),
            ..orchestrator
        };
        let InstallOutcome::Committed(second) = orchestrator.run(server_request()).await else {
            panic!("reinstall failed");
        };

        assert_eq!(second.id, first.id);
        assert!(second.path.join("mods/mine.jar").is_file());
        assert!(!second.path.join("mods/extras.jar").exists());
        let names: Vec<&str> = second.mods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Core", "Mine", "Extras"]);
        assert_eq!(*interaction.prompts.lock().unwrap(), vec!["Welcome".to_string()]);
        assert_eq!(*again.prompts.lock().unwrap(), vec!["Back again".to_string()]);
    }

    #[tokio::test]
    async fn declined_message_cancels_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let interaction = Arc::new(Scripted {
            accept: false,
            choose: None,
            prompts: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator(dir.path(), transport(manifest_json()), interaction);

        let outcome = orchestrator.run(server_request()).await;

        assert!(matches!(outcome, InstallOutcome::Cancelled));
        assert!(orchestrator.instances().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_stops_at_the_first_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let orchestrator = orchestrator(
            dir.path(),
            transport(manifest_json()),
            Scripted::accepting(None),
        )
        .with_cancellation(cancel.clone());
        cancel.cancel();

        let outcome = orchestrator.run(server_request()).await;

        assert_eq!(outcome.state(), InstallState::Cancelled);
        assert!(orchestrator.instances().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_during_install_finishes_the_transfer_and_leaves_instance_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let transport = CancelOnFetch {
            inner: transport(manifest_json()),
            trigger: "https://dl.test/server.jar".into(),
            token: cancel.clone(),
        };
        let orchestrator = orchestrator(dir.path(), transport, Scripted::accepting(None))
            .with_cancellation(cancel);

        let outcome = orchestrator.run(server_request()).await;

        assert!(matches!(outcome, InstallOutcome::Cancelled));
        let instances = orchestrator.instances().list().await.unwrap();
        assert_eq!(instances.len(), 1);
        assert!(instances[0].is_corrupt());
        let root = &instances[0].path;
        assert_eq!(std::fs::read(root.join("minecraft_server.1.20.1.jar")).unwrap(), SERVER_JAR);
        assert!(!root.join("mods/core.jar").exists());
    }

    #[tokio::test]
    async fn failure_after_mutation_leaves_instance_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = manifest_json();
        manifest["mods"][0]["url"] = "mods/Missing.jar".into();
        let orchestrator = orchestrator(dir.path(), transport(manifest), Scripted::accepting(None));

        let outcome = orchestrator.run(server_request()).await;

        let err = match outcome {
            InstallOutcome::Failed(err) => err,
            other => panic!("expected failure, got {other:?}"),
        };
        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
        let instances = orchestrator.instances().list().await.unwrap();
        assert_eq!(instances.len(), 1);
        assert!(instances[0].is_corrupt());
    }

    #[tokio::test]
    async fn unknown_pack_version_fails_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), MemoryTransport::new(), Scripted::accepting(None));

        let outcome = orchestrator.run(server_request()).await;

        assert!(matches!(
            outcome,
            InstallOutcome::Failed(LauncherError::Resolution(_))
        ));
    }

    #[tokio::test]
    async fn events_report_states_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let orchestrator = orchestrator(
            dir.path(),
            transport(manifest_json()),
            Scripted::accepting(None),
        )
        .with_events(tx);

        assert!(orchestrator.run(server_request()).await.is_committed());
        drop(orchestrator);

        let mut states = Vec::new();
        let mut last_percent = 0;
        while let Some(event) = rx.recv().await {
            match event {
                InstallEvent::StateChanged { state } => states.push(state),
                InstallEvent::Percent { percent } => {
                    assert!(percent >= last_percent);
                    last_percent = percent;
                }
                _ => {}
            }
        }
        assert_eq!(
            states,
            vec![
                InstallState::Pending,
                InstallState::ResolvingManifest,
                InstallState::AwaitingComponentSelection,
                InstallState::Installing,
                InstallState::Finalizing,
                InstallState::Committed,
            ]
        );
        assert_eq!(last_percent, 100);
    }

    #[test]
    fn update_message_only_on_reinstall() {
        let manifest: PackVersionManifest = serde_json::from_value(manifest_json()).unwrap();
        assert_eq!(pack_message(&manifest, false), Some("Welcome"));
        assert_eq!(pack_message(&manifest, true), Some("Back again"));
    }
}

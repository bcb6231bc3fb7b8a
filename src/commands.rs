// ─── CLI Commands ───
// Thin terminal front end over the installer core.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::{Confirm, MultiSelect};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::core::config::{InstallerConfig, JavaOverrides};
use crate::core::downloader::HttpTransport;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::{
    InstallEvent, InstallOutcome, InstallRequest, Orchestrator, SubProgress,
};
use crate::core::loaders::LoaderType;
use crate::core::pack::{ComponentChoiceRequest, InstallInteraction};

#[derive(Debug, Parser)]
#[command(name = "packsmith", version, about = "Install modpack instances")]
pub struct Cli {
    /// Data directory; defaults to the platform data dir.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install a pack version, or reinstall it over an instance of the same name
    Install {
        pack: String,
        version: String,
        /// Instance name; defaults to the pack name
        #[arg(long)]
        name: Option<String>,
        /// Build a dedicated server instead of a client
        #[arg(long)]
        server: bool,
        /// Preselect optional components from a share code
        #[arg(long)]
        share_code: Option<String>,
        /// Accept pack messages and the default component selection
        #[arg(long, short = 'y')]
        yes: bool,
        /// Maximum memory for the instance in MB
        #[arg(long)]
        max_memory: Option<u32>,
    },
    /// List loader builds for a runtime version
    LoaderVersions {
        #[arg(value_enum)]
        loader: LoaderArg,
        runtime: String,
    },
    /// List installed instances
    List,
    /// Delete an instance by name
    Delete { name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LoaderArg {
    Forge,
    Neoforge,
    Fabric,
    LegacyFabric,
    Quilt,
}

impl From<LoaderArg> for LoaderType {
    fn from(arg: LoaderArg) -> Self {
        match arg {
            LoaderArg::Forge => LoaderType::Forge,
            LoaderArg::Neoforge => LoaderType::NeoForge,
            LoaderArg::Fabric => LoaderType::Fabric,
            LoaderArg::LegacyFabric => LoaderType::LegacyFabric,
            LoaderArg::Quilt => LoaderType::Quilt,
        }
    }
}

pub async fn execute(cli: Cli) -> ExitCode {
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> LauncherResult<ExitCode> {
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| InstallerConfig::default().data_dir);
    let config = InstallerConfig::load(&data_dir)?;
    let interactive = !matches!(cli.command, Command::Install { yes: true, .. });
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(HttpTransport::new()?),
        Arc::new(TerminalInteraction { interactive }),
    );

    match cli.command {
        Command::Install {
            pack,
            version,
            name,
            server,
            share_code,
            yes,
            max_memory,
        } => {
            let mut request = InstallRequest::new(pack, version)
                .server(server)
                .with_share_code(share_code)
                .show_chooser(!yes)
                .with_java(JavaOverrides {
                    maximum_memory: max_memory,
                    ..JavaOverrides::default()
                });
            if let Some(name) = name {
                request = request.named(name);
            }
            install(orchestrator, request).await
        }
        Command::LoaderVersions { loader, runtime } => {
            for version in orchestrator.loader_versions(loader.into(), &runtime).await? {
                println!("{version}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::List => {
            for instance in orchestrator.instances().list().await? {
                let marker = if instance.is_corrupt() { " (corrupt)" } else { "" };
                println!(
                    "{}  {} {}  [{}]{}",
                    instance.name,
                    instance.pack,
                    instance.pack_version,
                    instance.runtime_version,
                    marker
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { name } => {
            let instance = orchestrator
                .instances()
                .find_by_name(&name)
                .await?
                .ok_or(LauncherError::InstanceNotFound(name))?;
            orchestrator.instances().delete(&instance.id).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn install(orchestrator: Orchestrator, request: InstallRequest) -> LauncherResult<ExitCode> {
    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = orchestrator.with_events(tx);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current phase");
            cancel.cancel();
        }
    });
    let reporter = tokio::spawn(report_progress(rx));

    let outcome = orchestrator.run(request).await;
    drop(orchestrator);
    let _ = reporter.await;

    Ok(match outcome {
        InstallOutcome::Committed(instance) => {
            println!("Installed '{}' at {}", instance.name, instance.path.display());
            ExitCode::SUCCESS
        }
        InstallOutcome::Cancelled => {
            println!("Installation cancelled");
            ExitCode::from(2)
        }
        InstallOutcome::Failed(e) => return Err(e),
    })
}

async fn report_progress(mut rx: mpsc::UnboundedReceiver<InstallEvent>) {
    let mut percent = 0;
    while let Some(event) = rx.recv().await {
        match event {
            InstallEvent::Percent { percent: p } => percent = p,
            InstallEvent::Task { message } => println!("[{percent:>3}%] {message}"),
            InstallEvent::SubProgress {
                progress: SubProgress::Bytes { transferred, total },
            } if total > 0 && transferred == total => {
                info!("{} bytes transferred", total);
            }
            InstallEvent::StateChanged { state } => info!("State: {}", state),
            _ => {}
        }
    }
}

/// Prompts on the terminal; with `interactive` off every question takes
/// its default answer.
struct TerminalInteraction {
    interactive: bool,
}

#[async_trait]
impl InstallInteraction for TerminalInteraction {
    async fn confirm_message(&self, title: &str, message: &str) -> bool {
        println!("── {title} ──\n{message}");
        if !self.interactive {
            return true;
        }

        let prompt = "Continue with the installation?".to_string();
        let answer = tokio::task::spawn_blocking(move || {
            Confirm::new().with_prompt(prompt).default(true).interact()
        })
        .await;

        match answer {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                warn!("Prompt failed: {}", e);
                false
            }
            Err(e) => {
                warn!("Prompt task failed: {}", e);
                false
            }
        }
    }

    async fn choose_components(&self, request: &ComponentChoiceRequest) -> Option<Vec<String>> {
        if !self.interactive {
            return Some(request.preselected.clone());
        }

        // Mandatory components are added back by the selector.
        let optional: Vec<(String, String, bool)> = request
            .components
            .iter()
            .filter(|c| c.optional)
            .map(|c| {
                let label = match &c.description {
                    Some(d) if !d.is_empty() => format!("{} - {}", c.name, d),
                    _ => c.name.clone(),
                };
                (c.name.clone(), label, request.is_preselected(&c.name))
            })
            .collect();

        let prompt = format!("Components for {} {}", request.pack, request.version);
        let labels: Vec<String> = optional.iter().map(|(_, label, _)| label.clone()).collect();
        let defaults: Vec<bool> = optional.iter().map(|(_, _, on)| *on).collect();

        let picked = tokio::task::spawn_blocking(move || {
            MultiSelect::new()
                .with_prompt(prompt)
                .items(&labels)
                .defaults(&defaults)
                .interact_opt()
        })
        .await;

        match picked {
            Ok(Ok(Some(indices))) => Some(
                indices
                    .into_iter()
                    .filter_map(|i| optional.get(i).map(|(name, _, _)| name.clone()))
                    .collect(),
            ),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!("Component chooser failed: {}", e);
                None
            }
            Err(e) => {
                warn!("Component chooser task failed: {}", e);
                None
            }
        }
    }
}

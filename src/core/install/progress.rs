use tracing::info;

use super::events::{emit, EventSink, InstallEvent, SubProgress};
use super::state::InstallState;

/// Coarse phases of a run, each worth a fixed share of the progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PackManifest,
    RuntimeDescriptor,
    Loader,
    DirectorySetup,
    Resources,
    RuntimeJar,
    Logging,
    Libraries,
    Organization,
    ModDownload,
    ModInstall,
    Packaging,
}

impl Phase {
    pub const ALL: [Phase; 12] = [
        Phase::PackManifest,
        Phase::RuntimeDescriptor,
        Phase::Loader,
        Phase::DirectorySetup,
        Phase::Resources,
        Phase::RuntimeJar,
        Phase::Logging,
        Phase::Libraries,
        Phase::Organization,
        Phase::ModDownload,
        Phase::ModInstall,
        Phase::Packaging,
    ];

    pub const fn weight(self) -> u8 {
        match self {
            Phase::Resources | Phase::Libraries => 10,
            Phase::ModDownload => 25,
            Phase::ModInstall => 15,
            _ => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::PackManifest => "Downloading pack version definition",
            Phase::RuntimeDescriptor => "Downloading runtime definition",
            Phase::Loader => "Downloading loader",
            Phase::DirectorySetup => "Preparing directories",
            Phase::Resources => "Downloading resources",
            Phase::RuntimeJar => "Downloading runtime",
            Phase::Logging => "Downloading logging config",
            Phase::Libraries => "Downloading libraries",
            Phase::Organization => "Organising libraries",
            Phase::ModDownload => "Downloading mods",
            Phase::ModInstall => "Installing mods",
            Phase::Packaging => "Packaging files",
        }
    }
}

/// Running percentage plus the event side channel.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    percent: u8,
    events: Option<EventSink>,
}

impl ProgressTracker {
    pub fn new(events: Option<EventSink>) -> Self {
        Self { percent: 0, events }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Credit `phase` and announce it.
    pub fn enter(&mut self, phase: Phase) {
        self.percent = self.percent.saturating_add(phase.weight()).min(100);
        info!("[{:>3}%] {}", self.percent, phase.label());
        self.emit(InstallEvent::Percent {
            percent: self.percent,
        });
        self.task(phase.label());
        self.sub(SubProgress::Unknown);
    }

    pub fn state(&self, state: InstallState) {
        self.emit(InstallEvent::StateChanged { state });
    }

    pub fn task(&self, message: impl Into<String>) {
        self.emit(InstallEvent::Task {
            message: message.into(),
        });
    }

    pub fn sub(&self, progress: SubProgress) {
        self.emit(InstallEvent::SubProgress { progress });
    }

    pub fn finish(&mut self) {
        self.percent = 100;
        self.emit(InstallEvent::Percent { percent: 100 });
        self.sub(SubProgress::Hidden);
    }

    pub fn events(&self) -> Option<&EventSink> {
        self.events.as_ref()
    }

    fn emit(&self, event: InstallEvent) {
        emit(self.events.as_ref(), event);
    }
}

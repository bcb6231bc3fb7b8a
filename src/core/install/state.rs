use serde::Serialize;

use crate::core::error::LauncherError;
use crate::core::instance::Instance;

/// Lifecycle of one installation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Pending,
    ResolvingManifest,
    ResolvingLoader,
    AwaitingComponentSelection,
    Installing,
    Finalizing,
    Committed,
    Cancelled,
    Failed,
}

impl std::fmt::Display for InstallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::ResolvingManifest => "resolving manifest",
            Self::ResolvingLoader => "resolving loader",
            Self::AwaitingComponentSelection => "awaiting component selection",
            Self::Installing => "installing",
            Self::Finalizing => "finalizing",
            Self::Committed => "committed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal result handed back to the caller. Only `Committed` is success.
#[derive(Debug)]
pub enum InstallOutcome {
    Committed(Box<Instance>),
    Cancelled,
    Failed(LauncherError),
}

impl InstallOutcome {
    pub fn state(&self) -> InstallState {
        match self {
            Self::Committed(_) => InstallState::Committed,
            Self::Cancelled => InstallState::Cancelled,
            Self::Failed(_) => InstallState::Failed,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Why a run stopped early. Internal to the orchestrator.
#[derive(Debug)]
pub(crate) enum Halt {
    Cancelled,
    Failed(LauncherError),
}

impl From<LauncherError> for Halt {
    fn from(error: LauncherError) -> Self {
        Halt::Failed(error)
    }
}

impl From<Halt> for InstallOutcome {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Cancelled => InstallOutcome::Cancelled,
            Halt::Failed(e) => InstallOutcome::Failed(e),
        }
    }
}

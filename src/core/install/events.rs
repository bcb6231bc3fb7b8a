// ─── Install Events ───
// Payloads pushed to the frontend while an installation runs.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::state::InstallState;

/// Secondary progress bar state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubProgress {
    /// Work is running but its size is not known yet.
    Unknown,
    Bytes { transferred: u64, total: u64 },
    Hidden,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InstallEvent {
    StateChanged { state: InstallState },
    Task { message: String },
    Percent { percent: u8 },
    SubProgress { progress: SubProgress },
}

pub type EventSink = UnboundedSender<InstallEvent>;

/// Fire-and-forget; a closed receiver is not an install failure.
pub fn emit(sink: Option<&EventSink>, event: InstallEvent) {
    if let Some(sink) = sink {
        let _ = sink.send(event);
    }
}

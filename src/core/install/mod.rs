// ─── Installation Pipeline ───
// Resolution, the phased mutation of one instance directory, and the
// events reported while it runs.

pub mod events;
mod finalize;
pub mod orchestrator;
mod phases;
pub mod plan;
pub mod progress;
pub mod session;
pub mod state;

pub use events::{EventSink, InstallEvent, SubProgress};
pub use orchestrator::Orchestrator;
pub use plan::{InstallPlan, InstallRequest};
pub use progress::Phase;
pub use state::{InstallOutcome, InstallState};

pub mod arguments;
pub mod depends;
pub mod library;
pub mod manifest;
pub mod selection;

pub use arguments::{Argument, ArgumentBlock, ArgumentValue};
pub use depends::{included, Predicate, SelectionSet};
pub use library::{DownloadSpec, LibraryEntry, LibrarySide, NativeArtifact};
pub use manifest::{
    ActionKind, AfterAction, CaseType, ExtraArguments, LoaderRef, MainClassOverride,
    ModCategory, ModEntry, PackAction, PackVersionManifest,
};
pub use selection::{
    ComponentChoiceRequest, ComponentSelection, InstallInteraction, PresetChooser, ShareCode,
};

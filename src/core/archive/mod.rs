// ─── Archive Organizer ───
// Native extraction and whole-directory zip work used by packaging phases.

mod natives;
mod repack;

pub use natives::{extract_natives, ExclusionRules};
pub use repack::{copy_dir, pack_dir, strip_meta_inf, unpack_dir};

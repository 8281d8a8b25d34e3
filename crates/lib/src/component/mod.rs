//! Component definitions: the unit of work the orchestrator walks.

pub mod patch;
mod types;

pub use patch::{PatchError, PatchOutcome, TextPatch};
pub use types::{BuildStrategy, ComponentSpec, Source};

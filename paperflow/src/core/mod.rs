//! Core domain types for paperflow.
//!
//! - Artifact and run identifiers
//! - Stage kind, advance policy and run status
//! - Stage output

mod artifact;
mod output;
mod status;

pub use artifact::{ArtifactId, RunId};
pub use output::StageOutput;
pub use status::{AdvancePolicy, RunStatus, StageKind};

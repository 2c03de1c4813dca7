//! Stage kind, advance policy and run status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a stage's failure halts the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Failure transitions the run to `failed`.
    #[default]
    Required,
    /// Failure is reported, then the run moves on.
    Optional,
}

impl StageKind {
    /// Returns true for required stages.
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// What happens after a stage resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
    /// Invoke the next stage immediately.
    #[default]
    AutoChain,
    /// Stop and wait for an explicit `advance()`.
    AwaitUser,
}

/// The execution status of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing started, or reset.
    #[default]
    Idle,
    /// The named stage's remote call is in flight.
    Running(String),
    /// The named stage is next but waits for user confirmation.
    Awaiting(String),
    /// Every foreground stage resolved.
    Complete,
    /// The named required stage failed.
    Failed(String),
}

impl RunStatus {
    /// Returns true while a run is between `start` and a terminal state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running(_) | Self::Awaiting(_))
    }

    /// Returns true for `complete` and `failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }

    /// The stage this status refers to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Running(key) | Self::Awaiting(key) | Self::Failed(key) => Some(key),
            Self::Idle | Self::Complete => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running(key) => write!(f, "running({key})"),
            Self::Awaiting(key) => write!(f, "awaiting({key})"),
            Self::Complete => write!(f, "complete"),
            Self::Failed(key) => write!(f, "failed({key})"),
        }
    }
}

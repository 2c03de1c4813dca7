//! Failure policy and failure records.

use crate::errors::PaperflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a required-stage failure does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at `failed(stage)` and keep every result produced so far.
    #[default]
    RetainPartial,
    /// Discard the run and go back to `idle`.
    RevertToIdle,
}

/// Record of a stage failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage key.
    pub stage: String,
    /// The message shown to the user.
    pub message: String,
    /// Error class (`transport`, `remote_rejection`, `timeout`, ...).
    pub error_kind: String,
    /// Whether the stage was required.
    pub required: bool,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a record from a stage error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>, error: &PaperflowError) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            error_kind: error.kind().to_string(),
            required: true,
            timestamp: Utc::now(),
        }
    }

    /// Marks the record as coming from an optional stage.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

//! Error types for paperflow.
//!
//! The taxonomy follows what a user can actually see go wrong: the network
//! failed, the backend refused with a `detail` message, the input was
//! malformed before anything was sent, or a stage never answered.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PaperflowError>;

/// The main error type for paperflow operations.
#[derive(Debug, Error)]
pub enum PaperflowError {
    /// The remote API could not be reached or the connection broke.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote API answered with a non-success status.
    #[error("Remote rejected request ({status}): {}", detail.as_deref().unwrap_or("no detail"))]
    RemoteRejection {
        /// HTTP status code.
        status: u16,
        /// The `detail` field of the error body, if one was sent.
        detail: Option<String>,
    },

    /// Client-side input was malformed.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A stage invocation did not resolve in time.
    #[error("Stage '{stage}' timed out after {after:?}")]
    Timeout {
        /// The stage key.
        stage: String,
        /// The configured limit.
        after: Duration,
    },

    /// A stage succeeded but returned nothing usable.
    #[error("Stage '{stage}' produced no output")]
    EmptyResult {
        /// The stage key.
        stage: String,
    },

    /// `start` was called while a run is already in flight.
    #[error("Pipeline '{pipeline}' already has a run in progress ({status})")]
    AlreadyRunning {
        /// The pipeline name.
        pipeline: String,
        /// The status of the in-flight run.
        status: String,
    },

    /// `start` was called on a finished run that has not been reset.
    #[error("Pipeline '{pipeline}' run is {status}; reset before starting again")]
    RunTerminal {
        /// The pipeline name.
        pipeline: String,
        /// The terminal status.
        status: String,
    },

    /// `advance` was called while there is nothing to continue or retry.
    #[error("Nothing to advance: run is {0}")]
    NothingToAdvance(String),

    /// The run was reset while a stage was in flight.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// A stage key that is not part of the pipeline.
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// The pipeline table itself is malformed.
    #[error("{0}")]
    Definition(#[from] PipelineDefinitionError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PaperflowError {
    /// Creates a remote rejection.
    #[must_use]
    pub fn rejection(status: u16, detail: Option<String>) -> Self {
        Self::RemoteRejection { status, detail }
    }

    /// Returns the text to show the user.
    ///
    /// A backend `detail` is surfaced verbatim; validation and timeout errors
    /// describe themselves; everything else falls back to `generic`.
    #[must_use]
    pub fn user_message(&self, generic: &str) -> String {
        match self {
            Self::RemoteRejection {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.clone(),
            Self::Validation(err) => err.to_string(),
            Self::Timeout { .. } => self.to_string(),
            _ => generic.to_string(),
        }
    }

    /// A short machine-readable name for the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::RemoteRejection { .. } => "remote_rejection",
            Self::Validation(_) => "validation",
            Self::Timeout { .. } => "timeout",
            Self::EmptyResult { .. } => "empty_result",
            Self::AlreadyRunning { .. } => "already_running",
            Self::RunTerminal { .. } => "run_terminal",
            Self::NothingToAdvance(_) => "nothing_to_advance",
            Self::Cancelled(_) => "cancelled",
            Self::UnknownStage(_) => "unknown_stage",
            Self::Definition(_) => "definition",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for PaperflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for PaperflowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Input rejected on the client before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required text field was blank.
    #[error("Please enter {0}")]
    EmptyInput(&'static str),

    /// The text is not an arXiv URL or identifier.
    #[error("Please enter a valid arXiv URL or ID (e.g., 2301.00001 or https://arxiv.org/abs/2301.00001), got '{input}'")]
    InvalidArxivReference {
        /// What the user typed.
        input: String,
    },

    /// The file has an extension the endpoint does not accept.
    #[error("Unsupported file type '{extension}': expected one of {}", expected.join(", "))]
    UnsupportedFileExtension {
        /// The offending extension (lowercase, with dot), or empty.
        extension: String,
        /// Accepted extensions.
        expected: Vec<String>,
    },

    /// The selected file does not exist.
    #[error("File not found: {}", path.display())]
    MissingFile {
        /// The path that was given.
        path: PathBuf,
    },

    /// A segment index outside the playlist.
    #[error("Segment index {index} out of range for {len} segments")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Number of segments.
        len: usize,
    },
}

/// Error raised when a pipeline table is malformed.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineDefinitionError {
    /// The error message.
    pub message: String,
    /// The stage keys involved in the error.
    pub stages: Vec<String>,
}

impl PipelineDefinitionError {
    /// Creates a new definition error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_is_surfaced_verbatim() {
        let err = PaperflowError::rejection(404, Some("Podcast script not found. Generate script first.".into()));
        assert_eq!(
            err.user_message("Failed to generate podcast"),
            "Podcast script not found. Generate script first."
        );
    }

    #[test]
    fn test_generic_message_without_detail() {
        let err = PaperflowError::rejection(500, None);
        assert_eq!(err.user_message("Video generation failed"), "Video generation failed");

        let err = PaperflowError::Transport("connection refused".into());
        assert_eq!(err.user_message("Video generation failed"), "Video generation failed");
    }

    #[test]
    fn test_blank_detail_falls_back() {
        let err = PaperflowError::rejection(502, Some("   ".into()));
        assert_eq!(err.user_message("Audio generation failed"), "Audio generation failed");
    }

    #[test]
    fn test_validation_describes_itself() {
        let err: PaperflowError = ValidationError::InvalidArxivReference {
            input: "not-a-paper".into(),
        }
        .into();
        assert!(err.user_message("ignored").contains("not-a-paper"));
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_timeout_display() {
        let err = PaperflowError::Timeout {
            stage: "video".into(),
            after: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("video"));
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_definition_error_stages() {
        let err = PipelineDefinitionError::new("Duplicate stage key 'audio'")
            .with_stages(vec!["audio".to_string()]);
        assert_eq!(err.stages, vec!["audio"]);
        assert_eq!(err.to_string(), "Duplicate stage key 'audio'");
    }
}

//! Stage and pipeline tables.

use super::FailurePolicy;
use crate::core::{AdvancePolicy, StageKind};
use crate::errors::{PaperflowError, PipelineDefinitionError};
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One row of a pipeline's stage table.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Unique key within the pipeline (`audio`, `video`, ...).
    pub key: String,
    /// The remote call.
    pub runner: Arc<dyn Stage>,
    /// Whether failure halts the pipeline.
    pub kind: StageKind,
    /// What happens after this stage resolves.
    pub advance: AdvancePolicy,
    /// Runs after the run is reported complete; must be optional.
    pub background: bool,
    /// Per-stage override of the orchestrator's stage timeout.
    pub timeout: Option<Duration>,
    /// Human label used in loading notices ("Generating audio...").
    pub label: String,
    /// Generic failure text when the backend sends no `detail`.
    pub failure_message: String,
    /// Success text when the stage output carries none.
    pub success_message: Option<String>,
    /// Loading text; defaults to "Generating {label}...".
    pub loading_message: Option<String>,
    /// Failure text when the call succeeded with nothing usable.
    pub empty_message: Option<String>,
}

impl StageSpec {
    /// Creates a required, auto-chaining stage.
    #[must_use]
    pub fn required(key: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            failure_message: format!("{key} generation failed"),
            key,
            runner,
            kind: StageKind::Required,
            advance: AdvancePolicy::AutoChain,
            background: false,
            timeout: None,
            success_message: None,
            loading_message: None,
            empty_message: None,
        }
    }

    /// Creates an optional, auto-chaining stage.
    #[must_use]
    pub fn optional(key: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        Self {
            kind: StageKind::Optional,
            ..Self::required(key, runner)
        }
    }

    /// Pauses after this stage until `advance()` is called.
    #[must_use]
    pub fn await_user(mut self) -> Self {
        self.advance = AdvancePolicy::AwaitUser;
        self
    }

    /// Runs this stage in the background after the run completes.
    #[must_use]
    pub fn in_background(mut self) -> Self {
        self.background = true;
        self
    }

    /// Sets a per-stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the generic failure message.
    #[must_use]
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    /// Sets the success message.
    #[must_use]
    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Sets the loading message.
    #[must_use]
    pub fn with_loading_message(mut self, message: impl Into<String>) -> Self {
        self.loading_message = Some(message.into());
        self
    }

    /// Sets the message shown when the stage returns an empty result.
    #[must_use]
    pub fn with_empty_message(mut self, message: impl Into<String>) -> Self {
        self.empty_message = Some(message.into());
        self
    }

    /// The loading notice text.
    #[must_use]
    pub fn loading_text(&self) -> String {
        self.loading_message
            .clone()
            .unwrap_or_else(|| format!("Generating {}...", self.label))
    }

    /// The notice text for a failed call.
    #[must_use]
    pub fn failure_text(&self, err: &PaperflowError) -> String {
        match (err, &self.empty_message) {
            (PaperflowError::EmptyResult { .. }, Some(message)) => message.clone(),
            _ => err.user_message(&self.failure_message),
        }
    }

    /// Returns true for required stages.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.kind.is_required()
    }
}

/// An ordered, validated stage table.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// The pipeline name (`media`, `podcast`, ...).
    pub name: String,
    /// Stages in execution order.
    pub stages: Vec<StageSpec>,
    /// What a required-stage failure does to the run.
    pub failure_policy: FailurePolicy,
    /// Emit `run.navigate` on the first completion of this pipeline.
    pub navigate_on_first_completion: bool,
}

impl PipelineSpec {
    /// Validates and creates a pipeline table.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank, there are no stages, a key
    /// repeats, or a background stage is required or followed by a
    /// foreground stage.
    pub fn new(
        name: impl Into<String>,
        stages: Vec<StageSpec>,
        failure_policy: FailurePolicy,
    ) -> Result<Self, PipelineDefinitionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PipelineDefinitionError::new(
                "Pipeline name cannot be empty or whitespace-only",
            ));
        }
        if stages.is_empty() {
            return Err(PipelineDefinitionError::new(format!(
                "Pipeline '{name}' has no stages"
            )));
        }

        let mut seen = HashSet::new();
        for stage in &stages {
            if stage.key.trim().is_empty() {
                return Err(PipelineDefinitionError::new("Stage key cannot be empty"));
            }
            if !seen.insert(stage.key.as_str()) {
                return Err(PipelineDefinitionError::new(format!(
                    "Duplicate stage key '{}'",
                    stage.key
                ))
                .with_stages(vec![stage.key.clone()]));
            }
        }

        if let Some(first_bg) = stages.iter().position(|s| s.background) {
            for stage in &stages[first_bg..] {
                if !stage.background {
                    return Err(PipelineDefinitionError::new(format!(
                        "Foreground stage '{}' cannot follow a background stage",
                        stage.key
                    ))
                    .with_stages(vec![stages[first_bg].key.clone(), stage.key.clone()]));
                }
                if stage.is_required() {
                    return Err(PipelineDefinitionError::new(format!(
                        "Background stage '{}' must be optional",
                        stage.key
                    ))
                    .with_stages(vec![stage.key.clone()]));
                }
            }
            if first_bg == 0 {
                return Err(PipelineDefinitionError::new(
                    "Pipeline needs at least one foreground stage",
                )
                .with_stages(vec![stages[0].key.clone()]));
            }
        }

        Ok(Self {
            name,
            stages,
            failure_policy,
            navigate_on_first_completion: false,
        })
    }

    /// Enables the first-completion navigation signal.
    #[must_use]
    pub fn navigate_on_first_completion(mut self) -> Self {
        self.navigate_on_first_completion = true;
        self
    }

    /// Returns the position of a stage key.
    #[must_use]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.key == key)
    }

    /// Returns a stage by key.
    #[must_use]
    pub fn stage(&self, key: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.key == key)
    }

    /// Stage keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.key.as_str()).collect()
    }

    /// Index one past the last foreground stage.
    #[must_use]
    pub fn foreground_len(&self) -> usize {
        self.stages
            .iter()
            .position(|s| s.background)
            .unwrap_or(self.stages.len())
    }
}

//! Fluent construction of pipeline tables.

use super::{FailurePolicy, PipelineSpec, StageSpec};
use crate::errors::PipelineDefinitionError;
use crate::stages::Stage;
use std::sync::Arc;

/// Builder for creating validated pipeline tables.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    failure_policy: FailurePolicy,
    navigate: bool,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            failure_policy: FailurePolicy::default(),
            navigate: false,
        }
    }

    /// Appends a required, auto-chaining stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is already in the table.
    pub fn required(self, key: impl Into<String>, runner: Arc<dyn Stage>) -> Result<Self, PipelineDefinitionError> {
        self.stage(StageSpec::required(key, runner))
    }

    /// Appends an optional, auto-chaining stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is already in the table.
    pub fn optional(self, key: impl Into<String>, runner: Arc<dyn Stage>) -> Result<Self, PipelineDefinitionError> {
        self.stage(StageSpec::optional(key, runner))
    }

    /// Appends a fully specified stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is already in the table.
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineDefinitionError> {
        if self.stages.iter().any(|s| s.key == spec.key) {
            return Err(PipelineDefinitionError::new(format!(
                "Duplicate stage key '{}'",
                spec.key
            ))
            .with_stages(vec![spec.key]));
        }
        self.stages.push(spec);
        Ok(self)
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Emits `run.navigate` on the first completion.
    #[must_use]
    pub fn navigate_on_first_completion(mut self) -> Self {
        self.navigate = true;
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table fails validation.
    pub fn build(self) -> Result<PipelineSpec, PipelineDefinitionError> {
        let spec = PipelineSpec::new(self.name, self.stages, self.failure_policy)?;
        Ok(if self.navigate {
            spec.navigate_on_first_completion()
        } else {
            spec
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStage;

    #[test]
    fn test_builder_orders_stages() {
        let spec = PipelineBuilder::new("storytelling")
            .required("script", Arc::new(MockStage::new("script")))
            .unwrap()
            .required("images", Arc::new(MockStage::new("images")))
            .unwrap()
            .failure_policy(FailurePolicy::RevertToIdle)
            .build()
            .unwrap();

        assert_eq!(spec.keys(), vec!["script", "images"]);
        assert_eq!(spec.failure_policy, FailurePolicy::RevertToIdle);
    }

    #[test]
    fn test_builder_duplicate_key() {
        let result = PipelineBuilder::new("p")
            .required("audio", Arc::new(MockStage::new("audio")))
            .unwrap()
            .optional("audio", Arc::new(MockStage::new("audio")));
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_empty_fails() {
        assert!(PipelineBuilder::new("p").build().is_err());
    }

    #[test]
    fn test_builder_navigation_flag() {
        let spec = PipelineBuilder::new("media")
            .required("audio", Arc::new(MockStage::new("audio")))
            .unwrap()
            .navigate_on_first_completion()
            .build()
            .unwrap();
        assert!(spec.navigate_on_first_completion);
    }
}

//! Stage trait and implementations.
//!
//! A stage is one remote generation call. The orchestrator decides when it
//! runs; the stage only turns a context into an output.

use crate::core::{ArtifactId, RunId, StageOutput};
use crate::errors::{PaperflowError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Everything a stage invocation can see.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// The paper being processed.
    pub artifact: ArtifactId,
    /// The run this invocation belongs to.
    pub run_id: RunId,
    /// The stage key being invoked.
    pub stage: String,
    /// Run-wide configuration passed to `start`.
    pub config: Arc<Value>,
    /// Results recorded by earlier stages of this run.
    pub results: HashMap<String, Value>,
}

impl StageContext {
    /// Creates a context with no config and no prior results.
    #[must_use]
    pub fn new(artifact: ArtifactId, stage: impl Into<String>) -> Self {
        Self {
            artifact,
            run_id: RunId::new(),
            stage: stage.into(),
            config: Arc::new(Value::Null),
            results: HashMap::new(),
        }
    }

    /// Sets the run configuration.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Adds a prior stage result.
    #[must_use]
    pub fn with_result(mut self, stage: impl Into<String>, value: Value) -> Self {
        self.results.insert(stage.into(), value);
        self
    }

    /// Decodes the run configuration. A missing config decodes as the
    /// type's defaults when it has them.
    pub fn config_as<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.config.is_null() {
            return Ok(T::default());
        }
        Ok(serde_json::from_value((*self.config).clone())?)
    }

    /// Decodes the recorded result of an earlier stage.
    pub fn prior_as<T: DeserializeOwned>(&self, stage: &str) -> Result<T> {
        let value = self
            .results
            .get(stage)
            .ok_or_else(|| PaperflowError::UnknownStage(format!("no result recorded for '{stage}'")))?;
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// One remote generation step.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Performs the remote call.
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput>;
}

/// A stage backed by an async closure.
pub struct FnStage<F, Fut> {
    name: String,
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageOutput>> + Send,
{
    /// Creates a new closure-backed stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for FnStage<F, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Stage for FnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageOutput>> + Send,
{
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        (self.func)(ctx.clone()).await
    }
}

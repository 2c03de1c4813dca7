//! One orchestrator per artifact.

use super::PipelineOrchestrator;
use crate::core::{ArtifactId, RunStatus};
use crate::errors::Result;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

type Factory = Arc<dyn Fn() -> PipelineOrchestrator + Send + Sync>;

/// Keeps an independent orchestrator for each artifact so that runs over
/// different papers never share a latch or a status.
#[derive(Clone)]
pub struct RunRegistry {
    factory: Factory,
    runs: Arc<DashMap<ArtifactId, PipelineOrchestrator>>,
}

impl RunRegistry {
    /// Creates a registry that builds orchestrators with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> PipelineOrchestrator + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            runs: Arc::new(DashMap::new()),
        }
    }

    /// Returns the orchestrator for `artifact`, creating it on first use.
    #[must_use]
    pub fn orchestrator_for(&self, artifact: &ArtifactId) -> PipelineOrchestrator {
        self.runs
            .entry(artifact.clone())
            .or_insert_with(|| (self.factory)())
            .clone()
    }

    /// Starts a run for `artifact` on its own orchestrator.
    ///
    /// # Errors
    ///
    /// As [`PipelineOrchestrator::start`].
    pub async fn start(&self, artifact: ArtifactId, config: Value) -> Result<RunStatus> {
        let orchestrator = self.orchestrator_for(&artifact);
        orchestrator.start(artifact, config).await
    }

    /// Status of the run for `artifact`, if one exists.
    #[must_use]
    pub fn status(&self, artifact: &ArtifactId) -> Option<RunStatus> {
        self.runs.get(artifact).map(|o| o.status())
    }

    /// Resets and forgets the run for `artifact`.
    pub fn remove(&self, artifact: &ArtifactId) {
        if let Some((_, orchestrator)) = self.runs.remove(artifact) {
            orchestrator.reset();
        }
    }

    /// Number of tracked artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl std::fmt::Debug for RunRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRegistry").field("runs", &self.runs.len()).finish()
    }
}

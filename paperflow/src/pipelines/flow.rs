//! Upload a paper, then run a pipeline over it.

use crate::api::{Ingestor, PaperSource};
use crate::core::{ArtifactId, RunStatus};
use crate::errors::Result;
use crate::pipeline::{PipelineOrchestrator, RunRegistry};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Ingest plus one pipeline, with an independent run per paper.
///
/// Only the most recently uploaded paper keeps its run; a new upload
/// resets and forgets the previous one.
#[derive(Debug, Clone)]
pub struct PaperFlow {
    ingestor: Ingestor,
    runs: RunRegistry,
    current: Arc<Mutex<Option<ArtifactId>>>,
}

impl PaperFlow {
    /// Creates a flow. `runs` decides which pipeline is started.
    #[must_use]
    pub fn new(ingestor: Ingestor, runs: RunRegistry) -> Self {
        Self {
            ingestor,
            runs,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Ingests `source` and starts the pipeline over the new artifact.
    ///
    /// # Errors
    ///
    /// Whatever ingest raises (nothing is started then), or the
    /// orchestrator's start errors.
    pub async fn run<T: Serialize>(&self, source: &PaperSource, config: &T) -> Result<(ArtifactId, RunStatus)> {
        let artifact = self.ingestor.ingest(source).await?;
        let config = serde_json::to_value(config)?;
        let replaced = self.current.lock().replace(artifact.clone());
        if let Some(previous) = replaced.filter(|previous| *previous != artifact) {
            debug!(artifact = %previous, "forgetting run of replaced paper");
            self.runs.remove(&previous);
        }
        info!(artifact = %artifact, "starting pipeline for uploaded paper");
        let status = self.runs.start(artifact.clone(), config).await?;
        Ok((artifact, status))
    }

    /// The orchestrator for an already-ingested paper.
    #[must_use]
    pub fn orchestrator_for(&self, artifact: &ArtifactId) -> PipelineOrchestrator {
        self.runs.orchestrator_for(artifact)
    }

    /// The most recently uploaded paper.
    #[must_use]
    pub fn current(&self) -> Option<ArtifactId> {
        self.current.lock().clone()
    }

    /// Per-paper runs.
    #[must_use]
    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }
}

//! Mind map from an arXiv paper or a local file.
//!
//! Unlike the other pipelines the mind map does not need an uploaded paper:
//! the source itself is the artifact. Each generation replaces the last.

use crate::api::{validate_mindmap_source, Mindmap, MindmapRequest, MindmapSource, PaperApi};
use crate::config::ComplexityLevel;
use crate::core::{ArtifactId, RunStatus, StageOutput};
use crate::errors::{PipelineDefinitionError, Result, ValidationError};
use crate::notify::{Notification, Notifier};
use crate::pipeline::{PipelineBuilder, PipelineOrchestrator, PipelineSpec, RunSnapshot, StageSpec};
use crate::stages::{Stage, StageContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Pipeline name.
pub const MINDMAP_PIPELINE: &str = "mindmap";
/// The only stage.
pub const MINDMAP: &str = "mindmap";

/// Run configuration for the mind-map pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapConfig {
    /// What to map.
    pub source: Option<MindmapSource>,
    /// Reader level; applies to arXiv sources.
    #[serde(default)]
    pub complexity_level: ComplexityLevel,
}

struct MindmapStage {
    api: Arc<dyn PaperApi>,
}

opaque_debug!(MindmapStage);

#[async_trait]
impl Stage for MindmapStage {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        let config: MindmapConfig = ctx.config_as()?;
        let mindmap = match config.source {
            Some(MindmapSource::Arxiv { arxiv_url }) => {
                let request = MindmapRequest {
                    arxiv_url: arxiv_url.trim().to_string(),
                    complexity_level: config.complexity_level,
                };
                self.api.generate_mindmap(&request).await?
            }
            Some(MindmapSource::File { path, title }) => self.api.generate_mindmap_from_file(&path, title).await?,
            None => return Err(ValidationError::EmptyInput("an arXiv URL").into()),
        };
        StageOutput::typed(&mindmap)
    }
}

/// Builds the mind-map stage table. The run config is a [`MindmapConfig`].
///
/// # Errors
///
/// Only if the table itself is malformed.
pub fn mindmap_pipeline(api: Arc<dyn PaperApi>) -> std::result::Result<PipelineSpec, PipelineDefinitionError> {
    PipelineBuilder::new(MINDMAP_PIPELINE)
        .stage(
            StageSpec::required(MINDMAP, Arc::new(MindmapStage { api }))
                .with_label("mind map")
                .with_success_message("Mind map generated successfully!")
                .with_failure_message("Failed to generate mind map"),
        )?
        .build()
}

/// Validates a source and generates its mind map.
#[derive(Clone)]
pub struct MindmapFlow {
    orchestrator: PipelineOrchestrator,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for MindmapFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MindmapFlow")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl MindmapFlow {
    /// Wraps an orchestrator running [`mindmap_pipeline`]. Validation
    /// failures are reported to `notifier`.
    pub fn new(orchestrator: PipelineOrchestrator, notifier: Arc<dyn Notifier>) -> Self {
        Self { orchestrator, notifier }
    }

    /// Generates a mind map for `source`, replacing any finished one.
    ///
    /// Invalid input raises one error notification and never reaches the
    /// network.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, `AlreadyRunning` while a map is being
    /// generated.
    pub async fn generate(&self, source: MindmapSource, complexity_level: ComplexityLevel) -> Result<RunStatus> {
        let source = match source {
            MindmapSource::File { path, title } => MindmapSource::File {
                path,
                title: title.filter(|t| !t.trim().is_empty()),
            },
            arxiv => arxiv,
        };
        if let Err(err) = validate_mindmap_source(&source) {
            warn!(source = %source.label(), error = %err, "rejected mind-map source");
            self.notifier
                .notify(Notification::error(err.to_string()).with_stage(MINDMAP));
            return Err(err.into());
        }
        let artifact = ArtifactId::new(source.label())?;

        if self.orchestrator.status().is_terminal() {
            self.orchestrator.reset();
        }
        info!(artifact = %artifact, "generating mind map");
        let config = MindmapConfig {
            source: Some(source),
            complexity_level,
        };
        self.orchestrator.start_with(artifact, &config).await
    }

    /// The last generated map, if any.
    ///
    /// # Errors
    ///
    /// `Serialization` if the recorded result has an unexpected shape.
    pub fn mindmap(&self) -> Result<Option<Mindmap>> {
        self.orchestrator.result_as(MINDMAP)
    }

    /// Read model of the current run.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.orchestrator.snapshot()
    }
}

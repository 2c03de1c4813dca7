//! Slide deck: build on the backend, then list the rendered pages.
//!
//! The deck is generated automatically the first time its view opens.
//! [`SlideFlow::ensure_generated`] makes that trigger safe to call on every
//! render.

use crate::api::{slide_image_path, PaperApi};
use crate::core::{ArtifactId, RunStatus, StageOutput};
use crate::errors::{PipelineDefinitionError, Result};
use crate::pipeline::{PipelineBuilder, PipelineOrchestrator, PipelineSpec, RunSnapshot, StageSpec};
use crate::stages::{Stage, StageContext};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Pipeline name.
pub const SLIDES_PIPELINE: &str = "slides";
/// The only stage.
pub const SLIDES: &str = "slides";

struct SlideDeck {
    api: Arc<dyn PaperApi>,
}

opaque_debug!(SlideDeck);

#[async_trait]
impl Stage for SlideDeck {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        self.api.generate_slides(&ctx.artifact).await?;
        let preview = self.api.get_slide_preview(&ctx.artifact).await?;
        let urls: Vec<String> = preview
            .images
            .iter()
            .map(|image| self.api.resolve_url(&slide_image_path(&ctx.artifact, image)))
            .collect();
        debug!(artifact = %ctx.artifact, slides = urls.len(), "slide preview resolved");
        let count = urls.len();
        Ok(StageOutput::typed(&urls)?.with_message(format!("{count} slides ready")))
    }
}

/// Builds the slide stage table.
///
/// # Errors
///
/// Only if the table itself is malformed.
pub fn slides_pipeline(api: Arc<dyn PaperApi>) -> std::result::Result<PipelineSpec, PipelineDefinitionError> {
    PipelineBuilder::new(SLIDES_PIPELINE)
        .stage(StageSpec::required(SLIDES, Arc::new(SlideDeck { api })).with_failure_message("Failed to generate slides"))?
        .build()
}

/// Auto-triggered slide generation.
#[derive(Debug, Clone)]
pub struct SlideFlow {
    orchestrator: PipelineOrchestrator,
}

impl SlideFlow {
    /// Wraps an orchestrator running [`slides_pipeline`].
    #[must_use]
    pub fn new(orchestrator: PipelineOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Generates the deck unless a run already exists.
    ///
    /// Returns `None` when nothing was started.
    ///
    /// # Errors
    ///
    /// `Cancelled` if a reset lands mid-run.
    pub async fn ensure_generated(&self, artifact: ArtifactId) -> Result<Option<RunStatus>> {
        self.orchestrator.ensure_started(artifact, Value::Null).await
    }

    /// Current view.
    ///
    /// # Errors
    ///
    /// `Serialization` if the recorded result has an unexpected shape.
    pub fn view(&self) -> Result<SlideView> {
        SlideView::from_snapshot(&self.orchestrator.snapshot())
    }

    /// The underlying orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.orchestrator
    }
}

/// What the slide view renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlideView {
    /// Full image URLs in deck order.
    pub images: Vec<String>,
    /// Generation is in flight.
    pub generating: bool,
}

impl SlideView {
    /// Projects a run snapshot.
    ///
    /// # Errors
    ///
    /// `Serialization` if the recorded result has an unexpected shape.
    pub fn from_snapshot(snapshot: &RunSnapshot) -> Result<Self> {
        Ok(Self {
            images: snapshot.result_as(SLIDES)?.unwrap_or_default(),
            generating: snapshot.status.is_active(),
        })
    }
}

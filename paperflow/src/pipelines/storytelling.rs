//! Visual storytelling: script, images, narration, video.
//!
//! Four required stages in strict sequence. Any failure abandons the whole
//! run and returns to idle; the failure log survives the revert.

use crate::api::{PaperApi, StorytellingRequest, StorytellingStep};
use crate::core::StageOutput;
use crate::errors::{PipelineDefinitionError, Result};
use crate::pipeline::{FailurePolicy, PipelineBuilder, PipelineSpec, RunSnapshot, StageSpec};
use crate::stages::{Stage, StageContext};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Pipeline name.
pub const STORYTELLING_PIPELINE: &str = "storytelling";

/// Shown for any failure without a backend `detail`.
const FAILURE_MESSAGE: &str = "Failed to generate video";

struct StoryStep {
    api: Arc<dyn PaperApi>,
    step: StorytellingStep,
}

opaque_debug!(StoryStep);

fn scene_count(script: Option<&Value>) -> usize {
    script
        .and_then(|s| s.get("scenes"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

#[async_trait]
impl Stage for StoryStep {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        let request: StorytellingRequest = ctx.config_as()?;
        let response = self.api.storytelling(&ctx.artifact, self.step, &request).await?;

        Ok(match self.step {
            StorytellingStep::Script => {
                let scenes = scene_count(response.script_data.as_ref());
                StageOutput::ok(response.script_data.unwrap_or(Value::Null))
                    .with_message(format!("Script ready! {scenes} scenes created"))
            }
            StorytellingStep::Images => {
                let count = response.image_count.unwrap_or(0);
                StageOutput::ok(json!(count)).with_message(format!("{count} images generated!"))
            }
            StorytellingStep::Audio => StageOutput::ok_empty().with_message("Audio narration ready!"),
            StorytellingStep::Video => {
                // The player only needs something truthy when the backend omits the path.
                let path = response
                    .video_path
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| "generated".to_string());
                StageOutput::ok(json!(path)).with_message("Visual storytelling video complete!")
            }
        })
    }
}

fn loading_message(step: StorytellingStep) -> &'static str {
    match step {
        StorytellingStep::Script => "Generating narrative script...",
        StorytellingStep::Images => "Generating scene images...",
        StorytellingStep::Audio => "Generating narration audio...",
        StorytellingStep::Video => "Creating cinematic video...",
    }
}

/// Builds the storytelling stage table. The run config is a
/// [`StorytellingRequest`].
///
/// # Errors
///
/// Only if the table itself is malformed.
pub fn storytelling_pipeline(api: Arc<dyn PaperApi>) -> std::result::Result<PipelineSpec, PipelineDefinitionError> {
    StorytellingStep::ALL
        .into_iter()
        .try_fold(PipelineBuilder::new(STORYTELLING_PIPELINE), |builder, step| {
            builder.stage(
                StageSpec::required(step.as_str(), Arc::new(StoryStep { api: api.clone(), step }))
                    .with_loading_message(loading_message(step))
                    .with_failure_message(FAILURE_MESSAGE),
            )
        })?
        .failure_policy(FailurePolicy::RevertToIdle)
        .build()
}

/// What the storytelling view renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorytellingView {
    /// Scene script.
    pub script: Option<Value>,
    /// Scenes in the script.
    pub scene_count: usize,
    /// Generated images.
    pub image_count: u32,
    /// The finished video.
    pub video_path: Option<String>,
}

impl StorytellingView {
    /// Projects a run snapshot.
    ///
    /// # Errors
    ///
    /// `Serialization` if a recorded result has an unexpected shape.
    pub fn from_snapshot(snapshot: &RunSnapshot) -> Result<Self> {
        let script = snapshot
            .results
            .get(StorytellingStep::Script.as_str())
            .filter(|v| !v.is_null())
            .cloned();
        Ok(Self {
            scene_count: scene_count(script.as_ref()),
            script,
            image_count: snapshot
                .result_as(StorytellingStep::Images.as_str())?
                .unwrap_or(0),
            video_path: snapshot.result_as(StorytellingStep::Video.as_str())?,
        })
    }

    /// The video is ready to play.
    #[must_use]
    pub fn has_video(&self) -> bool {
        self.video_path.is_some()
    }
}

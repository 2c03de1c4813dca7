//! Podcast: narration script, dialogue, then voiced dialogue.
//!
//! The dialogue is shown as soon as it exists. Voicing runs in the
//! background after the run completes and only upgrades the view; its
//! failure never fails the run.

use crate::api::{DialogueLine, DialogueRequest, PaperApi, PodcastAudioFile};
use crate::core::StageOutput;
use crate::errors::{PaperflowError, PipelineDefinitionError, Result};
use crate::pipeline::{PipelineBuilder, PipelineSpec, RunSnapshot, StageSpec};
use crate::playback::AudioSegment;
use crate::stages::{Stage, StageContext};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Pipeline name.
pub const PODCAST_PIPELINE: &str = "podcast";
/// Narration script stage.
pub const SCRIPT: &str = "script";
/// Dialogue stage.
pub const DIALOGUE: &str = "dialogue";
/// Background voicing stage.
pub const AUDIO: &str = "audio";

struct NarrationScript {
    api: Arc<dyn PaperApi>,
}

#[async_trait]
impl Stage for NarrationScript {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        let script = self.api.generate_script(&ctx.artifact).await?;
        StageOutput::typed(&script.sections_scripts)
    }
}

struct Dialogue {
    api: Arc<dyn PaperApi>,
}

#[async_trait]
impl Stage for Dialogue {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        let request: DialogueRequest = ctx.config_as()?;
        let response = self
            .api
            .generate_podcast_dialogue(&ctx.artifact, &request)
            .await?;
        let count = response.dialogue.len();
        Ok(StageOutput::typed(&response.dialogue)?.with_message(format!("Podcast script ready! {count} segments")))
    }
}

struct DialogueAudio {
    api: Arc<dyn PaperApi>,
}

#[async_trait]
impl Stage for DialogueAudio {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        let response = self.api.generate_podcast_audio(&ctx.artifact).await?;
        if response.audio_files.is_empty() {
            return Err(PaperflowError::EmptyResult {
                stage: ctx.stage.clone(),
            });
        }
        let count = response.audio_files.len();
        Ok(StageOutput::typed(&response.audio_files)?.with_message(format!("Audio ready! {count} files generated")))
    }
}

opaque_debug!(NarrationScript, Dialogue, DialogueAudio);

/// Builds the podcast stage table. The run config is a
/// [`DialogueRequest`].
///
/// # Errors
///
/// Only if the table itself is malformed.
pub fn podcast_pipeline(api: Arc<dyn PaperApi>) -> std::result::Result<PipelineSpec, PipelineDefinitionError> {
    PipelineBuilder::new(PODCAST_PIPELINE)
        .stage(
            StageSpec::required(SCRIPT, Arc::new(NarrationScript { api: api.clone() }))
                .with_label("scripts")
                .with_success_message("Scripts ready")
                .with_failure_message("Failed to generate podcast"),
        )?
        .stage(
            StageSpec::required(DIALOGUE, Arc::new(Dialogue { api: api.clone() }))
                .with_loading_message("Creating podcast dialogue...")
                .with_failure_message("Failed to generate podcast"),
        )?
        .stage(
            StageSpec::optional(AUDIO, Arc::new(DialogueAudio { api }))
                .in_background()
                .with_loading_message("Generating audio in background...")
                .with_failure_message("Audio unavailable - showing script only")
                .with_empty_message("Audio generation failed - script only mode"),
        )?
        .build()
}

/// What the podcast view renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PodcastView {
    /// Dialogue in turn order.
    pub dialogue: Vec<DialogueLine>,
    /// Voiced segments, once ready.
    pub audio_files: Vec<PodcastAudioFile>,
    /// Voiced segments exist.
    pub has_audio: bool,
    /// Voicing is still running.
    pub audio_pending: bool,
}

impl PodcastView {
    /// Projects a run snapshot.
    ///
    /// # Errors
    ///
    /// `Serialization` if a recorded result has an unexpected shape.
    pub fn from_snapshot(snapshot: &RunSnapshot) -> Result<Self> {
        let dialogue: Vec<DialogueLine> = snapshot.result_as(DIALOGUE)?.unwrap_or_default();
        let audio_files: Vec<PodcastAudioFile> = snapshot.result_as(AUDIO)?.unwrap_or_default();
        Ok(Self {
            dialogue,
            has_audio: !audio_files.is_empty(),
            audio_files,
            audio_pending: snapshot.is_pending(AUDIO),
        })
    }

    /// One-line description of what is available.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.has_audio {
            format!(
                "{} audio segments • {} script segments",
                self.audio_files.len(),
                self.dialogue.len()
            )
        } else {
            format!("{} script segments (audio pending)", self.dialogue.len())
        }
    }

    /// The voiced dialogue as a playlist.
    pub fn segments<F>(&self, resolve: F) -> Vec<AudioSegment>
    where
        F: Fn(&str) -> String,
    {
        AudioSegment::from_podcast_files(&self.audio_files, resolve)
    }
}

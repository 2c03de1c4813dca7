//! Narrated media: audio, then video, in one click.
//!
//! The video stage chains straight off the audio stage. The first run that
//! completes signals navigation to the results view; later re-runs do not.

use crate::api::{AudioRequest, PaperApi, VideoRequest};
use crate::core::StageOutput;
use crate::errors::{PipelineDefinitionError, Result};
use crate::pipeline::{PipelineBuilder, PipelineSpec, RunSnapshot, StageSpec};
use crate::playback::AudioSegment;
use crate::stages::{Stage, StageContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Pipeline name.
pub const MEDIA_PIPELINE: &str = "media";
/// Narration audio stage.
pub const AUDIO: &str = "audio";
/// Narrated video stage.
pub const VIDEO: &str = "video";

/// Run configuration for the media pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Sent to the audio endpoint.
    #[serde(default)]
    pub audio: AudioRequest,
    /// Sent to the video endpoint.
    #[serde(default)]
    pub video: VideoRequest,
}

impl MediaConfig {
    /// Default voices, narrated and rendered in `language`.
    #[must_use]
    pub fn for_language(language: impl Into<String>) -> Self {
        let language = language.into();
        Self {
            audio: AudioRequest::default().with_language(language.clone()),
            video: VideoRequest {
                selected_language: language,
                background_music_file: None,
            },
        }
    }
}

struct NarrationAudio {
    api: Arc<dyn PaperApi>,
}

#[async_trait]
impl Stage for NarrationAudio {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        let config: MediaConfig = ctx.config_as()?;
        let media = self.api.generate_audio(&ctx.artifact, &config.audio).await?;
        StageOutput::typed(&media.audio_files)
    }
}

struct NarratedVideo {
    api: Arc<dyn PaperApi>,
}

#[async_trait]
impl Stage for NarratedVideo {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        let config: MediaConfig = ctx.config_as()?;
        let media = self.api.generate_video(&ctx.artifact, &config.video).await?;
        Ok(match media.video_path {
            Some(path) => StageOutput::ok(json!(path)),
            None => StageOutput::ok_empty(),
        })
    }
}

opaque_debug!(NarrationAudio, NarratedVideo);

/// Builds the media stage table.
///
/// # Errors
///
/// Only if the table itself is malformed.
pub fn media_pipeline(api: Arc<dyn PaperApi>) -> std::result::Result<PipelineSpec, PipelineDefinitionError> {
    PipelineBuilder::new(MEDIA_PIPELINE)
        .stage(
            StageSpec::required(AUDIO, Arc::new(NarrationAudio { api: api.clone() }))
                .with_success_message("Audio ready – generating video…")
                .with_failure_message("Audio generation failed"),
        )?
        .stage(
            StageSpec::required(VIDEO, Arc::new(NarratedVideo { api }))
                .with_success_message("Video created successfully!")
                .with_failure_message("Video generation failed"),
        )?
        .navigate_on_first_completion()
        .build()
}

/// What the media view renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaView {
    /// Narration files.
    pub audio_files: Vec<String>,
    /// The video, once built.
    pub video_path: Option<String>,
    /// At least one narration file exists.
    pub has_audio_files: bool,
    /// A non-blank video path exists.
    pub has_video_path: bool,
    /// Both of the above.
    pub media_generated: bool,
}

impl MediaView {
    /// Projects a run snapshot.
    ///
    /// # Errors
    ///
    /// `Serialization` if a recorded result has an unexpected shape.
    pub fn from_snapshot(snapshot: &RunSnapshot) -> Result<Self> {
        let audio_files: Vec<String> = snapshot.result_as(AUDIO)?.unwrap_or_default();
        let video_path: Option<String> = snapshot.result_as::<Option<String>>(VIDEO)?.flatten();

        let has_audio_files = !audio_files.is_empty();
        let has_video_path = video_path.as_deref().is_some_and(|p| !p.trim().is_empty());
        Ok(Self {
            audio_files,
            video_path,
            has_audio_files,
            has_video_path,
            media_generated: has_audio_files && has_video_path,
        })
    }

    /// The narration files as a playlist.
    pub fn playlist<F>(&self, resolve: F) -> Vec<AudioSegment>
    where
        F: Fn(&str) -> String,
    {
        AudioSegment::from_paths(&self.audio_files, resolve)
    }
}

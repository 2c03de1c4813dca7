//! # Paperflow
//!
//! Staged generation of media from research papers.
//!
//! A paper is ingested once and becomes an artifact. Each content type
//! (narrated video, podcast, visual story, slides, mind map) is a fixed
//! table of remote generation stages run by one generic orchestrator:
//!
//! - **One run at a time**: every stage is guarded by a per-run latch, so a
//!   repeated trigger never issues a second remote call
//! - **Required and optional stages**: a required failure stops the run, an
//!   optional one only raises a notice
//! - **Explicit failure policy**: keep partial results and retry, or revert
//!   to idle
//! - **Playback**: a sequencer that keeps exactly one audio stream alive and
//!   advances through a playlist
//! - **Downloads**: generated videos, slide decks and podcast segments saved
//!   to disk, one notice per file
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paperflow::prelude::*;
//!
//! let api: Arc<dyn PaperApi> = Arc::new(HttpPaperApi::new(&config.api)?);
//! let orchestrator = PipelineOrchestrator::builder(media_pipeline(api)?)
//!     .with_config(&config.orchestrator)
//!     .build();
//!
//! let status = orchestrator
//!     .start_with(artifact, &MediaConfig::for_language("Hindi"))
//!     .await?;
//! let view = MediaView::from_snapshot(&orchestrator.snapshot())?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod api;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod download;
pub mod errors;
pub mod events;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod pipelines;
pub mod playback;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "http")]
    pub use crate::api::HttpPaperApi;
    pub use crate::api::{DownloadTarget, Ingestor, MindmapSource, PaperApi, PaperSource};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ComplexityLevel, PaperflowConfig};
    pub use crate::core::{ArtifactId, RunId, RunStatus, StageKind, StageOutput};
    pub use crate::download::{DownloadReport, Downloader};
    pub use crate::errors::{PaperflowError, PipelineDefinitionError, Result, ValidationError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::notify::{Notification, NotificationLog, Notifier, TracingNotifier};
    pub use crate::pipeline::{
        FailurePolicy, PipelineBuilder, PipelineOrchestrator, PipelineSpec, RunRegistry, RunSnapshot,
        StageSpec,
    };
    pub use crate::pipelines::{
        media_pipeline, mindmap_pipeline, podcast_pipeline, slides_pipeline, storytelling_pipeline,
        MediaConfig, MediaView, MindmapFlow, PaperFlow, PodcastView, SlideFlow, SlideView,
        StorytellingView,
    };
    pub use crate::playback::{AudioBackend, AudioSegment, PlaybackSequencer, PlayerHandle};
    pub use crate::stages::{Stage, StageContext};
    pub use std::sync::Arc;
}

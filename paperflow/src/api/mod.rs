//! The remote generation API.
//!
//! [`PaperApi`] is the seam between the orchestrator and the backend. The
//! HTTP implementation lives behind the `http` feature; tests use the
//! scripted double in [`crate::testing`].

#[cfg(feature = "http")]
mod client;
mod ingest;
mod models;
mod validation;

#[cfg(feature = "http")]
pub use client::HttpPaperApi;
pub use ingest::Ingestor;
pub use models::{
    AudioRequest, DialogueLine, DialogueRequest, DialogueResponse, MediaResponse, Mindmap,
    MindmapMetadata, MindmapRequest, MindmapSource, PaperMetadata, PaperResponse, PaperSource,
    PodcastAudioFile, PodcastAudioResponse, ScriptResponse, SlidePreview, StorytellingRequest,
    StorytellingResponse, VideoRequest, DEFAULT_VOICE, SUPPORTED_LANGUAGES,
};
pub use validation::{
    validate_arxiv_reference, validate_file, validate_mindmap_source, validate_paper_source,
    LATEX_ARCHIVE_EXTENSIONS, MINDMAP_FILE_EXTENSIONS, PDF_EXTENSIONS,
};

use crate::core::ArtifactId;
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// The four steps of the visual-storytelling backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorytellingStep {
    /// Scene script.
    Script,
    /// One image per scene.
    Images,
    /// Scene narration.
    Audio,
    /// Final cut.
    Video,
}

impl StorytellingStep {
    /// All steps in pipeline order.
    pub const ALL: [Self; 4] = [Self::Script, Self::Images, Self::Audio, Self::Video];

    /// The stage key and route suffix.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Images => "images",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for StorytellingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calls the generation backend.
///
/// Every method may fail with `Transport` or `RemoteRejection`; a
/// rejection carries the backend's `detail` message when one was sent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaperApi: Send + Sync {
    /// Scrapes a paper from arXiv.
    async fn upload_arxiv(&self, reference: &str) -> Result<PaperResponse>;

    /// Uploads a PDF.
    async fn upload_pdf(&self, path: &Path) -> Result<PaperResponse>;

    /// Uploads a zipped LaTeX source tree.
    async fn upload_latex_zip(&self, path: &Path) -> Result<PaperResponse>;

    /// Generates the narration script.
    async fn generate_script(&self, paper: &ArtifactId) -> Result<ScriptResponse>;

    /// Generates podcast dialogue.
    async fn generate_podcast_dialogue(&self, paper: &ArtifactId, request: &DialogueRequest) -> Result<DialogueResponse>;

    /// Voices the podcast dialogue.
    async fn generate_podcast_audio(&self, paper: &ArtifactId) -> Result<PodcastAudioResponse>;

    /// Voices the narration script.
    async fn generate_audio(&self, paper: &ArtifactId, request: &AudioRequest) -> Result<MediaResponse>;

    /// Renders the narrated video.
    async fn generate_video(&self, paper: &ArtifactId, request: &VideoRequest) -> Result<MediaResponse>;

    /// Builds the slide deck.
    async fn generate_slides(&self, paper: &ArtifactId) -> Result<()>;

    /// Lists slide images.
    async fn get_slide_preview(&self, paper: &ArtifactId) -> Result<SlidePreview>;

    /// Generates a mind map from arXiv.
    async fn generate_mindmap(&self, request: &MindmapRequest) -> Result<Mindmap>;

    /// Generates a mind map from an uploaded file.
    async fn generate_mindmap_from_file(&self, path: &Path, title: Option<String>) -> Result<Mindmap>;

    /// Runs one visual-storytelling step.
    async fn storytelling(
        &self,
        paper: &ArtifactId,
        step: StorytellingStep,
        request: &StorytellingRequest,
    ) -> Result<StorytellingResponse>;

    /// Fetches the raw bytes at a backend-relative path or absolute URL.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Resolves a backend-relative path (`/static/...`) to a full URL.
    fn resolve_url(&self, path: &str) -> String;
}

/// A generated file the backend serves as an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadTarget {
    /// The narrated video.
    NarratedVideo,
    /// The visual-storytelling video.
    StorytellingVideo,
    /// The compiled slide deck.
    SlidesPdf,
    /// The slide deck's LaTeX source.
    SlidesLatex,
}

impl DownloadTarget {
    /// Backend path of the attachment.
    #[must_use]
    pub fn path(self, paper: &ArtifactId) -> String {
        match self {
            Self::NarratedVideo => format!("/api/media/{paper}/download-video"),
            Self::StorytellingVideo => format!("/api/visual-storytelling/{paper}/download-storytelling-video"),
            Self::SlidesPdf => format!("/api/slides/{paper}/download"),
            Self::SlidesLatex => format!("/api/slides/{paper}/download-latex"),
        }
    }

    /// Name the file is saved under.
    #[must_use]
    pub fn file_name(self, paper: &ArtifactId) -> String {
        match self {
            Self::NarratedVideo => format!("video_{paper}.mp4"),
            Self::StorytellingVideo => format!("storytelling_{paper}.mp4"),
            Self::SlidesPdf => format!("slides_{paper}.pdf"),
            Self::SlidesLatex => format!("slides_{paper}.tex"),
        }
    }
}

/// Backend path of one slide image.
#[must_use]
pub fn slide_image_path(paper: &ArtifactId, image: &str) -> String {
    format!("/api/slides/{paper}/{image}")
}

/// Joins a backend origin and a path, tolerating slashes on either side.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://localhost:8000/", "/static/a.mp3"), "http://localhost:8000/static/a.mp3");
        assert_eq!(join_url("http://localhost:8000", "static/a.mp3"), "http://localhost:8000/static/a.mp3");
        assert_eq!(join_url("http://x", "https://cdn/a.mp3"), "https://cdn/a.mp3");
    }

    #[test]
    fn test_storytelling_steps_in_order() {
        let keys: Vec<_> = StorytellingStep::ALL.iter().map(StorytellingStep::as_str).collect();
        assert_eq!(keys, vec!["script", "images", "audio", "video"]);
    }

    #[test]
    fn test_download_targets() {
        let paper = ArtifactId::new("p1").unwrap();
        assert_eq!(DownloadTarget::SlidesLatex.path(&paper), "/api/slides/p1/download-latex");
        assert_eq!(
            DownloadTarget::StorytellingVideo.path(&paper),
            "/api/visual-storytelling/p1/download-storytelling-video"
        );
        assert_eq!(DownloadTarget::SlidesPdf.file_name(&paper), "slides_p1.pdf");
        assert_eq!(DownloadTarget::StorytellingVideo.file_name(&paper), "storytelling_p1.mp4");
    }

    #[test]
    fn test_slide_image_url() {
        let mut api = MockPaperApi::new();
        api.expect_resolve_url()
            .returning(|path| join_url("http://localhost:8000", path));
        let paper = ArtifactId::new("p1").unwrap();
        assert_eq!(
            api.resolve_url(&slide_image_path(&paper, "slide_1.png")),
            "http://localhost:8000/api/slides/p1/slide_1.png"
        );
    }
}

//! `reqwest` implementation of [`PaperApi`].

use super::models::{
    AudioRequest, DialogueRequest, DialogueResponse, MediaResponse, Mindmap, MindmapRequest,
    PaperResponse, PodcastAudioResponse, ScriptResponse, SlidePreview, StorytellingRequest,
    StorytellingResponse, VideoRequest,
};
use super::{join_url, PaperApi, StorytellingStep};
use crate::config::ApiConfig;
use crate::core::ArtifactId;
use crate::errors::{PaperflowError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Error body sent by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// Extracts the `detail` message from an error body, if there is one.
fn parse_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(detail) => Some(detail),
        serde_json::Value::Null => None,
        // Validation failures arrive as a list of objects.
        other => Some(other.to_string()),
    }
}

/// HTTP client for the generation backend.
#[derive(Debug, Clone)]
pub struct HttpPaperApi {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpPaperApi {
    /// Creates a client from API settings.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PaperflowError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The backend origin.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = parse_detail(&body);
        warn!(status = status.as_u16(), detail = ?detail, "backend rejected request");
        Err(PaperflowError::rejection(status.as_u16(), detail))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(url = %url, "POST");
        let response = self.http_client.post(&url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        debug!(url = %url, "POST");
        let response = self.http_client.post(&url).send().await?;
        Self::decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        debug!(url = %url, "GET");
        let response = self.http_client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn file_part(path: &Path, mime: &str) -> Result<Part> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Part::bytes(bytes).file_name(name).mime_str(mime)?)
    }

    async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let url = self.endpoint(path);
        debug!(url = %url, "POST multipart");
        let response = self.http_client.post(&url).multipart(form).send().await?;
        Self::decode(response).await
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("tex" | "latex") => "application/x-tex",
        _ => "application/octet-stream",
    }
}

#[derive(Serialize)]
struct ArxivBody<'a> {
    arxiv_url: &'a str,
}

#[async_trait]
impl PaperApi for HttpPaperApi {
    async fn upload_arxiv(&self, reference: &str) -> Result<PaperResponse> {
        self.post_json("/papers/scrape-arxiv", &ArxivBody { arxiv_url: reference })
            .await
    }

    async fn upload_pdf(&self, path: &Path) -> Result<PaperResponse> {
        let form = Form::new().part("file", Self::file_part(path, mime_for(path)).await?);
        self.post_multipart("/papers/upload-pdf", form).await
    }

    async fn upload_latex_zip(&self, path: &Path) -> Result<PaperResponse> {
        let form = Form::new().part("file", Self::file_part(path, mime_for(path)).await?);
        self.post_multipart("/papers/upload-zip", form).await
    }

    async fn generate_script(&self, paper: &ArtifactId) -> Result<ScriptResponse> {
        self.post_empty(&format!("/scripts/{paper}/generate")).await
    }

    async fn generate_podcast_dialogue(&self, paper: &ArtifactId, request: &DialogueRequest) -> Result<DialogueResponse> {
        self.post_json(&format!("/podcast/{paper}/generate-script"), request)
            .await
    }

    async fn generate_podcast_audio(&self, paper: &ArtifactId) -> Result<PodcastAudioResponse> {
        self.post_empty(&format!("/podcast/{paper}/generate-audio")).await
    }

    async fn generate_audio(&self, paper: &ArtifactId, request: &AudioRequest) -> Result<MediaResponse> {
        self.post_json(&format!("/media/{paper}/generate-audio"), request)
            .await
    }

    async fn generate_video(&self, paper: &ArtifactId, request: &VideoRequest) -> Result<MediaResponse> {
        self.post_json(&format!("/media/{paper}/generate-video"), request)
            .await
    }

    async fn generate_slides(&self, paper: &ArtifactId) -> Result<()> {
        let url = self.endpoint(&format!("/slides/{paper}/generate"));
        debug!(url = %url, "POST");
        let response = self.http_client.post(&url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_slide_preview(&self, paper: &ArtifactId) -> Result<SlidePreview> {
        self.get_json(&format!("/slides/{paper}/preview")).await
    }

    async fn generate_mindmap(&self, request: &MindmapRequest) -> Result<Mindmap> {
        self.post_json("/mindmap/generate-mindmap", request).await
    }

    async fn generate_mindmap_from_file(&self, path: &Path, title: Option<String>) -> Result<Mindmap> {
        let mut form = Form::new().part("file", Self::file_part(path, mime_for(path)).await?);
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            form = form.text("title", title);
        }
        self.post_multipart("/mindmap/generate-mindmap-from-file", form)
            .await
    }

    async fn storytelling(
        &self,
        paper: &ArtifactId,
        step: StorytellingStep,
        request: &StorytellingRequest,
    ) -> Result<StorytellingResponse> {
        self.post_json(
            &format!("/visual-storytelling/{paper}/generate-storytelling-{step}"),
            request,
        )
        .await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = join_url(&self.base_url, path);
        debug!(url = %url, "GET attachment");
        let response = self.http_client.get(&url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn resolve_url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

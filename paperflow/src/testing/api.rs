//! A scripted [`PaperApi`] for pipeline tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use crate::api::{
    join_url, AudioRequest, DialogueRequest, DialogueResponse, MediaResponse, Mindmap,
    MindmapRequest, PaperApi, PaperResponse, PodcastAudioResponse, ScriptResponse, SlidePreview,
    StorytellingRequest, StorytellingResponse, StorytellingStep, VideoRequest,
};
use crate::core::ArtifactId;
use crate::errors::{PaperflowError, Result};

use super::mocks::replicate;

/// What a scripted endpoint answers.
#[derive(Debug)]
pub enum ApiOutcome {
    /// A 2xx response with this JSON body.
    Json(Value),
    /// A rejection.
    Fail(PaperflowError),
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    /// Method name (`generate_audio`, `storytelling_video`, ...).
    pub method: String,
    /// The paper the call concerned, if any.
    pub paper: Option<String>,
    /// The request body or argument, as JSON.
    pub body: Value,
}

#[derive(Debug, Default)]
struct Script {
    /// The last queued outcome repeats once the queue drains to it.
    queues: HashMap<String, VecDeque<ApiOutcome>>,
    delays: HashMap<String, Duration>,
    calls: Vec<ApiCall>,
}

/// A [`PaperApi`] whose answers are queued per method.
///
/// Unscripted methods fail with a transport error naming the method.
#[derive(Debug)]
pub struct ScriptedApi {
    base_url: String,
    script: Mutex<Script>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApi {
    /// Creates an API resolving URLs against `http://localhost:8000`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            script: Mutex::new(Script::default()),
        }
    }

    /// Queues a JSON success for `method`.
    #[must_use]
    pub fn respond(self, method: &str, body: Value) -> Self {
        self.push(method, ApiOutcome::Json(body));
        self
    }

    /// Queues a rejection with a `detail` message for `method`.
    #[must_use]
    pub fn reject(self, method: &str, status: u16, detail: &str) -> Self {
        self.push(method, ApiOutcome::Fail(PaperflowError::rejection(status, Some(detail.to_string()))));
        self
    }

    /// Queues an arbitrary failure for `method`.
    #[must_use]
    pub fn fail(self, method: &str, err: PaperflowError) -> Self {
        self.push(method, ApiOutcome::Fail(err));
        self
    }

    /// Makes `method` sleep before answering.
    #[must_use]
    pub fn delay(self, method: &str, delay: Duration) -> Self {
        self.script.lock().delays.insert(method.to_string(), delay);
        self
    }

    /// Queues an outcome on a shared instance.
    pub fn push(&self, method: &str, outcome: ApiOutcome) {
        self.script
            .lock()
            .queues
            .entry(method.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.script.lock().calls.clone()
    }

    /// Number of calls to `method`.
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Method names in call order.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.script.lock().calls.iter().map(|c| c.method.clone()).collect()
    }

    /// Records the call and takes the next outcome.
    fn take(&self, method: &str, paper: Option<&ArtifactId>, body: Value) -> (Option<Duration>, Result<Value>) {
        let mut script = self.script.lock();
        script.calls.push(ApiCall {
            method: method.to_string(),
            paper: paper.map(ToString::to_string),
            body,
        });
        let delay = script.delays.get(method).copied();

        let outcome = match script.queues.get_mut(method) {
            Some(queue) if queue.len() > 1 => match queue.pop_front() {
                Some(ApiOutcome::Json(v)) => Ok(v),
                Some(ApiOutcome::Fail(e)) => Err(e),
                None => Err(unscripted(method)),
            },
            Some(queue) => match queue.front() {
                Some(ApiOutcome::Json(v)) => Ok(v.clone()),
                Some(ApiOutcome::Fail(e)) => Err(replicate(e)),
                None => Err(unscripted(method)),
            },
            None => Err(unscripted(method)),
        };
        (delay, outcome)
    }

    async fn answer<T: DeserializeOwned>(&self, method: &str, paper: Option<&ArtifactId>, body: Value) -> Result<T> {
        let (delay, outcome) = self.take(method, paper, body);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(serde_json::from_value(outcome?)?)
    }
}

fn unscripted(method: &str) -> PaperflowError {
    PaperflowError::Transport(format!("no scripted response for {method}"))
}

fn body<T: Serialize>(request: &T) -> Value {
    serde_json::to_value(request).unwrap_or(Value::Null)
}

#[async_trait]
impl PaperApi for ScriptedApi {
    async fn upload_arxiv(&self, reference: &str) -> Result<PaperResponse> {
        self.answer("upload_arxiv", None, json!({ "arxiv_url": reference }))
            .await
    }

    async fn upload_pdf(&self, path: &Path) -> Result<PaperResponse> {
        self.answer("upload_pdf", None, json!({ "file": path.display().to_string() }))
            .await
    }

    async fn upload_latex_zip(&self, path: &Path) -> Result<PaperResponse> {
        self.answer("upload_latex_zip", None, json!({ "file": path.display().to_string() }))
            .await
    }

    async fn generate_script(&self, paper: &ArtifactId) -> Result<ScriptResponse> {
        self.answer("generate_script", Some(paper), Value::Null).await
    }

    async fn generate_podcast_dialogue(&self, paper: &ArtifactId, request: &DialogueRequest) -> Result<DialogueResponse> {
        self.answer("generate_podcast_dialogue", Some(paper), body(request))
            .await
    }

    async fn generate_podcast_audio(&self, paper: &ArtifactId) -> Result<PodcastAudioResponse> {
        self.answer("generate_podcast_audio", Some(paper), Value::Null)
            .await
    }

    async fn generate_audio(&self, paper: &ArtifactId, request: &AudioRequest) -> Result<MediaResponse> {
        self.answer("generate_audio", Some(paper), body(request)).await
    }

    async fn generate_video(&self, paper: &ArtifactId, request: &VideoRequest) -> Result<MediaResponse> {
        self.answer("generate_video", Some(paper), body(request)).await
    }

    async fn generate_slides(&self, paper: &ArtifactId) -> Result<()> {
        let _: Value = self.answer("generate_slides", Some(paper), Value::Null).await?;
        Ok(())
    }

    async fn get_slide_preview(&self, paper: &ArtifactId) -> Result<SlidePreview> {
        self.answer("get_slide_preview", Some(paper), Value::Null).await
    }

    async fn generate_mindmap(&self, request: &MindmapRequest) -> Result<Mindmap> {
        self.answer("generate_mindmap", None, body(request)).await
    }

    async fn generate_mindmap_from_file(&self, path: &Path, title: Option<String>) -> Result<Mindmap> {
        self.answer(
            "generate_mindmap_from_file",
            None,
            json!({ "file": path.display().to_string(), "title": title }),
        )
        .await
    }

    async fn storytelling(
        &self,
        paper: &ArtifactId,
        step: StorytellingStep,
        request: &StorytellingRequest,
    ) -> Result<StorytellingResponse> {
        self.answer(&format!("storytelling_{step}"), Some(paper), body(request))
            .await
    }

    /// Answers with the queued `download` body: a JSON string becomes its
    /// UTF-8 bytes, anything else its JSON text.
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let body: Value = self.answer("download", None, json!({ "path": path })).await?;
        Ok(match body {
            Value::String(text) => text.into_bytes(),
            other => other.to_string().into_bytes(),
        })
    }

    fn resolve_url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

//! Request and response bodies of the generation backend.

use crate::config::{ComplexityLevel, PodcastDefaults, VideoDefaults};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Languages the narration backend can voice.
pub const SUPPORTED_LANGUAGES: [&str; 11] = [
    "English",
    "Hindi",
    "Bengali",
    "Gujarati",
    "Kannada",
    "Malayalam",
    "Marathi",
    "Odia",
    "Punjabi",
    "Tamil",
    "Telugu",
];

/// Voice used for every language unless the user picks another.
pub const DEFAULT_VOICE: &str = "vidya";

/// Where a paper comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PaperSource {
    /// An arXiv URL or bare id.
    Arxiv(String),
    /// A local PDF.
    Pdf(PathBuf),
    /// A zipped LaTeX source tree.
    LatexZip(PathBuf),
}

impl PaperSource {
    /// Short label for logs and notices.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Arxiv(reference) => reference.trim().to_string(),
            Self::Pdf(path) | Self::LatexZip(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
        }
    }
}

/// Metadata the backend extracted from a paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Author list as one string.
    #[serde(default)]
    pub authors: String,
    /// Publication date.
    #[serde(default)]
    pub date: String,
    /// arXiv id, when scraped from arXiv.
    #[serde(default)]
    pub arxiv_id: Option<String>,
}

/// Response to any of the upload endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperResponse {
    /// The new artifact id.
    pub paper_id: String,
    /// Extracted metadata.
    #[serde(default)]
    pub metadata: Option<PaperMetadata>,
    /// Figures found in the source.
    #[serde(default)]
    pub image_files: Vec<String>,
    /// Processing status.
    #[serde(default)]
    pub status: Option<String>,
}

/// Response to the narration script endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptResponse {
    /// Section title to narration.
    #[serde(default)]
    pub sections_scripts: BTreeMap<String, String>,
}

/// Body of the podcast dialogue request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueRequest {
    /// Number of host/guest exchanges.
    pub num_exchanges: u32,
    /// Language code.
    pub language: String,
    /// Reader level.
    pub complexity_level: ComplexityLevel,
}

impl Default for DialogueRequest {
    fn default() -> Self {
        Self::from(&PodcastDefaults::default())
    }
}

impl From<&PodcastDefaults> for DialogueRequest {
    fn from(defaults: &PodcastDefaults) -> Self {
        Self {
            num_exchanges: defaults.exchange_count,
            language: defaults.language.clone(),
            complexity_level: defaults.complexity,
        }
    }
}

/// One line of podcast dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Who speaks.
    pub speaker: String,
    /// What they say.
    pub text: String,
}

/// Response to the podcast dialogue request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueResponse {
    /// Dialogue in turn order.
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
}

/// One narrated podcast segment as served by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastAudioFile {
    /// Who speaks.
    pub speaker: String,
    /// What they say.
    #[serde(default)]
    pub text: String,
    /// Path relative to the backend origin.
    pub url: String,
    /// Download file name.
    #[serde(default)]
    pub filename: String,
}

/// Response to the podcast audio request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodcastAudioResponse {
    /// Segments in turn order; may be empty when synthesis fails.
    #[serde(default)]
    pub audio_files: Vec<PodcastAudioFile>,
}

/// Body of the narration audio request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRequest {
    /// Language name to voice id.
    pub voice_selection: BTreeMap<String, String>,
    /// Rewrite passes for Hinglish narration.
    pub hinglish_iterations: u32,
    /// Ask the backend to include Hindi debug output.
    pub show_hindi_debug: bool,
    /// Narration language.
    pub selected_language: String,
}

impl AudioRequest {
    /// Sets the narration language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.selected_language = language.into();
        self
    }

    /// Picks a voice for one language.
    #[must_use]
    pub fn with_voice(mut self, language: impl Into<String>, voice: impl Into<String>) -> Self {
        self.voice_selection.insert(language.into(), voice.into());
        self
    }
}

impl Default for AudioRequest {
    fn default() -> Self {
        Self {
            voice_selection: SUPPORTED_LANGUAGES
                .iter()
                .map(|lang| ((*lang).to_string(), DEFAULT_VOICE.to_string()))
                .collect(),
            hinglish_iterations: 3,
            show_hindi_debug: false,
            selected_language: "English".to_string(),
        }
    }
}

/// Body of the narrated video request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequest {
    /// Narration language.
    pub selected_language: String,
    /// Optional background track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music_file: Option<String>,
}

impl Default for VideoRequest {
    fn default() -> Self {
        Self {
            selected_language: "English".to_string(),
            background_music_file: None,
        }
    }
}

/// Response to the narration audio and video endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaResponse {
    /// Generated narration files.
    #[serde(default)]
    pub audio_files: Vec<String>,
    /// Generated video, once built.
    #[serde(default)]
    pub video_path: Option<String>,
    /// Echo of the artifact id.
    #[serde(default)]
    pub paper_id: Option<String>,
}

/// Response to the slide preview endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlidePreview {
    /// Slide image file names, in deck order.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Body of every visual-storytelling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorytellingRequest {
    /// Reader level.
    pub complexity_level: ComplexityLevel,
    /// Target length in seconds.
    pub video_duration: u32,
    /// Narrative style.
    pub style: String,
    /// Image generation backend.
    pub image_provider: String,
    /// Language name to voice id.
    pub voice_selection: BTreeMap<String, String>,
}

impl Default for StorytellingRequest {
    fn default() -> Self {
        Self::from(&VideoDefaults::default())
    }
}

impl From<&VideoDefaults> for StorytellingRequest {
    fn from(defaults: &VideoDefaults) -> Self {
        Self {
            complexity_level: ComplexityLevel::default(),
            video_duration: defaults.video_duration_seconds,
            style: defaults.style.clone(),
            image_provider: defaults.image_provider.clone(),
            voice_selection: BTreeMap::from([("English".to_string(), "arvind".to_string())]),
        }
    }
}

/// Response to every visual-storytelling endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorytellingResponse {
    /// Echo of the artifact id.
    #[serde(default)]
    pub paper_id: String,
    /// Backend status word.
    #[serde(default)]
    pub status: String,
    /// Backend message.
    #[serde(default)]
    pub message: String,
    /// Generated scene script.
    #[serde(default)]
    pub script_data: Option<serde_json::Value>,
    /// Number of generated images.
    #[serde(default)]
    pub image_count: Option<u32>,
    /// Final video.
    #[serde(default)]
    pub video_path: Option<String>,
}

/// Input to the mind-map generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MindmapSource {
    /// A paper on arXiv.
    Arxiv {
        /// URL or bare id.
        arxiv_url: String,
    },
    /// A local `.pdf`, `.tex` or `.latex` file.
    File {
        /// Path to the file.
        path: PathBuf,
        /// Optional title shown on the map.
        #[serde(default)]
        title: Option<String>,
    },
}

impl MindmapSource {
    /// Short label for logs and as an artifact id.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Arxiv { arxiv_url } => arxiv_url.trim().to_string(),
            Self::File { path, title } => title.clone().unwrap_or_else(|| {
                path.file_name()
                    .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
            }),
        }
    }
}

/// Body of the arXiv mind-map request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapRequest {
    /// URL or bare id.
    pub arxiv_url: String,
    /// Reader level.
    pub complexity_level: ComplexityLevel,
}

/// Facts about a generated mind map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MindmapMetadata {
    /// arXiv id, when the source was arXiv.
    #[serde(default)]
    pub arxiv_id: Option<String>,
    /// Authors.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Publication date.
    #[serde(default)]
    pub published: Option<String>,
    /// arXiv categories.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Backend processing time.
    #[serde(default)]
    pub processing_time_seconds: f64,
    /// Number of nodes in the diagram.
    #[serde(default)]
    pub node_count: u32,
}

/// A generated mind map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mindmap {
    /// Paper title.
    #[serde(default)]
    pub title: String,
    /// Mermaid source of the diagram.
    pub mermaid_diagram: String,
    /// Facts about the map.
    #[serde(default)]
    pub metadata: MindmapMetadata,
    /// Prose summary.
    #[serde(default)]
    pub analysis_summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_audio_request_defaults() {
        let request = AudioRequest::default();
        assert_eq!(request.voice_selection.len(), 11);
        assert_eq!(request.voice_selection["Telugu"], "vidya");
        assert_eq!(request.hinglish_iterations, 3);

        let body = serde_json::to_value(request.with_language("Hindi")).unwrap();
        assert_eq!(body["selected_language"], "Hindi");
        assert_eq!(body["show_hindi_debug"], false);
    }

    #[test]
    fn test_dialogue_request_body() {
        let body = serde_json::to_value(DialogueRequest::default()).unwrap();
        assert_eq!(
            body,
            json!({"num_exchanges": 8, "language": "en", "complexity_level": "medium"})
        );
    }

    #[test]
    fn test_storytelling_request_body() {
        let body = serde_json::to_value(StorytellingRequest::default()).unwrap();
        assert_eq!(body["video_duration"], 180);
        assert_eq!(body["style"], "educational");
        assert_eq!(body["image_provider"], "placeholder");
        assert_eq!(body["voice_selection"], json!({"English": "arvind"}));
    }

    #[test]
    fn test_video_request_omits_missing_music() {
        let body = serde_json::to_value(VideoRequest::default()).unwrap();
        assert_eq!(body, json!({"selected_language": "English"}));
    }

    #[test]
    fn test_decode_podcast_audio() {
        let response: PodcastAudioResponse = serde_json::from_value(json!({
            "paper_id": "p1",
            "status": "success",
            "audio_files": [
                {"speaker": "Host", "text": "Welcome", "url": "/static/p1/0.mp3", "filename": "0.mp3"}
            ]
        }))
        .unwrap();
        assert_eq!(response.audio_files[0].url, "/static/p1/0.mp3");

        let empty: PodcastAudioResponse = serde_json::from_value(json!({"status": "failed"})).unwrap();
        assert!(empty.audio_files.is_empty());
    }

    #[test]
    fn test_decode_mindmap() {
        let map: Mindmap = serde_json::from_value(json!({
            "status": "success",
            "title": "Attention",
            "mermaid_diagram": "mindmap\n  root",
            "metadata": {"arxiv_id": "1706.03762", "authors": ["A"], "published": null,
                         "categories": ["cs.CL"], "processing_time_seconds": 1.5, "node_count": 12},
            "analysis_summary": "summary"
        }))
        .unwrap();
        assert_eq!(map.metadata.node_count, 12);
        assert_eq!(map.metadata.arxiv_id.as_deref(), Some("1706.03762"));
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(PaperSource::Arxiv(" 2301.00001 ".into()).label(), "2301.00001");
        assert_eq!(PaperSource::Pdf("/tmp/paper.pdf".into()).label(), "paper.pdf");
        let file = MindmapSource::File {
            path: "/tmp/notes.tex".into(),
            title: None,
        };
        assert_eq!(file.label(), "notes.tex");
    }
}

//! Runtime configuration.
//!
//! Settings come from built-in defaults, optionally overridden by a JSON
//! document and then by environment variables:
//!
//! - `PAPERFLOW_API_BASE_URL`
//! - `PAPERFLOW_STAGE_TIMEOUT_SECONDS`
//! - `PAPERFLOW_PLAYBACK_DELAY_MS`
//! - `PAPERFLOW_DOWNLOAD_DIR`

use crate::errors::{PaperflowError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding [`ApiConfig::base_url`].
pub const ENV_API_BASE_URL: &str = "PAPERFLOW_API_BASE_URL";
/// Environment variable overriding [`OrchestratorConfig::stage_timeout_seconds`].
pub const ENV_STAGE_TIMEOUT: &str = "PAPERFLOW_STAGE_TIMEOUT_SECONDS";
/// Environment variable overriding [`PlaybackConfig::advance_delay_ms`].
pub const ENV_PLAYBACK_DELAY: &str = "PAPERFLOW_PLAYBACK_DELAY_MS";
/// Environment variable overriding [`DownloadConfig::directory`].
pub const ENV_DOWNLOAD_DIR: &str = "PAPERFLOW_DOWNLOAD_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperflowConfig {
    /// Remote API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Orchestrator settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Playback settings.
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Podcast request defaults.
    #[serde(default)]
    pub podcast: PodcastDefaults,
    /// Storytelling request defaults.
    #[serde(default)]
    pub video: VideoDefaults,
    /// Where downloaded files are saved.
    #[serde(default)]
    pub downloads: DownloadConfig,
}

impl PaperflowConfig {
    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PaperflowError::Config(e.to_string()))
    }

    /// Defaults overridden by environment variables.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlays variables read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a numeric variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            let url = url.trim().trim_end_matches('/').to_string();
            if url.is_empty() {
                warn!(variable = ENV_API_BASE_URL, "ignoring empty value");
            } else {
                self.api.base_url = url;
            }
        }
        if let Some(raw) = lookup(ENV_STAGE_TIMEOUT) {
            self.orchestrator.stage_timeout_seconds = parse_number(ENV_STAGE_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PLAYBACK_DELAY) {
            self.playback.advance_delay_ms = parse_number(ENV_PLAYBACK_DELAY, &raw)?;
        }
        if let Some(dir) = lookup(ENV_DOWNLOAD_DIR) {
            if dir.trim().is_empty() {
                warn!(variable = ENV_DOWNLOAD_DIR, "ignoring empty value");
            } else {
                self.downloads.directory = PathBuf::from(dir.trim());
            }
        }
        Ok(())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| PaperflowError::Config(format!("{key} must be a whole number, got '{raw}'")))
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Backend origin, without the `/api` prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. Generation calls are slow.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// `User-Agent` header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ApiConfig {
    /// The request timeout as a duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    600
}

fn default_user_agent() -> String {
    format!("paperflow/{}", env!("CARGO_PKG_VERSION"))
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// A stage call that takes longer fails with a timeout.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,
}

impl OrchestratorConfig {
    /// The stage timeout as a duration.
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stage_timeout_seconds: default_stage_timeout(),
        }
    }
}

fn default_stage_timeout() -> u64 {
    900
}

/// Playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Pause between a segment ending and the next one starting.
    #[serde(default = "default_advance_delay")]
    pub advance_delay_ms: u64,
}

impl PlaybackConfig {
    /// The advance delay as a duration.
    #[must_use]
    pub fn advance_delay(&self) -> Duration {
        Duration::from_millis(self.advance_delay_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            advance_delay_ms: default_advance_delay(),
        }
    }
}

fn default_advance_delay() -> u64 {
    500
}

/// Download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory that receives downloaded files; created on first use.
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

/// Reader level requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    /// Plain language, no jargon.
    Easy,
    /// Balanced.
    #[default]
    Medium,
    /// Technical depth.
    Advanced,
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

/// Defaults for podcast dialogue requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastDefaults {
    /// Number of host/guest exchanges.
    #[serde(default = "default_exchange_count")]
    pub exchange_count: u32,
    /// Language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Reader level.
    #[serde(default)]
    pub complexity: ComplexityLevel,
}

impl Default for PodcastDefaults {
    fn default() -> Self {
        Self {
            exchange_count: default_exchange_count(),
            language: default_language(),
            complexity: ComplexityLevel::default(),
        }
    }
}

fn default_exchange_count() -> u32 {
    8
}

fn default_language() -> String {
    "en".to_string()
}

/// Defaults for storytelling video requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDefaults {
    /// Target video length.
    #[serde(default = "default_video_duration")]
    pub video_duration_seconds: u32,
    /// Narrative style.
    #[serde(default = "default_style")]
    pub style: String,
    /// Image generation backend.
    #[serde(default = "default_image_provider")]
    pub image_provider: String,
}

impl Default for VideoDefaults {
    fn default() -> Self {
        Self {
            video_duration_seconds: default_video_duration(),
            style: default_style(),
            image_provider: default_image_provider(),
        }
    }
}

fn default_video_duration() -> u32 {
    180
}

fn default_style() -> String {
    "educational".to_string()
}

fn default_image_provider() -> String {
    "placeholder".to_string()
}

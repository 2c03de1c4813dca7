//! Saving generated files to disk.
//!
//! Every download raises one success or error notification. A batch of
//! podcast segments is fetched one file at a time with a pause between
//! files, and one failed file does not stop the rest.

use crate::api::{DownloadTarget, Mindmap, PaperApi};
use crate::config::PaperflowConfig;
use crate::core::ArtifactId;
use crate::errors::{Result, ValidationError};
use crate::notify::{NoticeLevel, Notification, Notifier};
use crate::playback::{AudioSegment, DEFAULT_ADVANCE_DELAY};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const STAGE: &str = "download";

/// Outcome of [`Downloader::download_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Files written, in playlist order.
    pub saved: Vec<PathBuf>,
    /// Segment index and error text of every file that failed.
    pub failed: Vec<(usize, String)>,
}

impl DownloadReport {
    /// Returns true if every file was saved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetches generated files through the [`PaperApi`] and writes them to a
/// directory.
#[derive(Clone)]
pub struct Downloader {
    api: Arc<dyn PaperApi>,
    notifier: Arc<dyn Notifier>,
    directory: PathBuf,
    delay: Duration,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("directory", &self.directory)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Creates a downloader writing into `directory`.
    pub fn new(api: Arc<dyn PaperApi>, notifier: Arc<dyn Notifier>, directory: impl Into<PathBuf>) -> Self {
        Self {
            api,
            notifier,
            directory: directory.into(),
            delay: DEFAULT_ADVANCE_DELAY,
        }
    }

    /// Uses the configured directory, and the playback advance delay as
    /// the pause between batch files.
    pub fn from_config(api: Arc<dyn PaperApi>, notifier: Arc<dyn Notifier>, config: &PaperflowConfig) -> Self {
        Self::new(api, notifier, config.downloads.directory.clone()).with_delay(config.playback.advance_delay())
    }

    /// Sets the pause between files of a batch.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The target directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Downloads one generated attachment of `paper`.
    ///
    /// # Errors
    ///
    /// `Transport` or `RemoteRejection` from the fetch, `Io` from the
    /// write.
    pub async fn save(&self, target: DownloadTarget, paper: &ArtifactId) -> Result<PathBuf> {
        let (done, failed) = match target {
            DownloadTarget::NarratedVideo | DownloadTarget::StorytellingVideo => {
                ("Video downloaded!", "Failed to download video")
            }
            DownloadTarget::SlidesPdf => ("PDF downloaded", "Failed to download PDF"),
            DownloadTarget::SlidesLatex => ("LaTeX downloaded", "Failed to download LaTeX"),
        };
        self.notifier
            .notify(Notification::loading("Preparing download...").with_stage(STAGE));

        let saved = match self.api.download(&target.path(paper)).await {
            Ok(bytes) => self.write(&target.file_name(paper), &bytes).await,
            Err(err) => Err(err),
        };
        self.report(saved, done, failed)
    }

    /// Writes the Mermaid source of `mindmap` as a `.mmd` file.
    ///
    /// # Errors
    ///
    /// `Validation` if the map has no diagram, `Io` from the write.
    pub async fn save_mermaid(&self, mindmap: &Mindmap) -> Result<PathBuf> {
        if mindmap.mermaid_diagram.trim().is_empty() {
            let err = ValidationError::EmptyInput("a generated mind map");
            self.notifier
                .notify(Notification::error(err.to_string()).with_stage(STAGE));
            return Err(err.into());
        }
        let stem = mindmap.metadata.arxiv_id.as_deref().unwrap_or("export");
        let saved = self
            .write(&format!("mindmap-{stem}.mmd"), mindmap.mermaid_diagram.as_bytes())
            .await;
        self.report(saved, "Mermaid code downloaded!", "Failed to save Mermaid code")
    }

    /// Downloads every segment in order, pausing between files.
    ///
    /// Each file raises its own notice; failures are collected in the
    /// report instead of aborting the batch.
    pub async fn download_all(&self, segments: &[AudioSegment]) -> DownloadReport {
        let mut report = DownloadReport::default();
        if segments.is_empty() {
            return report;
        }
        self.notifier.notify(
            Notification::new(NoticeLevel::Info, "Downloading all audio files...").with_stage(STAGE),
        );

        for (n, segment) in segments.iter().enumerate() {
            if n > 0 {
                tokio::time::sleep(self.delay).await;
            }
            let name = segment_file_name(segment);
            let saved = match self.api.download(&segment.url).await {
                Ok(bytes) => self.write(&name, &bytes).await,
                Err(err) => Err(err),
            };
            match saved {
                Ok(path) => {
                    self.notifier
                        .notify(Notification::success(format!("Downloaded {name}")).with_stage(STAGE));
                    report.saved.push(path);
                }
                Err(err) => {
                    warn!(index = segment.index, url = %segment.url, error = %err, "segment download failed");
                    self.notifier.notify(
                        Notification::error(err.user_message(&format!("Failed to download {name}"))).with_stage(STAGE),
                    );
                    report.failed.push((segment.index, err.to_string()));
                }
            }
        }

        info!(saved = report.saved.len(), failed = report.failed.len(), "audio batch downloaded");
        report
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(name);
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "file written");
        Ok(path)
    }

    fn report(&self, saved: Result<PathBuf>, done: &str, failed: &str) -> Result<PathBuf> {
        match saved {
            Ok(path) => {
                info!(path = %path.display(), "download saved");
                self.notifier.notify(Notification::success(done).with_stage(STAGE));
                Ok(path)
            }
            Err(err) => {
                warn!(error = %err, "download failed");
                self.notifier.notify(Notification::error(failed).with_stage(STAGE));
                Err(err)
            }
        }
    }
}

/// The last path component of the segment URL, or a numbered fallback.
fn segment_file_name(segment: &AudioSegment) -> String {
    segment
        .url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map_or_else(|| format!("segment_{}.mp3", segment.index), str::to_string)
}

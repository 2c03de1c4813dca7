//! Paper ingest: validate, upload, announce.

use super::models::PaperSource;
use super::validation::validate_paper_source;
use super::PaperApi;
use crate::core::ArtifactId;
use crate::errors::Result;
use crate::notify::{Notification, Notifier};
use std::sync::Arc;
use tracing::{info, warn};

/// Uploads papers and turns them into artifacts.
#[derive(Clone)]
pub struct Ingestor {
    api: Arc<dyn PaperApi>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor").finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Creates an ingestor.
    pub fn new(api: Arc<dyn PaperApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self { api, notifier }
    }

    /// Validates and uploads `source`, returning the new artifact id.
    ///
    /// Invalid input raises one error notification and never reaches the
    /// network. Upload failures surface the backend `detail` when present.
    ///
    /// # Errors
    ///
    /// `Validation`, `Transport` or `RemoteRejection`.
    pub async fn ingest(&self, source: &PaperSource) -> Result<ArtifactId> {
        if let Err(err) = validate_paper_source(source) {
            warn!(source = %source.label(), error = %err, "rejected paper source");
            self.notifier.notify(Notification::error(err.to_string()).with_stage("upload"));
            return Err(err.into());
        }

        let (loading, generic) = match source {
            PaperSource::Arxiv(_) => ("Fetching paper from arXiv...", "Failed to fetch paper from arXiv"),
            PaperSource::Pdf(_) => ("Uploading PDF file...", "Failed to upload file"),
            PaperSource::LatexZip(_) => ("Uploading LaTeX source...", "Failed to upload file"),
        };
        self.notifier.notify(Notification::loading(loading).with_stage("upload"));

        let uploaded = match source {
            PaperSource::Arxiv(reference) => self.api.upload_arxiv(reference.trim()).await,
            PaperSource::Pdf(path) => self.api.upload_pdf(path).await,
            PaperSource::LatexZip(path) => self.api.upload_latex_zip(path).await,
        };

        let artifact = uploaded.and_then(|paper| Ok(ArtifactId::new(paper.paper_id)?));
        match artifact {
            Ok(artifact) => {
                info!(source = %source.label(), artifact = %artifact, "paper uploaded");
                self.notifier
                    .notify(Notification::success("Paper uploaded successfully!").with_stage("upload"));
                Ok(artifact)
            }
            Err(err) => {
                warn!(source = %source.label(), error = %err, "paper upload failed");
                self.notifier
                    .notify(Notification::error(err.user_message(generic)).with_stage("upload"));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockPaperApi, PaperResponse};
    use crate::errors::PaperflowError;
    use crate::notify::{NoticeLevel, NotificationLog};
    use pretty_assertions::assert_eq;

    fn paper(id: &str) -> PaperResponse {
        PaperResponse {
            paper_id: id.to_string(),
            ..PaperResponse::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_arxiv_never_calls_backend() {
        let mut api = MockPaperApi::new();
        api.expect_upload_arxiv().never();
        let log = Arc::new(NotificationLog::new());
        let ingestor = Ingestor::new(Arc::new(api), log.clone());

        let err = ingestor
            .ingest(&PaperSource::Arxiv("not-a-paper".into()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation");
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_arxiv_upload_success() {
        let mut api = MockPaperApi::new();
        api.expect_upload_arxiv()
            .withf(|reference| reference == "2301.00001")
            .times(1)
            .returning(|_| Ok(paper("p-42")));
        let log = Arc::new(NotificationLog::new());
        let ingestor = Ingestor::new(Arc::new(api), log.clone());

        let artifact = ingestor
            .ingest(&PaperSource::Arxiv(" 2301.00001 ".into()))
            .await
            .unwrap();

        assert_eq!(artifact.as_str(), "p-42");
        assert_eq!(log.outcomes().len(), 1);
        assert_eq!(log.outcomes()[0].message, "Paper uploaded successfully!");
    }

    #[tokio::test]
    async fn test_rejection_detail_is_shown() {
        let mut api = MockPaperApi::new();
        api.expect_upload_arxiv()
            .returning(|_| Err(PaperflowError::rejection(404, Some("Paper not found on arXiv".into()))));
        let log = Arc::new(NotificationLog::new());
        let ingestor = Ingestor::new(Arc::new(api), log.clone());

        assert!(ingestor
            .ingest(&PaperSource::Arxiv("2301.99999".into()))
            .await
            .is_err());
        assert_eq!(log.errors()[0].message, "Paper not found on arXiv");
    }

    #[tokio::test]
    async fn test_file_upload_generic_failure() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("source.zip");
        std::fs::write(&zip, b"PK").unwrap();

        let mut api = MockPaperApi::new();
        api.expect_upload_latex_zip()
            .returning(|_| Err(PaperflowError::Transport("connection reset".into())));
        let log = Arc::new(NotificationLog::new());
        let ingestor = Ingestor::new(Arc::new(api), log.clone());

        assert!(ingestor.ingest(&PaperSource::LatexZip(zip)).await.is_err());
        assert_eq!(log.of_level(NoticeLevel::Loading)[0].message, "Uploading LaTeX source...");
        assert_eq!(log.errors()[0].message, "Failed to upload file");
    }

    #[tokio::test]
    async fn test_blank_paper_id_is_an_error() {
        let mut api = MockPaperApi::new();
        api.expect_upload_arxiv().returning(|_| Ok(paper("")));
        let log = Arc::new(NotificationLog::new());
        let ingestor = Ingestor::new(Arc::new(api), log.clone());

        assert!(ingestor
            .ingest(&PaperSource::Arxiv("2301.00001".into()))
            .await
            .is_err());
        assert_eq!(log.outcomes().len(), 1);
        assert_eq!(log.errors().len(), 1);
    }
}

//! Client-side input checks run before any upload.

use super::models::{MindmapSource, PaperSource};
use crate::errors::ValidationError;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Accepted PDF extensions.
pub const PDF_EXTENSIONS: &[&str] = &[".pdf"];
/// Accepted LaTeX source archive extensions.
pub const LATEX_ARCHIVE_EXTENSIONS: &[&str] = &[".zip"];
/// Accepted mind-map upload extensions.
pub const MINDMAP_FILE_EXTENSIONS: &[&str] = &[".pdf", ".tex", ".latex"];

fn arxiv_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"arxiv\.org/abs/[0-9]+\.[0-9]+",
            r"arxiv\.org/pdf/[0-9]+\.[0-9]+",
            r"^[0-9]+\.[0-9]+$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Checks an arXiv URL or bare identifier and returns it trimmed.
///
/// # Errors
///
/// `EmptyInput` for blank text, `InvalidArxivReference` when no accepted
/// form matches.
pub fn validate_arxiv_reference(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput("an arXiv URL"));
    }
    if arxiv_patterns().iter().any(|p| p.is_match(trimmed)) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidArxivReference {
            input: trimmed.to_string(),
        })
    }
}

/// Checks that `path` exists and ends in one of `extensions`.
///
/// Extensions are compared case-insensitively and include the dot.
///
/// # Errors
///
/// `MissingFile` or `UnsupportedFileExtension`.
pub fn validate_file(path: &Path, extensions: &[&str]) -> Result<(), ValidationError> {
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();

    if !extensions.iter().any(|allowed| *allowed == extension) {
        return Err(ValidationError::UnsupportedFileExtension {
            extension,
            expected: extensions.iter().map(|e| (*e).to_string()).collect(),
        });
    }
    if !path.is_file() {
        return Err(ValidationError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Validates a paper upload source.
///
/// # Errors
///
/// See [`validate_arxiv_reference`] and [`validate_file`].
pub fn validate_paper_source(source: &PaperSource) -> Result<(), ValidationError> {
    match source {
        PaperSource::Arxiv(reference) => validate_arxiv_reference(reference).map(|_| ()),
        PaperSource::Pdf(path) => validate_file(path, PDF_EXTENSIONS),
        PaperSource::LatexZip(path) => validate_file(path, LATEX_ARCHIVE_EXTENSIONS),
    }
}

/// Validates a mind-map source.
///
/// # Errors
///
/// See [`validate_arxiv_reference`] and [`validate_file`].
pub fn validate_mindmap_source(source: &MindmapSource) -> Result<(), ValidationError> {
    match source {
        MindmapSource::Arxiv { arxiv_url } => validate_arxiv_reference(arxiv_url).map(|_| ()),
        MindmapSource::File { path, .. } => validate_file(path, MINDMAP_FILE_EXTENSIONS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_accepted_arxiv_forms() {
        for input in [
            "https://arxiv.org/abs/2301.00001",
            "http://arxiv.org/pdf/1706.03762v5",
            "2301.00001",
            "  2301.00001  ",
        ] {
            assert!(validate_arxiv_reference(input).is_ok(), "{input}");
        }
        assert_eq!(validate_arxiv_reference(" 2301.00001 ").unwrap(), "2301.00001");
    }

    #[test]
    fn test_rejected_arxiv_forms() {
        assert_eq!(
            validate_arxiv_reference("not-a-paper"),
            Err(ValidationError::InvalidArxivReference {
                input: "not-a-paper".into()
            })
        );
        assert!(validate_arxiv_reference("https://example.com/abs/2301.00001").is_err());
        assert!(validate_arxiv_reference("2301").is_err());
        assert_eq!(
            validate_arxiv_reference("   "),
            Err(ValidationError::EmptyInput("an arXiv URL"))
        );
    }

    #[test]
    fn test_file_extension_checked_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("Paper.PDF");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        assert!(validate_file(&pdf, PDF_EXTENSIONS).is_ok());
        assert_eq!(
            validate_file(&pdf, LATEX_ARCHIVE_EXTENSIONS),
            Err(ValidationError::UnsupportedFileExtension {
                extension: ".pdf".into(),
                expected: vec![".zip".into()],
            })
        );
    }

    #[test]
    fn test_missing_file() {
        let path = PathBuf::from("/definitely/not/here.pdf");
        assert_eq!(
            validate_file(&path, PDF_EXTENSIONS),
            Err(ValidationError::MissingFile { path: path.clone() })
        );
    }

    #[test]
    fn test_file_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("paper");
        std::fs::write(&bare, b"x").unwrap();

        let err = validate_file(&bare, MINDMAP_FILE_EXTENSIONS).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedFileExtension { ref extension, .. } if extension.is_empty()));
    }

    #[test]
    fn test_sources() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("main.tex");
        std::fs::write(&tex, b"\\documentclass{article}").unwrap();

        assert!(validate_mindmap_source(&MindmapSource::File { path: tex.clone(), title: None }).is_ok());
        assert!(validate_paper_source(&PaperSource::Pdf(tex)).is_err());
        assert!(validate_paper_source(&PaperSource::Arxiv("2301.00001".into())).is_ok());
        assert!(validate_mindmap_source(&MindmapSource::Arxiv {
            arxiv_url: "nope".into()
        })
        .is_err());
    }
}

//! Playable audio segments.

use crate::api::PodcastAudioFile;
use serde::{Deserialize, Serialize};

/// Speaker label used for narration tracks that carry no speaker.
pub const NARRATOR: &str = "Narrator";

/// One playable narration unit.
///
/// The list order is the dialogue turn order and does not change once
/// built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSegment {
    /// Position in the playlist.
    pub index: usize,
    /// Who is speaking.
    pub speaker: String,
    /// The spoken text.
    pub text: String,
    /// Fully resolved media URL.
    pub url: String,
}

impl AudioSegment {
    /// Builds a playlist from podcast audio files, resolving each URL with
    /// `resolve`.
    pub fn from_podcast_files<F>(files: &[PodcastAudioFile], resolve: F) -> Vec<Self>
    where
        F: Fn(&str) -> String,
    {
        files
            .iter()
            .enumerate()
            .map(|(index, file)| Self {
                index,
                speaker: file.speaker.clone(),
                text: file.text.clone(),
                url: resolve(&file.url),
            })
            .collect()
    }

    /// Builds a playlist from bare narration paths.
    pub fn from_paths<F>(paths: &[String], resolve: F) -> Vec<Self>
    where
        F: Fn(&str) -> String,
    {
        paths
            .iter()
            .enumerate()
            .map(|(index, path)| Self {
                index,
                speaker: NARRATOR.to_string(),
                text: path.rsplit('/').next().unwrap_or(path).to_string(),
                url: resolve(path),
            })
            .collect()
    }
}

//! Document inputs and the collaborator-facing helpers that produce them.
//!
//! The pipeline consumes a [`Document`]: already-converted plain text plus a
//! free-text media label used only to parametrize prompts. Format conversion
//! (PDF and friends) and transcript fetching live outside this crate; what
//! does live here is the parsing that can fail *before* a pipeline run
//! starts — YouTube video-id extraction and transcript flattening.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Errors surfaced by document acquisition, before the pipeline starts.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The URL is not one of the recognized YouTube shapes.
    #[error("not a recognizable YouTube URL: {0}")]
    InvalidVideoUrl(String),

    /// The video exists but has no transcript to summarize.
    #[error("video has no transcript")]
    NoTranscript,
}

/// An immutable plain-text input to the pipeline.
///
/// `media_type` is a human-readable label ("document", "youtube video")
/// substituted into prompt templates downstream; it carries no behavior.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    media_type: String,
}

impl Document {
    pub fn new(text: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_type: media_type.into(),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

/// One caption line of a fetched video transcript.
///
/// Matches the shape transcript services hand back; only `text` matters to
/// summarization.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
}

/// Flatten transcript entries into a single plain-text string.
///
/// # Errors
///
/// Returns [`SourceError::NoTranscript`] when there are no entries to join.
pub fn transcript_to_text(entries: &[TranscriptEntry]) -> Result<String, SourceError> {
    if entries.is_empty() {
        return Err(SourceError::NoTranscript);
    }
    Ok(entries
        .iter()
        .map(|entry| entry.text.as_str())
        .collect::<Vec<_>>()
        .join(" "))
}

/// Extract the video id from the common YouTube URL shapes.
///
/// Recognizes `youtu.be/<id>`, `youtube.com/watch?v=<id>`,
/// `youtube.com/embed/<id>`, and `youtube.com/v/<id>`.
///
/// # Errors
///
/// Returns [`SourceError::InvalidVideoUrl`] for anything else, including
/// URLs that do not parse at all.
pub fn extract_video_id(video_url: &str) -> Result<String, SourceError> {
    let parsed = Url::parse(video_url)
        .map_err(|_| SourceError::InvalidVideoUrl(video_url.to_string()))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| SourceError::InvalidVideoUrl(video_url.to_string()))?;

    if host == "youtu.be" {
        let id = parsed.path().trim_start_matches('/');
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    if matches!(host, "www.youtube.com" | "youtube.com") {
        if parsed.path() == "/watch" {
            if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key.as_ref() == "v") {
                if !id.is_empty() {
                    return Ok(id.into_owned());
                }
            }
        }
        for prefix in ["/embed/", "/v/"] {
            if let Some(id) = parsed.path().strip_prefix(prefix) {
                if !id.is_empty() {
                    return Ok(id.split('/').next().unwrap_or(id).to_string());
                }
            }
        }
    }

    Err(SourceError::InvalidVideoUrl(video_url.to_string()))
}

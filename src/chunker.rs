//! Splitting raw document text into ordered, token-bounded segments.
//!
//! Two modes, matching the two pipeline paths:
//!
//! * [`split_by_characters`] — greedy character-budget splitting with
//!   whitespace-snapped boundaries. Lossless modulo trimmed whitespace.
//! * [`split_by_tokens`] — sliding token window with overlap, sized so the
//!   clustered path ends up with roughly `cluster_count × ratio` segments
//!   to choose representatives from.
//!
//! Both modes guarantee forward progress on pathological input (no
//! whitespace anywhere, single-character alphabets) and never produce an
//! empty segment from non-empty input.

use thiserror::Error;

use crate::tokenizer::{count_tokens, encoder};

/// Errors from segment production.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// A token window decoded to invalid text. Can only happen when a
    /// window boundary lands inside a multi-byte encoding unit.
    #[error("token window decoded to invalid text: {0}")]
    Decode(String),
}

/// A contiguous slice of document text, sized for a single model call.
///
/// `index` is the segment's position in document order and is stable for
/// the lifetime of a pipeline run: embeddings, cluster assignments, and
/// partial summaries are all keyed by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub text: String,
    pub tokens: usize,
}

/// Sizing parameters for [`split_by_tokens`].
#[derive(Debug, Clone)]
pub struct TokenWindowConfig {
    /// Target number of clusters downstream.
    pub cluster_count: usize,
    /// Segments-per-cluster ratio; the window is sized for
    /// `cluster_count × ratio` segments.
    pub ratio: usize,
    /// Lower clamp on the window size, in tokens.
    pub min_tokens: usize,
    /// Upper clamp on the window size, in tokens.
    pub max_tokens: usize,
}

impl Default for TokenWindowConfig {
    fn default() -> Self {
        Self {
            cluster_count: 8,
            ratio: 5,
            min_tokens: 200,
            max_tokens: 2_000,
        }
    }
}

// ── Character-budget mode ──────────────────────────────────────────────

/// Split `text` greedily into chunks of roughly `min_chunk_tokens` tokens.
///
/// The token budget is converted to a character budget using the document's
/// observed characters-per-token ratio, then the text is walked left to
/// right: each boundary snaps backward to the nearest preceding space so
/// words are never split, falling back to the raw character boundary when
/// no space exists in range. Chunks are trimmed of surrounding whitespace.
///
/// A document smaller than twice `min_chunk_tokens` becomes a single chunk.
#[must_use]
pub fn split_by_characters(text: &str, min_chunk_tokens: usize) -> Vec<Segment> {
    if text.is_empty() {
        return Vec::new();
    }

    let total_tokens = count_tokens(text).max(1);

    // Too small to split meaningfully: the whole document is one chunk.
    if total_tokens < min_chunk_tokens.saturating_mul(2) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![Segment {
            index: 0,
            text: trimmed.to_string(),
            tokens: count_tokens(trimmed),
        }];
    }

    let num_chunks = (total_tokens / min_chunk_tokens.max(1)).max(1);
    let chunk_tokens = (total_tokens / num_chunks).max(1);
    let chars_per_token = (text.len() / total_tokens).max(1);
    let budget = (chunk_tokens * chars_per_token).max(1);

    let mut segments = Vec::with_capacity(num_chunks);
    let mut start = 0usize;

    while start < text.len() {
        let mut end = snap_to_char_boundary(text, (start + budget).min(text.len()));

        if end < text.len() {
            // Snap back to the nearest preceding space so words stay whole.
            if let Some(pos) = text[start..end].rfind(' ') {
                let candidate = start + pos + 1;
                if candidate > start {
                    end = candidate;
                }
            }
        }

        // Whitespace-free input (or a budget narrower than one character):
        // fall forward to the next character boundary so the walk always
        // advances.
        if end <= start {
            end = next_char_boundary(text, (start + budget.max(1)).min(text.len()));
            if end <= start {
                end = next_char_boundary(text, start + 1);
            }
        }

        let chunk = text[start..end].trim();
        if !chunk.is_empty() {
            segments.push(Segment {
                index: segments.len(),
                text: chunk.to_string(),
                tokens: count_tokens(chunk),
            });
        }
        start = end;
    }

    segments
}

fn snap_to_char_boundary(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn next_char_boundary(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos.min(text.len())
}

// ── Token-window mode ──────────────────────────────────────────────────

/// Split `text` into overlapping token windows for the clustered path.
///
/// Window size is `total_tokens / (cluster_count × ratio)` clamped to
/// `[min_tokens, max_tokens]`; consecutive windows overlap by a tenth of
/// the window so cluster boundaries do not fall on hard segment edges.
///
/// # Errors
///
/// [`ChunkError::Decode`] if a window decodes to invalid text.
pub fn split_by_tokens(text: &str, config: &TokenWindowConfig) -> Result<Vec<Segment>, ChunkError> {
    let tokens = encoder().encode_ordinary(text);
    let total = tokens.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let divisor = (config.cluster_count * config.ratio).max(1);
    let window = (total / divisor).clamp(config.min_tokens.max(1), config.max_tokens.max(1));
    let overlap = window / 10;
    let stride = (window - overlap).max(1);

    let mut segments = Vec::new();
    let mut start = 0usize;

    while start < total {
        let end = (start + window).min(total);
        let piece = encoder()
            .decode(tokens[start..end].to_vec())
            .map_err(|err| ChunkError::Decode(err.to_string()))?;
        segments.push(Segment {
            index: segments.len(),
            text: piece,
            tokens: end - start,
        });
        if end == total {
            break;
        }
        start += stride;
    }

    Ok(segments)
}

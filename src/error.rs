//! The run-level error taxonomy.
//!
//! A caller receives either a complete artifact set or exactly one of
//! these. Per-segment map-stage failures never appear here — they are
//! absorbed and logged at the map stage; only "nothing survived to
//! combine" surfaces, as [`SummaryError::AllSegmentsFailed`].

use thiserror::Error;

use crate::chunker::ChunkError;
use crate::completion::CompletionError;
use crate::embeddings::EmbeddingError;
use crate::source::SourceError;

/// Fatal errors for a summarization run.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The document is below the minimum worth summarizing.
    #[error("input has {tokens} tokens, below the {minimum}-token minimum")]
    InputTooSmall { tokens: usize, minimum: usize },

    /// The document exceeds the supported maximum.
    #[error("input has {tokens} tokens, above the {maximum}-token maximum")]
    InputTooLarge { tokens: usize, maximum: usize },

    /// The embedding service failed; without a full vector set there is
    /// nothing to cluster, so the run aborts.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A reduce-stage combine call failed. Map-stage completion failures
    /// are absorbed; reduce-stage ones are fatal.
    #[error("combine call for artifact '{artifact}' failed: {source}")]
    Combine {
        artifact: String,
        #[source]
        source: CompletionError,
    },

    /// Every map-stage call failed, leaving the reduce stage no input.
    #[error("all {count} segment summaries failed; nothing to combine")]
    AllSegmentsFailed { count: usize },

    /// Segment production failed.
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// Document acquisition failed before the pipeline started.
    #[error(transparent)]
    Source(#[from] SourceError),
}

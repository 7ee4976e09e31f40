//! The pipeline orchestrator.
//!
//! Sequences Chunker → Embedder → Cluster Selector → Chunk Summarizer →
//! Reducer, choosing between two paths on total token count:
//!
//! ```text
//! Sized ──► SingleCall ─────────────────────────┐
//!   │                                           ├──► Combined ──► Done
//!   └─────► Clustered:                          │
//!           split_by_tokens ─► embed ─► select ─┘
//!                              ─► map (bounded fan-out)
//! ```
//!
//! A document that fits comfortably in one context window skips chunking
//! and clustering entirely: the raw text goes straight to the reduce
//! stage, so a single configured artifact costs exactly one completion
//! call. Oversized documents take the clustered map-reduce path.
//!
//! This is the only component that decides model tier, cluster count,
//! artifact set, and thresholds. Everything below it is parametrized.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::chunker::{self, TokenWindowConfig};
use crate::cluster::{auto_cluster_count, select_representatives};
use crate::completion::CompletionProvider;
use crate::embeddings::{sanitize_for_embedding, verify_uniform_dimensions, EmbeddingProvider};
use crate::error::SummaryError;
use crate::map::SegmentSummarizer;
use crate::prompts::PromptSpec;
use crate::reduce::{Artifact, Reducer};
use crate::source::Document;
use crate::tokenizer::count_tokens;

/// Which of the two execution paths a document takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    /// The document fits in one context window; no chunking, no
    /// clustering, one completion call per artifact.
    SingleCall,
    /// Map-reduce over cluster representatives.
    Clustered,
}

/// Tunables for a [`SummaryPipeline`].
///
/// Defaults mirror production behavior: documents above 100k tokens take
/// the clustered path with 8 clusters and 4 map workers.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Token count above which the clustered path is taken.
    pub large_document_threshold: usize,
    /// Cluster count K for the clustered path.
    pub cluster_count: usize,
    /// Choose K automatically with the elbow heuristic instead of using
    /// `cluster_count` as-is (`cluster_count` then caps the sweep).
    pub auto_clusters: bool,
    /// Segments-per-cluster ratio for token-window sizing.
    pub window_ratio: usize,
    /// Token-window clamp, lower bound.
    pub min_segment_tokens: usize,
    /// Token-window clamp, upper bound.
    pub max_segment_tokens: usize,
    /// Map-stage worker pool size.
    pub workers: usize,
    /// Per-call timeout for map-stage completions.
    pub call_timeout: Duration,
    /// Output budget for each map-stage summary.
    pub map_output_tokens: usize,
    /// Floor for the reduce-stage output budget.
    pub budget_floor: usize,
    /// Smallest document worth summarizing.
    pub min_document_tokens: usize,
    /// Largest supported document.
    pub max_document_tokens: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            large_document_threshold: 100_000,
            cluster_count: 8,
            auto_clusters: false,
            window_ratio: 5,
            min_segment_tokens: 200,
            max_segment_tokens: 2_000,
            workers: 4,
            call_timeout: Duration::from_secs(120),
            map_output_tokens: 500,
            budget_floor: 500,
            min_document_tokens: 2_000,
            max_document_tokens: 1_000_000,
        }
    }
}

/// Errors building a [`SummaryPipeline`].
#[derive(Debug, Error)]
pub enum PipelineBuildError {
    #[error("pipeline requires a completion provider")]
    MissingCompletionProvider,

    #[error("pipeline requires an embedding provider")]
    MissingEmbeddingProvider,
}

/// The orchestrator. Construct via [`SummaryPipeline::builder`].
pub struct SummaryPipeline {
    completion: Arc<dyn CompletionProvider>,
    embedding: Arc<dyn EmbeddingProvider>,
    config: PipelineConfig,
}

impl SummaryPipeline {
    #[must_use]
    pub fn builder() -> SummaryPipelineBuilder {
        SummaryPipelineBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The path a document of `total_tokens` tokens will take.
    #[must_use]
    pub fn path_for(&self, total_tokens: usize) -> ExecutionPath {
        if total_tokens > self.config.large_document_threshold {
            ExecutionPath::Clustered
        } else {
            ExecutionPath::SingleCall
        }
    }

    /// Produce every configured artifact for `document`.
    ///
    /// `map_prompt` drives the per-segment summaries on the clustered
    /// path; `artifacts` drives the reduce stage on both paths. The call
    /// returns the complete artifact set or one fatal error — never a
    /// partial set.
    ///
    /// # Errors
    ///
    /// See [`SummaryError`] for the taxonomy. Per-segment map failures are
    /// absorbed; everything else is fatal.
    pub async fn summarize(
        &self,
        document: &Document,
        map_prompt: &PromptSpec,
        artifacts: &[PromptSpec],
    ) -> Result<Vec<Artifact>, SummaryError> {
        let total_tokens = count_tokens(document.text());
        self.validate_size(total_tokens)?;

        let path = self.path_for(total_tokens);
        tracing::info!(
            total_tokens,
            ?path,
            media_type = document.media_type(),
            artifacts = artifacts.len(),
            "starting summarization run"
        );

        let reducer = Reducer::new(Arc::clone(&self.completion), self.config.budget_floor);

        match path {
            ExecutionPath::SingleCall => {
                // The whole document is the only "segment"; the reduce
                // stage consumes it directly.
                reducer.combine(artifacts, document.text()).await
            }
            ExecutionPath::Clustered => {
                let combined = self.map_stage(document, map_prompt).await?;
                reducer.combine(artifacts, &combined).await
            }
        }
    }

    /// Clustered-path front half: segment, embed, select, fan out, and
    /// join the partial summaries into the combine input.
    async fn map_stage(
        &self,
        document: &Document,
        map_prompt: &PromptSpec,
    ) -> Result<String, SummaryError> {
        let window = TokenWindowConfig {
            cluster_count: self.config.cluster_count,
            ratio: self.config.window_ratio,
            min_tokens: self.config.min_segment_tokens,
            max_tokens: self.config.max_segment_tokens,
        };
        let segments = chunker::split_by_tokens(document.text(), &window)?;
        tracing::debug!(segments = segments.len(), "document segmented");

        let inputs: Vec<String> = segments
            .iter()
            .map(|segment| sanitize_for_embedding(&segment.text))
            .collect();
        let vectors = self.embedding.embed(&inputs).await?;
        verify_uniform_dimensions(inputs.len(), &vectors).map_err(SummaryError::Embedding)?;

        let k = if self.config.auto_clusters {
            let k = auto_cluster_count(&vectors, self.config.cluster_count);
            tracing::info!(k, "elbow heuristic selected cluster count");
            k
        } else {
            self.config.cluster_count
        };

        let selected = select_representatives(segments, &vectors, k);
        tracing::debug!(selected = selected.len(), "representatives selected");

        let summarizer = SegmentSummarizer::new(
            Arc::clone(&self.completion),
            self.config.workers,
            self.config.call_timeout,
            self.config.map_output_tokens,
        );
        let attempted = selected.len();
        let partials = summarizer.summarize_segments(map_prompt, &selected).await;

        if partials.is_empty() {
            return Err(SummaryError::AllSegmentsFailed { count: attempted });
        }
        tracing::info!(
            succeeded = partials.len(),
            attempted,
            "map stage complete"
        );

        Ok(Reducer::combine_input(&partials))
    }

    fn validate_size(&self, total_tokens: usize) -> Result<(), SummaryError> {
        if total_tokens < self.config.min_document_tokens {
            return Err(SummaryError::InputTooSmall {
                tokens: total_tokens,
                minimum: self.config.min_document_tokens,
            });
        }
        if total_tokens > self.config.max_document_tokens {
            return Err(SummaryError::InputTooLarge {
                tokens: total_tokens,
                maximum: self.config.max_document_tokens,
            });
        }
        Ok(())
    }
}

/// Builder for [`SummaryPipeline`].
#[derive(Default)]
pub struct SummaryPipelineBuilder {
    completion: Option<Arc<dyn CompletionProvider>>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
    config: PipelineConfig,
}

impl SummaryPipelineBuilder {
    #[must_use]
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    #[must_use]
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding = Some(provider);
        self
    }

    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// # Errors
    ///
    /// [`PipelineBuildError`] when a provider is missing.
    pub fn build(self) -> Result<SummaryPipeline, PipelineBuildError> {
        Ok(SummaryPipeline {
            completion: self
                .completion
                .ok_or(PipelineBuildError::MissingCompletionProvider)?,
            embedding: self
                .embedding
                .ok_or(PipelineBuildError::MissingEmbeddingProvider)?,
            config: self.config,
        })
    }
}

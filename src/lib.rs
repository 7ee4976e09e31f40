//! # gistmill — map-reduce document summarization
//!
//! Summarizes documents that exceed the context window of a single
//! language-model call. Oversized text is split into token-bounded
//! segments, each segment is embedded, the segments are clustered in
//! embedding space so one representative can stand in for each cluster,
//! the representatives are summarized concurrently, and the partial
//! summaries are combined into one or more final artifacts under a
//! dynamic output-token budget. Documents that fit in one window skip all
//! of that and go straight to a single call.
//!
//! ```text
//! raw text ─► segments ─► vectors ─► representatives ─► partial summaries ─► artifacts
//!            (chunker)  (embeddings)   (cluster)           (map)              (reduce)
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gistmill::completion::{HttpCompletionProvider, ModelTier};
//! use gistmill::config::ProviderConfig;
//! use gistmill::embeddings::HttpEmbeddingProvider;
//! use gistmill::pipeline::{PipelineConfig, SummaryPipeline};
//! use gistmill::prompts;
//! use gistmill::source::Document;
//!
//! # async fn run(text: String) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProviderConfig::from_env()?;
//! let pipeline = SummaryPipeline::builder()
//!     .completion_provider(Arc::new(HttpCompletionProvider::new(&config)?))
//!     .embedding_provider(Arc::new(HttpEmbeddingProvider::new(&config)?))
//!     .config(PipelineConfig::default())
//!     .build()?;
//!
//! let document = Document::new(text, "document");
//! let map_prompt = prompts::section_summary("document", ModelTier::Standard);
//! let artifacts = vec![prompts::synopsis("document", ModelTier::Premium)];
//!
//! let results = pipeline.summarize(&document, &map_prompt, &artifacts).await?;
//! for artifact in results {
//!     println!("{}: {}", artifact.name, artifact.html);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - Aggregation order equals document order, independent of which map
//!   call finishes first.
//! - Clustering is seeded; identical input selects identical
//!   representatives across runs.
//! - A run yields the complete artifact set or exactly one fatal error —
//!   individual map-stage failures are absorbed, logged, and omitted.

pub mod chunker;
pub mod cluster;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod map;
pub mod pipeline;
pub mod prompts;
pub mod reduce;
pub mod source;
pub mod tokenizer;

pub use chunker::{Segment, TokenWindowConfig};
pub use completion::{CompletionProvider, CompletionRequest, ModelTier};
pub use config::ProviderConfig;
pub use embeddings::EmbeddingProvider;
pub use error::SummaryError;
pub use pipeline::{ExecutionPath, PipelineConfig, SummaryPipeline};
pub use prompts::PromptSpec;
pub use reduce::Artifact;
pub use source::Document;

//! Map stage: one completion call per representative segment, fanned out
//! under a bounded worker pool and fanned back in keyed by segment index.
//!
//! Failure policy: an individual segment's failure (service error, timeout,
//! task panic) is logged and the segment is omitted from the aggregate.
//! Deciding whether "nothing succeeded" is fatal belongs to the caller —
//! the reduce stage is where an empty aggregate becomes an error.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::chunker::Segment;
use crate::completion::{CompletionError, CompletionProvider, CompletionRequest};
use crate::prompts::PromptSpec;

/// The summary of exactly one segment, keyed by the segment's document
/// position so aggregation can reorder results deterministically.
#[derive(Debug, Clone)]
pub struct PartialSummary {
    pub segment_index: usize,
    pub text: String,
}

/// Fans segment-summarization calls out over a bounded worker pool.
pub struct SegmentSummarizer {
    provider: Arc<dyn CompletionProvider>,
    workers: usize,
    call_timeout: Duration,
    output_tokens: usize,
}

impl SegmentSummarizer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        workers: usize,
        call_timeout: Duration,
        output_tokens: usize,
    ) -> Self {
        Self {
            provider,
            workers: workers.max(1),
            call_timeout,
            output_tokens,
        }
    }

    /// Summarize every segment independently, at most `workers` calls in
    /// flight at once.
    ///
    /// Results come back sorted by segment index regardless of completion
    /// order. Failed segments are absent from the result; the caller
    /// decides what an empty result means.
    pub async fn summarize_segments(
        &self,
        prompt: &PromptSpec,
        segments: &[Segment],
    ) -> Vec<PartialSummary> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut join_set: JoinSet<(usize, Result<String, CompletionError>)> = JoinSet::new();

        for segment in segments {
            let semaphore = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let instructions = prompt.template.clone();
            let input = format!("'''{}'''", segment.text);
            let index = segment.index;
            let tier = prompt.tier;
            let timeout = self.call_timeout;
            let output_tokens = self.output_tokens;

            join_set.spawn(async move {
                let result = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| CompletionError::Service("worker pool closed".into()))?;
                    let request = CompletionRequest {
                        instructions: &instructions,
                        input: &input,
                        max_output_tokens: output_tokens,
                        tier,
                    };
                    match tokio::time::timeout(timeout, provider.complete(request)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(CompletionError::TimedOut {
                            seconds: timeout.as_secs(),
                        }),
                    }
                }
                .await;
                (index, result)
            });
        }

        let total = segments.len();
        let mut completed = 0usize;
        let mut partials: BTreeMap<usize, String> = BTreeMap::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(text))) => {
                    completed += 1;
                    tracing::debug!(segment = index, completed, total, "segment summarized");
                    partials.insert(index, text);
                }
                Ok((index, Err(error))) => {
                    tracing::warn!(
                        segment = index,
                        error = %error,
                        "segment summarization failed; omitting from aggregate"
                    );
                }
                Err(join_error) => {
                    tracing::warn!(error = %join_error, "segment task aborted; omitting");
                }
            }
        }

        partials
            .into_iter()
            .map(|(segment_index, text)| PartialSummary {
                segment_index,
                text,
            })
            .collect()
    }
}

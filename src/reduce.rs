//! Reduce stage: combine partial summaries and produce the final
//! artifact(s) under a dynamic output-token budget.
//!
//! The combined text is built once, in document order, and reused across
//! every configured artifact. Each artifact is an independent completion
//! call; failures are recorded per artifact, but a run only ever surfaces
//! a complete artifact set or a single fatal error — partial results are
//! never presented as complete.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::completion::{CompletionProvider, CompletionRequest, ModelTier};
use crate::error::SummaryError;
use crate::map::PartialSummary;
use crate::prompts::PromptSpec;
use crate::tokenizer::count_tokens;

/// One final output of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    /// HTML-formatted result text, markdown fences stripped.
    pub html: String,
}

/// Combines partial summaries into final artifacts.
pub struct Reducer {
    provider: Arc<dyn CompletionProvider>,
    budget_floor: usize,
}

impl Reducer {
    pub fn new(provider: Arc<dyn CompletionProvider>, budget_floor: usize) -> Self {
        Self {
            provider,
            budget_floor: budget_floor.max(1),
        }
    }

    /// Join partial summaries into the combine input, one per line, in
    /// document order.
    #[must_use]
    pub fn combine_input(partials: &[PartialSummary]) -> String {
        partials
            .iter()
            .map(|partial| partial.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Remaining output tokens for a combine call at `tier` when the input
    /// already occupies `used_tokens`.
    ///
    /// Clamped to the configured floor: a combined input larger than the
    /// context limit must degrade to a short output, never to a negative
    /// or zero budget.
    #[must_use]
    pub fn output_budget(&self, tier: ModelTier, used_tokens: usize) -> usize {
        tier.context_limit()
            .saturating_sub(used_tokens)
            .max(self.budget_floor)
    }

    /// Run one combine call per artifact spec over the same combined text.
    ///
    /// # Errors
    ///
    /// [`SummaryError::Combine`] naming the first artifact whose call
    /// failed. Remaining artifacts are still attempted first, so the log
    /// carries every failure even though the caller sees one error.
    pub async fn combine(
        &self,
        artifacts: &[PromptSpec],
        combined: &str,
    ) -> Result<Vec<Artifact>, SummaryError> {
        let used = count_tokens(combined);
        let input = format!("'''{combined}'''");

        let mut results = Vec::with_capacity(artifacts.len());
        let mut first_failure: Option<SummaryError> = None;

        for spec in artifacts {
            let budget = self.output_budget(spec.tier, used);
            tracing::debug!(
                artifact = %spec.name,
                used_tokens = used,
                budget,
                "issuing combine call"
            );

            let request = CompletionRequest {
                instructions: &spec.template,
                input: &input,
                max_output_tokens: budget,
                tier: spec.tier,
            };

            match self.provider.complete(request).await {
                Ok(text) => results.push(Artifact {
                    name: spec.name.clone(),
                    html: strip_code_fences(&text),
                }),
                Err(error) => {
                    tracing::error!(
                        artifact = %spec.name,
                        error = %error,
                        "combine call failed"
                    );
                    if first_failure.is_none() {
                        first_failure = Some(SummaryError::Combine {
                            artifact: spec.name.clone(),
                            source: error,
                        });
                    }
                }
            }
        }

        match first_failure {
            Some(error) => Err(error),
            None => Ok(results),
        }
    }
}

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\w*\n(.*?)```").expect("fence pattern compiles"));

/// Unwrap markdown code fences the model tends to put around HTML output.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    FENCE.replace_all(text, "$1").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingProvider {
        budgets: Mutex<Vec<usize>>,
        fail_artifacts: Vec<&'static str>,
    }

    impl RecordingProvider {
        fn new() -> Self {
            Self {
                budgets: Mutex::new(Vec::new()),
                fail_artifacts: Vec::new(),
            }
        }

        fn failing_on(artifacts: Vec<&'static str>) -> Self {
            Self {
                budgets: Mutex::new(Vec::new()),
                fail_artifacts: artifacts,
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        fn id(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            request: CompletionRequest<'_>,
        ) -> Result<String, CompletionError> {
            self.budgets
                .lock()
                .unwrap()
                .push(request.max_output_tokens);
            if self
                .fail_artifacts
                .iter()
                .any(|marker| request.instructions.contains(marker))
            {
                return Err(CompletionError::Service("boom".into()));
            }
            Ok("<p>combined</p>".to_string())
        }
    }

    fn partials(texts: &[&str]) -> Vec<PartialSummary> {
        texts
            .iter()
            .enumerate()
            .map(|(segment_index, text)| PartialSummary {
                segment_index,
                text: (*text).to_string(),
            })
            .collect()
    }

    #[test]
    fn combine_input_preserves_document_order() {
        let combined = Reducer::combine_input(&partials(&["first", "second", "third"]));
        assert_eq!(combined, "first\nsecond\nthird");
    }

    #[test]
    fn budget_subtracts_used_tokens() {
        let reducer = Reducer::new(Arc::new(RecordingProvider::new()), 500);
        assert_eq!(reducer.output_budget(ModelTier::Premium, 1_000), 6_500);
        assert_eq!(reducer.output_budget(ModelTier::Standard, 1_000), 2_800);
    }

    #[test]
    fn budget_clamps_to_floor_never_negative() {
        let reducer = Reducer::new(Arc::new(RecordingProvider::new()), 500);
        // Input larger than the whole context window.
        assert_eq!(reducer.output_budget(ModelTier::Standard, 10_000), 500);
        assert_eq!(reducer.output_budget(ModelTier::Premium, 7_500), 500);
    }

    #[tokio::test]
    async fn one_call_per_artifact_over_same_input() {
        let provider = Arc::new(RecordingProvider::new());
        let reducer = Reducer::new(provider.clone(), 100);
        let artifacts = vec![
            PromptSpec::new("a", "template a", "text", ModelTier::Standard),
            PromptSpec::new("b", "template b", "text", ModelTier::Premium),
        ];

        let results = reducer.combine(&artifacts, "short input").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "a");
        assert_eq!(results[1].name, "b");
        assert_eq!(provider.budgets.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn artifact_failure_is_fatal_but_others_still_run() {
        let provider = Arc::new(RecordingProvider::failing_on(vec!["template a"]));
        let reducer = Reducer::new(provider.clone(), 100);
        let artifacts = vec![
            PromptSpec::new("a", "template a", "text", ModelTier::Standard),
            PromptSpec::new("b", "template b", "text", ModelTier::Standard),
        ];

        let error = reducer.combine(&artifacts, "input").await.unwrap_err();
        assert!(matches!(
            error,
            SummaryError::Combine { ref artifact, .. } if artifact == "a"
        ));
        // The second artifact was still attempted.
        assert_eq!(provider.budgets.lock().unwrap().len(), 2);
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(
            strip_code_fences("```html\n<p>hi</p>\n```"),
            "<p>hi</p>"
        );
        assert_eq!(strip_code_fences("<p>plain</p>"), "<p>plain</p>");
    }
}

//! End-to-end pipeline scenarios with scripted providers.
//!
//! Map-stage and reduce-stage calls are told apart by their output budget:
//! the map stage always asks for `MAP_TOKENS`, which the configs below
//! keep distinct from every possible reduce budget.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use gistmill::completion::{
    CompletionError, CompletionProvider, CompletionRequest, ModelTier,
};
use gistmill::embeddings::MockEmbeddingProvider;
use gistmill::pipeline::{ExecutionPath, PipelineConfig, SummaryPipeline};
use gistmill::prompts::{self, PromptSpec};
use gistmill::source::Document;
use gistmill::tokenizer::count_tokens;
use gistmill::SummaryError;

const MAP_TOKENS: usize = 123;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counts map and combine calls separately; optionally fails the first
/// `fail_first_maps` map calls or every map call.
struct ScriptedProvider {
    map_calls: AtomicUsize,
    combine_calls: AtomicUsize,
    failed_maps: AtomicUsize,
    fail_first_maps: usize,
    fail_all_maps: bool,
}

impl ScriptedProvider {
    fn reliable() -> Self {
        Self::with_failures(0, false)
    }

    fn with_failures(fail_first_maps: usize, fail_all_maps: bool) -> Self {
        Self {
            map_calls: AtomicUsize::new(0),
            combine_calls: AtomicUsize::new(0),
            failed_maps: AtomicUsize::new(0),
            fail_first_maps,
            fail_all_maps,
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError> {
        if request.max_output_tokens == MAP_TOKENS {
            let call = self.map_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_all_maps || call < self.fail_first_maps {
                self.failed_maps.fetch_add(1, Ordering::SeqCst);
                return Err(CompletionError::Service("scripted map failure".into()));
            }
            Ok(format!("partial summary {call}"))
        } else {
            self.combine_calls.fetch_add(1, Ordering::SeqCst);
            Ok("<p>final artifact</p>".to_string())
        }
    }
}

/// Config scaled down so the clustered path triggers on a small document.
fn scaled_config() -> PipelineConfig {
    PipelineConfig {
        large_document_threshold: 3_000,
        cluster_count: 8,
        auto_clusters: false,
        window_ratio: 5,
        min_segment_tokens: 50,
        max_segment_tokens: 200,
        workers: 4,
        call_timeout: Duration::from_secs(5),
        map_output_tokens: MAP_TOKENS,
        budget_floor: 77,
        min_document_tokens: 10,
        max_document_tokens: 1_000_000,
    }
}

fn build_pipeline(provider: Arc<ScriptedProvider>, config: PipelineConfig) -> SummaryPipeline {
    SummaryPipeline::builder()
        .completion_provider(provider)
        .embedding_provider(Arc::new(MockEmbeddingProvider::new()))
        .config(config)
        .build()
        .unwrap()
}

fn map_prompt() -> PromptSpec {
    prompts::section_summary("document", ModelTier::Standard)
}

/// A mid-sized document: well above the validation minimum, well below
/// the default 100k clustered threshold.
fn medium_document() -> Document {
    let text = "The committee reviewed the annual budget proposal in considerable detail. "
        .repeat(3_000);
    Document::new(text, "document")
}

/// A document large enough to clear the scaled clustered threshold, with
/// enough lexical variety that segments embed apart from each other.
fn varied_document() -> Document {
    let mut text = String::new();
    for section in 0..400 {
        text.push_str(&format!(
            "Section {section} examines subject number {} and reports finding {} in depth, \
             covering methodology, observations, caveats, and follow-up questions raised \
             by reviewer {}. ",
            section * 7 % 13,
            section * 11 % 17,
            section % 5,
        ));
    }
    Document::new(text, "document")
}

#[tokio::test]
async fn scenario_a_single_call_path_issues_one_call() {
    init_tracing();
    let provider = Arc::new(ScriptedProvider::reliable());
    let pipeline = build_pipeline(provider.clone(), PipelineConfig::default());

    let document = medium_document();
    let total = count_tokens(document.text());
    assert!(total > 2_000 && total < 100_000, "fixture sized wrong: {total}");
    assert_eq!(pipeline.path_for(total), ExecutionPath::SingleCall);

    let artifacts = vec![prompts::synopsis("document", ModelTier::Premium)];
    let results = pipeline
        .summarize(&document, &map_prompt(), &artifacts)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "synopsis");
    assert_eq!(results[0].html, "<p>final artifact</p>");
    // No chunking, no clustering, no map calls: exactly one completion.
    assert_eq!(provider.map_calls.load(Ordering::SeqCst), 0);
    assert_eq!(provider.combine_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_b_clustered_path_bounds_map_calls_by_k() {
    init_tracing();
    let provider = Arc::new(ScriptedProvider::reliable());
    let pipeline = build_pipeline(provider.clone(), scaled_config());

    let document = varied_document();
    let total = count_tokens(document.text());
    assert_eq!(pipeline.path_for(total), ExecutionPath::Clustered);

    let artifacts = vec![
        prompts::synopsis("document", ModelTier::Premium),
        prompts::progress_note(ModelTier::Standard),
    ];
    let results = pipeline
        .summarize(&document, &map_prompt(), &artifacts)
        .await
        .unwrap();

    let map_calls = provider.map_calls.load(Ordering::SeqCst);
    assert!(map_calls > 0 && map_calls <= 8, "map calls: {map_calls}");
    // One combine call per configured artifact.
    assert_eq!(provider.combine_calls.load(Ordering::SeqCst), 2);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "synopsis");
    assert_eq!(results[1].name, "progress_note");
}

#[tokio::test]
async fn scenario_c_one_failed_segment_is_tolerated() {
    let provider = Arc::new(ScriptedProvider::with_failures(1, false));
    let pipeline = build_pipeline(provider.clone(), scaled_config());

    let artifacts = vec![prompts::synopsis("document", ModelTier::Premium)];
    let results = pipeline
        .summarize(&varied_document(), &map_prompt(), &artifacts)
        .await
        .unwrap();

    // The failure was absorbed; the artifact was produced from the rest.
    assert_eq!(provider.failed_maps.load(Ordering::SeqCst), 1);
    assert!(provider.map_calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(results.len(), 1);
    assert_eq!(provider.combine_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_d_all_segments_failing_is_fatal() {
    let provider = Arc::new(ScriptedProvider::with_failures(0, true));
    let pipeline = build_pipeline(provider.clone(), scaled_config());

    let artifacts = vec![prompts::synopsis("document", ModelTier::Premium)];
    let error = pipeline
        .summarize(&varied_document(), &map_prompt(), &artifacts)
        .await
        .unwrap_err();

    assert!(matches!(error, SummaryError::AllSegmentsFailed { count } if count > 0));
    // The reduce stage never ran.
    assert_eq!(provider.combine_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn auto_cluster_selection_still_bounds_map_calls() {
    let provider = Arc::new(ScriptedProvider::reliable());
    let config = PipelineConfig {
        auto_clusters: true,
        ..scaled_config()
    };
    let pipeline = build_pipeline(provider.clone(), config);

    let artifacts = vec![prompts::synopsis("document", ModelTier::Premium)];
    let results = pipeline
        .summarize(&varied_document(), &map_prompt(), &artifacts)
        .await
        .unwrap();

    // The elbow sweep may pick any K up to the configured count, but the
    // map stage never exceeds it.
    let map_calls = provider.map_calls.load(Ordering::SeqCst);
    assert!(map_calls >= 1 && map_calls <= 8, "map calls: {map_calls}");
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn clustered_runs_are_deterministic() {
    let artifacts = vec![prompts::synopsis("document", ModelTier::Premium)];

    let mut map_counts = Vec::new();
    for _ in 0..2 {
        let provider = Arc::new(ScriptedProvider::reliable());
        let pipeline = build_pipeline(provider.clone(), scaled_config());
        pipeline
            .summarize(&varied_document(), &map_prompt(), &artifacts)
            .await
            .unwrap();
        map_counts.push(provider.map_calls.load(Ordering::SeqCst));
    }
    // Same input, same seed: the same representatives get summarized.
    assert_eq!(map_counts[0], map_counts[1]);
}

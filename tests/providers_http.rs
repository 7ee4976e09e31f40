//! HTTP provider integration tests against a mock server.

use httpmock::prelude::*;
use serde_json::json;

use gistmill::completion::{
    CompletionError, CompletionProvider, CompletionRequest, HttpCompletionProvider, ModelTier,
};
use gistmill::config::ProviderConfig;
use gistmill::embeddings::{EmbeddingProvider, HttpEmbeddingProvider};

fn config_for(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new("test-key")
        .with_base_url(&server.url("/v1"))
        .unwrap()
        .with_completion_models("small-model", "big-model")
        .with_embedding_model("embed-model")
}

#[tokio::test]
async fn embeddings_round_trip_and_reorder_by_index() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{"model": "embed-model"}"#);
            then.status(200).json_body(json!({
                "object": "list",
                "model": "embed-model",
                // Deliberately out of order: the client must sort by index.
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [1.0, 0.0]},
                    {"object": "embedding", "index": 0, "embedding": [0.0, 1.0]}
                ]
            }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(&config_for(&server)).unwrap();
    let vectors = provider
        .embed(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(vectors, vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
}

#[tokio::test]
async fn embedding_count_mismatch_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(json!({
                "object": "list",
                "model": "embed-model",
                "data": [
                    {"object": "embedding", "index": 0, "embedding": [0.5, 0.5]}
                ]
            }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(&config_for(&server)).unwrap();
    let error = provider
        .embed(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(error.to_string().contains("1 vectors for 2 inputs"));
}

#[tokio::test]
async fn completion_uses_the_tier_model_and_budget() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{"model": "big-model", "max_tokens": 2500}"#);
            then.status(200).json_body(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "<p>summary</p>"}}
                ]
            }));
        })
        .await;

    let provider = HttpCompletionProvider::new(&config_for(&server)).unwrap();
    let text = provider
        .complete(CompletionRequest {
            instructions: "summarize",
            input: "'''some text'''",
            max_output_tokens: 2_500,
            tier: ModelTier::Premium,
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(text, "<p>summary</p>");
}

#[tokio::test]
async fn context_length_exceeded_maps_to_its_own_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(400).json_body(json!({
                "error": {
                    "message": "This model's maximum context length is exceeded.",
                    "type": "invalid_request_error",
                    "code": "context_length_exceeded"
                }
            }));
        })
        .await;

    let provider = HttpCompletionProvider::new(&config_for(&server)).unwrap();
    let error = provider
        .complete(CompletionRequest {
            instructions: "summarize",
            input: "way too much",
            max_output_tokens: 100,
            tier: ModelTier::Standard,
        })
        .await
        .unwrap_err();

    assert!(matches!(error, CompletionError::ContextLengthExceeded));
}

#[tokio::test]
async fn service_errors_carry_the_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).json_body(json!({
                "error": {
                    "message": "Rate limit reached.",
                    "type": "rate_limit_error"
                }
            }));
        })
        .await;

    let provider = HttpCompletionProvider::new(&config_for(&server)).unwrap();
    let error = provider
        .complete(CompletionRequest {
            instructions: "summarize",
            input: "text",
            max_output_tokens: 100,
            tier: ModelTier::Standard,
        })
        .await
        .unwrap_err();

    match error {
        CompletionError::Service(message) => assert!(message.contains("Rate limit reached")),
        other => panic!("expected Service error, got {other:?}"),
    }
}

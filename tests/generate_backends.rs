// tests/generate_backends.rs
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use topic_digest::generate::{
    Generator, OllamaGenerator, OpenAiGenerator, RequestLog, EMPTY_INPUT_TEXT,
};
use topic_digest::Item;

fn items() -> Vec<Item> {
    vec![Item {
        id: Some(1),
        title: "New LLM released".into(),
        url: "https://a.test/1".into(),
        source: "LocalLLaMA".into(),
        source_kind: "reddit".into(),
        score: 321,
        matched_keywords: vec!["LLM".into()],
        created_at: 0,
    }]
}

fn log_in(dir: &tempfile::TempDir) -> Arc<RequestLog> {
    Arc::new(RequestLog::new(dir.path().join("llm.log"), true))
}

#[tokio::test]
async fn ollama_generates_and_logs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "gpt-oss:20b", "stream": false})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"response": "  ## Overview\nAll good.\n", "done": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    let g = OllamaGenerator::new(&server.uri(), "gpt-oss:20b", log.clone()).unwrap();

    let md = g.summarize(&items(), "AI").await.unwrap();
    assert_eq!(md, "## Overview\nAll good.");

    let recs = log.records().unwrap();
    assert_eq!(recs.len(), 1);
    let r = &recs[0];
    assert!(r.success);
    assert_eq!(r.provider, "ollama");
    assert_eq!(r.topic, "AI");
    assert_eq!(r.cost_usd, 0.0);
    assert!(r.prompt_tokens > 0);
    assert_eq!(r.prompt_fingerprint.len(), 16);
    assert_eq!(r.total_tokens, r.prompt_tokens + r.completion_tokens);
}

#[tokio::test]
async fn ollama_failure_is_logged_and_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    let g = OllamaGenerator::new(&server.uri(), "m", log.clone()).unwrap();

    assert!(g.summarize(&items(), "AI").await.is_err());
    let stats = log.stats().unwrap();
    assert_eq!((stats.total_requests, stats.failed), (1, 1));
    assert!(log.records().unwrap()[0].error.is_some());
}

#[tokio::test]
async fn empty_input_skips_the_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let g = OllamaGenerator::new(&server.uri(), "m", Arc::new(RequestLog::disabled())).unwrap();
    assert_eq!(g.summarize(&[], "AI").await.unwrap(), EMPTY_INPUT_TEXT);

    let g = OpenAiGenerator::new("sk-test", "gpt-4o-mini", Arc::new(RequestLog::disabled()))
        .unwrap()
        .with_base_url(server.uri());
    assert_eq!(g.summarize(&[], "AI").await.unwrap(), EMPTY_INPUT_TEXT);
}

#[tokio::test]
async fn openai_uses_reported_usage_for_cost() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 2000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "## Overview\nBusy day."}}],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 500, "total_tokens": 1500}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    let g = OpenAiGenerator::new("sk-test", "gpt-4o-mini", log.clone())
        .unwrap()
        .with_base_url(server.uri());

    assert_eq!(g.summarize(&items(), "AI").await.unwrap(), "## Overview\nBusy day.");

    let r = &log.records().unwrap()[0];
    assert_eq!(r.provider, "openai");
    assert_eq!((r.prompt_tokens, r.completion_tokens, r.total_tokens), (1000, 500, 1500));
    assert!((r.cost_usd - 0.00045).abs() < 1e-12);
}

#[tokio::test]
async fn openai_without_content_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let g = OpenAiGenerator::new("sk-test", "gpt-4o-mini", Arc::new(RequestLog::disabled()))
        .unwrap()
        .with_base_url(server.uri());
    let err = g.summarize(&items(), "AI").await.unwrap_err();
    assert!(err.to_string().contains("no content"));
}

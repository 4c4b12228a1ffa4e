mod common;

use gleaner_llm::inference::Inference;
use gleaner_llm::inference::PromptedInference;
use gleaner_llm::ollama::{OllamaClient, OllamaOptions};
use gleaner_llm::traits::{InferenceError, LlmClient};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_with_models(models: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    let listed: Vec<_> = models.iter().map(|m| json!({ "name": m })).collect();
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": listed })))
        .mount(&server)
        .await;
    server
}

fn no_pull() -> OllamaOptions {
    OllamaOptions {
        request_timeout: Duration::from_secs(5),
        pull_missing: false,
    }
}

#[tokio::test]
async fn generate_sends_model_prompt_and_options() {
    common::init_test_tracing();
    let server = server_with_models(&["gemma3:1b"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "gemma3:1b",
            "prompt": "hello",
            "system": "be terse",
            "stream": false,
            "options": { "num_predict": 16 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gemma3:1b",
            "response": "hi",
            "done": true,
            "eval_count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::connect(&server.uri(), "gemma3:1b", no_pull())
        .await
        .unwrap();
    let resp = client
        .generate("hello", Some("be terse"), Some(16), None)
        .await
        .unwrap();

    assert_eq!(resp.text, "hi");
    assert_eq!(resp.tokens_used, Some(2));
    assert_eq!(client.model_name(), "gemma3:1b");
}

#[tokio::test]
async fn empty_response_is_preserved() {
    let server = server_with_models(&["gemma3:1b"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "" })))
        .mount(&server)
        .await;

    let client = OllamaClient::connect(&server.uri(), "gemma3:1b", no_pull())
        .await
        .unwrap();
    let inference = PromptedInference::new(Arc::new(client));

    assert_eq!(inference.infer("nothing here", "prices").await.unwrap(), "");
}

#[tokio::test]
async fn missing_response_field_is_malformed() {
    let server = server_with_models(&["gemma3:1b"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
        .mount(&server)
        .await;

    let client = OllamaClient::connect(&server.uri(), "gemma3:1b", no_pull())
        .await
        .unwrap();
    let err = client.generate("x", None, None, None).await.unwrap_err();

    assert!(matches!(err, InferenceError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn backend_error_carries_status_and_message() {
    let server = server_with_models(&["gemma3:1b"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "out of memory" })),
        )
        .mount(&server)
        .await;

    let client = OllamaClient::connect(&server.uri(), "gemma3:1b", no_pull())
        .await
        .unwrap();
    let err = client.generate("x", None, None, None).await.unwrap_err();

    match err {
        InferenceError::Backend { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "out of memory");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_model_without_pull_is_reported() {
    let server = server_with_models(&["llama3:latest"]).await;

    let err = OllamaClient::connect(&server.uri(), "gemma3:1b", no_pull())
        .await
        .err()
        .expect("connect should fail");

    assert!(matches!(err, InferenceError::ModelNotAvailable(_)), "{err:?}");
}

#[tokio::test]
async fn missing_model_is_pulled_when_allowed() {
    let server = server_with_models(&[]).await;
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(json!({ "model": "gemma3:1b", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let options = OllamaOptions {
        pull_missing: true,
        ..no_pull()
    };
    let client = OllamaClient::connect(&server.uri(), "gemma3:1b", options).await;

    assert!(client.is_ok());
}

#[tokio::test]
async fn connect_lists_models_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "models": [{ "name": "gemma3:1b" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    OllamaClient::connect(&server.uri(), "gemma3:1b", no_pull())
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn untagged_model_name_matches_latest_tag() {
    let server = server_with_models(&["llama3:latest"]).await;

    let client = OllamaClient::connect(&server.uri(), "llama3", no_pull()).await;

    assert!(client.is_ok());
}

#[tokio::test]
async fn unreachable_server_fails_connect_with_hint() {
    // Nothing listens on port 9 on a test host.
    let err = OllamaClient::connect("http://127.0.0.1:9", "gemma3:1b", no_pull())
        .await
        .err()
        .expect("connect should fail");

    match err {
        InferenceError::Unreachable(msg) => assert!(msg.contains("ollama serve")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "e2e"), ignore = "needs a running Ollama server")]
async fn live_ollama_generate_smoketest() {
    common::init_test_tracing();
    let endpoint =
        std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
    let client = OllamaClient::connect(&endpoint, "gemma3:1b", OllamaOptions::default())
        .await
        .expect("running ollama server");

    let resp = client
        .generate("Say Ok", None, Some(8), Some(0.2))
        .await
        .expect("generate");
    tracing::debug!("ollama response is: {}", resp.text);

    assert!(!resp.text.trim().is_empty());
}

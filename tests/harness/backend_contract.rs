use langmetres::client::{CompletionClient, CompletionRequest, HttpCompletionClient};
use langmetres::error::{CompletionError, EnvUpdateError};
use langmetres::harness::ModelConfig;
use serde_json::json;
use std::collections::BTreeMap;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body(model: &str, content: &str) -> serde_json::Value {
    json!({
        "status": "success",
        "response": {
            "response_content": content,
            "model_name": model,
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 30,
                "total_tokens": 42,
                "cost": 0.00021,
                "latency": 0.83
            }
        }
    })
}

#[tokio::test]
async fn completion_posts_model_prompt_and_sampling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_json(json!({
            "model": "gpt-4o",
            "user_prompt": "Name three primes",
            "temperature": 0.2,
            "top_p": 0.9
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("gpt-4o", "2, 3, 5")))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(&server.uri());
    let request = CompletionRequest::new(
        "gpt-4o",
        "Name three primes",
        ModelConfig {
            temperature: 0.2,
            top_p: 0.9,
        },
    );
    let metrics = client.complete(&request).await.unwrap();

    assert_eq!(metrics.response_content, "2, 3, 5");
    assert_eq!(metrics.model_name, "gpt-4o");
    assert_eq!(metrics.usage.total_tokens, 42);
    assert!((metrics.usage.latency - 0.83).abs() < 1e-9);
    assert_eq!(metrics.passed, None);
}

#[tokio::test]
async fn configured_system_prompt_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"system_prompt": "Answer tersely."})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("m", "ok")))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(&server.uri())
        .with_system_prompt(Some("Answer tersely.".into()));
    let request = CompletionRequest::new("m", "hi", ModelConfig::default());
    assert!(client.complete(&request).await.is_ok());
}

#[tokio::test]
async fn error_status_carries_a_scrubbed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("{\"detail\":\"invalid key api_key=sk-live-abc123\"}"),
        )
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(&server.uri());
    let request = CompletionRequest::new("gpt-4o", "hi", ModelConfig::default());
    let err = client.complete(&request).await.unwrap_err();

    match &err {
        CompletionError::Status { status, body } => {
            assert_eq!(*status, 401);
            assert!(!body.contains("abc123"));
            assert!(body.contains("[REDACTED]"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().starts_with("HTTP error! status: 401"));
}

#[tokio::test]
async fn undecodable_payload_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(&server.uri());
    let request = CompletionRequest::new("gpt-4o", "hi", ModelConfig::default());
    let err = client.complete(&request).await.unwrap_err();
    assert!(matches!(err, CompletionError::Decode { .. }));
}

#[tokio::test]
async fn environment_update_posts_variables() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/envs"))
        .and(body_json(json!({
            "variables": {"ANTHROPIC": "sk-2", "OPENAI_API_KEY": "sk-1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Environment variables updated successfully",
            "updated_vars": ["OPENAI_API_KEY", "ANTHROPIC"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(&server.uri());
    let variables = langmetres::env::parse_env_vars("OPENAI_API_KEY=sk-1\nBAD_LINE\nANTHROPIC=sk-2");
    let ack = client.update_environment(&variables).await.unwrap();

    assert_eq!(ack.status, "success");
    assert_eq!(ack.updated_vars.len(), 2);
}

#[tokio::test]
async fn environment_update_failure_is_reported_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/envs"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(&server.uri());
    let variables = BTreeMap::from([("A".to_string(), "1".to_string())]);
    let err = client.update_environment(&variables).await.unwrap_err();
    assert!(matches!(err, EnvUpdateError::Status { status: 500, .. }));
}

#[tokio::test]
async fn empty_environment_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/envs"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(&server.uri());
    let err = client.update_environment(&BTreeMap::new()).await.unwrap_err();
    assert!(matches!(err, EnvUpdateError::Empty));
}

#[tokio::test]
async fn health_probe_reads_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;

    let client = HttpCompletionClient::new(&server.uri());
    assert!(client.health().await.unwrap().is_healthy());
}

#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Embedding client tests against a mocked HTTP provider.

use answerdesk::config::Config;
use answerdesk::embeddings::ollama::OllamaClient;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dimension: u32) -> Config {
    let address = server.address();
    let mut config = Config::default();
    config.ollama.host = address.ip().to_string();
    config.ollama.port = address.port();
    config.ollama.embedding_dimension = dimension;
    config.ollama.batch_size = 2;
    config
}

fn client_for(server: &MockServer, dimension: u32) -> OllamaClient {
    OllamaClient::new(&config_for(server, dimension))
        .expect("client should build")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(2)
}

async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> T + Send + 'static,
) -> T {
    tokio::task::spawn_blocking(task)
        .await
        .expect("blocking task should not panic")
}

#[tokio::test]
async fn embed_one_returns_configured_width() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.1, 0.2, 0.3]]})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let vector = run_blocking(move || client.embed_one("how do refunds work"))
        .await
        .expect("embedding should succeed");

    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn wrong_width_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.1, 0.2]]})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let error = run_blocking(move || client.embed_one("query"))
        .await
        .expect_err("dimension mismatch must fail");

    assert!(format!("{error:#}").contains("dimension mismatch"));
}

#[tokio::test]
async fn batches_are_split_by_configured_size() {
    let server = MockServer::start().await;
    // batch_size is 2, so five texts arrive as three requests
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0], [2.0]]})),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[5.0]]})))
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let texts: Vec<String> = (0..5).map(|i| format!("text {}", i)).collect();
    let vectors = run_blocking(move || client.embed_batch(&texts))
        .await
        .expect("batch embedding should succeed");

    assert_eq!(vectors.len(), 5);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.5, 0.5, 0.5]]})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let vector = run_blocking(move || client.embed_one("query"))
        .await
        .expect("retry should recover from one 500");

    assert_eq!(vector.len(), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let error = run_blocking(move || client.embed_one("query"))
        .await
        .expect_err("400 must fail immediately");

    assert!(format!("{error:#}").contains("400"));
}

#[tokio::test]
async fn ping_hits_tags_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    run_blocking(move || client.ping())
        .await
        .expect("ping should succeed");
}

#[tokio::test]
async fn missing_model_fails_validation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "some-other-model"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let error = run_blocking(move || client.validate_model())
        .await
        .expect_err("unknown model must fail validation");

    assert!(format!("{error:#}").contains("not available"));
}

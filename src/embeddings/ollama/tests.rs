use super::*;
use crate::config::Config;

fn test_config(dimension: u32) -> Config {
    let mut config = Config::default();
    config.ollama.embedding_dimension = dimension;
    config.ollama.batch_size = 2;
    config
}

#[test]
fn client_reads_dimension_from_config() {
    let client = OllamaClient::new(&test_config(768)).expect("client should build");

    assert_eq!(client.dimension(), 768);
    assert_eq!(client.model(), Config::default().ollama.model);
}

#[test]
fn builders_adjust_client() {
    let client = OllamaClient::new(&test_config(768))
        .expect("client should build")
        .with_timeout(std::time::Duration::from_secs(5))
        .with_retry_attempts(1);

    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn parse_embed_response_accepts_matching_vectors() {
    let body = r#"{"embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]}"#;

    let vectors = parse_embed_response(body, 2, 3).expect("should parse");

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], vec![0.1, 0.2, 0.3]);
}

#[test]
fn parse_embed_response_rejects_wrong_dimension() {
    let body = r#"{"embeddings": [[0.1, 0.2]]}"#;

    let error = parse_embed_response(body, 1, 3).expect_err("dimension mismatch must fail");

    assert!(error.to_string().contains("dimension mismatch"));
}

#[test]
fn parse_embed_response_rejects_count_mismatch() {
    let body = r#"{"embeddings": [[0.1, 0.2, 0.3]]}"#;

    let error = parse_embed_response(body, 2, 3).expect_err("count mismatch must fail");

    assert!(error.to_string().contains("count mismatch"));
}

#[test]
fn parse_embed_response_rejects_malformed_body() {
    let error = parse_embed_response("not json", 1, 3).expect_err("garbage must fail");

    assert!(error.to_string().contains("parse"));
}

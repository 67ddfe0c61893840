use super::*;
use crate::config::Config;
use tempfile::TempDir;

const TEST_DIMENSION: usize = 5;

fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::default();
    config.base_dir = temp_dir.path().to_path_buf();
    config.ollama.embedding_dimension = TEST_DIMENSION as u32;
    (config, temp_dir)
}

fn record(id: &str, tenant_id: &str, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        id: id.to_string(),
        vector,
        metadata: ChunkMetadata {
            tenant_id: tenant_id.to_string(),
            site_id: None,
            document_id: "1".to_string(),
            title: "Support Handbook".to_string(),
            source_url: "https://example.com/handbook".to_string(),
            content: format!("Test content for {}", id),
            token_estimate: 12,
            chunk_index: 0,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

fn unit_vector(direction: usize) -> Vec<f32> {
    let mut vector = vec![0.0; TEST_DIMENSION];
    vector[direction % TEST_DIMENSION] = 1.0;
    vector
}

#[tokio::test]
async fn store_initializes_empty() {
    let (config, _temp_dir) = create_test_config();

    let store = VectorStore::new(&config).await.expect("store should open");

    assert_eq!(store.count().await.expect("count should work"), 0);
}

#[tokio::test]
async fn store_and_count_embeddings() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::new(&config).await.expect("store should open");

    store
        .store_batch(vec![
            record("v1", "1", unit_vector(0)),
            record("v2", "1", unit_vector(1)),
            record("v3", "2", unit_vector(2)),
        ])
        .await
        .expect("batch should store");

    assert_eq!(store.count().await.expect("count should work"), 3);
}

#[tokio::test]
async fn wrong_dimension_write_is_rejected() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::new(&config).await.expect("store should open");

    let error = store
        .store_batch(vec![record("v1", "1", vec![0.1, 0.2])])
        .await
        .expect_err("short vector must be rejected");

    assert!(matches!(error, DeskError::Embedding(_)));
    assert_eq!(store.count().await.expect("count should work"), 0);
}

#[tokio::test]
async fn wrong_dimension_query_is_rejected() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::new(&config).await.expect("store should open");

    let error = store
        .search_similar("1", &[0.1, 0.2], 5, None)
        .await
        .expect_err("short query vector must be rejected");

    assert!(matches!(error, DeskError::Embedding(_)));
}

#[tokio::test]
async fn search_returns_most_similar_first() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::new(&config).await.expect("store should open");

    store
        .store_batch(vec![
            record("aligned", "1", vec![1.0, 0.0, 0.0, 0.0, 0.0]),
            record("nearby", "1", vec![0.9, 0.1, 0.0, 0.0, 0.0]),
            record("orthogonal", "1", vec![0.0, 0.0, 0.0, 0.0, 1.0]),
        ])
        .await
        .expect("batch should store");

    let hits = store
        .search_similar("1", &[1.0, 0.0, 0.0, 0.0, 0.0], 3, None)
        .await
        .expect("search should work");

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].vector_id, "aligned");
    assert_eq!(hits[1].vector_id, "nearby");
    assert!(hits[0].similarity >= hits[1].similarity);
    assert!(hits[1].similarity >= hits[2].similarity);
}

#[tokio::test]
async fn search_never_crosses_tenants() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::new(&config).await.expect("store should open");

    // Tenant 2 has the perfect match; tenant 1's query must not see it
    store
        .store_batch(vec![
            record("t1-chunk", "1", vec![0.1, 0.9, 0.0, 0.0, 0.0]),
            record("t2-chunk", "2", vec![1.0, 0.0, 0.0, 0.0, 0.0]),
        ])
        .await
        .expect("batch should store");

    let hits = store
        .search_similar("1", &[1.0, 0.0, 0.0, 0.0, 0.0], 10, None)
        .await
        .expect("search should work");

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].vector_id, "t1-chunk");
    assert_eq!(hits[0].metadata.tenant_id, "1");
}

#[tokio::test]
async fn site_filter_keeps_tenant_wide_chunks() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::new(&config).await.expect("store should open");

    let mut site_scoped = record("site-a", "1", unit_vector(0));
    site_scoped.metadata.site_id = Some("10".to_string());
    let mut other_site = record("site-b", "1", unit_vector(1));
    other_site.metadata.site_id = Some("11".to_string());
    let tenant_wide = record("tenant-wide", "1", unit_vector(2));

    store
        .store_batch(vec![site_scoped, other_site, tenant_wide])
        .await
        .expect("batch should store");

    let hits = store
        .search_similar("1", &unit_vector(0), 10, Some("10"))
        .await
        .expect("search should work");

    let ids: Vec<&str> = hits.iter().map(|h| h.vector_id.as_str()).collect();
    assert!(ids.contains(&"site-a"));
    assert!(ids.contains(&"tenant-wide"));
    assert!(!ids.contains(&"site-b"));
}

#[tokio::test]
async fn delete_document_removes_only_that_document() {
    let (config, _temp_dir) = create_test_config();
    let store = VectorStore::new(&config).await.expect("store should open");

    let mut other_document = record("keep", "1", unit_vector(1));
    other_document.metadata.document_id = "2".to_string();

    store
        .store_batch(vec![record("drop", "1", unit_vector(0)), other_document])
        .await
        .expect("batch should store");

    store
        .delete_document("1", "1")
        .await
        .expect("delete should work");

    assert_eq!(store.count().await.expect("count should work"), 1);
}

#[tokio::test]
async fn reopening_with_other_dimension_fails_closed() {
    let (mut config, _temp_dir) = create_test_config();

    {
        let _store = VectorStore::new(&config).await.expect("store should open");
    }

    config.ollama.embedding_dimension = 7;
    let error = VectorStore::new(&config)
        .await
        .expect_err("dimension change must not silently reuse the table");

    assert!(matches!(error, DeskError::Database(_)));
}

#[tokio::test]
async fn recreate_drops_existing_vectors() {
    let (config, _temp_dir) = create_test_config();

    {
        let store = VectorStore::new(&config).await.expect("store should open");
        store
            .store_batch(vec![record("v1", "1", unit_vector(0))])
            .await
            .expect("batch should store");
    }

    let rebuilt = VectorStore::recreate(&config)
        .await
        .expect("recreate should work");

    assert_eq!(rebuilt.count().await.expect("count should work"), 0);
}

#[test]
fn literal_escaping_doubles_quotes() {
    assert_eq!(escape_literal("plain"), "plain");
    assert_eq!(escape_literal("o'brien"), "o''brien");
    assert_eq!(escape_literal("a' OR '1'='1"), "a'' OR ''1''=''1");
}

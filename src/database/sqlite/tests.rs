use super::*;
use crate::database::sqlite::models::{NewCuratedAnswer, NewTenant};
use tempfile::TempDir;

async fn test_database() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let database = Database::new(temp_dir.path().join("test.db"))
        .await
        .expect("database should initialize");
    (database, temp_dir)
}

async fn create_tenant(database: &Database, slug: &str) -> models::Tenant {
    database
        .create_tenant(NewTenant {
            slug: slug.to_string(),
            name: format!("{} Inc", slug),
        })
        .await
        .expect("tenant should be created")
}

#[tokio::test]
async fn initialization_runs_migrations() {
    let (database, _temp_dir) = test_database().await;

    // Migrations are idempotent on an already-initialized database
    database.run_migrations().await.expect("re-run should be fine");

    let tenants = database.list_tenants().await.expect("query should work");
    assert!(tenants.is_empty());
}

#[tokio::test]
async fn initialize_from_config_dir_creates_the_directory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_dir = temp_dir.path().join("nested").join("config");

    let database = Database::initialize_from_config_dir(&config_dir)
        .await
        .expect("database should initialize");

    assert!(config_dir.join("metadata.db").exists());
    drop(database);
}

#[tokio::test]
async fn tenant_statistics_counts_rows() {
    let (database, _temp_dir) = test_database().await;
    let tenant = create_tenant(&database, "acme").await;

    database
        .create_curated_answer(NewCuratedAnswer {
            tenant_id: tenant.id,
            site_id: None,
            question: "How do refunds work?".to_string(),
            answer: "Five business days.".to_string(),
            priority: 1,
            keywords: vec!["refund".to_string()],
            tags: Vec::new(),
        })
        .await
        .expect("answer should be created");

    let stats = database
        .tenant_statistics(tenant)
        .await
        .expect("statistics should work");

    assert_eq!(stats.documents, 0);
    assert_eq!(stats.chunks, 0);
    assert_eq!(stats.curated_answers, 1);
    assert_eq!(stats.escalation_rules, 0);
}

#[tokio::test]
async fn curated_source_parses_string_ids() {
    let (database, _temp_dir) = test_database().await;
    let tenant = create_tenant(&database, "acme").await;

    database
        .create_curated_answer(NewCuratedAnswer {
            tenant_id: tenant.id,
            site_id: None,
            question: "How do refunds work?".to_string(),
            answer: "Five business days.".to_string(),
            priority: 1,
            keywords: vec!["refund".to_string()],
            tags: Vec::new(),
        })
        .await
        .expect("answer should be created");

    let answers = database
        .active_answers(&tenant.id.to_string(), None)
        .await
        .expect("trait lookup should work");

    assert_eq!(answers.len(), 1);
}

#[tokio::test]
async fn curated_source_rejects_non_numeric_tenant() {
    let (database, _temp_dir) = test_database().await;

    let error = database
        .active_answers("acme; DROP TABLE tenants", None)
        .await
        .expect_err("junk tenant id must fail");

    assert!(matches!(error, ResolveError::InvalidInput(_)));
}

#[tokio::test]
async fn optimize_runs() {
    let (database, _temp_dir) = test_database().await;

    database.optimize().await.expect("optimize should work");
}

use super::*;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::DocumentStatus;
use crate::rules::{BoolOp, RulePredicate};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn test_pool() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let database = Database::new(temp_dir.path().join("test.db"))
        .await
        .expect("database should initialize");
    (database.pool().clone(), temp_dir)
}

async fn tenant(pool: &SqlitePool, slug: &str) -> Tenant {
    TenantQueries::create(
        pool,
        NewTenant {
            slug: slug.to_string(),
            name: format!("{} Inc", slug),
        },
    )
    .await
    .expect("tenant should be created")
}

fn answer_for(tenant_id: i64, question: &str, priority: i64) -> NewCuratedAnswer {
    NewCuratedAnswer {
        tenant_id,
        site_id: None,
        question: question.to_string(),
        answer: format!("Answer: {}", question),
        priority,
        keywords: vec!["refund".to_string()],
        tags: vec!["billing".to_string()],
    }
}

#[tokio::test]
async fn tenant_round_trip() {
    let (pool, _temp_dir) = test_pool().await;

    let created = tenant(&pool, "acme").await;
    let by_slug = TenantQueries::get_by_slug(&pool, "acme")
        .await
        .expect("query should work")
        .expect("tenant should exist");

    assert_eq!(created, by_slug);
    assert!(TenantQueries::get_by_slug(&pool, "missing")
        .await
        .expect("query should work")
        .is_none());
}

#[tokio::test]
async fn duplicate_tenant_slug_is_rejected() {
    let (pool, _temp_dir) = test_pool().await;
    tenant(&pool, "acme").await;

    let result = TenantQueries::create(
        &pool,
        NewTenant {
            slug: "acme".to_string(),
            name: "Duplicate".to_string(),
        },
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn sites_are_scoped_per_tenant() {
    let (pool, _temp_dir) = test_pool().await;
    let acme = tenant(&pool, "acme").await;
    let globex = tenant(&pool, "globex").await;

    SiteQueries::create(
        &pool,
        NewSite {
            tenant_id: acme.id,
            slug: "help".to_string(),
            name: "Help Center".to_string(),
        },
    )
    .await
    .expect("site should be created");

    let acme_sites = SiteQueries::list_for_tenant(&pool, acme.id)
        .await
        .expect("query should work");
    let globex_sites = SiteQueries::list_for_tenant(&pool, globex.id)
        .await
        .expect("query should work");

    assert_eq!(acme_sites.len(), 1);
    assert!(globex_sites.is_empty());
}

#[tokio::test]
async fn document_lifecycle() {
    let (pool, _temp_dir) = test_pool().await;
    let acme = tenant(&pool, "acme").await;

    let document = DocumentQueries::create(
        &pool,
        NewDocument {
            tenant_id: acme.id,
            site_id: None,
            title: "Handbook".to_string(),
            source_url: "https://example.com/handbook".to_string(),
        },
    )
    .await
    .expect("document should be created");
    assert_eq!(document.status, DocumentStatus::Pending);

    DocumentQueries::mark_indexed(&pool, document.id, 4)
        .await
        .expect("update should work");

    let updated = DocumentQueries::get_by_id(&pool, document.id)
        .await
        .expect("query should work")
        .expect("document should exist");
    assert_eq!(updated.status, DocumentStatus::Indexed);
    assert_eq!(updated.chunk_count, 4);
    assert!(updated.indexed_date.is_some());

    DocumentQueries::mark_failed(&pool, document.id, "provider offline")
        .await
        .expect("update should work");

    let failed = DocumentQueries::get_by_id(&pool, document.id)
        .await
        .expect("query should work")
        .expect("document should exist");
    assert_eq!(failed.status, DocumentStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("provider offline"));
}

#[tokio::test]
async fn chunk_replacement_is_wholesale() {
    let (pool, _temp_dir) = test_pool().await;
    let acme = tenant(&pool, "acme").await;
    let document = DocumentQueries::create(
        &pool,
        NewDocument {
            tenant_id: acme.id,
            site_id: None,
            title: "Handbook".to_string(),
            source_url: "https://example.com/handbook".to_string(),
        },
    )
    .await
    .expect("document should be created");

    let chunk = |index: i64, vector_id: &str| NewDocumentChunk {
        document_id: document.id,
        tenant_id: acme.id,
        chunk_index: index,
        content: format!("chunk {}", index),
        token_estimate: 10,
        vector_id: vector_id.to_string(),
    };

    DocumentChunkQueries::replace_for_document(
        &pool,
        document.id,
        &[chunk(0, "v0"), chunk(1, "v1"), chunk(2, "v2")],
    )
    .await
    .expect("first write should work");

    DocumentChunkQueries::replace_for_document(&pool, document.id, &[chunk(0, "v3"), chunk(1, "v4")])
        .await
        .expect("replacement should work");

    let rows = DocumentChunkQueries::list_for_document(&pool, document.id)
        .await
        .expect("query should work");

    assert_eq!(rows.len(), 2, "old chunks must be gone");
    let vector_ids: Vec<&str> = rows.iter().map(|r| r.vector_id.as_str()).collect();
    assert_eq!(vector_ids, vec!["v3", "v4"]);
}

#[tokio::test]
async fn active_answers_respect_tenant_and_status() {
    let (pool, _temp_dir) = test_pool().await;
    let acme = tenant(&pool, "acme").await;
    let globex = tenant(&pool, "globex").await;

    let kept = CuratedAnswerQueries::create(&pool, answer_for(acme.id, "Refunds?", 5))
        .await
        .expect("answer should be created");
    let disabled = CuratedAnswerQueries::create(&pool, answer_for(acme.id, "Old refunds?", 9))
        .await
        .expect("answer should be created");
    CuratedAnswerQueries::create(&pool, answer_for(globex.id, "Globex refunds?", 9))
        .await
        .expect("answer should be created");

    CuratedAnswerQueries::set_status(&pool, disabled.id, CuratedStatus::Inactive)
        .await
        .expect("status update should work");

    let active = CuratedAnswerQueries::list_active(&pool, acme.id, None)
        .await
        .expect("query should work");

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, kept.id);
    assert_eq!(active[0].keywords, vec!["refund"]);
}

#[tokio::test]
async fn site_scoped_answers_filter_correctly() {
    let (pool, _temp_dir) = test_pool().await;
    let acme = tenant(&pool, "acme").await;
    let help = SiteQueries::create(
        &pool,
        NewSite {
            tenant_id: acme.id,
            slug: "help".to_string(),
            name: "Help Center".to_string(),
        },
    )
    .await
    .expect("site should be created");
    let docs = SiteQueries::create(
        &pool,
        NewSite {
            tenant_id: acme.id,
            slug: "docs".to_string(),
            name: "Docs".to_string(),
        },
    )
    .await
    .expect("site should be created");

    let mut tenant_wide = answer_for(acme.id, "Tenant-wide answer", 1);
    tenant_wide.site_id = None;
    let mut help_only = answer_for(acme.id, "Help-only answer", 1);
    help_only.site_id = Some(help.id);
    let mut docs_only = answer_for(acme.id, "Docs-only answer", 1);
    docs_only.site_id = Some(docs.id);

    for new_answer in [tenant_wide, help_only, docs_only] {
        CuratedAnswerQueries::create(&pool, new_answer)
            .await
            .expect("answer should be created");
    }

    let scoped = CuratedAnswerQueries::list_active(&pool, acme.id, Some(help.id))
        .await
        .expect("query should work");
    let questions: Vec<&str> = scoped.iter().map(|a| a.question.as_str()).collect();

    assert!(questions.contains(&"Tenant-wide answer"));
    assert!(questions.contains(&"Help-only answer"));
    assert!(!questions.contains(&"Docs-only answer"));

    let unscoped = CuratedAnswerQueries::list_active(&pool, acme.id, None)
        .await
        .expect("query should work");
    assert_eq!(unscoped.len(), 3, "tenant-wide search sees every site");
}

#[tokio::test]
async fn escalation_rules_round_trip() {
    let (pool, _temp_dir) = test_pool().await;
    let acme = tenant(&pool, "acme").await;

    let rule = EscalationRuleQueries::create(
        &pool,
        NewEscalationRule {
            tenant_id: acme.id,
            name: "always off".to_string(),
            predicate: RulePredicate {
                operator: BoolOp::And,
                conditions: vec![],
            },
        },
    )
    .await
    .expect("rule should be created");
    assert!(rule.enabled);

    EscalationRuleQueries::set_enabled(&pool, rule.id, false)
        .await
        .expect("update should work");

    let enabled = EscalationRuleQueries::list_enabled(&pool, acme.id)
        .await
        .expect("query should work");
    assert!(enabled.is_empty());

    let all = EscalationRuleQueries::list_for_tenant(&pool, acme.id)
        .await
        .expect("query should work");
    assert_eq!(all.len(), 1);
    assert!(!all[0].enabled);
}

#[tokio::test]
async fn malformed_stored_predicate_is_skipped_not_fatal() {
    let (pool, _temp_dir) = test_pool().await;
    let acme = tenant(&pool, "acme").await;

    EscalationRuleQueries::create(
        &pool,
        NewEscalationRule {
            tenant_id: acme.id,
            name: "good rule".to_string(),
            predicate: RulePredicate {
                operator: BoolOp::Or,
                conditions: vec![],
            },
        },
    )
    .await
    .expect("rule should be created");

    // Simulate a row written by an older build with an incompatible shape
    sqlx::query(
        "INSERT INTO escalation_rules (tenant_id, name, predicate, enabled, created_date) \
         VALUES (?, 'broken rule', '{not json', 1, ?)",
    )
    .bind(acme.id)
    .bind(chrono::Utc::now().naive_utc())
    .execute(&pool)
    .await
    .expect("raw insert should work");

    let enabled = EscalationRuleQueries::list_enabled(&pool, acme.id)
        .await
        .expect("query should not fail on the broken row");

    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].name, "good rule");
}

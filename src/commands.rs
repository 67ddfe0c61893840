use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{
    CuratedStatus, NewCuratedAnswer, NewEscalationRule, NewSite, NewTenant, Tenant,
};
use crate::embeddings::ollama::OllamaClient;
use crate::escalation::{self, extract_keywords};
use crate::indexer::Indexer;
use crate::resolver::{AnswerResolver, ResolverOptions};
use crate::rules::{EvaluationContext, RulePredicate, evaluate};

async fn open_database(config: &Config) -> Result<Database> {
    Database::initialize_from_config_dir(&config.base_dir)
        .await
        .context("Failed to initialize database")
}

async fn require_tenant(database: &Database, slug: &str) -> Result<Tenant> {
    database
        .get_tenant_by_slug(slug)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No tenant with slug '{}'. Use 'tenant add' first.", slug))
}

async fn resolve_site_id(
    database: &Database,
    tenant: &Tenant,
    site_slug: Option<&str>,
) -> Result<Option<i64>> {
    match site_slug {
        None => Ok(None),
        Some(slug) => {
            let site = database
                .get_site_by_slug(tenant.id, slug)
                .await?
                .ok_or_else(|| {
                    anyhow::anyhow!("No site '{}' for tenant '{}'", slug, tenant.slug)
                })?;
            Ok(Some(site.id))
        }
    }
}

/// Register a new tenant
#[inline]
pub async fn add_tenant(slug: String, name: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;

    if let Some(existing) = database.get_tenant_by_slug(&slug).await? {
        println!("Tenant already exists: {} (ID: {})", existing.slug, existing.id);
        return Ok(());
    }

    let name = name.unwrap_or_else(|| slug.clone());
    let tenant = database
        .create_tenant(NewTenant { slug, name })
        .await
        .context("Failed to create tenant")?;

    println!("Created tenant: {} (ID: {})", tenant.slug, tenant.id);
    Ok(())
}

#[inline]
pub async fn list_tenants() -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;

    let tenants = database.list_tenants().await?;
    if tenants.is_empty() {
        println!("No tenants yet. Use 'answerdesk tenant add <slug>' to create one.");
        return Ok(());
    }

    println!("Tenants ({} total):", tenants.len());
    for tenant in tenants {
        println!("  {} (ID: {}) — {}", tenant.slug, tenant.id, tenant.name);
    }
    Ok(())
}

/// Register a site within a tenant
#[inline]
pub async fn add_site(tenant_slug: String, slug: String, name: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;
    let tenant = require_tenant(&database, &tenant_slug).await?;

    if database.get_site_by_slug(tenant.id, &slug).await?.is_some() {
        println!("Site '{}' already exists for tenant '{}'", slug, tenant.slug);
        return Ok(());
    }

    let name = name.unwrap_or_else(|| slug.clone());
    let site = database
        .create_site(NewSite {
            tenant_id: tenant.id,
            slug,
            name,
        })
        .await
        .context("Failed to create site")?;

    println!("Created site: {} (ID: {})", site.slug, site.id);
    Ok(())
}

#[inline]
pub async fn list_sites(tenant_slug: String) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;
    let tenant = require_tenant(&database, &tenant_slug).await?;

    let sites = database.list_sites_for_tenant(tenant.id).await?;
    if sites.is_empty() {
        println!("No sites for tenant '{}'.", tenant.slug);
        return Ok(());
    }

    for site in sites {
        println!("  {} (ID: {}) — {}", site.slug, site.id, site.name);
    }
    Ok(())
}

/// Author a curated answer
#[inline]
pub async fn add_answer(
    tenant_slug: String,
    question: String,
    answer: String,
    priority: i64,
    keywords: Vec<String>,
    tags: Vec<String>,
    site_slug: Option<String>,
) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;
    let tenant = require_tenant(&database, &tenant_slug).await?;
    let site_id = resolve_site_id(&database, &tenant, site_slug.as_deref()).await?;

    let created = database
        .create_curated_answer(NewCuratedAnswer {
            tenant_id: tenant.id,
            site_id,
            question,
            answer,
            priority,
            keywords,
            tags,
        })
        .await
        .context("Failed to create curated answer")?;

    println!(
        "Created curated answer {} (priority {}, {} keywords)",
        created.id,
        created.priority,
        created.keywords.len()
    );
    Ok(())
}

#[inline]
pub async fn list_answers(tenant_slug: String) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;
    let tenant = require_tenant(&database, &tenant_slug).await?;

    let answers = database.list_answers_for_tenant(tenant.id).await?;
    if answers.is_empty() {
        println!("No curated answers for tenant '{}'.", tenant.slug);
        return Ok(());
    }

    println!("Curated answers ({} total):", answers.len());
    for answer in answers {
        println!(
            "  [{}] {} (priority {}, {})",
            answer.id, answer.question, answer.priority, answer.status
        );
        if !answer.keywords.is_empty() {
            println!("      keywords: {}", answer.keywords.join(", "));
        }
    }
    Ok(())
}

/// Soft-enable or soft-disable a curated answer
#[inline]
pub async fn set_answer_enabled(id: i64, enabled: bool) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;

    let status = if enabled {
        CuratedStatus::Active
    } else {
        CuratedStatus::Inactive
    };

    if database.set_answer_status(id, status).await? {
        println!("Curated answer {} is now {}", id, status);
    } else {
        println!("No curated answer with id {}", id);
    }
    Ok(())
}

/// Ingest a UTF-8 text file as a document
#[inline]
pub async fn ingest_file(
    tenant_slug: String,
    path: &Path,
    title: Option<String>,
    source_url: Option<String>,
    site_slug: Option<String>,
) -> Result<()> {
    let config = Config::load()?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let title = title.unwrap_or_else(|| {
        path.file_stem()
            .map_or_else(|| "Untitled".to_string(), |s| s.to_string_lossy().into_owned())
    });
    let source_url =
        source_url.unwrap_or_else(|| format!("file://{}", path.display()));

    let indexer = Indexer::new(config).await?;
    let tenant = require_tenant(indexer.database(), &tenant_slug).await?;
    let site_id = resolve_site_id(indexer.database(), &tenant, site_slug.as_deref()).await?;

    let stats = indexer
        .ingest_document(&tenant, site_id, &title, &source_url, &text)
        .await?;

    if stats.replaced {
        println!(
            "Re-ingested document {} ({} chunks)",
            stats.document_id, stats.chunks
        );
    } else {
        println!(
            "Ingested document {} ({} chunks)",
            stats.document_id, stats.chunks
        );
    }
    Ok(())
}

/// Resolve a query and report the escalation verdict
#[inline]
pub async fn ask(
    tenant_slug: String,
    query: String,
    site_slug: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;
    let tenant = require_tenant(&database, &tenant_slug).await?;
    let site_id = resolve_site_id(&database, &tenant, site_slug.as_deref()).await?;

    let vector_store = VectorStore::new(&config).await?;
    let ollama_client = OllamaClient::new(&config)?;

    let mut options = ResolverOptions::from_config(&config);
    if let Some(limit) = limit {
        options.max_results = limit;
    }

    let resolver = AnswerResolver::new(
        Arc::new(database.clone()),
        Arc::new(vector_store),
        Arc::new(ollama_client),
        options,
    );

    let site_id_string = site_id.map(|id| id.to_string());
    let resolved = resolver
        .resolve(&tenant.id.to_string(), &query, site_id_string.as_deref())
        .await?;

    if resolved.curated.is_empty() {
        println!("No curated answers matched.");
    } else {
        println!("Curated answers:");
        for m in &resolved.curated {
            println!(
                "  [priority {}] {}",
                m.answer.priority, m.answer.question
            );
            println!("      {}", m.answer.answer);
            if !m.matched_keywords.is_empty() {
                println!("      matched keywords: {}", m.matched_keywords.join(", "));
            }
        }
    }

    println!();
    if resolved.passages.is_empty() {
        println!("No passages retrieved.");
    } else {
        println!("Retrieved passages:");
        for passage in &resolved.passages {
            println!(
                "  [{:.3}] {} — {}",
                passage.similarity, passage.title, passage.source_url
            );
            println!("      {}", passage.snippet);
        }
    }

    // Escalation check over the resolution outcome
    let rules = database.list_enabled_rules(tenant.id).await?;
    let mut context = EvaluationContext::new(
        query.clone(),
        f64::from(resolved.top_similarity()),
        Utc::now(),
    )
    .with_keywords(extract_keywords(&query));
    context.site_id = site_id_string;

    let decision = escalation::decide(&rules, &context);
    println!();
    if decision.should_escalate {
        println!("Escalation: {} rule(s) fired", decision.fired.len());
        for fired in &decision.fired {
            println!("  rule {} ('{}')", fired.rule_id, fired.rule_name);
        }
    } else {
        println!("Escalation: no rules fired");
    }

    Ok(())
}

/// Author an escalation rule from a JSON predicate
#[inline]
pub async fn add_rule(tenant_slug: String, name: String, predicate_json: String) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;
    let tenant = require_tenant(&database, &tenant_slug).await?;

    let predicate: RulePredicate = serde_json::from_str(&predicate_json)
        .context("Predicate is not valid rule JSON")?;

    let rule = database
        .create_escalation_rule(NewEscalationRule {
            tenant_id: tenant.id,
            name,
            predicate,
        })
        .await
        .context("Failed to create escalation rule")?;

    println!("Created escalation rule {} ('{}')", rule.id, rule.name);
    Ok(())
}

#[inline]
pub async fn list_rules(tenant_slug: String) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;
    let tenant = require_tenant(&database, &tenant_slug).await?;

    let rules = database.list_rules_for_tenant(tenant.id).await?;
    if rules.is_empty() {
        println!("No escalation rules for tenant '{}'.", tenant.slug);
        return Ok(());
    }

    println!("Escalation rules ({} total):", rules.len());
    for rule in rules {
        let state = if rule.enabled { "enabled" } else { "disabled" };
        println!("  [{}] {} ({})", rule.id, rule.name, state);
    }
    Ok(())
}

#[inline]
pub async fn set_rule_enabled(id: i64, enabled: bool) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;

    if database.set_rule_enabled(id, enabled).await? {
        println!(
            "Escalation rule {} is now {}",
            id,
            if enabled { "enabled" } else { "disabled" }
        );
    } else {
        println!("No escalation rule with id {}", id);
    }
    Ok(())
}

/// Dry-run one rule against a synthetic context and print the full trace
#[inline]
pub async fn test_rule(
    rule_id: i64,
    message: String,
    confidence: f64,
    user_email: Option<String>,
    site_id: Option<String>,
) -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;

    let rule = database
        .get_escalation_rule(rule_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No escalation rule with id {}", rule_id))?;

    let mut context = EvaluationContext::new(message.clone(), confidence, Utc::now())
        .with_keywords(extract_keywords(&message));
    context.user_email = user_email;
    context.site_id = site_id;

    let evaluation = evaluate(&rule.predicate, &context);

    println!(
        "Rule {} ('{}') {}",
        rule.id,
        rule.name,
        if evaluation.matched { "MATCHED" } else { "did not match" }
    );
    println!("Trace:");
    for entry in &evaluation.trace {
        let marker = if entry.matched { "✓" } else { "✗" };
        println!("  {}{} {}", "  ".repeat(entry.depth), marker, entry.detail);
    }
    Ok(())
}

/// Rebuild every vector after an embedding model change
#[inline]
pub async fn reembed() -> Result<()> {
    let config = Config::load()?;

    info!("Starting corpus re-embedding");
    let stats = Indexer::reembed_corpus(config).await?;

    println!(
        "Re-embedded {} chunks across {} documents",
        stats.chunks, stats.documents
    );
    Ok(())
}

/// Show per-tenant corpus and rule counts
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load()?;
    let database = open_database(&config).await?;

    let tenants = database.list_tenants().await?;
    if tenants.is_empty() {
        println!("No tenants configured.");
        return Ok(());
    }

    for tenant in tenants {
        let stats = database.tenant_statistics(tenant).await?;
        println!("🏢 {} (ID: {})", stats.tenant.slug, stats.tenant.id);
        println!("   Documents: {}", stats.documents);
        println!("   Chunks: {}", stats.chunks);
        println!("   Curated answers: {}", stats.curated_answers);
        println!("   Escalation rules: {}", stats.escalation_rules);
    }

    match VectorStore::new(&config).await {
        Ok(store) => println!("Vector store: {} embeddings", store.count().await?),
        Err(e) => println!("Vector store: unavailable ({})", e),
    }

    Ok(())
}

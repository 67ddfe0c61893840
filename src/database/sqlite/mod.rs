use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{
    CuratedAnswer, CuratedStatus, Document, DocumentChunkRow, EscalationRuleRow, NewCuratedAnswer,
    NewDocument, NewDocumentChunk, NewEscalationRule, NewSite, NewTenant, Site, Tenant,
    TenantStatistics,
};
use crate::database::sqlite::queries::{
    CuratedAnswerQueries, DocumentChunkQueries, DocumentQueries, EscalationRuleQueries,
    SiteQueries, TenantQueries,
};
use crate::escalation::EscalationRule;
use crate::resolver::{CuratedAnswerSource, ResolveError};

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        let db_path = config_dir.join("metadata.db");

        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(db_path).await
    }

    // Tenant operations
    pub async fn create_tenant(&self, new_tenant: NewTenant) -> Result<Tenant> {
        TenantQueries::create(&self.pool, new_tenant).await
    }

    pub async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        TenantQueries::get_by_slug(&self.pool, slug).await
    }

    pub async fn get_tenant_by_id(&self, id: i64) -> Result<Option<Tenant>> {
        TenantQueries::get_by_id(&self.pool, id).await
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        TenantQueries::list_all(&self.pool).await
    }

    // Site operations
    pub async fn create_site(&self, new_site: NewSite) -> Result<Site> {
        SiteQueries::create(&self.pool, new_site).await
    }

    pub async fn get_site_by_slug(&self, tenant_id: i64, slug: &str) -> Result<Option<Site>> {
        SiteQueries::get_by_slug(&self.pool, tenant_id, slug).await
    }

    pub async fn list_sites_for_tenant(&self, tenant_id: i64) -> Result<Vec<Site>> {
        SiteQueries::list_for_tenant(&self.pool, tenant_id).await
    }

    // Document operations
    pub async fn create_document(&self, new_document: NewDocument) -> Result<Document> {
        DocumentQueries::create(&self.pool, new_document).await
    }

    pub async fn get_document_by_id(&self, id: i64) -> Result<Option<Document>> {
        DocumentQueries::get_by_id(&self.pool, id).await
    }

    pub async fn get_document_by_source_url(
        &self,
        tenant_id: i64,
        source_url: &str,
    ) -> Result<Option<Document>> {
        DocumentQueries::get_by_source_url(&self.pool, tenant_id, source_url).await
    }

    pub async fn list_documents_for_tenant(&self, tenant_id: i64) -> Result<Vec<Document>> {
        DocumentQueries::list_for_tenant(&self.pool, tenant_id).await
    }

    pub async fn mark_document_indexed(&self, id: i64, chunk_count: i64) -> Result<()> {
        DocumentQueries::mark_indexed(&self.pool, id, chunk_count).await
    }

    pub async fn mark_document_failed(&self, id: i64, error_message: &str) -> Result<()> {
        DocumentQueries::mark_failed(&self.pool, id, error_message).await
    }

    // Chunk operations
    pub async fn replace_document_chunks(
        &self,
        document_id: i64,
        chunks: &[NewDocumentChunk],
    ) -> Result<()> {
        DocumentChunkQueries::replace_for_document(&self.pool, document_id, chunks).await
    }

    pub async fn list_chunks_for_document(&self, document_id: i64) -> Result<Vec<DocumentChunkRow>> {
        DocumentChunkQueries::list_for_document(&self.pool, document_id).await
    }

    pub async fn list_all_chunks(&self) -> Result<Vec<DocumentChunkRow>> {
        DocumentChunkQueries::list_all(&self.pool).await
    }

    // Curated answer operations
    pub async fn create_curated_answer(&self, new_answer: NewCuratedAnswer) -> Result<CuratedAnswer> {
        CuratedAnswerQueries::create(&self.pool, new_answer).await
    }

    pub async fn list_active_answers(
        &self,
        tenant_id: i64,
        site_id: Option<i64>,
    ) -> Result<Vec<CuratedAnswer>> {
        CuratedAnswerQueries::list_active(&self.pool, tenant_id, site_id).await
    }

    pub async fn list_answers_for_tenant(&self, tenant_id: i64) -> Result<Vec<CuratedAnswer>> {
        CuratedAnswerQueries::list_for_tenant(&self.pool, tenant_id).await
    }

    pub async fn set_answer_status(&self, id: i64, status: CuratedStatus) -> Result<bool> {
        CuratedAnswerQueries::set_status(&self.pool, id, status).await
    }

    // Escalation rule operations
    pub async fn create_escalation_rule(
        &self,
        new_rule: NewEscalationRule,
    ) -> Result<EscalationRule> {
        EscalationRuleQueries::create(&self.pool, new_rule).await
    }

    pub async fn get_escalation_rule(&self, id: i64) -> Result<Option<EscalationRule>> {
        EscalationRuleQueries::get_by_id(&self.pool, id).await
    }

    pub async fn list_enabled_rules(&self, tenant_id: i64) -> Result<Vec<EscalationRule>> {
        EscalationRuleQueries::list_enabled(&self.pool, tenant_id).await
    }

    pub async fn list_rules_for_tenant(&self, tenant_id: i64) -> Result<Vec<EscalationRuleRow>> {
        EscalationRuleQueries::list_for_tenant(&self.pool, tenant_id).await
    }

    pub async fn set_rule_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        EscalationRuleQueries::set_enabled(&self.pool, id, enabled).await
    }

    /// Per-tenant counts for the status command
    pub async fn tenant_statistics(&self, tenant: Tenant) -> Result<TenantStatistics> {
        let documents = Self::count(&self.pool, "documents", tenant.id).await?;
        let chunks = Self::count(&self.pool, "document_chunks", tenant.id).await?;
        let curated_answers = Self::count(&self.pool, "curated_answers", tenant.id).await?;
        let escalation_rules = Self::count(&self.pool, "escalation_rules", tenant.id).await?;

        Ok(TenantStatistics {
            tenant,
            documents,
            chunks,
            curated_answers,
            escalation_rules,
        })
    }

    async fn count(pool: &DbPool, table: &str, tenant_id: i64) -> Result<i64> {
        // Table names come from the fixed list above, never from user input
        let sql = format!("SELECT COUNT(*) FROM {} WHERE tenant_id = ?", table);
        let count: (i64,) = sqlx::query_as(&sql)
            .bind(tenant_id)
            .fetch_one(pool)
            .await
            .with_context(|| format!("Failed to count rows in {}", table))?;

        Ok(count.0)
    }

    /// Optimize database performance by running VACUUM and ANALYZE
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing database performance");

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .context("Failed to vacuum database")?;

        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .context("Failed to analyze database")?;

        debug!("Database optimization completed");
        Ok(())
    }
}

#[async_trait]
impl CuratedAnswerSource for Database {
    async fn active_answers(
        &self,
        tenant_id: &str,
        site_id: Option<&str>,
    ) -> Result<Vec<CuratedAnswer>, ResolveError> {
        let tenant_id: i64 = tenant_id
            .parse()
            .map_err(|_| ResolveError::InvalidInput(format!("Invalid tenant id '{}'", tenant_id)))?;
        let site_id: Option<i64> = site_id
            .map(|s| {
                s.parse()
                    .map_err(|_| ResolveError::InvalidInput(format!("Invalid site id '{}'", s)))
            })
            .transpose()?;

        self.list_active_answers(tenant_id, site_id)
            .await
            .map_err(|e| ResolveError::StoreUnavailable(format!("Curated answer lookup failed: {e}")))
    }
}

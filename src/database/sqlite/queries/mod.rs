#[cfg(test)]
mod tests;

use super::models::{
    CuratedAnswer, CuratedAnswerRow, CuratedStatus, Document, DocumentChunkRow, EscalationRuleRow,
    NewCuratedAnswer, NewDocument, NewDocumentChunk, NewEscalationRule, NewSite, NewTenant, Site,
    Tenant,
};
use crate::escalation::EscalationRule;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

pub struct TenantQueries;

impl TenantQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_tenant: NewTenant) -> Result<Tenant> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO tenants (slug, name, created_date) VALUES (?, ?, ?)",
        )
        .bind(&new_tenant.slug)
        .bind(&new_tenant.name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tenant")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created tenant"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>(
            "SELECT id, slug, name, created_date FROM tenants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tenant by id")
    }

    #[inline]
    pub async fn get_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>(
            "SELECT id, slug, name, created_date FROM tenants WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get tenant by slug")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Tenant>> {
        sqlx::query_as::<_, Tenant>(
            "SELECT id, slug, name, created_date FROM tenants ORDER BY created_date, id",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list tenants")
    }
}

pub struct SiteQueries;

impl SiteQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_site: NewSite) -> Result<Site> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO sites (tenant_id, slug, name, created_date) VALUES (?, ?, ?, ?)",
        )
        .bind(new_site.tenant_id)
        .bind(&new_site.slug)
        .bind(&new_site.name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create site")?
        .last_insert_rowid();

        sqlx::query_as::<_, Site>(
            "SELECT id, tenant_id, slug, name, created_date FROM sites WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to retrieve created site")?
        .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created site"))
    }

    #[inline]
    pub async fn get_by_slug(
        pool: &SqlitePool,
        tenant_id: i64,
        slug: &str,
    ) -> Result<Option<Site>> {
        sqlx::query_as::<_, Site>(
            "SELECT id, tenant_id, slug, name, created_date FROM sites WHERE tenant_id = ? AND slug = ?",
        )
        .bind(tenant_id)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get site by slug")
    }

    #[inline]
    pub async fn list_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<Site>> {
        sqlx::query_as::<_, Site>(
            "SELECT id, tenant_id, slug, name, created_date FROM sites WHERE tenant_id = ? ORDER BY created_date, id",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("Failed to list sites")
    }
}

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: NewDocument) -> Result<Document> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO documents (tenant_id, site_id, title, source_url, status, created_date) \
             VALUES (?, ?, ?, ?, 'pending', ?)",
        )
        .bind(new_document.tenant_id)
        .bind(new_document.site_id)
        .bind(&new_document.title)
        .bind(&new_document.source_url)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create document")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created document"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(
            "SELECT id, tenant_id, site_id, title, source_url, status, chunk_count, \
                    error_message, created_date, indexed_date \
             FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by id")
    }

    #[inline]
    pub async fn get_by_source_url(
        pool: &SqlitePool,
        tenant_id: i64,
        source_url: &str,
    ) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(
            "SELECT id, tenant_id, site_id, title, source_url, status, chunk_count, \
                    error_message, created_date, indexed_date \
             FROM documents WHERE tenant_id = ? AND source_url = ?",
        )
        .bind(tenant_id)
        .bind(source_url)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by source URL")
    }

    #[inline]
    pub async fn list_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<Document>> {
        sqlx::query_as::<_, Document>(
            "SELECT id, tenant_id, site_id, title, source_url, status, chunk_count, \
                    error_message, created_date, indexed_date \
             FROM documents WHERE tenant_id = ? ORDER BY created_date, id",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("Failed to list documents")
    }

    #[inline]
    pub async fn mark_indexed(pool: &SqlitePool, id: i64, chunk_count: i64) -> Result<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "UPDATE documents SET status = 'indexed', chunk_count = ?, error_message = NULL, \
             indexed_date = ? WHERE id = ?",
        )
        .bind(chunk_count)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark document indexed")?;

        Ok(())
    }

    #[inline]
    pub async fn mark_failed(pool: &SqlitePool, id: i64, error_message: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET status = 'failed', error_message = ? WHERE id = ?")
            .bind(error_message)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to mark document failed")?;

        Ok(())
    }
}

pub struct DocumentChunkQueries;

impl DocumentChunkQueries {
    /// Replace every chunk row of a document in one transaction.
    /// Partial chunk sets must never be observable, so delete and insert
    /// commit together.
    #[inline]
    pub async fn replace_for_document(
        pool: &SqlitePool,
        document_id: i64,
        chunks: &[NewDocumentChunk],
    ) -> Result<()> {
        let now = Utc::now().naive_utc();
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete existing chunks")?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO document_chunks \
                 (document_id, tenant_id, chunk_index, content, token_estimate, vector_id, created_date) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(chunk.document_id)
            .bind(chunk.tenant_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(chunk.token_estimate)
            .bind(&chunk.vector_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to insert chunk")?;
        }

        tx.commit().await.context("Failed to commit chunk replacement")?;

        debug!(
            "Replaced chunks for document {} with {} new chunks",
            document_id,
            chunks.len()
        );
        Ok(())
    }

    #[inline]
    pub async fn list_for_document(
        pool: &SqlitePool,
        document_id: i64,
    ) -> Result<Vec<DocumentChunkRow>> {
        sqlx::query_as::<_, DocumentChunkRow>(
            "SELECT id, document_id, tenant_id, chunk_index, content, token_estimate, \
                    vector_id, created_date \
             FROM document_chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chunks for document")
    }

    /// Every chunk in the corpus, for whole-store re-embedding after a model change
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentChunkRow>> {
        sqlx::query_as::<_, DocumentChunkRow>(
            "SELECT id, document_id, tenant_id, chunk_index, content, token_estimate, \
                    vector_id, created_date \
             FROM document_chunks ORDER BY document_id, chunk_index",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list all chunks")
    }

    #[inline]
    pub async fn count_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM document_chunks WHERE tenant_id = ?")
                .bind(tenant_id)
                .fetch_one(pool)
                .await
                .context("Failed to count chunks")?;

        Ok(count.0)
    }
}

pub struct CuratedAnswerQueries;

impl CuratedAnswerQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_answer: NewCuratedAnswer) -> Result<CuratedAnswer> {
        let now = Utc::now().naive_utc();
        let keywords = serde_json::to_string(&new_answer.keywords)
            .context("Failed to encode keywords")?;
        let tags = serde_json::to_string(&new_answer.tags).context("Failed to encode tags")?;

        let id = sqlx::query(
            "INSERT INTO curated_answers \
             (tenant_id, site_id, question, answer, priority, keywords, tags, status, created_date) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?)",
        )
        .bind(new_answer.tenant_id)
        .bind(new_answer.site_id)
        .bind(&new_answer.question)
        .bind(&new_answer.answer)
        .bind(new_answer.priority)
        .bind(&keywords)
        .bind(&tags)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create curated answer")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created curated answer"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<CuratedAnswer>> {
        let row = sqlx::query_as::<_, CuratedAnswerRow>(
            "SELECT id, tenant_id, site_id, question, answer, priority, keywords, tags, \
                    status, created_date \
             FROM curated_answers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get curated answer by id")?;

        row.map(CuratedAnswer::try_from).transpose()
    }

    /// Active answers for resolution, scoped to a tenant and optionally a site.
    ///
    /// A NULL site_id marks a tenant-wide answer and always participates; with
    /// a site filter, answers pinned to other sites are excluded. Creation
    /// order is part of the contract: it is the final ranking tie-breaker.
    #[inline]
    pub async fn list_active(
        pool: &SqlitePool,
        tenant_id: i64,
        site_id: Option<i64>,
    ) -> Result<Vec<CuratedAnswer>> {
        let rows = match site_id {
            Some(site) => {
                sqlx::query_as::<_, CuratedAnswerRow>(
                    "SELECT id, tenant_id, site_id, question, answer, priority, keywords, tags, \
                            status, created_date \
                     FROM curated_answers \
                     WHERE tenant_id = ? AND status = 'active' AND (site_id IS NULL OR site_id = ?) \
                     ORDER BY id",
                )
                .bind(tenant_id)
                .bind(site)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query_as::<_, CuratedAnswerRow>(
                    "SELECT id, tenant_id, site_id, question, answer, priority, keywords, tags, \
                            status, created_date \
                     FROM curated_answers \
                     WHERE tenant_id = ? AND status = 'active' \
                     ORDER BY id",
                )
                .bind(tenant_id)
                .fetch_all(pool)
                .await
            }
        }
        .context("Failed to list active curated answers")?;

        let mut answers = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match CuratedAnswer::try_from(row) {
                Ok(answer) => answers.push(answer),
                // One corrupt row must not take curated answers offline
                Err(e) => warn!("Skipping malformed curated answer {}: {}", id, e),
            }
        }

        Ok(answers)
    }

    #[inline]
    pub async fn list_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<CuratedAnswer>> {
        let rows = sqlx::query_as::<_, CuratedAnswerRow>(
            "SELECT id, tenant_id, site_id, question, answer, priority, keywords, tags, \
                    status, created_date \
             FROM curated_answers WHERE tenant_id = ? ORDER BY priority DESC, id",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("Failed to list curated answers")?;

        rows.into_iter().map(CuratedAnswer::try_from).collect()
    }

    #[inline]
    pub async fn set_status(pool: &SqlitePool, id: i64, status: CuratedStatus) -> Result<bool> {
        let affected = sqlx::query("UPDATE curated_answers SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update curated answer status")?
            .rows_affected();

        Ok(affected > 0)
    }
}

pub struct EscalationRuleQueries;

impl EscalationRuleQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_rule: NewEscalationRule) -> Result<EscalationRule> {
        let now = Utc::now().naive_utc();
        let predicate = serde_json::to_string(&new_rule.predicate)
            .context("Failed to encode rule predicate")?;

        let id = sqlx::query(
            "INSERT INTO escalation_rules (tenant_id, name, predicate, enabled, created_date) \
             VALUES (?, ?, ?, 1, ?)",
        )
        .bind(new_rule.tenant_id)
        .bind(&new_rule.name)
        .bind(&predicate)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create escalation rule")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created escalation rule"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<EscalationRule>> {
        let row = sqlx::query_as::<_, EscalationRuleRow>(
            "SELECT id, tenant_id, name, predicate, enabled, created_date \
             FROM escalation_rules WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get escalation rule by id")?;

        row.map(EscalationRule::try_from).transpose()
    }

    /// Enabled rules ready for evaluation. Rules whose stored predicate no
    /// longer parses are skipped with a warning instead of failing the batch.
    #[inline]
    pub async fn list_enabled(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<EscalationRule>> {
        let rows = sqlx::query_as::<_, EscalationRuleRow>(
            "SELECT id, tenant_id, name, predicate, enabled, created_date \
             FROM escalation_rules WHERE tenant_id = ? AND enabled = 1 ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("Failed to list enabled escalation rules")?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match EscalationRule::try_from(row) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!("Skipping malformed escalation rule {}: {}", id, e),
            }
        }

        Ok(rules)
    }

    #[inline]
    pub async fn list_for_tenant(
        pool: &SqlitePool,
        tenant_id: i64,
    ) -> Result<Vec<EscalationRuleRow>> {
        sqlx::query_as::<_, EscalationRuleRow>(
            "SELECT id, tenant_id, name, predicate, enabled, created_date \
             FROM escalation_rules WHERE tenant_id = ? ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("Failed to list escalation rules")
    }

    #[inline]
    pub async fn set_enabled(pool: &SqlitePool, id: i64, enabled: bool) -> Result<bool> {
        let affected = sqlx::query("UPDATE escalation_rules SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update escalation rule")?
            .rows_affected();

        Ok(affected > 0)
    }
}

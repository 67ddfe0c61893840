#[cfg(test)]
mod tests;

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

use crate::escalation::EscalationRule;
use crate::rules::RulePredicate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTenant {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub id: i64,
    pub tenant_id: i64,
    pub slug: String,
    pub name: String,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSite {
    pub tenant_id: i64,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Indexed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Pending => write!(f, "Pending"),
            DocumentStatus::Indexed => write!(f, "Indexed"),
            DocumentStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub tenant_id: i64,
    pub site_id: Option<i64>,
    pub title: String,
    pub source_url: String,
    pub status: DocumentStatus,
    pub chunk_count: i64,
    pub error_message: Option<String>,
    pub created_date: NaiveDateTime,
    pub indexed_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub tenant_id: i64,
    pub site_id: Option<i64>,
    pub title: String,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentChunkRow {
    pub id: i64,
    pub document_id: i64,
    pub tenant_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub token_estimate: i64,
    pub vector_id: String,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocumentChunk {
    pub document_id: i64,
    pub tenant_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub token_estimate: i64,
    pub vector_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum CuratedStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for CuratedStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            CuratedStatus::Active => write!(f, "Active"),
            CuratedStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Raw curated answer row; keywords and tags are JSON-encoded TEXT columns
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CuratedAnswerRow {
    pub id: i64,
    pub tenant_id: i64,
    pub site_id: Option<i64>,
    pub question: String,
    pub answer: String,
    pub priority: i64,
    pub keywords: String,
    pub tags: String,
    pub status: CuratedStatus,
    pub created_date: NaiveDateTime,
}

/// A curated answer with its JSON columns decoded.
/// Query code never hands the raw row shape to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedAnswer {
    pub id: i64,
    pub tenant_id: i64,
    pub site_id: Option<i64>,
    pub question: String,
    pub answer: String,
    pub priority: i64,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub status: CuratedStatus,
    pub created_date: NaiveDateTime,
}

impl TryFrom<CuratedAnswerRow> for CuratedAnswer {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(row: CuratedAnswerRow) -> Result<Self, Self::Error> {
        let keywords: Vec<String> = serde_json::from_str(&row.keywords)
            .with_context(|| format!("Malformed keywords for curated answer {}", row.id))?;
        let tags: Vec<String> = serde_json::from_str(&row.tags)
            .with_context(|| format!("Malformed tags for curated answer {}", row.id))?;

        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            site_id: row.site_id,
            question: row.question,
            answer: row.answer,
            priority: row.priority,
            keywords,
            tags,
            status: row.status,
            created_date: row.created_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCuratedAnswer {
    pub tenant_id: i64,
    pub site_id: Option<i64>,
    pub question: String,
    pub answer: String,
    pub priority: i64,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
}

/// Raw escalation rule row; the predicate is a JSON-encoded TEXT column
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct EscalationRuleRow {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub predicate: String,
    pub enabled: bool,
    pub created_date: NaiveDateTime,
}

impl TryFrom<EscalationRuleRow> for EscalationRule {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(row: EscalationRuleRow) -> Result<Self, Self::Error> {
        let predicate: RulePredicate = serde_json::from_str(&row.predicate)
            .with_context(|| format!("Malformed predicate for escalation rule {}", row.id))?;

        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            predicate,
            enabled: row.enabled,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEscalationRule {
    pub tenant_id: i64,
    pub name: String,
    pub predicate: RulePredicate,
}

/// Per-tenant counts for the status command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantStatistics {
    pub tenant: Tenant,
    pub documents: i64,
    pub chunks: i64,
    pub curated_answers: i64,
    pub escalation_rules: i64,
}

// Answer resolver
// Combines curated answer matching with vector retrieval over the document
// corpus. Callers treat a curated hit as a short-circuit signal; retrieval
// runs regardless so generated responses can still cite passages.


pub mod curated;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::database::sqlite::models::CuratedAnswer;

pub use curated::{CuratedMatch, rank_matches};

/// Hard ceiling on passages per resolution, bounding latency and token cost
pub const MAX_RESULTS_CAP: usize = 12;

const SNIPPET_MAX_CHARS: usize = 360;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The embedding provider failed. Surfaced rather than mapped to an empty
    /// result: "no matches" and "search broke" must stay distinguishable.
    #[error("Embedding service failure: {0}")]
    EmbeddingService(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Resolution timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of active curated answers, scoped per tenant and optionally per site
#[async_trait]
pub trait CuratedAnswerSource: Send + Sync {
    async fn active_answers(
        &self,
        tenant_id: &str,
        site_id: Option<&str>,
    ) -> Result<Vec<CuratedAnswer>, ResolveError>;
}

/// Tenant-scoped vector similarity search
#[async_trait]
pub trait PassageSearch: Send + Sync {
    async fn similar_chunks(
        &self,
        tenant_id: &str,
        query_vector: &[f32],
        limit: usize,
        site_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, ResolveError>;
}

/// Query embedding. Blocking by design: implementations are HTTP clients and
/// the resolver runs them on a blocking worker.
pub trait QueryEmbedder: Send + Sync {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, ResolveError>;
}

/// One chunk returned by the vector store with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub vector_id: String,
    pub document_id: String,
    pub title: String,
    pub source_url: String,
    pub content: String,
    pub chunk_index: u32,
    pub similarity: f32,
}

/// A retrieved passage annotated for citation
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPassage {
    /// Trimmed excerpt for display
    pub snippet: String,
    /// Full chunk text for prompt grounding
    pub content: String,
    pub title: String,
    pub source_url: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub similarity: f32,
}

/// Output of one resolution: both lists are independently computed and either
/// may be empty
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAnswers {
    pub curated: Vec<CuratedMatch>,
    pub passages: Vec<RetrievedPassage>,
}

impl ResolvedAnswers {
    /// Whether a caller can short-circuit with a curated answer
    #[inline]
    pub fn has_curated(&self) -> bool {
        !self.curated.is_empty()
    }

    /// Confidence signal for escalation: the best retrieval similarity, or
    /// zero when nothing was retrieved
    #[inline]
    pub fn top_similarity(&self) -> f32 {
        self.passages.first().map_or(0.0, |p| p.similarity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub max_results: usize,
    pub timeout: Duration,
}

impl Default for ResolverOptions {
    #[inline]
    fn default() -> Self {
        Self {
            max_results: 8,
            timeout: Duration::from_secs(5),
        }
    }
}

impl ResolverOptions {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_results: config.resolver.max_results,
            timeout: Duration::from_secs(config.resolver.timeout_seconds),
        }
    }
}

/// Stateless resolution over injected stores.
///
/// Holds no caches and no mutable state; concurrent calls are independent.
pub struct AnswerResolver {
    curated: Arc<dyn CuratedAnswerSource>,
    passages: Arc<dyn PassageSearch>,
    embedder: Arc<dyn QueryEmbedder>,
    options: ResolverOptions,
}

impl AnswerResolver {
    #[inline]
    pub fn new(
        curated: Arc<dyn CuratedAnswerSource>,
        passages: Arc<dyn PassageSearch>,
        embedder: Arc<dyn QueryEmbedder>,
        options: ResolverOptions,
    ) -> Self {
        let mut options = options;
        if options.max_results == 0 {
            warn!("max_results of 0 requested, using 1");
            options.max_results = 1;
        }
        if options.max_results > MAX_RESULTS_CAP {
            warn!(
                "max_results of {} exceeds cap, using {}",
                options.max_results, MAX_RESULTS_CAP
            );
            options.max_results = MAX_RESULTS_CAP;
        }

        Self {
            curated,
            passages,
            embedder,
            options,
        }
    }

    #[inline]
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve a query to curated answers and retrieved passages.
    ///
    /// Fails fast on blank input, and fails (rather than degrading silently)
    /// when the embedding provider or a store is unavailable. The whole call
    /// is bounded by the configured timeout.
    #[inline]
    pub async fn resolve(
        &self,
        tenant_id: &str,
        query: &str,
        site_id: Option<&str>,
    ) -> Result<ResolvedAnswers, ResolveError> {
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(ResolveError::InvalidInput(
                "tenant id must not be empty".to_string(),
            ));
        }

        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        tokio::time::timeout(
            self.options.timeout,
            self.resolve_inner(tenant_id, query, site_id),
        )
        .await
        .map_err(|_| ResolveError::Timeout(self.options.timeout))?
    }

    async fn resolve_inner(
        &self,
        tenant_id: &str,
        query: &str,
        site_id: Option<&str>,
    ) -> Result<ResolvedAnswers, ResolveError> {
        debug!(
            "Resolving query for tenant {} (site {:?}): '{}'",
            tenant_id, site_id, query
        );

        // Curated lookup and query embedding have no ordering dependency;
        // run them concurrently to keep the latency budget
        let embedder = Arc::clone(&self.embedder);
        let query_owned = query.to_string();
        let embed_task =
            tokio::task::spawn_blocking(move || embedder.embed_query(&query_owned));

        let answers = self.curated.active_answers(tenant_id, site_id).await?;
        let curated = rank_matches(query, answers);

        let query_vector = embed_task
            .await
            .map_err(|e| ResolveError::EmbeddingService(format!("Embedding task failed: {e}")))??;

        let chunks = self
            .passages
            .similar_chunks(tenant_id, &query_vector, self.options.max_results, site_id)
            .await?;

        let passages: Vec<RetrievedPassage> = chunks
            .into_iter()
            .map(|chunk| RetrievedPassage {
                snippet: trim_snippet(&chunk.content, SNIPPET_MAX_CHARS),
                content: chunk.content,
                title: chunk.title,
                source_url: chunk.source_url,
                document_id: chunk.document_id,
                chunk_index: chunk.chunk_index,
                similarity: chunk.similarity,
            })
            .collect();

        debug!(
            "Resolved {} curated answers and {} passages",
            curated.len(),
            passages.len()
        );

        Ok(ResolvedAnswers { curated, passages })
    }
}

/// Trim content to a display snippet, cutting at a word boundary when one is
/// close enough
fn trim_snippet(content: &str, max_chars: usize) -> String {
    let condensed: String = content.split_whitespace().collect::<Vec<_>>().join(" ");

    if condensed.chars().count() <= max_chars {
        return condensed;
    }

    let truncated: String = condensed.chars().take(max_chars).collect();
    let cut = truncated
        .rfind(' ')
        .filter(|&pos| pos > max_chars / 2)
        .unwrap_or(truncated.len());

    format!("{}…", truncated[..cut].trim_end())
}

// Ingestion pipeline
// Chunks a document, embeds every chunk, and replaces the document's rows and
// vectors wholesale. Chunks are never updated in place: a re-ingested or
// migrated document is always delete-then-reinsert so no mixed-model or
// half-replaced state can exist.


use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::DeskError;
use crate::config::Config;
use crate::database::lancedb::{ChunkMetadata, EmbeddingRecord, VectorStore};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{Document, NewDocument, NewDocumentChunk, Tenant};
use crate::embeddings::chunking::{TextChunk, chunk_text};
use crate::embeddings::ollama::OllamaClient;

/// Outcome of one document ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub document_id: i64,
    pub chunks: usize,
    /// Whether an earlier version of the document was replaced
    pub replaced: bool,
}

/// Outcome of a whole-corpus re-embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReembedStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Foreground ingestion pipeline over the dual store
pub struct Indexer {
    config: Config,
    database: Database,
    vector_store: VectorStore,
    ollama_client: OllamaClient,
}

impl Indexer {
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let database = Database::new(config.database_path())
            .await
            .context("Failed to initialize SQLite database")?;

        let vector_store = VectorStore::new(&config)
            .await
            .context("Failed to initialize vector store")?;

        let ollama_client =
            OllamaClient::new(&config).context("Failed to initialize embedding client")?;

        Ok(Self {
            config,
            database,
            vector_store,
            ollama_client,
        })
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Ingest one document for a tenant.
    ///
    /// Re-ingesting the same `(tenant, source_url)` replaces every chunk and
    /// vector of the earlier version. All embeddings are generated before any
    /// store is touched, so a provider failure leaves the previous version
    /// fully intact.
    #[inline]
    pub async fn ingest_document(
        &self,
        tenant: &Tenant,
        site_id: Option<i64>,
        title: &str,
        source_url: &str,
        text: &str,
    ) -> Result<IngestStats> {
        if text.trim().is_empty() {
            return Err(DeskError::InvalidInput(
                "document text must not be empty".to_string(),
            )
            .into());
        }

        let (document, replaced) = self
            .find_or_create_document(tenant, site_id, title, source_url)
            .await?;

        info!(
            "Ingesting document {} ('{}') for tenant {}",
            document.id, title, tenant.slug
        );

        let chunks = chunk_text(text, &self.config.chunking);
        if chunks.is_empty() {
            self.database
                .mark_document_failed(document.id, "no chunkable text")
                .await?;
            return Err(DeskError::InvalidInput(
                "document produced no chunkable text".to_string(),
            )
            .into());
        }

        let records = match self.embed_chunks(tenant, &document, &chunks) {
            Ok(records) => records,
            Err(e) => {
                warn!("Embedding failed for document {}: {:#}", document.id, e);
                self.database
                    .mark_document_failed(document.id, &format!("{e:#}"))
                    .await?;
                return Err(e);
            }
        };

        // SQLite rows first (single transaction), then vectors. The shared
        // vector_id keys keep the two stores reconcilable if this process
        // dies between the writes; the next ingest repeats the replacement.
        let rows: Vec<NewDocumentChunk> = chunks
            .iter()
            .zip(records.iter())
            .map(|(chunk, record)| NewDocumentChunk {
                document_id: document.id,
                tenant_id: tenant.id,
                chunk_index: chunk.chunk_index as i64,
                content: chunk.content.clone(),
                token_estimate: chunk.token_estimate as i64,
                vector_id: record.id.clone(),
            })
            .collect();

        self.database
            .replace_document_chunks(document.id, &rows)
            .await?;

        self.vector_store
            .delete_document(&tenant.id.to_string(), &document.id.to_string())
            .await?;
        self.vector_store.store_batch(records).await?;

        self.database
            .mark_document_indexed(document.id, chunks.len() as i64)
            .await?;

        info!(
            "Document {} indexed with {} chunks",
            document.id,
            chunks.len()
        );

        Ok(IngestStats {
            document_id: document.id,
            chunks: chunks.len(),
            replaced,
        })
    }

    async fn find_or_create_document(
        &self,
        tenant: &Tenant,
        site_id: Option<i64>,
        title: &str,
        source_url: &str,
    ) -> Result<(Document, bool)> {
        if let Some(existing) = self
            .database
            .get_document_by_source_url(tenant.id, source_url)
            .await?
        {
            debug!(
                "Document for {} already exists (id {}), replacing content",
                source_url, existing.id
            );
            return Ok((existing, true));
        }

        let document = self
            .database
            .create_document(NewDocument {
                tenant_id: tenant.id,
                site_id,
                title: title.to_string(),
                source_url: source_url.to_string(),
            })
            .await?;

        Ok((document, false))
    }

    /// Embed every chunk, assigning fresh vector ids.
    ///
    /// The client verifies dimensionality per response; anything that reaches
    /// the stores is already the configured width.
    fn embed_chunks(
        &self,
        tenant: &Tenant,
        document: &Document,
        chunks: &[TextChunk],
    ) -> Result<Vec<EmbeddingRecord>> {
        let progress = ProgressBar::new(chunks.len() as u64);
        progress.set_message("embedding chunks");

        let created_at = Utc::now().to_rfc3339();
        let batch_size = self.config.ollama.batch_size as usize;
        let mut records = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .ollama_client
                .embed_batch(&texts)
                .context("Embedding provider call failed")?;

            for (chunk, vector) in batch.iter().zip(vectors) {
                records.push(EmbeddingRecord {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    metadata: ChunkMetadata {
                        tenant_id: tenant.id.to_string(),
                        site_id: document.site_id.map(|id| id.to_string()),
                        document_id: document.id.to_string(),
                        title: document.title.clone(),
                        source_url: document.source_url.clone(),
                        content: chunk.content.clone(),
                        token_estimate: chunk.token_estimate as u32,
                        chunk_index: chunk.chunk_index as u32,
                        created_at: created_at.clone(),
                    },
                });
            }
            progress.inc(batch.len() as u64);
        }

        progress.finish_and_clear();
        Ok(records)
    }

    /// Rebuild every vector after an embedding model change.
    ///
    /// Comparing vectors across models is meaningless, so the vector table is
    /// dropped and rebuilt at the new dimension and every stored chunk is
    /// re-embedded from its text in SQLite. All tenants are migrated in one
    /// pass; searches against the store fail closed until this completes.
    #[inline]
    pub async fn reembed_corpus(config: Config) -> Result<ReembedStats> {
        let database = Database::new(config.database_path())
            .await
            .context("Failed to initialize SQLite database")?;
        let vector_store = VectorStore::recreate(&config)
            .await
            .context("Failed to rebuild vector store")?;
        let ollama_client =
            OllamaClient::new(&config).context("Failed to initialize embedding client")?;

        let chunks = database.list_all_chunks().await?;
        if chunks.is_empty() {
            info!("No chunks to re-embed");
            return Ok(ReembedStats {
                documents: 0,
                chunks: 0,
            });
        }

        info!("Re-embedding {} chunks", chunks.len());
        let progress = ProgressBar::new(chunks.len() as u64);
        let created_at = Utc::now().to_rfc3339();

        let mut documents = std::collections::HashMap::new();
        let mut records = Vec::with_capacity(chunks.len());
        let mut document_count = 0_usize;

        for batch in chunks.chunks(config.ollama.batch_size as usize) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = ollama_client
                .embed_batch(&texts)
                .context("Embedding provider call failed during re-embed")?;

            for (chunk, vector) in batch.iter().zip(vectors) {
                if !documents.contains_key(&chunk.document_id) {
                    let document = require_document(&database, chunk.document_id).await?;
                    documents.insert(chunk.document_id, document);
                    document_count += 1;
                }
                let document = &documents[&chunk.document_id];

                records.push(EmbeddingRecord {
                    id: chunk.vector_id.clone(),
                    vector,
                    metadata: ChunkMetadata {
                        tenant_id: chunk.tenant_id.to_string(),
                        site_id: document.site_id.map(|id| id.to_string()),
                        document_id: document.id.to_string(),
                        title: document.title.clone(),
                        source_url: document.source_url.clone(),
                        content: chunk.content.clone(),
                        token_estimate: chunk.token_estimate as u32,
                        chunk_index: chunk.chunk_index as u32,
                        created_at: created_at.clone(),
                    },
                });
            }
            progress.inc(batch.len() as u64);
        }

        progress.finish_and_clear();

        vector_store.store_batch(records).await?;
        vector_store.optimize().await?;

        info!(
            "Re-embedded {} chunks across {} documents",
            chunks.len(),
            document_count
        );

        Ok(ReembedStats {
            documents: document_count,
            chunks: chunks.len(),
        })
    }
}

/// Lookup that treats a dangling chunk->document reference as corruption
async fn require_document(database: &Database, document_id: i64) -> Result<Document> {
    database
        .get_document_by_id(document_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Chunk references missing document {}", document_id))
}

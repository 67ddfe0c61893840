#[cfg(test)]
mod tests;

use super::{ChunkMetadata, EmbeddingRecord};
use crate::resolver::{PassageSearch, ResolveError, ScoredChunk};
use crate::{DeskError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::sync::Arc;
use tracing::{debug, info};

const TABLE_NAME: &str = "chunk_embeddings";

/// Vector store backed by LanceDB.
///
/// The vector column is a fixed-size list of the configured dimension, so a
/// vector of any other width cannot be written or searched: after a model
/// migration stale vectors are unreachable until the store is rebuilt.
pub struct VectorStore {
    connection: Connection,
    dimension: usize,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// Search hit from tenant-scoped similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub metadata: ChunkMetadata,
    pub vector_id: String,
    pub similarity: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open the store, creating the table when missing.
    ///
    /// An existing table whose dimension differs from the configured one is an
    /// error: the corpus must be rebuilt with `recreate` before use.
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, DeskError> {
        let store = Self::connect(config).await?;

        match store.existing_dimension().await? {
            Some(existing) if existing != store.dimension => {
                return Err(DeskError::Database(format!(
                    "Vector store dimension is {} but the configured model produces {}; \
                     re-embed the corpus to migrate",
                    existing, store.dimension
                )));
            }
            Some(_) => debug!("Vector table present with matching dimension"),
            None => store.create_table().await?,
        }

        info!(
            "Vector store ready at dimension {} ({})",
            store.dimension, TABLE_NAME
        );
        Ok(store)
    }

    /// Open the store and rebuild the table for the configured dimension,
    /// dropping every stored vector. Used for embedding-model migration.
    #[inline]
    pub async fn recreate(config: &Config) -> Result<Self, DeskError> {
        let store = Self::connect(config).await?;

        if store.existing_dimension().await?.is_some() {
            info!("Dropping vector table for rebuild");
            store
                .connection
                .drop_table(TABLE_NAME)
                .await
                .map_err(|e| DeskError::Database(format!("Failed to drop table: {}", e)))?;
        }
        store.create_table().await?;

        Ok(store)
    }

    async fn connect(config: &Config) -> Result<Self, DeskError> {
        let db_path = config.vector_db_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DeskError::Database(format!("Failed to create vector database directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            dimension: config.ollama.embedding_dimension as usize,
        })
    }

    /// Dimension of the vector column in the existing table, if any
    async fn existing_dimension(&self) -> Result<Option<usize>, DeskError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to open table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to read table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(DeskError::Database(
            "Vector table has no fixed-size vector column".to_string(),
        ))
    }

    async fn create_table(&self) -> Result<(), DeskError> {
        info!(
            "Creating vector table with dimension {}",
            self.dimension
        );

        self.connection
            .create_empty_table(TABLE_NAME, self.schema())
            .execute()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("tenant_id", DataType::Utf8, false),
            Field::new("site_id", DataType::Utf8, true),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("source_url", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("token_estimate", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Store a batch of embeddings.
    ///
    /// Every vector must match the configured dimension; a mismatch aborts the
    /// whole batch before anything is written.
    #[inline]
    pub async fn store_batch(&self, records: Vec<EmbeddingRecord>) -> Result<(), DeskError> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        for record in &records {
            if record.vector.len() != self.dimension {
                return Err(DeskError::Embedding(format!(
                    "Vector {} has {} dimensions, store is configured for {}",
                    record.id,
                    record.vector.len(),
                    self.dimension
                )));
            }
        }

        debug!("Storing batch of {} embeddings", records.len());

        let record_batch = self.build_record_batch(&records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let table = self.open_table().await?;
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Stored {} embeddings", records.len());
        Ok(())
    }

    fn build_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch, DeskError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut tenant_ids = Vec::with_capacity(len);
        let mut site_ids = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut source_urls = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut token_estimates = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);

        for record in records {
            ids.push(record.id.as_str());
            tenant_ids.push(record.metadata.tenant_id.as_str());
            site_ids.push(record.metadata.site_id.as_deref());
            document_ids.push(record.metadata.document_id.as_str());
            titles.push(record.metadata.title.as_str());
            source_urls.push(record.metadata.source_url.as_str());
            contents.push(record.metadata.content.as_str());
            token_estimates.push(record.metadata.token_estimate);
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.metadata.created_at.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| DeskError::Database(format!("Failed to build vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(tenant_ids)),
            Arc::new(StringArray::from(site_ids)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(source_urls)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(token_estimates)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(self.schema(), arrays)
            .map_err(|e| DeskError::Database(format!("Failed to build record batch: {}", e)))
    }

    /// Tenant-scoped similarity search.
    ///
    /// The tenant filter is pushed into the store query, never applied after
    /// the fact: results from other tenants must not reach this process at
    /// all. Ties in similarity are broken by vector id so result order is
    /// reproducible.
    #[inline]
    pub async fn search_similar(
        &self,
        tenant_id: &str,
        query_vector: &[f32],
        limit: usize,
        site_id: Option<&str>,
    ) -> Result<Vec<SearchResult>, DeskError> {
        if query_vector.len() != self.dimension {
            return Err(DeskError::Embedding(format!(
                "Query vector has {} dimensions, store is configured for {}",
                query_vector.len(),
                self.dimension
            )));
        }

        debug!(
            "Searching vectors for tenant {} (limit {}, site {:?})",
            tenant_id, limit, site_id
        );

        let mut filter = format!("tenant_id = '{}'", escape_literal(tenant_id));
        if let Some(site) = site_id {
            filter.push_str(&format!(
                " AND (site_id IS NULL OR site_id = '{}')",
                escape_literal(site)
            ));
        }

        let table = self.open_table().await?;
        let results = table
            .vector_search(query_vector)
            .map_err(|e| DeskError::Database(format!("Failed to build vector search: {}", e)))?
            .column("vector")
            .only_if(filter)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = self.collect_search_results(results).await?;

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.vector_id.cmp(&b.vector_id))
        });

        Ok(hits)
    }

    async fn collect_search_results(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, DeskError> {
        let mut hits = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(parse_search_batch(&batch)?);
        }

        debug!("Collected {} search results", hits.len());
        Ok(hits)
    }

    /// Delete every embedding belonging to one document
    #[inline]
    pub async fn delete_document(
        &self,
        tenant_id: &str,
        document_id: &str,
    ) -> Result<(), DeskError> {
        debug!(
            "Deleting embeddings for document {} of tenant {}",
            document_id, tenant_id
        );

        let predicate = format!(
            "tenant_id = '{}' AND document_id = '{}'",
            escape_literal(tenant_id),
            escape_literal(document_id)
        );

        let table = self.open_table().await?;
        table.delete(&predicate).await.map_err(|e| {
            DeskError::Database(format!("Failed to delete document embeddings: {}", e))
        })?;

        Ok(())
    }

    /// Total number of stored embeddings
    #[inline]
    pub async fn count(&self) -> Result<u64, DeskError> {
        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| DeskError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Compact and reorganize the table after large write batches
    #[inline]
    pub async fn optimize(&self) -> Result<(), DeskError> {
        let table = self.open_table().await?;
        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| DeskError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector store optimization completed");
        Ok(())
    }

    /// Build an ANN index over the vector column.
    ///
    /// The index inherits the store's metric; queries go through the same
    /// column so index and search always agree on the distance measure.
    #[inline]
    pub async fn create_vector_index(&self) -> Result<(), DeskError> {
        let table = self.open_table().await?;
        table
            .create_index(&["vector"], lancedb::index::Index::Auto)
            .execute()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to create vector index: {}", e)))?;

        info!("Vector index created");
        Ok(())
    }

    async fn open_table(&self) -> Result<lancedb::Table, DeskError> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| DeskError::Database(format!("Failed to open table: {}", e)))
    }
}

/// Escape a string for use inside a single-quoted filter literal
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, DeskError> {
    let ids = string_column(batch, "id")?;
    let tenant_ids = string_column(batch, "tenant_id")?;
    let site_ids = string_column(batch, "site_id")?;
    let document_ids = string_column(batch, "document_id")?;
    let titles = string_column(batch, "title")?;
    let source_urls = string_column(batch, "source_url")?;
    let contents = string_column(batch, "content")?;
    let token_estimates = u32_column(batch, "token_estimate")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;
    let created_ats = string_column(batch, "created_at")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut hits = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let metadata = ChunkMetadata {
            tenant_id: tenant_ids.value(row).to_string(),
            site_id: (!site_ids.is_null(row)).then(|| site_ids.value(row).to_string()),
            document_id: document_ids.value(row).to_string(),
            title: titles.value(row).to_string(),
            source_url: source_urls.value(row).to_string(),
            content: contents.value(row).to_string(),
            token_estimate: token_estimates.value(row),
            chunk_index: chunk_indices.value(row),
            created_at: created_ats.value(row).to_string(),
        };

        let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        hits.push(SearchResult {
            metadata,
            vector_id: ids.value(row).to_string(),
            similarity: 1.0 - distance,
            distance,
        });
    }

    Ok(hits)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, DeskError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DeskError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| DeskError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, DeskError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DeskError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| DeskError::Database(format!("Invalid {} column type", name)))
}

#[async_trait]
impl PassageSearch for VectorStore {
    async fn similar_chunks(
        &self,
        tenant_id: &str,
        query_vector: &[f32],
        limit: usize,
        site_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, ResolveError> {
        let hits = self
            .search_similar(tenant_id, query_vector, limit, site_id)
            .await
            .map_err(|e| ResolveError::StoreUnavailable(format!("Vector search failed: {e}")))?;

        Ok(hits
            .into_iter()
            .map(|hit| ScoredChunk {
                vector_id: hit.vector_id,
                document_id: hit.metadata.document_id,
                title: hit.metadata.title,
                source_url: hit.metadata.source_url,
                content: hit.metadata.content,
                chunk_index: hit.metadata.chunk_index,
                similarity: hit.similarity,
            })
            .collect())
    }
}

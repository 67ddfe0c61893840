// LanceDB vector database module
// Stores chunk embeddings and serves tenant-scoped similarity search


pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Vector id, shared with the chunk row in SQLite
    pub id: String,
    /// The embedding; length must match the store's configured dimension
    pub vector: Vec<f32>,
    /// Chunk metadata stored alongside the vector for citation
    pub metadata: ChunkMetadata,
}

/// Metadata stored with each embedding so search hits are citable without a
/// second lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Owning tenant; every query filters on this
    pub tenant_id: String,
    /// Optional site scope within the tenant
    pub site_id: Option<String>,
    /// Source document id in SQLite
    pub document_id: String,
    /// Title of the source document
    pub title: String,
    /// URL of the source document
    pub source_url: String,
    /// The chunk text
    pub content: String,
    /// Rough token estimate for the chunk
    pub token_estimate: u32,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// Timestamp when this embedding was created
    pub created_at: String,
}

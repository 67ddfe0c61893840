// Embeddings module
// Content chunking plus the HTTP client for the embedding provider

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, TextChunk, chunk_text, estimate_token_count};
pub use ollama::{EmbeddingVector, OllamaClient};

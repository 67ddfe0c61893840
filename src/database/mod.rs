// Database module
// Dual store: SQLite holds metadata, LanceDB holds chunk embeddings

pub mod lancedb;
pub mod sqlite;

pub use sqlite::*;

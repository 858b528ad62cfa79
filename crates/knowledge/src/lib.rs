//! Knowledge retrieval core for pitchsim.
//!
//! Documents are split into overlapping chunks, embedded through a
//! pluggable provider and stored in named vector indexes. Queries run
//! against a single index or fan out across every known index and merge
//! the hits by distance.

pub mod chunker;
pub mod embeddings;
pub mod lancedb_index;
pub mod memory_index;
pub mod parser;
pub mod store;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::{chunk_documents, chunk_text, ChunkOptions};
pub use embeddings::{create_provider, EmbeddingClient, EmbeddingProvider};
pub use lancedb_index::LanceDbIndex;
pub use memory_index::MemoryIndex;
pub use store::KnowledgeStore;
pub use types::{
    Document, DocumentRecord, FederatedHit, IngestOutcome, IngestReport, SearchHit, TableStats,
    TextChunk,
};
pub use vector_index::IndexBackend;

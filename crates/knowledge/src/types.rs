//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};

/// A raw document handed over by the upload/extraction layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Original file name; used as the chunk source
    pub filename: String,

    /// Extracted plain text
    pub content: String,
}

impl Document {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// A bounded excerpt of a source document, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChunk {
    /// Trimmed, non-empty chunk content
    pub text: String,

    /// Originating document identifier (file name)
    pub source: String,

    /// 0-based position within the source's chunk sequence
    pub chunk_index: u32,

    /// Total chunks produced for the source
    pub total_chunks: u32,
}

/// A persisted, embedded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// `{source}-{chunk_index}`
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk_index: u32,
    pub vector: Vec<f32>,
}

impl DocumentRecord {
    /// Build a record from a chunk and its embedding.
    pub fn from_chunk(chunk: &TextChunk, vector: Vec<f32>) -> Self {
        Self {
            id: record_id(&chunk.source, chunk.chunk_index),
            text: chunk.text.clone(),
            source: chunk.source.clone(),
            chunk_index: chunk.chunk_index,
            vector,
        }
    }
}

/// Deterministic record id for a chunk position within a source.
pub fn record_id(source: &str, chunk_index: u32) -> String {
    format!("{}-{}", source, chunk_index)
}

/// A single nearest-neighbor hit from one index.
///
/// `score` is a distance: lower means more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// A hit from a federated query, tagged with the table it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedHit {
    pub text: String,
    pub source: String,
    pub table: String,
    pub score: f32,
}

/// Result of an ingest call, shaped for display to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub success: bool,
    pub chunks_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestOutcome {
    pub fn ok(chunks_processed: usize) -> Self {
        Self {
            success: true,
            chunks_processed,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            chunks_processed: 0,
            error: Some(error.into()),
        }
    }
}

/// Summary of a document upload (chunk + ingest) into one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub table: String,
    pub documents_processed: usize,
    pub chunks_created: usize,
}

/// Per-table status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub name: String,
    pub has_content: bool,
    pub rows: usize,
}

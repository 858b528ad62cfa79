//! Vector index abstraction for embedded chunks.
//!
//! Defines the storage seam used by the knowledge store: a set of named
//! tables, each holding [`DocumentRecord`]s searchable by vector distance.

use crate::types::{DocumentRecord, SearchHit};
use pitchsim_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Listing the named indexes that currently exist
/// - Replacing an index wholesale with a new record set
/// - Dropping an index
/// - Nearest-neighbor search returning distances (lower is closer)
#[async_trait::async_trait]
pub trait IndexBackend: Send + Sync + std::fmt::Debug {
    /// Short backend identifier for logs ("lancedb", "memory").
    fn backend_name(&self) -> &str;

    /// Names of all indexes currently present.
    async fn list_names(&self) -> AppResult<Vec<String>>;

    /// Whether an index named `name` exists.
    async fn exists(&self, name: &str) -> AppResult<bool> {
        Ok(self.list_names().await?.iter().any(|n| n == name))
    }

    /// Create `name` from `records`, replacing any previous contents.
    ///
    /// Either the previous index stays intact (on error) or the new one is
    /// fully written. Returns the number of records stored.
    async fn replace(&self, name: &str, records: Vec<DocumentRecord>) -> AppResult<usize>;

    /// Drop `name`. Returns `false` when there was nothing to drop.
    async fn drop_index(&self, name: &str) -> AppResult<bool>;

    /// Up to `limit` records nearest to `vector`, ascending by distance.
    ///
    /// Searching an index that does not exist is an error.
    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> AppResult<Vec<SearchHit>>;

    /// Number of records stored in `name`.
    async fn count(&self, name: &str) -> AppResult<usize>;
}

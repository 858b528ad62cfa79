//! Knowledge store: named vector indexes over embedded document chunks.
//!
//! The store owns one index backend handle and one embedding client for its
//! whole lifetime. Every fallible operation has an inner `AppResult` form;
//! the public surface converts failures at the boundary:
//! - `ingest` reports them in an [`IngestOutcome`]
//! - `query` and `query_all` degrade to empty results
//! - `clear` logs and returns

use crate::chunker::{chunk_documents, ChunkOptions};
use crate::embeddings::EmbeddingClient;
use crate::lancedb_index::LanceDbIndex;
use crate::types::{
    Document, DocumentRecord, FederatedHit, IngestOutcome, IngestReport, SearchHit, TableStats,
    TextChunk,
};
use crate::vector_index::IndexBackend;
use futures::future::join_all;
use pitchsim_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    index: Arc<dyn IndexBackend>,
    embedder: EmbeddingClient,
    tables: Vec<String>,
}

impl KnowledgeStore {
    /// Create a store over `index` knowing the given table names.
    pub fn new(index: Arc<dyn IndexBackend>, embedder: EmbeddingClient, tables: Vec<String>) -> Self {
        Self {
            index,
            embedder,
            tables,
        }
    }

    /// Build a LanceDB-backed store from application configuration.
    ///
    /// # Errors
    /// * `AppError::Config` - If the embedding provider is unknown or not configured
    pub fn from_config(config: &AppConfig, api_key: Option<&str>) -> AppResult<Self> {
        let embedder = EmbeddingClient::from_settings(&config.knowledge.embedding, api_key)?;
        let index = Arc::new(LanceDbIndex::new(config.db_path()));

        debug!(
            "Knowledge store using {:?} with provider '{}' ({} tables)",
            config.db_path(),
            embedder.provider().provider_name(),
            config.knowledge.tables.len()
        );

        Ok(Self::new(index, embedder, config.knowledge.tables.clone()))
    }

    /// Known table names, in federated query order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn embedder(&self) -> &EmbeddingClient {
        &self.embedder
    }

    /// Replace the contents of `name` with embeddings of `chunks`.
    ///
    /// Empty input succeeds with zero chunks and leaves the index untouched.
    pub async fn ingest(&self, name: &str, chunks: &[TextChunk]) -> IngestOutcome {
        match self.try_ingest(name, chunks).await {
            Ok(count) => IngestOutcome::ok(count),
            Err(e) => {
                warn!("Ingest into '{}' failed: {}", name, e);
                IngestOutcome::failed(e.to_string())
            }
        }
    }

    /// Fallible form of [`ingest`](Self::ingest).
    pub async fn try_ingest(&self, name: &str, chunks: &[TextChunk]) -> AppResult<usize> {
        self.ensure_known(name)?;

        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(AppError::Embedding(format!(
                "Got {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let records: Vec<DocumentRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| DocumentRecord::from_chunk(chunk, vector))
            .collect();

        let written = self.index.replace(name, records).await?;

        info!("Ingested {} chunks into '{}'", written, name);

        Ok(written)
    }

    /// Chunk and ingest uploaded documents into `name`.
    ///
    /// When no chunk survives chunking the existing index is left as is.
    pub async fn ingest_documents(
        &self,
        name: &str,
        documents: &[Document],
        options: &ChunkOptions,
    ) -> AppResult<IngestReport> {
        self.ensure_known(name)?;

        let chunks = chunk_documents(documents, options);
        if chunks.is_empty() {
            return Err(AppError::Other(
                "No content could be extracted from the documents".to_string(),
            ));
        }

        debug!(
            "Chunked {} documents into {} chunks for '{}'",
            documents.len(),
            chunks.len(),
            name
        );

        let chunks_created = self.try_ingest(name, &chunks).await?;

        Ok(IngestReport {
            table: name.to_string(),
            documents_processed: documents.len(),
            chunks_created,
        })
    }

    /// Nearest chunks in `name` to `text`, ascending by distance.
    ///
    /// A missing index or any failure yields an empty result.
    pub async fn query(&self, name: &str, text: &str, top_k: usize) -> Vec<SearchHit> {
        self.try_query(name, text, top_k).await.unwrap_or_else(|e| {
            warn!("Query against '{}' failed, returning no results: {}", name, e);
            Vec::new()
        })
    }

    /// Fallible form of [`query`](Self::query). A missing index is `Ok(vec![])`.
    pub async fn try_query(&self, name: &str, text: &str, top_k: usize) -> AppResult<Vec<SearchHit>> {
        if top_k == 0 || !self.index.exists(name).await? {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(text).await?;
        self.search(name, &vector, top_k).await
    }

    /// Query every known table and merge the results by distance.
    pub async fn query_all(&self, text: &str, top_k: usize) -> Vec<FederatedHit> {
        self.query_tables(&self.tables, text, top_k).await
    }

    /// Query each of `names` with the same `top_k`, then keep the `top_k`
    /// closest hits overall.
    ///
    /// Equal distances keep table order, then per-table rank. Tables that
    /// are missing or fail contribute nothing.
    pub async fn query_tables(&self, names: &[String], text: &str, top_k: usize) -> Vec<FederatedHit> {
        if top_k == 0 || names.is_empty() {
            return Vec::new();
        }

        let vector = match self.embedder.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Federated query embedding failed, returning no results: {}", e);
                return Vec::new();
            }
        };

        let searches = names.iter().map(|name| {
            let vector = &vector;
            async move {
                let hits = match self.search_if_present(name, vector, top_k).await {
                    Ok(hits) => hits,
                    Err(e) => {
                        warn!("Query against '{}' failed, skipping: {}", name, e);
                        Vec::new()
                    }
                };
                (name, hits)
            }
        });

        let mut merged: Vec<FederatedHit> = join_all(searches)
            .await
            .into_iter()
            .flat_map(|(name, hits)| {
                hits.into_iter().map(move |hit| FederatedHit {
                    text: hit.text,
                    source: hit.source,
                    table: name.clone(),
                    score: hit.score,
                })
            })
            .collect();

        merged.sort_by(|a, b| a.score.total_cmp(&b.score));
        merged.truncate(top_k);
        merged
    }

    /// Drop `name` if present. Failures are logged, never returned.
    pub async fn clear(&self, name: &str) {
        match self.index.drop_index(name).await {
            Ok(true) => info!("Cleared knowledge table '{}'", name),
            Ok(false) => debug!("Knowledge table '{}' was already empty", name),
            Err(e) => warn!("Failed to clear knowledge table '{}': {}", name, e),
        }
    }

    /// Whether `name` currently holds an index.
    pub async fn has_content(&self, name: &str) -> bool {
        self.index.exists(name).await.unwrap_or_else(|e| {
            warn!("Could not check knowledge table '{}': {}", name, e);
            false
        })
    }

    /// Number of stored chunks in `name`; 0 when missing or unreadable.
    pub async fn document_count(&self, name: &str) -> usize {
        if !self.has_content(name).await {
            return 0;
        }
        self.index.count(name).await.unwrap_or_else(|e| {
            warn!("Could not count knowledge table '{}': {}", name, e);
            0
        })
    }

    /// Status of every known table.
    pub async fn stats(&self) -> Vec<TableStats> {
        let mut stats = Vec::with_capacity(self.tables.len());
        for name in &self.tables {
            let has_content = self.has_content(name).await;
            let rows = if has_content {
                self.document_count(name).await
            } else {
                0
            };
            stats.push(TableStats {
                name: name.clone(),
                has_content,
                rows,
            });
        }
        stats
    }

    async fn search_if_present(&self, name: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>> {
        if !self.index.exists(name).await? {
            return Ok(Vec::new());
        }
        self.search(name, vector, top_k).await
    }

    async fn search(&self, name: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>> {
        let hits = self.index.search(name, vector, top_k).await?;
        debug!("Found {} results in '{}'", hits.len(), name);
        Ok(hits)
    }

    fn ensure_known(&self, name: &str) -> AppResult<()> {
        if self.tables.iter().any(|t| t == name) {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "Unknown knowledge table '{}'. Known tables: {}",
                name,
                self.tables.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::mock::MockProvider;
    use crate::embeddings::EmbeddingProvider;
    use crate::memory_index::MemoryIndex;

    #[derive(Debug)]
    struct BrokenProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for BrokenProvider {
        fn provider_name(&self) -> &str {
            "broken"
        }

        fn model_name(&self) -> &str {
            "broken-v1"
        }

        fn dimensions(&self) -> usize {
            8
        }

        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Err(AppError::Embedding("rate limited".to_string()))
        }
    }

    #[derive(Debug)]
    struct BrokenIndex;

    #[async_trait::async_trait]
    impl IndexBackend for BrokenIndex {
        fn backend_name(&self) -> &str {
            "broken"
        }

        async fn list_names(&self) -> AppResult<Vec<String>> {
            Err(AppError::Storage("disk unavailable".to_string()))
        }

        async fn replace(&self, _name: &str, _records: Vec<DocumentRecord>) -> AppResult<usize> {
            Err(AppError::Storage("disk unavailable".to_string()))
        }

        async fn drop_index(&self, _name: &str) -> AppResult<bool> {
            Err(AppError::Storage("disk unavailable".to_string()))
        }

        async fn search(&self, _name: &str, _vector: &[f32], _limit: usize) -> AppResult<Vec<SearchHit>> {
            Err(AppError::Storage("disk unavailable".to_string()))
        }

        async fn count(&self, _name: &str) -> AppResult<usize> {
            Err(AppError::Storage("disk unavailable".to_string()))
        }
    }

    fn tables() -> Vec<String> {
        vec!["website".to_string(), "documentation".to_string()]
    }

    fn chunk(source: &str, idx: u32, text: &str) -> TextChunk {
        TextChunk {
            text: text.to_string(),
            source: source.to_string(),
            chunk_index: idx,
            total_chunks: 1,
        }
    }

    fn mock_store() -> KnowledgeStore {
        KnowledgeStore::new(
            Arc::new(MemoryIndex::new()),
            EmbeddingClient::new(Arc::new(MockProvider::new(64)), 100),
            tables(),
        )
    }

    #[tokio::test]
    async fn test_empty_ingest_leaves_index_untouched() {
        let store = mock_store();

        let outcome = store.ingest("website", &[]).await;

        assert_eq!(outcome, IngestOutcome::ok(0));
        assert!(!store.has_content("website").await);
    }

    #[tokio::test]
    async fn test_ingest_unknown_table_fails() {
        let store = mock_store();
        let outcome = store.ingest("blog", &[chunk("a.md", 0, "hello")]).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Unknown knowledge table 'blog'"));
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_previous_index() {
        let index = Arc::new(MemoryIndex::new());
        let good = KnowledgeStore::new(
            index.clone(),
            EmbeddingClient::new(Arc::new(MockProvider::new(8)), 100),
            tables(),
        );
        assert!(good.ingest("website", &[chunk("a.md", 0, "original pricing page")]).await.success);

        let broken = KnowledgeStore::new(
            index.clone(),
            EmbeddingClient::new(Arc::new(BrokenProvider), 100),
            tables(),
        );
        let outcome = broken.ingest("website", &[chunk("b.md", 0, "replacement")]).await;

        assert!(!outcome.success);
        assert_eq!(outcome.chunks_processed, 0);
        assert!(outcome.error.unwrap().contains("rate limited"));
        assert_eq!(good.document_count("website").await, 1);
    }

    #[tokio::test]
    async fn test_query_failures_degrade_to_empty() {
        let index = Arc::new(MemoryIndex::new());
        let good = KnowledgeStore::new(
            index.clone(),
            EmbeddingClient::new(Arc::new(MockProvider::new(8)), 100),
            tables(),
        );
        good.ingest("website", &[chunk("a.md", 0, "pricing tiers")]).await;

        let broken = KnowledgeStore::new(
            index,
            EmbeddingClient::new(Arc::new(BrokenProvider), 100),
            tables(),
        );

        assert!(broken.try_query("website", "pricing", 3).await.is_err());
        assert!(broken.query("website", "pricing", 3).await.is_empty());
        assert!(broken.query_all("pricing", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failures_are_absorbed() {
        let store = KnowledgeStore::new(
            Arc::new(BrokenIndex),
            EmbeddingClient::new(Arc::new(MockProvider::new(8)), 100),
            tables(),
        );

        store.clear("website").await;
        assert!(store.query("website", "anything", 5).await.is_empty());
        assert!(store.query_all("anything", 5).await.is_empty());
        assert!(!store.has_content("website").await);
        assert_eq!(store.document_count("website").await, 0);

        let outcome = store.ingest("website", &[chunk("a.md", 0, "text")]).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("disk unavailable"));
    }

    #[tokio::test]
    async fn test_zero_top_k_returns_nothing() {
        let store = mock_store();
        store.ingest("website", &[chunk("a.md", 0, "pricing tiers")]).await;

        assert!(store.query("website", "pricing", 0).await.is_empty());
        assert!(store.query_all("pricing", 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_documents_without_content() {
        let store = mock_store();
        store.ingest("documentation", &[chunk("old.md", 0, "keep me")]).await;

        let docs = vec![Document::new("blank.txt", "   \n\n  ")];
        let err = store
            .ingest_documents("documentation", &docs, &ChunkOptions::default())
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .contains("No content could be extracted from the documents"));
        assert_eq!(store.document_count("documentation").await, 1);
    }

    #[tokio::test]
    async fn test_ingest_documents_reports_counts() {
        let store = mock_store();
        let docs = vec![
            Document::new("faq.md", "Do you offer refunds? Yes, within thirty days."),
            Document::new("pricing.md", "Plans start at forty dollars per seat."),
        ];

        let report = store
            .ingest_documents("documentation", &docs, &ChunkOptions::default())
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                table: "documentation".to_string(),
                documents_processed: 2,
                chunks_created: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_stats_covers_known_tables() {
        let store = mock_store();
        store
            .ingest("documentation", &[chunk("a.md", 0, "one"), chunk("a.md", 1, "two")])
            .await;

        let stats = store.stats().await;

        assert_eq!(
            stats,
            vec![
                TableStats {
                    name: "website".to_string(),
                    has_content: false,
                    rows: 0,
                },
                TableStats {
                    name: "documentation".to_string(),
                    has_content: true,
                    rows: 2,
                },
            ]
        );
    }
}

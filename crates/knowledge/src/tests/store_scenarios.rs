//! End-to-end store behavior over both index backends.

use crate::chunker::{chunk_text, ChunkOptions};
use crate::embeddings::providers::mock::MockProvider;
use crate::embeddings::{EmbeddingClient, EmbeddingProvider};
use crate::lancedb_index::LanceDbIndex;
use crate::memory_index::MemoryIndex;
use crate::store::KnowledgeStore;
use crate::types::{record_id, DocumentRecord, TextChunk};
use crate::vector_index::IndexBackend;
use pitchsim_core::AppResult;
use std::sync::Arc;
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds every text to the origin, so distances equal squared norms.
    #[derive(Debug)]
    struct OriginProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for OriginProvider {
        fn provider_name(&self) -> &str {
            "origin"
        }

        fn model_name(&self) -> &str {
            "origin-v1"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0, 0.0]).collect())
        }
    }

    fn known_tables() -> Vec<String> {
        vec!["website".to_string(), "documentation".to_string(), "docs".to_string()]
    }

    fn store_over(index: Arc<dyn IndexBackend>) -> KnowledgeStore {
        KnowledgeStore::new(
            index,
            EmbeddingClient::new(Arc::new(MockProvider::new(256)), 100),
            known_tables(),
        )
    }

    fn backends(temp: &TempDir) -> Vec<Arc<dyn IndexBackend>> {
        vec![
            Arc::new(MemoryIndex::new()),
            Arc::new(LanceDbIndex::new(temp.path().join("lancedb"))),
        ]
    }

    fn chunk(source: &str, text: &str) -> TextChunk {
        TextChunk {
            text: text.to_string(),
            source: source.to_string(),
            chunk_index: 0,
            total_chunks: 1,
        }
    }

    fn at_distance(source: &str, text: &str, distance: f32) -> DocumentRecord {
        DocumentRecord {
            id: record_id(source, 0),
            text: text.to_string(),
            source: source.to_string(),
            chunk_index: 0,
            vector: vec![distance.sqrt(), 0.0],
        }
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_records() {
        let temp = TempDir::new().unwrap();
        for index in backends(&temp) {
            let store = store_over(index.clone());

            let first = store
                .ingest(
                    "website",
                    &[
                        chunk("pricing.html", "Pricing plans start at forty dollars."),
                        chunk("team.html", "Our team works remotely across time zones."),
                    ],
                )
                .await;
            assert_eq!(first.chunks_processed, 2, "{}", index.backend_name());

            let second = store
                .ingest("website", &[chunk("launch.html", "The spring launch adds webhooks.")])
                .await;
            assert!(second.success);
            assert_eq!(second.chunks_processed, 1);

            let hits = store.query("website", "pricing plans team remote", 10).await;
            assert_eq!(hits.len(), 1, "{}", index.backend_name());
            assert_eq!(hits[0].source, "launch.html");
            assert_eq!(store.document_count("website").await, 1);
        }
    }

    #[tokio::test]
    async fn test_query_missing_index_is_empty() {
        let temp = TempDir::new().unwrap();
        for index in backends(&temp) {
            let store = store_over(index);

            assert!(store.query("nonexistent", "q", 5).await.is_empty());
            assert!(store.try_query("nonexistent", "q", 5).await.unwrap().is_empty());
            assert!(store.query_all("q", 5).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_federated_results_merge_by_distance() {
        let index = Arc::new(MemoryIndex::new());
        index
            .replace("a", vec![at_distance("a.md", "from a", 0.1)])
            .await
            .unwrap();
        index
            .replace("b", vec![at_distance("b.md", "from b", 0.05)])
            .await
            .unwrap();

        let store = KnowledgeStore::new(
            index,
            EmbeddingClient::new(Arc::new(OriginProvider), 100),
            vec!["a".to_string(), "b".to_string()],
        );

        let hits = store.query_all("q", 5).await;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].table, "b");
        assert_eq!(hits[0].text, "from b");
        assert_eq!(hits[1].table, "a");
        assert!(hits[0].score < hits[1].score);
    }

    #[tokio::test]
    async fn test_federated_truncates_and_breaks_ties_stably() {
        let index = Arc::new(MemoryIndex::new());
        index
            .replace(
                "website",
                vec![
                    at_distance("home.html", "web first", 0.25),
                    at_distance("about.html", "web second", 1.0),
                ],
            )
            .await
            .unwrap();
        index
            .replace(
                "documentation",
                vec![
                    at_distance("guide.md", "doc first", 0.25),
                    at_distance("faq.md", "doc second", 0.0625),
                ],
            )
            .await
            .unwrap();

        let store = KnowledgeStore::new(
            index,
            EmbeddingClient::new(Arc::new(OriginProvider), 100),
            vec!["website".to_string(), "documentation".to_string()],
        );

        let hits = store.query_all("q", 3).await;
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();

        // Each table is asked for 3 hits; 4 candidates are cut to 3
        assert_eq!(texts, vec!["doc second", "web first", "doc first"]);
    }

    #[tokio::test]
    async fn test_federated_skips_missing_tables() {
        let index = Arc::new(MemoryIndex::new());
        index
            .replace("documentation", vec![at_distance("faq.md", "only doc", 0.5)])
            .await
            .unwrap();

        let store = KnowledgeStore::new(
            index,
            EmbeddingClient::new(Arc::new(OriginProvider), 100),
            vec!["website".to_string(), "documentation".to_string()],
        );

        let hits = store.query_all("q", 5).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].table, "documentation");
    }

    #[tokio::test]
    async fn test_clear_then_query_is_empty() {
        let temp = TempDir::new().unwrap();
        for index in backends(&temp) {
            let store = store_over(index);
            store
                .ingest("documentation", &[chunk("faq.md", "Refunds within thirty days.")])
                .await;
            assert!(store.has_content("documentation").await);

            store.clear("documentation").await;
            store.clear("documentation").await;

            assert!(!store.has_content("documentation").await);
            assert!(store.query("documentation", "refunds", 3).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_chunk_ingest_query_end_to_end() {
        let billing: Vec<String> = (10..34)
            .map(|n| format!("Billing invoices renew monthly and refunds settle within {} business days.", n))
            .collect();
        let onboarding: Vec<String> = (10..28)
            .map(|n| format!("Onboarding webhooks synchronize integrations for workspace {} automatically.", n))
            .collect();
        let first = billing.join(" ");
        let second = onboarding.join(" ");
        assert!((1750..=1850).contains(&first.chars().count()));
        assert!((1350..=1450).contains(&second.chars().count()));

        let document = format!("{}\n\n{}", first, second);
        let options = ChunkOptions {
            chunk_size: 1500,
            chunk_overlap: 200,
            min_chunk_size: 100,
        };

        let chunks = chunk_text(&document, "product.md", &options);

        assert!(chunks.len() >= 2);
        let total = chunks.len() as u32;
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1500);
            assert_eq!(chunk.total_chunks, total);
        }

        let needle = "Onboarding webhooks synchronize integrations for workspace 17 automatically.";

        let temp = TempDir::new().unwrap();
        for index in backends(&temp) {
            let store = store_over(index.clone());

            let outcome = store.ingest("docs", &chunks).await;
            assert!(outcome.success, "{:?}", outcome.error);
            assert_eq!(outcome.chunks_processed, chunks.len());

            let hits = store.query("docs", needle, 1).await;
            assert_eq!(hits.len(), 1, "{}", index.backend_name());
            assert!(hits[0].text.contains(needle));
            assert_eq!(hits[0].source, "product.md");
        }
    }
}

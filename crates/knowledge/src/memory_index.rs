//! In-process vector index with exact search.

use crate::types::{DocumentRecord, SearchHit};
use crate::vector_index::IndexBackend;
use pitchsim_core::{AppError, AppResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Brute-force index keeping every table in memory.
///
/// Distances are squared Euclidean, matching LanceDB's default L2 metric.
/// Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    tables: RwLock<HashMap<String, Vec<DocumentRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IndexBackend for MemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn list_names(&self) -> AppResult<Vec<String>> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn exists(&self, name: &str) -> AppResult<bool> {
        Ok(self.tables.read().await.contains_key(name))
    }

    async fn replace(&self, name: &str, records: Vec<DocumentRecord>) -> AppResult<usize> {
        if let Some(first) = records.first() {
            let dim = first.vector.len();
            if let Some(bad) = records.iter().find(|r| r.vector.len() != dim) {
                return Err(AppError::Storage(format!(
                    "Record '{}' has {} dimensions, expected {}",
                    bad.id,
                    bad.vector.len(),
                    dim
                )));
            }
        }

        let count = records.len();
        self.tables.write().await.insert(name.to_string(), records);
        Ok(count)
    }

    async fn drop_index(&self, name: &str) -> AppResult<bool> {
        Ok(self.tables.write().await.remove(name).is_some())
    }

    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> AppResult<Vec<SearchHit>> {
        let tables = self.tables.read().await;
        let records = tables
            .get(name)
            .ok_or_else(|| AppError::Storage(format!("Index '{}' does not exist", name)))?;

        let mut scored = Vec::with_capacity(records.len());
        for record in records {
            if record.vector.len() != vector.len() {
                return Err(AppError::Storage(format!(
                    "Query has {} dimensions, index '{}' has {}",
                    vector.len(),
                    name,
                    record.vector.len()
                )));
            }
            scored.push((squared_l2(vector, &record.vector), record));
        }

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, record)| SearchHit {
                text: record.text.clone(),
                source: record.source.clone(),
                score,
            })
            .collect())
    }

    async fn count(&self, name: &str) -> AppResult<usize> {
        self.tables
            .read()
            .await
            .get(name)
            .map(Vec::len)
            .ok_or_else(|| AppError::Storage(format!("Index '{}' does not exist", name)))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

//! LanceDB-backed vector index implementation.

use crate::types::{DocumentRecord, SearchHit};
use crate::vector_index::IndexBackend;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::database::CreateTableMode;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use pitchsim_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// LanceDB database holding one table per knowledge index.
///
/// The connection is opened on first use and reused for the lifetime of
/// the value.
pub struct LanceDbIndex {
    db_path: PathBuf,
    connection: OnceCell<Connection>,
}

impl std::fmt::Debug for LanceDbIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceDbIndex")
            .field("db_path", &self.db_path)
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

impl LanceDbIndex {
    /// Create a handle for the database at `db_path`. Nothing is opened yet.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            connection: OnceCell::new(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn connection(&self) -> AppResult<&Connection> {
        self.connection
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.db_path).await.map_err(|e| {
                    AppError::Storage(format!("Failed to create database directory: {}", e))
                })?;

                let uri = self.db_path.to_string_lossy().to_string();
                let conn = lancedb::connect(&uri).execute().await.map_err(|e| {
                    AppError::Storage(format!("Failed to connect to LanceDB: {}", e))
                })?;

                tracing::debug!("Connected to LanceDB at {:?}", self.db_path);
                Ok(conn)
            })
            .await
    }

    async fn open(&self, name: &str) -> AppResult<Table> {
        self.connection()
            .await?
            .open_table(name)
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to open table '{}': {}", name, e)))
    }

    /// Arrow schema for a table of `dim`-dimensional records.
    fn create_schema(dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Convert records to a single Arrow batch. All vectors must share a length.
    fn records_to_batch(records: &[DocumentRecord]) -> AppResult<RecordBatch> {
        let dim = records.first().map(|r| r.vector.len()).unwrap_or(0);
        if dim == 0 {
            return Err(AppError::Storage(
                "Cannot build a table without vectors".to_string(),
            ));
        }

        let mut ids = Vec::with_capacity(records.len());
        let mut texts = Vec::with_capacity(records.len());
        let mut sources = Vec::with_capacity(records.len());
        let mut chunk_indices = Vec::with_capacity(records.len());
        let mut flat_vectors = Vec::with_capacity(records.len() * dim);

        for record in records {
            if record.vector.len() != dim {
                return Err(AppError::Storage(format!(
                    "Embedding dimension mismatch for '{}': expected {}, got {}",
                    record.id,
                    dim,
                    record.vector.len()
                )));
            }
            ids.push(record.id.as_str());
            texts.push(record.text.as_str());
            sources.push(record.source.as_str());
            chunk_indices.push(record.chunk_index);
            flat_vectors.extend_from_slice(&record.vector);
        }

        let vector_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dim as i32,
            Arc::new(Float32Array::from(flat_vectors)),
            None,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create vector array: {}", e)))?;

        RecordBatch::try_new(
            Self::create_schema(dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(sources)),
                Arc::new(UInt32Array::from(chunk_indices)),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Read `(text, source, _distance)` rows out of a search result batch.
    fn batch_to_hits(batch: &RecordBatch) -> AppResult<Vec<SearchHit>> {
        let texts = string_column(batch, "text")?;
        let sources = string_column(batch, "source")?;
        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| AppError::Storage("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| AppError::Storage("Invalid _distance column type".to_string()))?;

        Ok((0..batch.num_rows())
            .map(|row| SearchHit {
                text: texts.value(row).to_string(),
                source: sources.value(row).to_string(),
                score: if distances.is_null(row) {
                    f32::MAX
                } else {
                    distances.value(row)
                },
            })
            .collect())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AppError::Storage(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AppError::Storage(format!("Invalid {} column type", name)))
}

#[async_trait::async_trait]
impl IndexBackend for LanceDbIndex {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn list_names(&self) -> AppResult<Vec<String>> {
        self.connection()
            .await?
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to list tables: {}", e)))
    }

    async fn replace(&self, name: &str, records: Vec<DocumentRecord>) -> AppResult<usize> {
        let batch = Self::records_to_batch(&records)?;
        let schema = batch.schema();
        let count = batch.num_rows();

        // Overwrite commits a new table version; readers keep the old one until then
        self.connection()
            .await?
            .create_table(name, RecordBatchIterator::new(vec![Ok(batch)], schema))
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write table '{}': {}", name, e)))?;

        tracing::debug!("Wrote {} records to LanceDB table '{}'", count, name);

        Ok(count)
    }

    async fn drop_index(&self, name: &str) -> AppResult<bool> {
        if !self.exists(name).await? {
            return Ok(false);
        }

        self.connection()
            .await?
            .drop_table(name)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to drop table '{}': {}", name, e)))?;

        Ok(true)
    }

    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> AppResult<Vec<SearchHit>> {
        let table = self.open(name).await?;

        let batches = table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| AppError::Storage(format!("Failed to create query: {}", e)))?
            .limit(limit)
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to collect results: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(Self::batch_to_hits(batch)?);
        }
        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        hits.truncate(limit);

        tracing::debug!("Table '{}' returned {} hits (limit {})", name, hits.len(), limit);

        Ok(hits)
    }

    async fn count(&self, name: &str) -> AppResult<usize> {
        self.open(name)
            .await?
            .count_rows(None)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to count rows in '{}': {}", name, e)))
    }
}

//! Embedding client for the knowledge store.
//!
//! `EmbeddingClient` sits between the store and a concrete provider and owns
//! the batching policy: inputs are partitioned into sub-batches no larger than
//! the provider limit and the outputs are concatenated in input order.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use pitchsim_core::{AppError, AppResult, EmbeddingSettings};
use std::sync::Arc;

/// Conservative per-request input limit.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Order-preserving, batching front end for an [`EmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingClient {
    /// Wrap a provider. A `batch_size` of 0 falls back to [`DEFAULT_BATCH_SIZE`].
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        Self {
            provider,
            batch_size,
        }
    }

    /// Build the provider named in `settings` and wrap it.
    pub fn from_settings(settings: &EmbeddingSettings, api_key: Option<&str>) -> AppResult<Self> {
        let provider = create_provider(settings, api_key)?;
        Ok(Self::new(provider, settings.batch_size))
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.provider.embed(text).await
    }

    /// Embed `texts`, returning one vector per input at the same position.
    ///
    /// Duplicates are embedded separately. Provider errors are returned
    /// unchanged and abort the whole call.
    pub async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "Embedding {} texts in batches of {} using provider '{}' (model: {})",
            texts.len(),
            self.batch_size,
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self.provider.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Provider returned {} embeddings for batch {} of {} texts",
                    vectors.len(),
                    batch_idx,
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }
}

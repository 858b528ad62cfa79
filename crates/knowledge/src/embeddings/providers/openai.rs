//! OpenAI Embedding Provider
//!
//! Calls the `/embeddings` endpoint of the OpenAI API (or any compatible
//! server configured through `endpoint`). One `embed_batch` call maps to
//! exactly one HTTP request; partitioning happens in `EmbeddingClient`.
//! Failures are returned as-is, without retries.

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use pitchsim_core::{AppError, AppResult, EmbeddingSettings};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default API base URL
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const EMBEDDING_ENDPOINT: &str = "/embeddings";

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    /// API base URL without trailing slash
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiProvider {
    /// Create a provider from settings and an API key.
    ///
    /// # Errors
    /// * `AppError::Embedding` - If the HTTP client cannot be built
    pub fn new(settings: &EmbeddingSettings, api_key: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = settings
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        })
    }

    /// Put response items back in request order and check their shape.
    fn order_embeddings(&self, mut data: Vec<EmbeddingData>, expected: usize) -> AppResult<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(AppError::Embedding(format!(
                "OpenAI returned {} embeddings for {} inputs",
                data.len(),
                expected
            )));
        }

        data.sort_by_key(|item| item.index);

        data.into_iter()
            .enumerate()
            .map(|(position, item)| {
                if item.index != position {
                    return Err(AppError::Embedding(format!(
                        "OpenAI response is missing embedding for input {}",
                        position
                    )));
                }
                if item.embedding.len() != self.dimensions {
                    return Err(AppError::Embedding(format!(
                        "Unexpected embedding dimensions: got {}, expected {}",
                        item.embedding.len(),
                        self.dimensions
                    )));
                }
                Ok(item.embedding)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "openai", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to OpenAI: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);

            warn!("OpenAI embedding request failed with status {}", status);

            return Err(AppError::Embedding(format!(
                "OpenAI API error ({}): {}",
                status, message
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse OpenAI response: {}", e)))?;

        let embeddings = self.order_embeddings(body.data, texts.len())?;

        debug!("Received {} embeddings", embeddings.len());

        Ok(embeddings)
    }
}

//! Voyage backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use mmsearch_core::defaults;
use mmsearch_core::{EmbeddingBackend, Error, RerankBackend, RerankScore, Result, Vector};

use super::error::{ProviderErrorCode, VoyageOperation};
use super::types::*;

/// Configuration for the Voyage backend.
#[derive(Debug, Clone)]
pub struct VoyageConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication.
    pub api_key: Option<String>,
    /// Model to use for query embeddings.
    pub embed_model: String,
    /// Model to use for reranking.
    pub rerank_model: String,
    /// Expected embedding dimension.
    pub embed_dimension: usize,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for VoyageConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::VOYAGE_URL.to_string(),
            api_key: None,
            embed_model: defaults::EMBED_MODEL.to_string(),
            rerank_model: defaults::RERANK_MODEL.to_string(),
            embed_dimension: defaults::EMBED_DIMENSION,
            timeout_seconds: defaults::HTTP_TIMEOUT_SECS,
        }
    }
}

impl VoyageConfig {
    /// Read configuration from `VOYAGE_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("VOYAGE_BASE_URL")
                .unwrap_or_else(|_| defaults::VOYAGE_URL.to_string()),
            api_key: std::env::var("VOYAGE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            embed_model: std::env::var("VOYAGE_EMBED_MODEL")
                .unwrap_or_else(|_| defaults::EMBED_MODEL.to_string()),
            rerank_model: std::env::var("VOYAGE_RERANK_MODEL")
                .unwrap_or_else(|_| defaults::RERANK_MODEL.to_string()),
            embed_dimension: std::env::var("VOYAGE_EMBED_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::EMBED_DIMENSION),
            timeout_seconds: std::env::var("VOYAGE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::HTTP_TIMEOUT_SECS),
        }
    }
}

/// Voyage embedding and rerank backend.
pub struct VoyageBackend {
    client: Client,
    config: VoyageConfig,
}

impl VoyageBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: VoyageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            warn!(
                subsystem = "inference",
                component = "voyage",
                "VOYAGE_API_KEY is not set; provider calls will be rejected"
            );
        }

        info!(
            subsystem = "inference",
            component = "voyage",
            url = %config.base_url,
            embed_model = %config.embed_model,
            rerank_model = %config.rerank_model,
            "Initializing Voyage backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(VoyageConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &VoyageConfig {
        &self.config
    }

    /// Build a POST request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    /// POST a JSON body and decode the JSON response, mapping every failure
    /// into the error variant owned by `op`.
    async fn post_json<B, R>(&self, endpoint: &str, body: &B, op: VoyageOperation) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .build_request(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    op.error(format!("Request timed out: {}", e))
                } else {
                    op.error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<VoyageErrorResponse>(&text)
                .map(|body| body.detail)
                .unwrap_or_else(|_| {
                    if text.is_empty() {
                        "Unknown error".to_string()
                    } else {
                        text
                    }
                });
            let code = ProviderErrorCode::from_response(status.as_u16(), &detail);
            warn!(
                subsystem = "inference",
                component = "voyage",
                op = %op,
                http_status = status.as_u16(),
                retryable = code.is_retryable(),
                error = %detail,
                "Voyage request failed"
            );
            return Err(code.into_error(op, status.as_u16(), &detail));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| op.error(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl EmbeddingBackend for VoyageBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            subsystem = "inference",
            component = "voyage",
            op = "embed_texts",
            input_count = texts.len(),
            model = %self.config.embed_model,
            "Embedding query texts"
        );

        let request = MultimodalEmbeddingRequest {
            inputs: texts.iter().map(MultimodalInput::text).collect(),
            model: self.config.embed_model.clone(),
            input_type: Some("query".to_string()),
        };

        let result: EmbeddingResponse = self
            .post_json("/multimodalembeddings", &request, VoyageOperation::Embed)
            .await?;

        if result.data.len() != texts.len() {
            return Err(Error::EmbeddingUnavailable(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        // Sort by index to ensure correct ordering
        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        let mut vectors = Vec::with_capacity(data.len());
        for d in data {
            if d.embedding.len() != self.config.embed_dimension {
                return Err(Error::EmbeddingUnavailable(format!(
                    "Expected {}-dim embedding, got {}",
                    self.config.embed_dimension,
                    d.embedding.len()
                )));
            }
            vectors.push(Vector::from(d.embedding));
        }

        debug!(
            subsystem = "inference",
            component = "voyage",
            total_tokens = result.usage.and_then(|u| u.total_tokens),
            "Generated {} embeddings",
            vectors.len()
        );
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl RerankBackend for VoyageBackend {
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RerankScore>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            subsystem = "inference",
            component = "voyage",
            op = "rerank",
            input_count = documents.len(),
            model = %self.config.rerank_model,
            "Reranking candidates"
        );

        let request = RerankRequest {
            query: query.to_string(),
            documents: documents.to_vec(),
            model: self.config.rerank_model.clone(),
            top_k: None,
        };

        let result: RerankResponse = self
            .post_json("/rerank", &request, VoyageOperation::Rerank)
            .await?;

        Ok(result
            .data
            .into_iter()
            .map(|d| RerankScore {
                index: d.index,
                relevance_score: d.relevance_score,
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.config.rerank_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VoyageConfig::default();
        assert_eq!(config.base_url, defaults::VOYAGE_URL);
        assert_eq!(config.embed_model, "voyage-multimodal-3");
        assert_eq!(config.rerank_model, "rerank-lite-1");
        assert_eq!(config.embed_dimension, 1024);
        assert_eq!(config.timeout_seconds, defaults::HTTP_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_backend_creation() {
        let backend = VoyageBackend::new(VoyageConfig::default());
        assert!(backend.is_ok());
        assert_eq!(backend.unwrap().config().base_url, defaults::VOYAGE_URL);
    }

    #[test]
    fn test_model_name_accessors() {
        let config = VoyageConfig {
            embed_model: "test-embed".to_string(),
            rerank_model: "test-rerank".to_string(),
            embed_dimension: 8,
            ..Default::default()
        };
        let backend = VoyageBackend::new(config).unwrap();
        assert_eq!(EmbeddingBackend::model_name(&backend), "test-embed");
        assert_eq!(RerankBackend::model_name(&backend), "test-rerank");
        assert_eq!(backend.dimension(), 8);
    }

    #[tokio::test]
    async fn test_empty_inputs_short_circuit() {
        let backend = VoyageBackend::new(VoyageConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert!(backend.embed_texts(&[]).await.unwrap().is_empty());
        assert!(backend.rerank("q", &[]).await.unwrap().is_empty());
    }
}

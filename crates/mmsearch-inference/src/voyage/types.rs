//! Voyage API request and response types.

use serde::{Deserialize, Serialize};

/// Request body for `POST /multimodalembeddings`.
#[derive(Debug, Clone, Serialize)]
pub struct MultimodalEmbeddingRequest {
    pub inputs: Vec<MultimodalInput>,
    pub model: String,
    /// `"query"` at search time, `"document"` at ingestion time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

/// One multimodal input (an interleaved list of content parts).
#[derive(Debug, Clone, Serialize)]
pub struct MultimodalInput {
    pub content: Vec<ContentPart>,
}

/// Content part of a multimodal input. Queries are text only.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
}

impl MultimodalInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }
}

/// Response from `POST /multimodalembeddings`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    pub index: usize,
}

/// Request body for `POST /rerank`.
#[derive(Debug, Clone, Serialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

/// Response from `POST /rerank`, sorted by descending relevance.
#[derive(Debug, Clone, Deserialize)]
pub struct RerankResponse {
    pub data: Vec<RerankData>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerankData {
    pub index: usize,
    pub relevance_score: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub text_tokens: Option<u64>,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct VoyageErrorResponse {
    pub detail: String,
}

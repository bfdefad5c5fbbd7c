//! Core traits for mmsearch collaborators.
//!
//! The retrieval pipeline only sees these traits, so every remote
//! dependency can be swapped for an in-process implementation in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{FileTypeFilter, StoredHit, Vector};

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating query embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    /// Failures are reported as `Error::EmbeddingUnavailable`.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Relevance score assigned by a reranker to one input document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankScore {
    /// Position of the document in the request.
    pub index: usize,
    pub relevance_score: f32,
}

/// Backend for cross-encoder reranking.
#[async_trait]
pub trait RerankBackend: Send + Sync {
    /// Score each document against the query.
    ///
    /// Failures are reported as `Error::RerankUnavailable`.
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RerankScore>>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// SEARCH TRAITS
// =============================================================================

/// Parameters for one nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vector,
    /// Maximum number of hits to return.
    pub top_k: usize,
    /// Index search breadth.
    pub num_candidates: usize,
    /// Pre-filter on stored file type. Empty means unrestricted.
    pub file_types: FileTypeFilter,
}

/// Filtered approximate nearest-neighbor search over the archive index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return at most `top_k` hits ordered by descending similarity.
    ///
    /// The file type filter must be applied before truncation to `top_k`.
    /// Failures are reported as `Error::SearchUnavailable`.
    async fn search(&self, query: &VectorQuery) -> Result<Vec<StoredHit>>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

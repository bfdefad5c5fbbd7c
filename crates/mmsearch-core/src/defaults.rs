//! Centralized default constants for mmsearch.
//!
//! **This module is the single source of truth** for shared default values.
//! Component configs reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default multimodal embedding model (Voyage).
pub const EMBED_MODEL: &str = "voyage-multimodal-3";

/// Embedding vector dimension of the archive index.
pub const EMBED_DIMENSION: usize = 1024;

// =============================================================================
// RERANKING
// =============================================================================

/// Default cross-encoder rerank model (Voyage).
pub const RERANK_MODEL: &str = "rerank-lite-1";

// =============================================================================
// PROVIDER
// =============================================================================

/// Default Voyage API endpoint.
pub const VOYAGE_URL: &str = "https://api.voyageai.com/v1";

/// HTTP client timeout in seconds. A backstop behind the per-stage timeouts.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Number of candidates requested from the vector store.
///
/// Larger than any display count so reranking and group collapse have
/// headroom.
pub const TOP_K: usize = 50;

/// HNSW search breadth (candidates examined per query).
pub const NUM_CANDIDATES: usize = 200;

/// Embedding stage timeout in milliseconds.
pub const EMBED_TIMEOUT_MS: u64 = 5_000;

/// Vector search stage timeout in milliseconds.
pub const SEARCH_TIMEOUT_MS: u64 = 5_000;

/// Rerank stage timeout in milliseconds.
pub const RERANK_TIMEOUT_MS: u64 = 3_000;

// =============================================================================
// DATABASE
// =============================================================================

/// Default database URL.
pub const DATABASE_URL: &str = "postgres://localhost/mmsearch";

/// Table holding archive records and their embeddings.
pub const RECORDS_TABLE: &str = "media_records";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8080;

/// Default bind address.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Directory holding the built single-page app.
pub const STATIC_DIR: &str = "dist";

/// Maximum accepted request body size in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_budget_exceeds_top_k() {
        assert!(NUM_CANDIDATES >= TOP_K);
    }

    #[test]
    fn test_rerank_timeout_is_bounded() {
        assert!(RERANK_TIMEOUT_MS <= SEARCH_TIMEOUT_MS);
        assert!(HTTP_TIMEOUT_SECS * 1000 >= EMBED_TIMEOUT_MS);
    }
}

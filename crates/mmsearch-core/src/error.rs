//! Error types for mmsearch.

use thiserror::Error;

/// Result type alias using mmsearch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mmsearch operations.
///
/// The first four variants form the retrieval taxonomy. `InvalidQuery` is a
/// client error raised before any remote call; `EmbeddingUnavailable` and
/// `SearchUnavailable` abort a request; `RerankUnavailable` is only ever
/// produced by reranker clients and is absorbed by the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Query text was blank or a filter value is unsupported
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Embedding provider failed, timed out, or returned an unusable vector
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Vector store failed or timed out
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// Reranker failed, timed out, or returned an unusable ordering
    #[error("Rerank unavailable: {0}")]
    RerankUnavailable(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a remote collaborator is at fault (maps to a 502 response).
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingUnavailable(_)
                | Error::SearchUnavailable(_)
                | Error::RerankUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

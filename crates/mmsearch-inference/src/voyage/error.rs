//! Voyage error classification.

use std::fmt;

use mmsearch_core::Error;

/// Which provider call failed; decides the taxonomy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoyageOperation {
    Embed,
    Rerank,
}

impl VoyageOperation {
    /// Wrap a message in the error variant owned by this operation.
    pub fn error(self, message: impl Into<String>) -> Error {
        match self {
            Self::Embed => Error::EmbeddingUnavailable(message.into()),
            Self::Rerank => Error::RerankUnavailable(message.into()),
        }
    }
}

impl fmt::Display for VoyageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embed => f.write_str("embed"),
            Self::Rerank => f.write_str("rerank"),
        }
    }
}

/// Provider error classes derived from the HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// Invalid or missing API key.
    AuthenticationError,
    /// Rate limit or token quota exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request rejected (too many inputs, too long, malformed).
    InvalidRequest,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl ProviderErrorCode {
    /// Determine error code from HTTP status and error detail.
    pub fn from_response(status: u16, detail: &str) -> Self {
        let detail = detail.to_lowercase();
        match status {
            401 | 403 => Self::AuthenticationError,
            429 => Self::RateLimitExceeded,
            404 => Self::ModelNotFound,
            400 | 422 if detail.contains("model") && detail.contains("not") => {
                Self::ModelNotFound
            }
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Check if this error is retryable by a caller-side policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::AuthenticationError => "Authentication failed",
            Self::RateLimitExceeded => "Rate limit exceeded",
            Self::ModelNotFound => "Model not found",
            Self::InvalidRequest => "Request rejected",
            Self::ServerError => "Server error",
            Self::Unknown => "Provider error",
        }
    }

    /// Convert into the taxonomy error for the failing operation.
    pub fn into_error(self, op: VoyageOperation, status: u16, message: &str) -> Error {
        op.error(format!("{} ({}): {}", self.label(), status, message))
    }
}

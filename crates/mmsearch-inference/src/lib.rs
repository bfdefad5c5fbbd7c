//! # mmsearch-inference
//!
//! Embedding and rerank provider backends for mmsearch.
//!
//! This crate provides:
//! - Voyage AI backend implementing both [`EmbeddingBackend`] (multimodal
//!   query embeddings) and [`RerankBackend`] (cross-encoder reranking)
//! - Provider error classification mapped onto the core error taxonomy
//! - Deterministic mock backends (feature `mock`) for pipeline tests
//!
//! # Example
//!
//! ```rust,no_run
//! use mmsearch_inference::VoyageBackend;
//! use mmsearch_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = VoyageBackend::from_env().unwrap();
//!     let texts = vec!["apollo moon landing".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//!     assert_eq!(embeddings[0].as_slice().len(), 1024);
//! }
//! ```

pub mod voyage;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use mmsearch_core::{EmbeddingBackend, Error, RerankBackend, RerankScore, Result, Vector};

pub use voyage::{VoyageBackend, VoyageConfig};

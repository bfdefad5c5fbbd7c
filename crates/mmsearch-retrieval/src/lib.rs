//! # mmsearch-retrieval
//!
//! Query-time retrieval for the media archive.
//!
//! This crate provides:
//! - The retrieval orchestrator (embed, filtered vector search, optional
//!   rerank with fallback, grouping) with per-stage timeouts
//! - Collapse of chunked video results into ranked media groups
//! - The response envelope and its OpenAPI schema
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mmsearch_retrieval::{format_response, RetrievalConfig, RetrievalPipeline};
//! use mmsearch_core::{FileTypeFilter, SearchRequest};
//!
//! let pipeline = RetrievalPipeline::new(embedder, store, RetrievalConfig::from_env())
//!     .with_reranker(reranker);
//!
//! let request = SearchRequest::new("apollo launch")
//!     .with_file_types(FileTypeFilter::parse(&["mp4"])?);
//! let outcome = pipeline.search(&request).await?;
//! let response = format_response(&outcome);
//! ```

pub mod grouping;
pub mod pipeline;
pub mod response;

// Re-export core types
pub use mmsearch_core::*;

pub use grouping::{group_records, MediaGroup, ResultEntry};
pub use pipeline::{
    PipelineStage, RerankStatus, RetrievalConfig, RetrievalPipeline, SearchOutcome, StageTimings,
};
pub use response::{format_response, GroupMemberResponse, ResultEntryResponse, SearchResponse};

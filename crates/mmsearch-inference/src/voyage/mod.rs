//! Voyage AI backend.
//!
//! One HTTP client serves both provider endpoints used at query time:
//!
//! - `POST /multimodalembeddings` with `input_type = "query"`, producing the
//!   1024-dim vectors the archive index was built with
//! - `POST /rerank`, scoring candidate texts against the raw query
//!
//! # Example
//!
//! ```rust,no_run
//! use mmsearch_inference::voyage::{VoyageBackend, VoyageConfig};
//! use mmsearch_core::RerankBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = VoyageConfig {
//!         api_key: Some("pa-...".to_string()),
//!         ..Default::default()
//!     };
//!     let backend = VoyageBackend::new(config).unwrap();
//!
//!     let documents = vec![
//!         "Saturn V stacking in the VAB".to_string(),
//!         "Mission control during Apollo 13".to_string(),
//!     ];
//!     let scores = backend.rerank("rocket assembly", &documents).await.unwrap();
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{VoyageBackend, VoyageConfig};
pub use error::{ProviderErrorCode, VoyageOperation};
pub use types::*;

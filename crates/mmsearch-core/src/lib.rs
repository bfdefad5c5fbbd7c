//! # mmsearch-core
//!
//! Core types, traits, and abstractions for the mmsearch workspace.
//!
//! This crate provides the foundational data structures (tagged archive
//! records, search requests, file type filters), the backend traits the
//! retrieval pipeline is composed from, and the shared error taxonomy.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;

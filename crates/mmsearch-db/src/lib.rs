//! # mmsearch-db
//!
//! Vector store implementations for mmsearch.
//!
//! This crate provides:
//! - Connection pool management
//! - pgvector-backed filtered nearest-neighbor search over `media_records`
//! - A brute-force in-memory store for development and tests
//! - Schema migrations (feature `migrations`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use mmsearch_db::Database;
//! use mmsearch_core::{FileTypeFilter, VectorQuery, VectorStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/mmsearch").await?;
//!
//!     let hits = db.records.search(&VectorQuery {
//!         vector: query_vector,
//!         top_k: 50,
//!         num_candidates: 200,
//!         file_types: FileTypeFilter::parse(&["pdf"])?,
//!     }).await?;
//!
//!     println!("{} hits", hits.len());
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod pool;
pub mod vector_store;

// Re-export core types
pub use mmsearch_core::*;

pub use memory::{cosine_similarity, MemoryDocument, MemoryVectorStore};
pub use pool::{create_pool, log_pool_metrics, PoolConfig, PoolMetrics};
pub use vector_store::PgVectorStore;

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Archive index over `media_records`.
    pub records: PgVectorStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            records: PgVectorStore::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, &PoolConfig::default()).await
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = create_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

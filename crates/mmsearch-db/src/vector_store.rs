//! pgvector-backed archive index.
//!
//! Documents live in a single `media_records` table with an HNSW cosine
//! index over the `embedding` column. The file type filter is a `WHERE`
//! predicate evaluated during the index scan; with iterative scanning enabled
//! the scan keeps walking the graph until `top_k` rows pass the filter, so a
//! rare file type is not starved by a top-K already filled with other types.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::pool::log_pool_metrics;
use mmsearch_core::defaults::RECORDS_TABLE;
use mmsearch_core::{
    compact_string_list, Error, Result, StoredFields, StoredHit, VectorQuery, VectorStore,
};

/// PostgreSQL vector store over the `media_records` table.
#[derive(Clone)]
pub struct PgVectorStore {
    pool: PgPool,
    iterative_scan: bool,
}

fn unavailable(e: sqlx::Error) -> Error {
    Error::SearchUnavailable(format!("Vector search failed: {}", e))
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            iterative_scan: true,
        }
    }

    /// Toggle `hnsw.iterative_scan`. Disable on pgvector releases older
    /// than 0.8, which do not know the setting.
    pub fn with_iterative_scan(mut self, enabled: bool) -> Self {
        self.iterative_scan = enabled;
        self
    }

    fn search_sql() -> String {
        format!(
            r#"
            SELECT id,
                   1.0 - (embedding <=> $1::vector) AS score,
                   na_id, title, subtitle, scope_note, file_type,
                   source_file_name, source_file_names,
                   source_s3_path, source_s3_paths,
                   chunk_text_content, start_timestamp, end_timestamp
            FROM {}
            WHERE embedding IS NOT NULL
              AND ($2::text[] IS NULL OR file_type = ANY($2::text[]))
            ORDER BY embedding <=> $1::vector
            LIMIT $3
            "#,
            RECORDS_TABLE
        )
    }

    /// Decode one row. Only `id` and `score` are required; any other
    /// column that fails to decode is treated as missing so the record
    /// still resolves, flagged, downstream.
    fn row_to_hit(row: &PgRow) -> std::result::Result<StoredHit, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let score: f64 = row.try_get("score")?;

        let text = |name: &str| column::<String>(row, name, &id);
        let float = |name: &str| column::<f64>(row, name, &id);
        let list =
            |name: &str| compact_string_list(column::<Vec<Option<String>>>(row, name, &id));

        let fields = StoredFields {
            na_id: text("na_id"),
            title: text("title"),
            subtitle: text("subtitle"),
            scope_note: text("scope_note"),
            file_type: text("file_type"),
            source_file_name: text("source_file_name"),
            source_file_names: list("source_file_names"),
            source_s3_path: text("source_s3_path"),
            source_s3_paths: list("source_s3_paths"),
            chunk_text_content: text("chunk_text_content"),
            start_timestamp: float("start_timestamp"),
            end_timestamp: float("end_timestamp"),
        };

        Ok(StoredHit {
            id,
            score: score as f32,
            fields,
        })
    }
}

/// Decode a nullable column, logging and returning `None` on a decode error.
fn column<'r, T>(row: &'r PgRow, name: &str, id: &str) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(name) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                subsystem = "database",
                component = "vector_store",
                record_id = id,
                column = name,
                error = %e,
                "Undecodable column, treating as missing"
            );
            None
        }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn search(&self, query: &VectorQuery) -> Result<Vec<StoredHit>> {
        let start = Instant::now();
        let file_types = if query.file_types.is_empty() {
            None
        } else {
            Some(query.file_types.stored_values())
        };

        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        // Settings are transaction-local so pooled connections stay clean.
        sqlx::query("SELECT set_config('hnsw.ef_search', $1, true)")
            .bind(query.num_candidates.max(query.top_k).to_string())
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        if self.iterative_scan {
            sqlx::query("SELECT set_config('hnsw.iterative_scan', 'strict_order', true)")
                .execute(&mut *tx)
                .await
                .map_err(unavailable)?;
        }

        let rows = sqlx::query(&Self::search_sql())
            .bind(&query.vector)
            .bind(file_types)
            .bind(query.top_k as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;
        log_pool_metrics(&self.pool);

        let hits: Vec<StoredHit> = rows
            .iter()
            .filter_map(|row| match Self::row_to_hit(row) {
                Ok(hit) => Some(hit),
                Err(e) => {
                    warn!(
                        subsystem = "database",
                        component = "vector_store",
                        error = %e,
                        "Skipping row without a readable id or score"
                    );
                    None
                }
            })
            .collect();

        if hits.len() < query.top_k && !query.file_types.is_empty() {
            debug!(
                subsystem = "database",
                component = "vector_store",
                file_types = %query.file_types,
                result_count = hits.len(),
                top_k = query.top_k,
                "Filtered search returned fewer than top_k hits"
            );
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if duration_ms > 1000 {
            warn!(
                subsystem = "database",
                component = "vector_store",
                duration_ms,
                "Slow vector search"
            );
        }

        debug!(
            subsystem = "database",
            component = "vector_store",
            op = "search",
            result_count = hits.len(),
            top_k = query.top_k,
            num_candidates = query.num_candidates,
            duration_ms,
            "Vector search complete"
        );
        Ok(hits)
    }

    fn name(&self) -> &str {
        "pgvector"
    }
}

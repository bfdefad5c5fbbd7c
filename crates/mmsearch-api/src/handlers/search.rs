use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;
use utoipa::ToSchema;

use mmsearch_core::{FileTypeFilter, SearchRequest};
use mmsearch_retrieval::{format_response, SearchResponse};

use crate::error::ErrorResponse;
use crate::{ApiError, AppState};

fn default_use_reranker() -> bool {
    true
}

/// Search request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequestBody {
    /// Free-text query. Blank queries are rejected.
    pub query_text: String,
    /// File types to restrict results to (`mp4`, `jpg`, `gif`, `pdf`).
    /// `mp4` also matches video chunks. Empty or absent means all.
    #[serde(default)]
    pub filter_file_types: Option<Vec<String>>,
    /// Reorder candidates with the cross-encoder when one is configured.
    #[serde(default = "default_use_reranker")]
    pub use_reranker: bool,
}

impl SearchRequestBody {
    fn into_request(self) -> Result<SearchRequest, ApiError> {
        let file_types = FileTypeFilter::parse(&self.filter_file_types.unwrap_or_default())?;
        Ok(SearchRequest::new(self.query_text)
            .with_file_types(file_types)
            .with_reranker(self.use_reranker))
    }
}

/// Semantic search over the archive.
#[utoipa::path(
    post,
    path = "/search",
    tag = "Search",
    request_body = SearchRequestBody,
    responses(
        (status = 200, description = "Ranked results", body = SearchResponse),
        (status = 400, description = "Invalid query, filter or body", body = ErrorResponse),
        (
            status = 502,
            description = "Embedding or vector search unavailable",
            body = ErrorResponse
        ),
    )
)]
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequestBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(body) = payload.map_err(ApiError::from)?;
    let request = body.into_request()?;

    let outcome = state.pipeline.search(&request).await?;
    debug!(
        subsystem = "api",
        op = "search",
        rerank = outcome.rerank.label(),
        malformed = outcome.malformed_count,
        "Search complete"
    );

    Ok(Json(format_response(&outcome)))
}

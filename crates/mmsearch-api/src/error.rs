use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Invalid query, filter or request body.
    BadRequest(String),
    /// Embedding or vector search backend failed.
    BadGateway(String),
    PayloadTooLarge(String),
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<mmsearch_core::Error> for ApiError {
    fn from(err: mmsearch_core::Error) -> Self {
        use mmsearch_core::Error;
        match err {
            Error::InvalidQuery(msg) => ApiError::BadRequest(msg),
            e if e.is_upstream_failure() => ApiError::BadGateway(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => {
                warn!(subsystem = "api", status = 400, error = %msg, "Rejected request");
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::BadGateway(msg) => {
                error!(subsystem = "api", status = 502, error = %msg, "Upstream failure");
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::PayloadTooLarge(msg) => {
                warn!(subsystem = "api", status = 413, error = %msg, "Rejected request");
                (StatusCode::PAYLOAD_TOO_LARGE, msg)
            }
            ApiError::Internal(msg) => {
                error!(subsystem = "api", status = 500, error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

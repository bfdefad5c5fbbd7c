//! mmsearch-api - HTTP API server for the media archive search

mod config;
mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use uuid::Uuid;

use mmsearch_core::VectorStore;
use mmsearch_db::{Database, MemoryVectorStore, PoolConfig};
use mmsearch_inference::VoyageBackend;
use mmsearch_retrieval::{
    GroupMemberResponse, ResultEntryResponse, RetrievalConfig, RetrievalPipeline, SearchResponse,
};

use config::{ServerConfig, StoreKind};
pub use error::ApiError;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RetrievalPipeline>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "mmsearch API",
        description = "Semantic search over a multimodal media archive"
    ),
    paths(
        handlers::search::search,
        handlers::health::health_check,
        handlers::health::liveness,
    ),
    components(schemas(
        handlers::search::SearchRequestBody,
        handlers::health::HealthResponse,
        error::ErrorResponse,
        SearchResponse,
        ResultEntryResponse,
        GroupMemberResponse,
    )),
    tags(
        (name = "Search", description = "Semantic search with optional reranking"),
        (name = "System", description = "Health checks and system info")
    )
)]
struct ApiDoc;

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// =============================================================================
// ROUTER
// =============================================================================

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600))
}

fn build_router(state: AppState, config: &ServerConfig) -> Router {
    // Unknown paths fall through to the SPA so client-side routes resolve.
    let spa = ServeDir::new(&config.static_dir)
        .fallback(ServeFile::new(config.static_dir.join("index.html")));

    Router::new()
        .route("/search", post(handlers::search::search))
        .route("/health", get(handlers::health::health_check))
        .route("/liveness", get(handlers::health::liveness))
        .route("/openapi.json", get(openapi_json))
        .fallback_service(spa)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(&config.allowed_origins))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
}

// =============================================================================
// STARTUP
// =============================================================================

async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.store {
        StoreKind::Postgres => {
            let pool_config = PoolConfig::from_env();
            let db = Database::connect_with_config(&config.database_url, &pool_config).await?;
            if config.run_migrations {
                db.migrate().await?;
                info!("Database migrations applied");
            }
            Ok(Arc::new(db.records))
        }
        StoreKind::Memory => {
            let store = match &config.memory_store_path {
                Some(path) => MemoryVectorStore::load_json(path).await?,
                None => {
                    warn!("MEMORY_STORE_PATH not set, serving an empty archive");
                    MemoryVectorStore::new()
                }
            };
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "mmsearch_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        concat!(
            "mmsearch_api=debug,mmsearch_retrieval=info,mmsearch_inference=info,",
            "mmsearch_db=info,tower_http=debug"
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("mmsearch-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // no ANSI in files unless asked
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ServerConfig::from_env();
    let store = open_store(&config).await?;
    info!(store = store.name(), "Vector store ready");

    let voyage = Arc::new(VoyageBackend::from_env()?);
    let mut pipeline = RetrievalPipeline::new(voyage.clone(), store, RetrievalConfig::from_env());
    if voyage.config().api_key.is_some() {
        pipeline = pipeline.with_reranker(voyage);
    } else {
        warn!("VOYAGE_API_KEY not set, reranking disabled");
    }

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let app = build_router(state, &config);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use mmsearch_core::StoredFields;
    use mmsearch_db::MemoryDocument;
    use mmsearch_inference::mock::{MockEmbeddingBackend, MockRerankBackend};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const QUERY: &str = "apollo launch";

    fn unit(s: f32) -> Vec<f32> {
        vec![s, (1.0 - s * s).sqrt(), 0.0, 0.0]
    }

    fn archive() -> MemoryVectorStore {
        let media = |id: &str, file_type: &str, score: f32| MemoryDocument {
            id: id.to_string(),
            fields: StoredFields {
                na_id: Some(format!("na-{}", id)),
                title: Some(format!("Title {}", id)),
                file_type: Some(file_type.to_string()),
                source_file_names: Some(vec![format!("{}.{}", id, file_type)]),
                source_s3_paths: Some(vec![format!("s3://archive/{}.{}", id, file_type)]),
                ..Default::default()
            },
            embedding: unit(score),
        };
        let chunk = |id: &str, start: f64, score: f32| MemoryDocument {
            id: id.to_string(),
            fields: StoredFields {
                title: Some("Apollo 11 Launch".to_string()),
                file_type: Some("video_chunk".to_string()),
                source_file_name: Some("apollo11.mp4".to_string()),
                source_s3_path: Some(format!("s3://archive/{}.mp4", id)),
                chunk_text_content: Some(format!("transcript {}", id)),
                start_timestamp: Some(start),
                end_timestamp: Some(start + 10.0),
                ..Default::default()
            },
            embedding: unit(score),
        };
        MemoryVectorStore::from_documents(vec![
            media("img", "jpg", 0.8),
            chunk("c1", 0.0, 0.7),
            chunk("c2", 10.0, 0.6),
            media("doc", "pdf", 0.3),
        ])
        .unwrap()
    }

    fn embedder() -> MockEmbeddingBackend {
        MockEmbeddingBackend::new()
            .with_dimension(4)
            .with_fixed_vector(QUERY, vec![1.0, 0.0, 0.0, 0.0])
    }

    struct Harness {
        router: Router,
        embedder: MockEmbeddingBackend,
        reranker: MockRerankBackend,
        _static_dir: tempfile::TempDir,
    }

    fn harness_with(embedder: MockEmbeddingBackend) -> Harness {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<html>spa</html>").unwrap();
        std::fs::write(static_dir.path().join("app.js"), "console.log(1)").unwrap();

        let reranker = MockRerankBackend::new();
        let pipeline = RetrievalPipeline::new(
            Arc::new(embedder.clone()),
            Arc::new(archive()),
            RetrievalConfig::default(),
        )
        .with_reranker(Arc::new(reranker.clone()));

        let config = ServerConfig {
            static_dir: static_dir.path().to_path_buf(),
            ..Default::default()
        };
        let state = AppState {
            pipeline: Arc::new(pipeline),
        };

        Harness {
            router: build_router(state, &config),
            embedder,
            reranker,
            _static_dir: static_dir,
        }
    }

    fn harness() -> Harness {
        harness_with(embedder())
    }

    fn post_search(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/search")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn read_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let h = harness();
        let response = h.router.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_liveness() {
        let h = harness();
        let response = h.router.oneshot(get("/liveness")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["status"], "alive");
    }

    #[tokio::test]
    async fn test_search_returns_grouped_results() {
        let h = harness();
        let body = json!({ "query_text": QUERY, "use_reranker": false });
        let response = h
            .router
            .oneshot(post_search(body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = read_json(response).await;
        assert_eq!(body["used_reranker"], json!(false));
        assert_eq!(body["candidate_count"], json!(4));
        assert_eq!(body["result_count"], json!(3));

        let results = body["results"].as_array().unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["img", "c1", "doc"]);

        let group = &results[1];
        assert_eq!(group["member_count"], json!(2));
        assert_eq!(group["members"][1]["_id"], json!("c2"));
        assert_eq!(group["source_file_name"], json!("apollo11.mp4"));
        assert_eq!(results[0]["naId"], json!("na-img"));

        assert_eq!(h.reranker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_reranks_by_default() {
        let h = harness();
        let body = json!({ "query_text": QUERY });
        let response = h
            .router
            .oneshot(post_search(body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["used_reranker"], json!(true));
        assert_eq!(h.reranker.call_count(), 1);
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let h = harness();
        let body = json!({ "query_text": QUERY, "filter_file_types": ["pdf"] });
        let response = h
            .router
            .oneshot(post_search(body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["file_type"], json!("pdf"));
    }

    #[tokio::test]
    async fn test_blank_query_is_bad_request() {
        let h = harness();
        let body = json!({ "query_text": "   " });
        let response = h
            .router
            .oneshot(post_search(body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(response).await["error"].is_string());
        assert_eq!(h.embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_file_type_is_bad_request() {
        let h = harness();
        let body = json!({ "query_text": QUERY, "filter_file_types": ["docx"] });
        let response = h
            .router
            .oneshot(post_search(body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(response).await["error"].is_string());
        assert_eq!(h.embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let h = harness();
        let response = h.router.oneshot(post_search("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_query_text_is_bad_request() {
        let h = harness();
        let body = json!({ "filter_file_types": ["pdf"] });
        let response = h
            .router
            .oneshot(post_search(body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let h = harness();
        let body = json!({ "query_text": "x".repeat(70 * 1024) }).to_string();
        let request = Request::builder()
            .method("POST")
            .uri("/search")
            .header("content-type", "application/json")
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap();
        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response.headers()["content-type"],
            HeaderValue::from_static("application/json")
        );
        let body = read_json(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
        assert_eq!(h.embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_bad_gateway() {
        let h = harness_with(embedder().with_failure("quota exceeded"));
        let body = json!({ "query_text": QUERY });
        let response = h
            .router
            .oneshot(post_search(body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = read_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
        assert_eq!(h.reranker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let h = harness();
        let response = h.router.oneshot(get("/openapi.json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let doc = read_json(response).await;
        assert!(doc["paths"]["/search"]["post"].is_object());
        assert!(doc["components"]["schemas"]["SearchResponse"].is_object());
    }

    #[tokio::test]
    async fn test_static_asset_served() {
        let h = harness();
        let response = h.router.oneshot(get("/app.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_text(response).await, "console.log(1)");
    }

    #[tokio::test]
    async fn test_unknown_route_serves_index() {
        let h = harness();
        let response = h.router.oneshot(get("/collections/apollo")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_text(response).await, "<html>spa</html>");
    }

    #[test]
    fn test_request_ids_are_uuid_v7() {
        let request = Request::builder().body(()).unwrap();
        let id = MakeRequestUuidV7.make_request_id(&request).unwrap();
        let parsed = Uuid::parse_str(id.header_value().to_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }
}

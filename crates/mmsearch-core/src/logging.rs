//! Structured logging schema and field name constants for mmsearch.
//!
//! `tracing` macros take field names as identifiers, so these constants are
//! the written contract the macros follow rather than values passed to them.
//! Log aggregation queries should use exactly these names.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Fatal request failure, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (rerank degraded, malformed record) |
//! | INFO  | Lifecycle events (startup, shutdown), request completions |
//! | DEBUG | Stage decisions, intermediate counts, config choices |
//! | TRACE | Per-candidate data (scores, group membership) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID attached to every inbound HTTP request.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "retrieval", "db", "inference"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pipeline", "grouping", "voyage", "pgvector", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "embed_texts", "rerank", "group"
pub const OPERATION: &str = "op";

/// Pipeline stage a message was emitted from.
/// Values: "embedding", "searching", "reranking", "grouping", "done"
pub const STAGE: &str = "stage";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Archive record identifier.
pub const RECORD_ID: &str = "record_id";

/// Search query text.
pub const QUERY: &str = "query";

/// Requested file type filter, comma separated.
pub const FILE_TYPES: &str = "file_types";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of entries in a formatted response.
pub const RESULT_COUNT: &str = "result_count";

/// Number of raw candidates returned by the vector store.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of video groups produced by grouping.
pub const GROUP_COUNT: &str = "group_count";

/// Number of records flagged as malformed in one request.
pub const MALFORMED_COUNT: &str = "malformed_count";

/// Number of input texts sent to an embedding or rerank model.
pub const INPUT_COUNT: &str = "input_count";

/// Search budget handed to the vector store.
pub const TOP_K: &str = "top_k";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for embedding or reranking.
pub const MODEL: &str = "model";

/// HTTP status returned by a remote provider.
pub const HTTP_STATUS: &str = "http_status";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether reranking took effect for the request.
pub const USED_RERANKER: &str = "used_reranker";

/// Rerank outcome label ("applied", "not_requested", "skipped", "degraded").
pub const RERANK_STATUS: &str = "rerank_status";

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

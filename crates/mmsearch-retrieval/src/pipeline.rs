//! Retrieval orchestrator.
//!
//! One request moves through `Embedding -> Searching -> (Reranking) ->
//! Grouping -> Done`. Embedding and search failures abort the request;
//! reranking failures degrade to the vector-search order. Every remote call
//! is attempted once and bounded by its own stage timeout.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use mmsearch_core::defaults;
use mmsearch_core::{
    EmbeddingBackend, Error, Record, RerankBackend, RerankScore, Result, SearchRequest,
    VectorQuery, VectorStore,
};

use crate::grouping::{group_records, ResultEntry};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Retrieval budgets and stage timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Candidates requested from the vector store; also caps the result count.
    pub top_k: usize,
    /// HNSW search breadth.
    pub num_candidates: usize,
    pub embed_timeout: Duration,
    pub search_timeout: Duration,
    pub rerank_timeout: Duration,
    /// Global switch; when false no request is reranked.
    pub rerank_enabled: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: defaults::TOP_K,
            num_candidates: defaults::NUM_CANDIDATES,
            embed_timeout: Duration::from_millis(defaults::EMBED_TIMEOUT_MS),
            search_timeout: Duration::from_millis(defaults::SEARCH_TIMEOUT_MS),
            rerank_timeout: Duration::from_millis(defaults::RERANK_TIMEOUT_MS),
            rerank_enabled: true,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    subsystem = "retrieval",
                    component = "config",
                    variable = name,
                    value = %raw,
                    "Invalid value, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(
                    subsystem = "retrieval",
                    component = "config",
                    variable = name,
                    value = %raw,
                    "Invalid flag, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

impl RetrievalConfig {
    /// Read `SEARCH_*`, `*_TIMEOUT_MS`, and `RERANK_ENABLED` from the
    /// environment.
    pub fn from_env() -> Self {
        Self {
            top_k: env_or("SEARCH_TOP_K", defaults::TOP_K),
            num_candidates: env_or("SEARCH_NUM_CANDIDATES", defaults::NUM_CANDIDATES),
            embed_timeout: Duration::from_millis(env_or(
                "EMBED_TIMEOUT_MS",
                defaults::EMBED_TIMEOUT_MS,
            )),
            search_timeout: Duration::from_millis(env_or(
                "SEARCH_TIMEOUT_MS",
                defaults::SEARCH_TIMEOUT_MS,
            )),
            rerank_timeout: Duration::from_millis(env_or(
                "RERANK_TIMEOUT_MS",
                defaults::RERANK_TIMEOUT_MS,
            )),
            rerank_enabled: env_flag("RERANK_ENABLED", true),
        }
        .normalized()
    }

    /// Correct inconsistent budgets: `top_k` must be positive and
    /// `num_candidates` at least `top_k`.
    pub fn normalized(mut self) -> Self {
        if self.top_k == 0 {
            warn!(
                subsystem = "retrieval",
                component = "config",
                default = defaults::TOP_K,
                "top_k must be positive, using default"
            );
            self.top_k = defaults::TOP_K;
        }
        if self.num_candidates < self.top_k {
            warn!(
                subsystem = "retrieval",
                component = "config",
                num_candidates = self.num_candidates,
                top_k = self.top_k,
                "num_candidates below top_k, raising to top_k"
            );
            self.num_candidates = self.top_k;
        }
        self
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Request lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Embedding,
    Searching,
    Reranking,
    Grouping,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Embedding => "embedding",
            Self::Searching => "searching",
            Self::Reranking => "reranking",
            Self::Grouping => "grouping",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// What happened to the rerank stage of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerankStatus {
    /// Reranker scores replaced the vector scores.
    Applied,
    /// The request asked for no reranking.
    NotRequested,
    /// Requested, but nothing to rerank or no reranker available.
    Skipped,
    /// Reranker failed, timed out, or answered with an invalid response;
    /// vector-search order was kept.
    Degraded(String),
}

impl RerankStatus {
    pub fn used_reranker(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::NotRequested => "not_requested",
            Self::Skipped => "skipped",
            Self::Degraded(_) => "degraded",
        }
    }
}

/// Wall-clock time spent per stage, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub embed_ms: u64,
    pub search_ms: u64,
    pub rerank_ms: Option<u64>,
    pub group_ms: u64,
    pub total_ms: u64,
}

/// Result of one retrieval request, ready for formatting.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub entries: Vec<ResultEntry>,
    pub rerank: RerankStatus,
    /// Number of records returned by the vector store.
    pub candidate_count: usize,
    /// Number of candidates carrying at least one record issue.
    pub malformed_count: usize,
    pub timings: StageTimings,
}

impl SearchOutcome {
    pub fn used_reranker(&self) -> bool {
        self.rerank.used_reranker()
    }

    /// Number of returned entries that are video groups.
    pub fn group_count(&self) -> usize {
        count_groups(&self.entries)
    }
}

fn count_groups(entries: &[ResultEntry]) -> usize {
    entries
        .iter()
        .filter(|entry| matches!(entry, ResultEntry::Group(_)))
        .count()
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Composes the embedding, search, and rerank backends into one request
/// lifecycle.
#[derive(Clone)]
pub struct RetrievalPipeline {
    embedder: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn RerankBackend>>,
    config: RetrievalConfig,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Run `fut` under `limit`, converting a timeout into the stage's error.
async fn bounded<T, F, E>(limit: Duration, fut: F, on_timeout: E) -> Result<T>
where
    F: Future<Output = Result<T>>,
    E: FnOnce(String) -> Error,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!(
            "timed out after {} ms",
            limit.as_millis()
        ))),
    }
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            reranker: None,
            config: config.normalized(),
        }
    }

    /// Attach a reranker. Without one, rerank requests are skipped.
    pub fn with_reranker(mut self, reranker: Arc<dyn RerankBackend>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Execute one search request.
    ///
    /// Fails with `InvalidQuery` before any remote call for a blank query,
    /// `EmbeddingUnavailable` or `SearchUnavailable` for fatal upstream
    /// failures. Reranker problems never fail the request.
    #[instrument(skip(self, request), fields(
        subsystem = "retrieval",
        component = "pipeline",
        op = "search",
        query = %request.query_text,
        file_types = %request.file_types,
        use_reranker = request.use_reranker,
    ))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let start = Instant::now();
        let mut timings = StageTimings::default();

        let query = request.trimmed_query()?;

        // Embedding
        let stage_start = Instant::now();
        let vector = self.embed(query).await?;
        timings.embed_ms = elapsed_ms(stage_start);
        debug!(
            stage = %PipelineStage::Embedding,
            duration_ms = timings.embed_ms,
            model = self.embedder.model_name(),
            "Query embedded"
        );

        // Searching
        let stage_start = Instant::now();
        let vector_query = VectorQuery {
            vector,
            top_k: self.config.top_k,
            num_candidates: self.config.num_candidates,
            file_types: request.file_types.clone(),
        };
        let hits = bounded(
            self.config.search_timeout,
            self.store.search(&vector_query),
            Error::SearchUnavailable,
        )
        .await
        .map_err(|e| match e {
            Error::SearchUnavailable(_) => e,
            other => Error::SearchUnavailable(other.to_string()),
        })?;
        timings.search_ms = elapsed_ms(stage_start);

        let candidate_count = hits.len();
        let mut records: Vec<Record> = hits.into_iter().map(Record::from_stored).collect();
        let malformed_count = log_malformed(&records);
        debug!(
            stage = %PipelineStage::Searching,
            store = self.store.name(),
            candidate_count,
            malformed_count,
            duration_ms = timings.search_ms,
            "Vector search complete"
        );

        // Reranking
        let rerank = if !request.use_reranker {
            RerankStatus::NotRequested
        } else if records.is_empty() || !self.config.rerank_enabled {
            RerankStatus::Skipped
        } else if let Some(reranker) = &self.reranker {
            let stage_start = Instant::now();
            let status = self.rerank(reranker.as_ref(), query, &mut records).await;
            timings.rerank_ms = Some(elapsed_ms(stage_start));
            status
        } else {
            debug!(
                stage = %PipelineStage::Reranking,
                "No reranker configured, keeping vector order"
            );
            RerankStatus::Skipped
        };

        // Grouping
        let stage_start = Instant::now();
        let mut entries = group_records(records);
        entries.truncate(self.config.top_k);
        timings.group_ms = elapsed_ms(stage_start);
        timings.total_ms = elapsed_ms(start);

        info!(
            stage = %PipelineStage::Done,
            result_count = entries.len(),
            group_count = count_groups(&entries),
            candidate_count,
            malformed_count,
            rerank_status = rerank.label(),
            used_reranker = rerank.used_reranker(),
            embed_ms = timings.embed_ms,
            search_ms = timings.search_ms,
            rerank_ms = timings.rerank_ms,
            group_ms = timings.group_ms,
            duration_ms = timings.total_ms,
            "Search completed"
        );

        Ok(SearchOutcome {
            entries,
            rerank,
            candidate_count,
            malformed_count,
            timings,
        })
    }

    async fn embed(&self, query: &str) -> Result<mmsearch_core::Vector> {
        let texts = vec![query.to_string()];
        let mut vectors = bounded(
            self.config.embed_timeout,
            self.embedder.embed_texts(&texts),
            Error::EmbeddingUnavailable,
        )
        .await
        .map_err(|e| match e {
            Error::EmbeddingUnavailable(_) => e,
            other => Error::EmbeddingUnavailable(other.to_string()),
        })?;

        if vectors.is_empty() {
            return Err(Error::EmbeddingUnavailable(
                "provider returned no embedding".to_string(),
            ));
        }
        Ok(vectors.swap_remove(0))
    }

    /// Rerank `records` in place. On any failure the records are left
    /// untouched and the degraded status is returned.
    async fn rerank(
        &self,
        reranker: &dyn RerankBackend,
        query: &str,
        records: &mut [Record],
    ) -> RerankStatus {
        let documents: Vec<String> = records.iter().map(Record::rerank_text).collect();

        let result = bounded(
            self.config.rerank_timeout,
            reranker.rerank(query, &documents),
            Error::RerankUnavailable,
        )
        .await
        .and_then(|scores| validate_rerank(&scores, records.len()).map(|_| scores));

        match result {
            Ok(scores) => {
                apply_rerank(records, &scores);
                debug!(
                    stage = %PipelineStage::Reranking,
                    model = reranker.model_name(),
                    input_count = documents.len(),
                    "Rerank applied"
                );
                RerankStatus::Applied
            }
            Err(e) => {
                warn!(
                    stage = %PipelineStage::Reranking,
                    model = reranker.model_name(),
                    error = %e,
                    "Rerank degraded, keeping vector order"
                );
                RerankStatus::Degraded(e.to_string())
            }
        }
    }
}

fn log_malformed(records: &[Record]) -> usize {
    let mut count = 0;
    for record in records.iter().filter(|r| r.is_malformed()) {
        count += 1;
        for issue in &record.meta().issues {
            warn!(
                subsystem = "retrieval",
                component = "pipeline",
                record_id = record.id(),
                issue = %issue,
                "Malformed record"
            );
        }
    }
    count
}

/// A rerank response must score every candidate exactly once.
fn validate_rerank(scores: &[RerankScore], candidate_count: usize) -> Result<()> {
    if scores.len() != candidate_count {
        return Err(Error::RerankUnavailable(format!(
            "expected {} scores, got {}",
            candidate_count,
            scores.len()
        )));
    }
    let mut seen = vec![false; candidate_count];
    for score in scores {
        if score.index >= candidate_count {
            return Err(Error::RerankUnavailable(format!(
                "index {} out of range",
                score.index
            )));
        }
        if seen[score.index] {
            return Err(Error::RerankUnavailable(format!(
                "duplicate index {}",
                score.index
            )));
        }
        if !score.relevance_score.is_finite() {
            return Err(Error::RerankUnavailable(format!(
                "non-finite score for index {}",
                score.index
            )));
        }
        seen[score.index] = true;
    }
    Ok(())
}

/// Replace scores and reorder, stable so ties keep the pre-rerank order.
fn apply_rerank(records: &mut [Record], scores: &[RerankScore]) {
    for score in scores {
        records[score.index].set_score(score.relevance_score);
    }
    records.sort_by(|a, b| b.score().total_cmp(&a.score()));
}

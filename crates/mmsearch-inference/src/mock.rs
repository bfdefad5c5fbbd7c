//! Mock embedding and rerank backends for deterministic testing.
//!
//! Both mocks implement the core backend traits, so they can be handed to
//! the retrieval pipeline in place of the Voyage client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mmsearch_inference::mock::{MockEmbeddingBackend, MockRerankBackend};
//!
//! let embedder = MockEmbeddingBackend::new()
//!     .with_dimension(4)
//!     .with_fixed_vector("moon landing", vec![1.0, 0.0, 0.0, 0.0]);
//!
//! let reranker = MockRerankBackend::new().with_scores(vec![0.2, 0.9]);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;

use mmsearch_core::{EmbeddingBackend, Error, RerankBackend, RerankScore, Result, Vector};

/// One recorded call against a mock backend.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub inputs: Vec<String>,
    pub timestamp: Instant,
}

type CallLog = Arc<Mutex<Vec<MockCall>>>;

fn log_call(log: &CallLog, operation: &str, inputs: Vec<String>) {
    log.lock().unwrap().push(MockCall {
        operation: operation.to_string(),
        inputs,
        timestamp: Instant::now(),
    });
}

async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
    }
}

// =============================================================================
// EMBEDDING
// =============================================================================

#[derive(Debug, Clone)]
struct EmbedConfig {
    dimension: usize,
    fixed_vectors: HashMap<String, Vec<f32>>,
    latency_ms: u64,
    failure: Option<String>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            dimension: 1024,
            fixed_vectors: HashMap::new(),
            latency_ms: 0,
            failure: None,
        }
    }
}

/// Mock embedding backend.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    config: Arc<EmbedConfig>,
    call_log: CallLog,
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(EmbedConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Return `vector` verbatim whenever `text` is embedded.
    pub fn with_fixed_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_vectors
            .insert(text.into(), vector);
        self
    }

    /// Set simulated latency for every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Fail every call with `Error::EmbeddingUnavailable`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(message.into());
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        log_call(&self.call_log, "embed", texts.to_vec());
        simulate_latency(self.config.latency_ms).await;

        if let Some(ref message) = self.config.failure {
            return Err(Error::EmbeddingUnavailable(message.clone()));
        }

        Ok(texts
            .iter()
            .map(|text| {
                let values = match self.config.fixed_vectors.get(text) {
                    Some(fixed) => fixed.clone(),
                    None => MockEmbeddingGenerator::generate(text, self.config.dimension),
                };
                Vector::from(values)
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

/// Deterministic embedding generator.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Generate a deterministic unit vector from text.
    ///
    /// The same text always produces the same embedding.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension];
        if dimension == 0 {
            return vec;
        }

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }

        Self::normalize(&mut vec);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}

// =============================================================================
// RERANK
// =============================================================================

#[derive(Debug, Clone, Default)]
enum RerankBehavior {
    /// Score by the share of query terms present in each document.
    #[default]
    TermOverlap,
    /// Score document `i` with `scores[i]`.
    Scores(Vec<f32>),
    /// Return this exact response regardless of input.
    Raw(Vec<RerankScore>),
}

#[derive(Debug, Clone, Default)]
struct RerankConfig {
    behavior: RerankBehavior,
    latency_ms: u64,
    failure: Option<String>,
}

/// Mock rerank backend.
#[derive(Clone)]
pub struct MockRerankBackend {
    config: Arc<RerankConfig>,
    call_log: CallLog,
}

impl MockRerankBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RerankConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Assign explicit scores by input position. Documents beyond the end of
    /// `scores` get 0.0.
    pub fn with_scores(mut self, scores: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.config).behavior = RerankBehavior::Scores(scores);
        self
    }

    /// Return a fixed response, valid or not.
    pub fn with_raw_response(mut self, response: Vec<RerankScore>) -> Self {
        Arc::make_mut(&mut self.config).behavior = RerankBehavior::Raw(response);
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Fail every call with `Error::RerankUnavailable`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(message.into());
        self
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    fn term_overlap(query: &str, document: &str) -> f32 {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return 0.0;
        }
        let document = document.to_lowercase();
        let hits = terms.iter().filter(|t| document.contains(t.as_str())).count();
        hits as f32 / terms.len() as f32
    }
}

impl Default for MockRerankBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RerankBackend for MockRerankBackend {
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RerankScore>> {
        let mut inputs = Vec::with_capacity(documents.len() + 1);
        inputs.push(query.to_string());
        inputs.extend(documents.iter().cloned());
        log_call(&self.call_log, "rerank", inputs);
        simulate_latency(self.config.latency_ms).await;

        if let Some(ref message) = self.config.failure {
            return Err(Error::RerankUnavailable(message.clone()));
        }

        let mut scores: Vec<RerankScore> = match &self.config.behavior {
            RerankBehavior::Raw(response) => return Ok(response.clone()),
            RerankBehavior::Scores(scores) => (0..documents.len())
                .map(|index| RerankScore {
                    index,
                    relevance_score: scores.get(index).copied().unwrap_or(0.0),
                })
                .collect(),
            RerankBehavior::TermOverlap => documents
                .iter()
                .enumerate()
                .map(|(index, doc)| RerankScore {
                    index,
                    relevance_score: Self::term_overlap(query, doc),
                })
                .collect(),
        };

        // Providers return results ordered by relevance
        scores.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(scores)
    }

    fn model_name(&self) -> &str {
        "mock-rerank"
    }
}

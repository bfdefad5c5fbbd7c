//! End-to-end retrieval tests over mock providers and the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mmsearch_db::{MemoryDocument, MemoryVectorStore};
use mmsearch_inference::mock::{MockEmbeddingBackend, MockRerankBackend};
use mmsearch_retrieval::{
    format_response, Error, FileTypeFilter, RerankScore, RerankStatus, Result, ResultEntry,
    RetrievalConfig, RetrievalPipeline, SearchRequest, StoredFields, StoredHit, VectorQuery,
    VectorStore,
};

const QUERY: &str = "apollo launch";

/// Unit vector whose cosine with the query axis is exactly `s`.
fn unit(s: f32) -> Vec<f32> {
    vec![s, (1.0 - s * s).sqrt(), 0.0, 0.0]
}

fn media(id: &str, file_type: &str, score: f32) -> MemoryDocument {
    MemoryDocument {
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
    }
}

fn chunk(id: &str, start: f64, score: f32) -> MemoryDocument {
    MemoryDocument {
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
    }
}

/// Store order by similarity: img_a, c1, c2, img_b, c3, doc, anim.
fn archive() -> MemoryVectorStore {
    MemoryVectorStore::from_documents(vec![
        media("img_a", "jpg", 0.8),
        media("img_b", "jpg", 0.6),
        chunk("c1", 0.0, 0.7),
        chunk("c2", 10.0, 0.65),
        chunk("c3", 20.0, 0.5),
        media("doc", "pdf", 0.3),
        media("anim", "gif", 0.2),
    ])
    .unwrap()
}

fn embedder() -> MockEmbeddingBackend {
    MockEmbeddingBackend::new()
        .with_dimension(4)
        .with_fixed_vector(QUERY, vec![1.0, 0.0, 0.0, 0.0])
}

/// Wraps a store and counts calls.
struct CountingStore<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S> CountingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: VectorStore> VectorStore for CountingStore<S> {
    async fn search(&self, query: &VectorQuery) -> Result<Vec<StoredHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn search(&self, _query: &VectorQuery) -> Result<Vec<StoredHit>> {
        Err(Error::SearchUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct SlowStore;

#[async_trait]
impl VectorStore for SlowStore {
    async fn search(&self, _query: &VectorQuery) -> Result<Vec<StoredHit>> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(vec![])
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn ids(entries: &[ResultEntry]) -> Vec<&str> {
    entries.iter().map(ResultEntry::id).collect()
}

#[tokio::test]
async fn test_mixed_results_interleave_groups_by_score() {
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    );

    let request = SearchRequest::new(QUERY).with_reranker(false);
    let outcome = pipeline.search(&request).await.unwrap();

    assert_eq!(ids(&outcome.entries), vec!["img_a", "c1", "img_b", "doc", "anim"]);
    let ResultEntry::Group(group) = &outcome.entries[1] else {
        panic!("expected the chunks to form a group");
    };
    let members: Vec<&str> = group.members().iter().map(|m| m.meta.id.as_str()).collect();
    assert_eq!(members, vec!["c1", "c2", "c3"]);

    assert_eq!(outcome.candidate_count, 7);
    assert_eq!(outcome.malformed_count, 0);
    assert_eq!(outcome.rerank, RerankStatus::NotRequested);
    assert!(!outcome.used_reranker());
}

#[tokio::test]
async fn test_scores_are_non_increasing_and_bounded_by_top_k() {
    let config = RetrievalConfig {
        top_k: 4,
        ..Default::default()
    };
    let pipeline = RetrievalPipeline::new(Arc::new(embedder()), Arc::new(archive()), config);

    let outcome = pipeline
        .search(&SearchRequest::new(QUERY).with_reranker(false))
        .await
        .unwrap();

    assert!(!outcome.entries.is_empty());
    assert!(outcome.entries.len() <= 4);
    assert_eq!(outcome.candidate_count, 4);
    assert!(outcome
        .entries
        .windows(2)
        .all(|w| w[0].score() >= w[1].score()));
}

#[tokio::test]
async fn test_pdf_filter_returns_only_pdf() {
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    );

    let request = SearchRequest::new(QUERY)
        .with_file_types(FileTypeFilter::parse(&["pdf"]).unwrap())
        .with_reranker(false);
    let response = format_response(&pipeline.search(&request).await.unwrap());

    assert_eq!(response.result_count, 1);
    assert!(response.results.iter().all(|e| e.file_type == "pdf"));
}

#[tokio::test]
async fn test_mp4_filter_returns_video_groups() {
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    );

    let request = SearchRequest::new(QUERY)
        .with_file_types(FileTypeFilter::parse(&["mp4"]).unwrap())
        .with_reranker(false);
    let outcome = pipeline.search(&request).await.unwrap();

    assert_eq!(outcome.entries.len(), 1);
    assert!(matches!(&outcome.entries[0], ResultEntry::Group(g) if g.len() == 3));
}

#[tokio::test]
async fn test_blank_query_makes_no_remote_calls() {
    let embed = embedder();
    let store = Arc::new(CountingStore::new(archive()));
    let rerank = MockRerankBackend::new();
    let pipeline =
        RetrievalPipeline::new(Arc::new(embed.clone()), store.clone(), RetrievalConfig::default())
            .with_reranker(Arc::new(rerank.clone()));

    let err = pipeline
        .search(&SearchRequest::new("   \t "))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidQuery(_)));
    assert_eq!(embed.call_count(), 0);
    assert_eq!(store.calls(), 0);
    assert_eq!(rerank.call_count(), 0);
}

#[tokio::test]
async fn test_unsupported_filter_is_invalid_query() {
    let err = FileTypeFilter::parse(&["mov"]).unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}

#[tokio::test]
async fn test_reranker_reorders_and_regroups() {
    // Candidate order: img_a, c1, c2, img_b, c3, doc, anim
    let rerank = MockRerankBackend::new().with_scores(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.9]);
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    )
    .with_reranker(Arc::new(rerank));

    let outcome = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap();

    assert_eq!(outcome.rerank, RerankStatus::Applied);
    assert!(outcome.used_reranker());
    assert_eq!(ids(&outcome.entries), vec!["anim", "doc", "c3", "img_b", "img_a"]);
    assert!((outcome.entries[0].score() - 0.9).abs() < 1e-6);
    assert!(outcome.timings.rerank_ms.is_some());
}

#[tokio::test]
async fn test_reranker_receives_trimmed_query_and_candidate_texts() {
    let embed = embedder();
    let rerank = MockRerankBackend::new();
    let pipeline = RetrievalPipeline::new(
        Arc::new(embed.clone()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    )
    .with_reranker(Arc::new(rerank.clone()));

    pipeline
        .search(&SearchRequest::new(format!("  {}  ", QUERY)))
        .await
        .unwrap();

    assert_eq!(embed.get_calls()[0].inputs, vec![QUERY.to_string()]);

    let calls = rerank.get_calls();
    assert_eq!(calls.len(), 1);
    let inputs = &calls[0].inputs;
    assert_eq!(inputs[0], QUERY);
    // query followed by one text per candidate, in candidate order
    assert_eq!(inputs.len(), 8);
    assert_eq!(inputs[1], "Title img_a");
    assert_eq!(inputs[2], "transcript c1");
}

#[tokio::test]
async fn test_reranker_failure_keeps_vector_order() {
    let baseline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    )
    .search(&SearchRequest::new(QUERY).with_reranker(false))
    .await
    .unwrap();

    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    )
    .with_reranker(Arc::new(MockRerankBackend::new().with_failure("quota exceeded")));

    let outcome = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap();

    assert!(matches!(outcome.rerank, RerankStatus::Degraded(ref msg) if msg.contains("quota")));
    assert!(!outcome.used_reranker());
    assert_eq!(outcome.entries, baseline.entries);
}

#[tokio::test]
async fn test_reranker_timeout_degrades() {
    let config = RetrievalConfig {
        rerank_timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let pipeline = RetrievalPipeline::new(Arc::new(embedder()), Arc::new(archive()), config)
        .with_reranker(Arc::new(MockRerankBackend::new().with_latency_ms(500)));

    let outcome = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap();

    assert!(matches!(outcome.rerank, RerankStatus::Degraded(ref msg) if msg.contains("timed out")));
    assert_eq!(outcome.entries[0].id(), "img_a");
}

#[tokio::test]
async fn test_reranker_invalid_response_degrades() {
    let duplicate = vec![
        RerankScore {
            index: 0,
            relevance_score: 0.9,
        };
        7
    ];
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    )
    .with_reranker(Arc::new(MockRerankBackend::new().with_raw_response(duplicate)));

    let outcome = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap();

    assert!(matches!(outcome.rerank, RerankStatus::Degraded(_)));
    assert_eq!(ids(&outcome.entries)[0], "img_a");
}

#[tokio::test]
async fn test_no_reranker_configured_is_skipped() {
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    );
    assert!(!pipeline.has_reranker());

    let outcome = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap();
    assert_eq!(outcome.rerank, RerankStatus::Skipped);
    assert!(!outcome.used_reranker());
}

#[tokio::test]
async fn test_rerank_disabled_by_config_is_skipped() {
    let rerank = MockRerankBackend::new();
    let config = RetrievalConfig {
        rerank_enabled: false,
        ..Default::default()
    };
    let pipeline = RetrievalPipeline::new(Arc::new(embedder()), Arc::new(archive()), config)
        .with_reranker(Arc::new(rerank.clone()));

    let outcome = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap();
    assert_eq!(outcome.rerank, RerankStatus::Skipped);
    assert_eq!(rerank.call_count(), 0);
}

#[tokio::test]
async fn test_empty_candidates_skip_reranker() {
    let rerank = MockRerankBackend::new();
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(MemoryVectorStore::new()),
        RetrievalConfig::default(),
    )
    .with_reranker(Arc::new(rerank.clone()));

    let outcome = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap();

    assert!(outcome.entries.is_empty());
    assert_eq!(outcome.rerank, RerankStatus::Skipped);
    assert_eq!(rerank.call_count(), 0);
    assert_eq!(format_response(&outcome).result_count, 0);
}

#[tokio::test]
async fn test_embedding_failure_is_fatal_and_skips_search() {
    let store = Arc::new(CountingStore::new(archive()));
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder().with_failure("rate limited")),
        store.clone(),
        RetrievalConfig::default(),
    );

    let err = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap_err();

    assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_embedding_timeout_is_embedding_unavailable() {
    let config = RetrievalConfig {
        embed_timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder().with_latency_ms(500)),
        Arc::new(archive()),
        config,
    );

    let err = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable(ref msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn test_search_failure_is_fatal_and_skips_rerank() {
    let rerank = MockRerankBackend::new();
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(FailingStore),
        RetrievalConfig::default(),
    )
    .with_reranker(Arc::new(rerank.clone()));

    let err = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap_err();

    assert!(matches!(err, Error::SearchUnavailable(_)));
    assert_eq!(rerank.call_count(), 0);
}

#[tokio::test]
async fn test_search_timeout_is_search_unavailable() {
    let config = RetrievalConfig {
        search_timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let pipeline = RetrievalPipeline::new(Arc::new(embedder()), Arc::new(SlowStore), config);

    let err = pipeline.search(&SearchRequest::new(QUERY)).await.unwrap_err();
    assert!(matches!(err, Error::SearchUnavailable(ref msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn test_search_without_reranker_is_idempotent() {
    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder()),
        Arc::new(archive()),
        RetrievalConfig::default(),
    );
    let request = SearchRequest::new(QUERY).with_reranker(false);

    let first = format_response(&pipeline.search(&request).await.unwrap());
    let second = format_response(&pipeline.search(&request).await.unwrap());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_malformed_records_are_kept_and_counted() {
    let mut broken = chunk("broken", 30.0, 0.9);
    broken.fields.title = None;
    broken.fields.end_timestamp = Some(5.0);

    let store = MemoryVectorStore::from_documents(vec![broken, media("img", "jpg", 0.4)]).unwrap();
    let pipeline =
        RetrievalPipeline::new(Arc::new(embedder()), Arc::new(store), RetrievalConfig::default());

    let outcome = pipeline
        .search(&SearchRequest::new(QUERY).with_reranker(false))
        .await
        .unwrap();

    assert_eq!(outcome.malformed_count, 1);
    assert_eq!(outcome.entries.len(), 2);

    let response = format_response(&outcome);
    let entry = &response.results[0];
    assert_eq!(entry.id, "broken");
    assert_eq!(entry.title, "");
    assert_eq!(entry.start_timestamp, Some(30.0));
    assert_eq!(entry.end_timestamp, Some(30.0));
}

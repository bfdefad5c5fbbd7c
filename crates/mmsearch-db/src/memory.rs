//! In-memory vector store for development and tests.
//!
//! Exact brute-force cosine search over a fixed document set. The file type
//! filter is applied before ranking, so a filtered query sees every matching
//! document regardless of how many others score higher.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mmsearch_core::{Error, Result, StoredFields, StoredHit, VectorQuery, VectorStore};

/// One stored document: identifier, loosely typed fields, and embedding.
///
/// Serialized in the same shape the ingestion scripts write, with `_id` and
/// the stored fields flattened alongside `embedding`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: StoredFields,
    pub embedding: Vec<f32>,
}

/// Brute-force vector store.
#[derive(Debug, Clone, Default)]
pub struct MemoryVectorStore {
    documents: Vec<MemoryDocument>,
    dimension: Option<usize>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from documents. All embeddings must share one
    /// non-zero dimension.
    pub fn from_documents(documents: Vec<MemoryDocument>) -> Result<Self> {
        let mut dimension = None;
        for doc in &documents {
            let len = doc.embedding.len();
            if len == 0 {
                return Err(Error::Config(format!(
                    "Document {} has an empty embedding",
                    doc.id
                )));
            }
            match dimension {
                None => dimension = Some(len),
                Some(d) if d != len => {
                    return Err(Error::Config(format!(
                        "Document {} has a {}-dim embedding, expected {}",
                        doc.id, len, d
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(Self {
            documents,
            dimension,
        })
    }

    /// Load documents from a JSON array on disk.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let documents: Vec<MemoryDocument> = serde_json::from_str(&raw)?;
        let store = Self::from_documents(documents)?;

        info!(
            subsystem = "database",
            component = "memory_store",
            op = "load",
            path = %path.display(),
            record_count = store.len(),
            dimension = store.dimension,
            "Loaded in-memory vector store"
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Embedding dimension shared by all documents, if any are loaded.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a > 0.0 && mag_b > 0.0 {
        dot / (mag_a * mag_b)
    } else {
        0.0
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn search(&self, query: &VectorQuery) -> Result<Vec<StoredHit>> {
        let vector = query.vector.as_slice();
        if let Some(dimension) = self.dimension {
            if vector.len() != dimension {
                return Err(Error::SearchUnavailable(format!(
                    "Query vector has {} dimensions, index has {}",
                    vector.len(),
                    dimension
                )));
            }
        }

        let allowed = query.file_types.stored_values();
        let mut scored: Vec<(f32, &MemoryDocument)> = self
            .documents
            .iter()
            .filter(|doc| {
                allowed.is_empty()
                    || doc
                        .fields
                        .file_type
                        .as_ref()
                        .is_some_and(|ft| allowed.contains(ft))
            })
            .map(|doc| (cosine_similarity(vector, &doc.embedding), doc))
            .collect();

        // Stable: equal scores keep store order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(query.top_k);

        debug!(
            subsystem = "database",
            component = "memory_store",
            op = "search",
            result_count = scored.len(),
            top_k = query.top_k,
            "Memory search complete"
        );

        Ok(scored
            .into_iter()
            .map(|(score, doc)| StoredHit {
                id: doc.id.clone(),
                score,
                fields: doc.fields.clone(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

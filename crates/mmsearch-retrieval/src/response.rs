//! Wire shapes for search responses.
//!
//! [`format_response`] is a pure, total function: every entry produced by
//! the pipeline maps to exactly one wire entry, malformed records included
//! (their safe defaults are emitted as-is).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mmsearch_core::{Record, RecordMeta, VideoChunkRecord};

use crate::grouping::{MediaGroup, ResultEntry};
use crate::pipeline::SearchOutcome;

/// Search response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    /// Entries ordered by score descending.
    pub results: Vec<ResultEntryResponse>,
    /// True only when reranker scores were actually applied.
    pub used_reranker: bool,
    pub result_count: usize,
    /// Number of candidates returned by the vector store before grouping.
    pub candidate_count: usize,
}

/// One singleton record or video group.
///
/// Video chunks carry `source_s3_path`, `source_file_name` and the chunk
/// fields; other media carry `source_s3_paths` and `source_file_names`.
/// Groups add `members` and `member_count` to the representative's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultEntryResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "naId")]
    pub na_id: Option<String>,
    pub title: String,
    pub file_type: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_s3_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_s3_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<GroupMemberResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<usize>,
}

/// One chunk inside a video group, ordered by `start_timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroupMemberResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub score: f32,
    pub start_timestamp: f64,
    pub end_timestamp: f64,
    pub chunk_text_content: String,
    pub source_s3_path: String,
}

impl ResultEntryResponse {
    fn base(meta: &RecordMeta) -> Self {
        Self {
            id: meta.id.clone(),
            na_id: meta.na_id.clone(),
            title: meta.title.clone(),
            file_type: meta.file_type.as_str().to_string(),
            score: meta.score,
            source_s3_path: None,
            source_s3_paths: None,
            source_file_name: None,
            source_file_names: None,
            start_timestamp: None,
            end_timestamp: None,
            chunk_text_content: None,
            members: None,
            member_count: None,
        }
    }

    fn from_media(meta: &RecordMeta) -> Self {
        Self {
            source_s3_paths: Some(meta.media_paths.clone()),
            source_file_names: Some(meta.source_file_names.clone()),
            ..Self::base(meta)
        }
    }

    fn from_chunk(chunk: &VideoChunkRecord) -> Self {
        Self {
            source_s3_path: Some(chunk.source_path().unwrap_or_default().to_string()),
            source_file_name: Some(chunk.source_file_name().to_string()),
            start_timestamp: Some(chunk.start_timestamp),
            end_timestamp: Some(chunk.end_timestamp),
            chunk_text_content: Some(chunk.chunk_text.clone()),
            ..Self::base(&chunk.meta)
        }
    }

    fn from_group(group: &MediaGroup) -> Self {
        let members: Vec<GroupMemberResponse> =
            group.members().iter().map(GroupMemberResponse::from).collect();
        Self {
            member_count: Some(members.len()),
            members: Some(members),
            ..Self::from_chunk(group.representative())
        }
    }
}

impl From<&VideoChunkRecord> for GroupMemberResponse {
    fn from(chunk: &VideoChunkRecord) -> Self {
        Self {
            id: chunk.meta.id.clone(),
            score: chunk.meta.score,
            start_timestamp: chunk.start_timestamp,
            end_timestamp: chunk.end_timestamp,
            chunk_text_content: chunk.chunk_text.clone(),
            source_s3_path: chunk.source_path().unwrap_or_default().to_string(),
        }
    }
}

impl From<&ResultEntry> for ResultEntryResponse {
    fn from(entry: &ResultEntry) -> Self {
        match entry {
            ResultEntry::Single(Record::Media(meta)) => Self::from_media(meta),
            ResultEntry::Single(Record::VideoChunk(chunk)) => Self::from_chunk(chunk),
            ResultEntry::Group(group) => Self::from_group(group),
        }
    }
}

/// Shape a pipeline outcome into the response envelope.
pub fn format_response(outcome: &SearchOutcome) -> SearchResponse {
    let results: Vec<ResultEntryResponse> =
        outcome.entries.iter().map(ResultEntryResponse::from).collect();
    SearchResponse {
        result_count: results.len(),
        results,
        used_reranker: outcome.used_reranker(),
        candidate_count: outcome.candidate_count,
    }
}

//! Data model for archive records and search requests.
//!
//! Stored documents arrive from the vector store as loosely typed
//! [`StoredHit`]s. They are resolved exactly once into the tagged [`Record`]
//! form; grouping and formatting operate on the tagged form only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use pgvector::Vector;

// =============================================================================
// FILE TYPES
// =============================================================================

/// Archive file type as stored alongside each record.
///
/// Unknown stored values are preserved verbatim so a record is never dropped
/// because of an unexpected type string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileType {
    /// Whole source video
    Mp4,
    /// 10-second segment of a source video
    VideoChunk,
    Jpg,
    Gif,
    Pdf,
    /// Any other stored value
    Unknown(String),
}

impl FileType {
    /// Values accepted in a request's `filter_file_types`.
    pub const FILTERABLE: [FileType; 4] =
        [FileType::Mp4, FileType::Jpg, FileType::Gif, FileType::Pdf];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Mp4 => "mp4",
            Self::VideoChunk => "video_chunk",
            Self::Jpg => "jpg",
            Self::Gif => "gif",
            Self::Pdf => "pdf",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether records of this type take part in video grouping.
    pub fn is_chunked_video(&self) -> bool {
        matches!(self, Self::Mp4 | Self::VideoChunk)
    }

    /// Parse a filter value supplied by a client.
    ///
    /// Only the filterable types are accepted; `video_chunk` is reached
    /// through `mp4`.
    pub fn parse_filter(value: &str) -> Result<Self> {
        let normalized = value.trim().to_lowercase();
        let parsed = Self::from(normalized);
        if Self::FILTERABLE.contains(&parsed) {
            return Ok(parsed);
        }
        let expected: Vec<String> = Self::FILTERABLE
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        Err(Error::InvalidQuery(format!(
            "Unsupported file type filter '{}': expected one of {}",
            value,
            expected.join(", ")
        )))
    }

    /// Stored `file_type` values a filter on this type admits.
    pub fn stored_values(&self) -> Vec<&str> {
        match self {
            Self::Mp4 => vec!["mp4", "video_chunk"],
            other => vec![other.as_str()],
        }
    }
}

impl From<String> for FileType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "mp4" => Self::Mp4,
            "video_chunk" => Self::VideoChunk,
            "jpg" => Self::Jpg,
            "gif" => Self::Gif,
            "pdf" => Self::Pdf,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for FileType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<FileType> for String {
    fn from(value: FileType) -> Self {
        match value {
            FileType::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of requested file types. Empty means every type is eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTypeFilter {
    types: Vec<FileType>,
}

impl FileTypeFilter {
    /// No restriction.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse client supplied values, rejecting anything outside
    /// [`FileType::FILTERABLE`]. Duplicates are collapsed.
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        let mut types = Vec::with_capacity(values.len());
        for value in values {
            let file_type = FileType::parse_filter(value.as_ref())?;
            if !types.contains(&file_type) {
                types.push(file_type);
            }
        }
        Ok(Self { types })
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> &[FileType] {
        &self.types
    }

    /// Stored values to restrict the index scan to, sorted and deduplicated.
    /// Empty when unfiltered.
    pub fn stored_values(&self) -> Vec<String> {
        let mut values: Vec<String> = self
            .types
            .iter()
            .flat_map(|t| t.stored_values())
            .map(str::to_string)
            .collect();
        values.sort();
        values.dedup();
        values
    }

    /// Whether a record with the given stored type passes this filter.
    pub fn admits(&self, file_type: &FileType) -> bool {
        self.is_empty()
            || self
                .types
                .iter()
                .any(|t| t.stored_values().contains(&file_type.as_str()))
    }
}

impl fmt::Display for FileTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.types.is_empty() {
            return f.write_str("*");
        }
        let names: Vec<&str> = self.types.iter().map(FileType::as_str).collect();
        f.write_str(&names.join(","))
    }
}

// =============================================================================
// STORED HITS (as returned by a vector store)
// =============================================================================

/// Loosely typed stored fields for one document. Every field is optional;
/// [`Record::from_stored`] decides what a missing field means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredFields {
    #[serde(rename = "naId", default)]
    pub na_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(rename = "scopeAndContentNote", default)]
    pub scope_note: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub source_file_name: Option<String>,
    #[serde(default, deserialize_with = "nullable_string_list")]
    pub source_file_names: Option<Vec<String>>,
    #[serde(default)]
    pub source_s3_path: Option<String>,
    #[serde(default, deserialize_with = "nullable_string_list")]
    pub source_s3_paths: Option<Vec<String>>,
    #[serde(default)]
    pub chunk_text_content: Option<String>,
    #[serde(default)]
    pub start_timestamp: Option<f64>,
    #[serde(default)]
    pub end_timestamp: Option<f64>,
}

/// Drop `null` entries from a stored string list.
///
/// Ingestion writes one entry per source object, so a missing object name
/// lands as `null` inside an otherwise valid list.
pub fn compact_string_list(list: Option<Vec<Option<String>>>) -> Option<Vec<String>> {
    list.map(|items| items.into_iter().flatten().collect())
}

fn nullable_string_list<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(compact_string_list(raw))
}

/// One ranked result from a vector store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredHit {
    pub id: String,
    pub score: f32,
    pub fields: StoredFields,
}

// =============================================================================
// RECORDS
// =============================================================================

/// A problem found while resolving a stored document into a [`Record`].
///
/// Flagged records are still returned, with the safe default noted on each
/// variant.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordIssue {
    /// No `file_type` stored (treated as an unknown, ungrouped type)
    MissingFileType,
    /// Stored `file_type` is not one of the known types
    UnknownFileType(String),
    /// Blank or missing title (empty string)
    MissingTitle,
    /// Video chunk without a source file name (empty string)
    MissingSourceFile,
    /// No media locator stored (empty list)
    MissingLocator,
    /// Video chunk without `start_timestamp` (0)
    MissingStartTimestamp,
    /// Negative or non-finite `start_timestamp` (0)
    InvalidStartTimestamp(f64),
    /// Video chunk without `end_timestamp` (start)
    MissingEndTimestamp,
    /// `end_timestamp <= start_timestamp` or non-finite (start)
    InvalidEndTimestamp(f64),
    /// Score was NaN or infinite (0)
    NonFiniteScore,
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFileType => write!(f, "missing file_type"),
            Self::UnknownFileType(raw) => write!(f, "unknown file_type '{}'", raw),
            Self::MissingTitle => write!(f, "missing title"),
            Self::MissingSourceFile => write!(f, "missing source_file_name"),
            Self::MissingLocator => write!(f, "missing source_s3_path(s)"),
            Self::MissingStartTimestamp => write!(f, "missing start_timestamp"),
            Self::InvalidStartTimestamp(v) => write!(f, "invalid start_timestamp {}", v),
            Self::MissingEndTimestamp => write!(f, "missing end_timestamp"),
            Self::InvalidEndTimestamp(v) => write!(f, "invalid end_timestamp {}", v),
            Self::NonFiniteScore => write!(f, "non-finite score"),
        }
    }
}

/// Fields shared by every record variant.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
    pub id: String,
    pub na_id: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub scope_note: Option<String>,
    pub file_type: FileType,
    /// Ordered source file names; a chunk's source file is the first entry.
    pub source_file_names: Vec<String>,
    /// Ordered media locators (one per page or frame for multi-page media).
    pub media_paths: Vec<String>,
    pub score: f32,
    pub issues: Vec<RecordIssue>,
}

impl RecordMeta {
    /// Title followed by any descriptive metadata, newline separated.
    pub fn descriptive_text(&self) -> String {
        [
            Some(self.title.as_str()),
            self.subtitle.as_deref(),
            self.scope_note.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// A 10-second segment of a source video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoChunkRecord {
    pub meta: RecordMeta,
    /// Seconds from the start of the source video.
    pub start_timestamp: f64,
    pub end_timestamp: f64,
    /// Transcript excerpt for this chunk.
    pub chunk_text: String,
}

impl VideoChunkRecord {
    pub fn source_file_name(&self) -> &str {
        self.meta
            .source_file_names
            .first()
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Key shared by all chunks of one source video.
    pub fn group_key(&self) -> (&str, &str) {
        (self.meta.title.as_str(), self.source_file_name())
    }

    pub fn source_path(&self) -> Option<&str> {
        self.meta.media_paths.first().map(String::as_str)
    }
}

/// An indexed archive item, tagged by whether it takes part in video
/// grouping.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Image, document, or any other ungrouped media
    Media(RecordMeta),
    /// Chunked video segment
    VideoChunk(VideoChunkRecord),
}

impl Record {
    pub fn meta(&self) -> &RecordMeta {
        match self {
            Self::Media(meta) => meta,
            Self::VideoChunk(chunk) => &chunk.meta,
        }
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        match self {
            Self::Media(meta) => meta,
            Self::VideoChunk(chunk) => &mut chunk.meta,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta().id
    }

    pub fn score(&self) -> f32 {
        self.meta().score
    }

    /// Replace the score (reranking).
    pub fn set_score(&mut self, score: f32) {
        let meta = self.meta_mut();
        if score.is_finite() {
            meta.score = score;
        } else {
            meta.score = 0.0;
            if !meta.issues.contains(&RecordIssue::NonFiniteScore) {
                meta.issues.push(RecordIssue::NonFiniteScore);
            }
        }
    }

    pub fn file_type(&self) -> &FileType {
        &self.meta().file_type
    }

    pub fn is_malformed(&self) -> bool {
        !self.meta().issues.is_empty()
    }

    /// Text the reranker scores against the query: the transcript for video
    /// chunks, otherwise the title plus descriptive metadata.
    pub fn rerank_text(&self) -> String {
        match self {
            Self::VideoChunk(chunk) if !chunk.chunk_text.trim().is_empty() => {
                chunk.chunk_text.clone()
            }
            other => other.meta().descriptive_text(),
        }
    }

    /// Resolve a stored document into its tagged form, flagging and
    /// defaulting anything missing instead of dropping the record.
    pub fn from_stored(hit: StoredHit) -> Self {
        let StoredHit { id, score, fields } = hit;
        let mut issues = Vec::new();

        let file_type = match fields.file_type {
            Some(raw) => {
                let file_type = FileType::from(raw);
                if let FileType::Unknown(raw) = &file_type {
                    issues.push(RecordIssue::UnknownFileType(raw.clone()));
                }
                file_type
            }
            None => {
                issues.push(RecordIssue::MissingFileType);
                FileType::Unknown(String::new())
            }
        };

        let title = match fields.title {
            Some(title) if !title.trim().is_empty() => title,
            _ => {
                issues.push(RecordIssue::MissingTitle);
                String::new()
            }
        };

        let score = if score.is_finite() {
            score
        } else {
            issues.push(RecordIssue::NonFiniteScore);
            0.0
        };

        let source_file_names = non_empty_list(fields.source_file_names, fields.source_file_name);
        let media_paths = non_empty_list(fields.source_s3_paths, fields.source_s3_path);
        if media_paths.is_empty() {
            issues.push(RecordIssue::MissingLocator);
        }

        if !file_type.is_chunked_video() {
            return Self::Media(RecordMeta {
                id,
                na_id: fields.na_id,
                title,
                subtitle: fields.subtitle,
                scope_note: fields.scope_note,
                file_type,
                source_file_names,
                media_paths,
                score,
                issues,
            });
        }

        if source_file_names.is_empty() {
            issues.push(RecordIssue::MissingSourceFile);
        }

        let start_timestamp = match fields.start_timestamp {
            Some(start) if start.is_finite() && start >= 0.0 => start,
            Some(start) => {
                issues.push(RecordIssue::InvalidStartTimestamp(start));
                0.0
            }
            None => {
                issues.push(RecordIssue::MissingStartTimestamp);
                0.0
            }
        };

        let end_timestamp = match fields.end_timestamp {
            Some(end) if end.is_finite() && end > start_timestamp => end,
            Some(end) => {
                issues.push(RecordIssue::InvalidEndTimestamp(end));
                start_timestamp
            }
            None => {
                issues.push(RecordIssue::MissingEndTimestamp);
                start_timestamp
            }
        };

        Self::VideoChunk(VideoChunkRecord {
            meta: RecordMeta {
                id,
                na_id: fields.na_id,
                title,
                subtitle: fields.subtitle,
                scope_note: fields.scope_note,
                file_type,
                source_file_names,
                media_paths,
                score,
                issues,
            },
            start_timestamp,
            end_timestamp,
            chunk_text: fields.chunk_text_content.unwrap_or_default(),
        })
    }
}

/// Prefer a non-empty list; fall back to a single value; drop blanks.
fn non_empty_list(list: Option<Vec<String>>, single: Option<String>) -> Vec<String> {
    let list: Vec<String> = list
        .unwrap_or_default()
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if !list.is_empty() {
        return list;
    }
    single
        .filter(|s| !s.trim().is_empty())
        .into_iter()
        .collect()
}

// =============================================================================
// SEARCH REQUEST
// =============================================================================

/// A validated-on-use search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query_text: String,
    pub file_types: FileTypeFilter,
    pub use_reranker: bool,
}

impl SearchRequest {
    /// Create an unfiltered request with reranking enabled.
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            file_types: FileTypeFilter::all(),
            use_reranker: true,
        }
    }

    pub fn with_file_types(mut self, file_types: FileTypeFilter) -> Self {
        self.file_types = file_types;
        self
    }

    pub fn with_reranker(mut self, use_reranker: bool) -> Self {
        self.use_reranker = use_reranker;
        self
    }

    /// The trimmed query text, or `InvalidQuery` when it is blank.
    pub fn trimmed_query(&self) -> Result<&str> {
        let trimmed = self.query_text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidQuery(
                "query_text must not be empty".to_string(),
            ));
        }
        Ok(trimmed)
    }
}

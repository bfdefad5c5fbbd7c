//! Result grouping for chunked video.
//!
//! A single source video contributes many chunks to one candidate list.
//! Chunks sharing `(title, source_file_name)` collapse into a [`MediaGroup`]
//! that ranks by its best-scoring member while keeping every chunk
//! addressable; all other records pass through as singletons.
//!
//! Ordering rules:
//! - a group's score and rank are its representative's (highest score,
//!   earliest rank on ties)
//! - entries are ordered by score descending, ties by rank ascending
//! - members are ordered by start timestamp ascending, ties by rank

use std::collections::HashMap;

use tracing::trace;

use mmsearch_core::{Record, VideoChunkRecord};

/// All chunks of one source video found in a candidate list.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaGroup {
    members: Vec<VideoChunkRecord>,
    representative: usize,
}

impl MediaGroup {
    /// Members ordered by start timestamp. Never empty.
    pub fn members(&self) -> &[VideoChunkRecord] {
        &self.members
    }

    /// The best-scoring member.
    pub fn representative(&self) -> &VideoChunkRecord {
        &self.members[self.representative]
    }

    pub fn score(&self) -> f32 {
        self.representative().meta.score
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn title(&self) -> &str {
        &self.representative().meta.title
    }

    pub fn source_file_name(&self) -> &str {
        self.representative().source_file_name()
    }
}

/// One element of the grouped result list.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEntry {
    Single(Record),
    Group(MediaGroup),
}

impl ResultEntry {
    pub fn score(&self) -> f32 {
        match self {
            Self::Single(record) => record.score(),
            Self::Group(group) => group.score(),
        }
    }

    /// Id of the record that stands for this entry.
    pub fn id(&self) -> &str {
        match self {
            Self::Single(record) => record.id(),
            Self::Group(group) => &group.representative().meta.id,
        }
    }
}

/// Chunks collected for one group key, with their upstream ranks.
struct Bucket {
    chunks: Vec<(usize, VideoChunkRecord)>,
}

impl Bucket {
    /// Resolve into `(representative rank, group)`.
    fn into_group(mut self) -> (usize, MediaGroup) {
        // Chunks arrive in rank order, so strict `>` keeps the earliest on ties.
        let mut best = 0;
        for (i, (_, chunk)) in self.chunks.iter().enumerate() {
            if chunk.meta.score > self.chunks[best].1.meta.score {
                best = i;
            }
        }
        let best_rank = self.chunks[best].0;

        self.chunks.sort_by(|(rank_a, a), (rank_b, b)| {
            a.start_timestamp
                .total_cmp(&b.start_timestamp)
                .then(rank_a.cmp(rank_b))
        });

        let representative = self
            .chunks
            .iter()
            .position(|(rank, _)| *rank == best_rank)
            .unwrap_or(0);

        let members = self.chunks.into_iter().map(|(_, chunk)| chunk).collect();
        (
            best_rank,
            MediaGroup {
                members,
                representative,
            },
        )
    }
}

/// Partition a ranked record list into singletons and video groups, then
/// merge them into one list ordered by score.
///
/// The input order is the upstream rank; it breaks every score tie.
pub fn group_records(records: Vec<Record>) -> Vec<ResultEntry> {
    let mut ranked: Vec<(usize, ResultEntry)> = Vec::with_capacity(records.len());
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut bucket_index: HashMap<(String, String), usize> = HashMap::new();

    for (rank, record) in records.into_iter().enumerate() {
        match record {
            Record::VideoChunk(chunk) => {
                let (title, source) = chunk.group_key();
                let key = (title.to_string(), source.to_string());
                let idx = *bucket_index.entry(key).or_insert_with(|| {
                    buckets.push(Bucket { chunks: Vec::new() });
                    buckets.len() - 1
                });
                trace!(
                    subsystem = "retrieval",
                    component = "grouping",
                    record_id = %chunk.meta.id,
                    rank,
                    score = chunk.meta.score,
                    group = idx,
                    title = %chunk.meta.title,
                    source_file_name = chunk.source_file_name(),
                    "Chunk assigned to group"
                );
                buckets[idx].chunks.push((rank, chunk));
            }
            other => {
                trace!(
                    subsystem = "retrieval",
                    component = "grouping",
                    record_id = other.id(),
                    rank,
                    score = other.score(),
                    "Record kept as singleton"
                );
                ranked.push((rank, ResultEntry::Single(other)));
            }
        }
    }

    for (idx, bucket) in buckets.into_iter().enumerate() {
        let (rank, group) = bucket.into_group();
        trace!(
            subsystem = "retrieval",
            component = "grouping",
            group = idx,
            member_count = group.len(),
            representative = %group.representative().meta.id,
            score = group.score(),
            "Group resolved"
        );
        ranked.push((rank, ResultEntry::Group(group)));
    }

    ranked.sort_by(|(rank_a, a), (rank_b, b)| {
        b.score().total_cmp(&a.score()).then(rank_a.cmp(rank_b))
    });

    ranked.into_iter().map(|(_, entry)| entry).collect()
}

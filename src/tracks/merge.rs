//! Reconciliation of several embedding tables into one feature matrix.

use super::embedding_table::{load_embedding_table, EmbeddingTable, EmbeddingTableError};
use super::{TrackIdentity, TrackRecord};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("No embedding sources were given")]
    NoSources,

    #[error(transparent)]
    Table(#[from] EmbeddingTableError),

    #[error("No track is present in all {sources} embedding sources")]
    NoCompleteTracks { sources: usize },
}

/// Track-level issue found while merging.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeProblem {
    /// The same identity appeared more than once in one source; only the
    /// first occurrence was used.
    DuplicateIdentity {
        source: PathBuf,
        identity: TrackIdentity,
    },
}

/// A track that was dropped because it is missing from some sources.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialTrack {
    pub identity: TrackIdentity,
    pub found_in: usize,
    pub total: usize,
}

/// Tracks present in every source with their concatenated embeddings.
#[derive(Debug, Clone)]
pub struct MergedFeatureMatrix {
    pub records: Vec<TrackRecord>,
    /// Sum of the per-source dimensions.
    pub dimension: usize,
    pub sources: Vec<PathBuf>,
    pub partial_tracks: Vec<PartialTrack>,
    pub problems: Vec<MergeProblem>,
}

impl MergedFeatureMatrix {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Feature rows aligned with `records`.
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.records.iter().map(|r| r.embedding.clone()).collect()
    }
}

/// Load every path and merge the resulting tables.
pub fn merge_embedding_tables(paths: &[PathBuf]) -> Result<MergedFeatureMatrix, MergeError> {
    if paths.is_empty() {
        return Err(MergeError::NoSources);
    }

    let tables = paths
        .iter()
        .map(|path| load_embedding_table(Path::new(path)))
        .collect::<Result<Vec<_>, _>>()?;

    merge_tables(tables)
}

fn index_source<'a>(
    table: &'a EmbeddingTable,
    problems: &mut Vec<MergeProblem>,
) -> HashMap<&'a TrackIdentity, &'a TrackRecord> {
    let mut index = HashMap::with_capacity(table.records.len());
    for record in &table.records {
        if index.contains_key(&record.identity) {
            warn!(
                "Duplicate track {} in {:?}, keeping the first occurrence",
                record.identity, table.source
            );
            problems.push(MergeProblem::DuplicateIdentity {
                source: table.source.clone(),
                identity: record.identity.clone(),
            });
        } else {
            index.insert(&record.identity, record);
        }
    }
    index
}

/// Merge already loaded tables.
///
/// A single table is passed through untouched. With more than one table a
/// track is kept only when its identity is present in every table; rows keep
/// the first table's order and embeddings are concatenated in table order.
pub fn merge_tables(tables: Vec<EmbeddingTable>) -> Result<MergedFeatureMatrix, MergeError> {
    let total = tables.len();
    let sources: Vec<PathBuf> = tables.iter().map(|t| t.source.clone()).collect();

    let mut tables = tables.into_iter();
    let first = tables.next().ok_or(MergeError::NoSources)?;
    let rest: Vec<EmbeddingTable> = tables.collect();

    if rest.is_empty() {
        if first.is_empty() {
            return Err(MergeError::NoCompleteTracks { sources: 1 });
        }
        info!(
            "Using {} tracks with {}-dimensional embeddings from a single source",
            first.len(),
            first.dimension
        );
        return Ok(MergedFeatureMatrix {
            dimension: first.dimension,
            records: first.records,
            sources,
            partial_tracks: Vec::new(),
            problems: Vec::new(),
        });
    }

    let mut problems = Vec::new();
    let first_index = index_source(&first, &mut problems);
    let other_indices: Vec<_> = rest
        .iter()
        .map(|table| index_source(table, &mut problems))
        .collect();

    let dimension = first.dimension + rest.iter().map(|t| t.dimension).sum::<usize>();

    let mut records = Vec::new();
    let mut partial_tracks = Vec::new();

    // Walk the first source in row order, skipping its own duplicates.
    for record in first
        .records
        .iter()
        .filter(|r| std::ptr::eq(first_index[&r.identity], *r))
    {
        let matches: Vec<Option<&&TrackRecord>> = other_indices
            .iter()
            .map(|index| index.get(&record.identity))
            .collect();
        let found_in = 1 + matches.iter().filter(|m| m.is_some()).count();

        if found_in == total {
            let mut embedding = Vec::with_capacity(dimension);
            embedding.extend_from_slice(&record.embedding);
            for other in matches.into_iter().flatten() {
                embedding.extend_from_slice(&other.embedding);
            }
            records.push(TrackRecord {
                identity: record.identity.clone(),
                song_uri: record.song_uri.clone(),
                embedding,
            });
        } else {
            partial_tracks.push(PartialTrack {
                identity: record.identity.clone(),
                found_in,
                total,
            });
        }
    }

    // Tracks the first source never saw.
    let mut seen_elsewhere: HashSet<&TrackIdentity> = HashSet::new();
    for table in &rest {
        for identity in table.records.iter().map(|r| &r.identity) {
            if first_index.contains_key(identity) || !seen_elsewhere.insert(identity) {
                continue;
            }
            let found_in = other_indices
                .iter()
                .filter(|other| other.contains_key(identity))
                .count();
            partial_tracks.push(PartialTrack {
                identity: identity.clone(),
                found_in,
                total,
            });
        }
    }

    for partial in &partial_tracks {
        warn!(
            "Song {} only found in {}/{} embedding sources",
            partial.identity, partial.found_in, partial.total
        );
    }

    if records.is_empty() {
        return Err(MergeError::NoCompleteTracks { sources: total });
    }

    info!(
        "Merged {} sources into {} tracks with {}-dimensional embeddings ({} partial tracks dropped)",
        total,
        records.len(),
        dimension,
        partial_tracks.len()
    );

    Ok(MergedFeatureMatrix {
        records,
        dimension,
        sources,
        partial_tracks,
        problems,
    })
}

//! Embedding table loading.
//!
//! An embedding table is a CSV file with (at least) the columns
//! `song_name`, `artist`, `song_uri` and `embedding`, where the embedding
//! cell holds a serialized number sequence such as `[0.1, -0.2, 0.3]`.
//! Rows that cannot be used are dropped and recorded as problems, the rest
//! of the table is kept.

use super::{TrackIdentity, TrackRecord};
use csv::StringRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub(crate) const SONG_NAME_COLUMN: &str = "song_name";
pub(crate) const ARTIST_COLUMN: &str = "artist";
pub(crate) const SONG_URI_COLUMN: &str = "song_uri";
const EMBEDDING_COLUMN: &str = "embedding";

const REQUIRED_COLUMNS: &[&str] = &[
    SONG_NAME_COLUMN,
    ARTIST_COLUMN,
    SONG_URI_COLUMN,
    EMBEDDING_COLUMN,
];

/// Errors that make a whole embedding table unusable.
#[derive(Debug, Error)]
pub enum EmbeddingTableError {
    #[error("Failed to read embedding table {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Embedding table {path:?} is missing required columns: {missing:?}")]
    MissingColumns { path: PathBuf, missing: Vec<String> },
}

/// A row that was dropped while loading a table.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadProblem {
    /// The CSV record itself could not be read (wrong field count, bad encoding).
    MalformedRecord { line: Option<u64>, reason: String },
    /// The embedding cell could not be parsed into a list of numbers.
    MalformedEmbedding { song_name: String, reason: String },
    /// The embedding length differs from the table's dimensionality.
    DimensionMismatch {
        identity: TrackIdentity,
        expected: usize,
        actual: usize,
    },
}

/// An ordered list of tracks sharing one embedding dimensionality.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    /// Where the table came from, used in diagnostics.
    pub source: PathBuf,
    pub records: Vec<TrackRecord>,
    /// Shared embedding length, 0 when the table has no usable rows.
    pub dimension: usize,
    pub problems: Vec<LoadProblem>,
}

impl EmbeddingTable {
    /// Build a table from already parsed records, dropping every record whose
    /// embedding length differs from the table's dimensionality.
    ///
    /// The dimensionality is the most common embedding length; ties go to
    /// the length that appears first.
    pub fn from_records(source: impl Into<PathBuf>, records: Vec<TrackRecord>) -> Self {
        Self::build(source.into(), records, Vec::new())
    }

    fn build(source: PathBuf, records: Vec<TrackRecord>, mut problems: Vec<LoadProblem>) -> Self {
        let dimension = dominant_dimension(&records);

        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if record.embedding.len() == dimension {
                kept.push(record);
            } else {
                warn!(
                    "Dropping {} from {:?}: embedding has {} dimensions, expected {}",
                    record.identity,
                    source,
                    record.embedding.len(),
                    dimension
                );
                problems.push(LoadProblem::DimensionMismatch {
                    expected: dimension,
                    actual: record.embedding.len(),
                    identity: record.identity,
                });
            }
        }

        Self {
            source,
            records: kept,
            dimension,
            problems,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The raw feature matrix, rows aligned 1:1 with `records`.
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.records.iter().map(|r| r.embedding.clone()).collect()
    }
}

fn dominant_dimension(records: &[TrackRecord]) -> usize {
    let mut counts: HashMap<usize, (usize, usize)> = HashMap::new();
    for (position, record) in records.iter().enumerate() {
        let entry = counts
            .entry(record.embedding.len())
            .or_insert((0, position));
        entry.0 += 1;
    }

    counts
        .into_iter()
        // Highest count wins, earliest first appearance breaks ties.
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(dimension, _)| dimension)
        .unwrap_or(0)
}

/// Parse a serialized embedding cell into a list of floats.
///
/// Accepts a bracketed list (`[1, 2.5, -3e-2]`) or a parenthesized tuple
/// (`(1, 2.5)`), with at most one trailing comma (`(1,)`, `[1, 2,]`).
/// Empty sequences and non-finite values are rejected.
pub fn parse_embedding(cell: &str) -> Result<Vec<f64>, String> {
    let trimmed = cell.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .or_else(|| {
            trimmed
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
        });
    let normalized = match inner {
        Some(inner) => {
            let inner = inner.trim_end();
            format!("[{}]", inner.strip_suffix(',').unwrap_or(inner))
        }
        None => trimmed.to_string(),
    };

    let values: Vec<f64> =
        serde_json::from_str(&normalized).map_err(|e| format!("invalid number list: {}", e))?;

    if values.is_empty() {
        return Err("embedding is empty".to_string());
    }
    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(format!("non-finite value at position {}", position));
    }

    Ok(values)
}

fn column_indices(headers: &StringRecord, path: &Path) -> Result<[usize; 4], EmbeddingTableError> {
    let find = |name: &str| headers.iter().position(|h| h.trim() == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| find(column).is_none())
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EmbeddingTableError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut indices = [0usize; 4];
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = find(column).unwrap_or_default();
    }
    Ok(indices)
}

/// Load an embedding table from a CSV file.
///
/// Malformed rows are skipped (and listed in `problems`); only an unreadable
/// file or a missing required column fails the load.
pub fn load_embedding_table(path: &Path) -> Result<EmbeddingTable, EmbeddingTableError> {
    let read_error = |source: csv::Error| EmbeddingTableError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(read_error)?;

    let headers = reader.headers().map_err(read_error)?.clone();
    let [name_idx, artist_idx, uri_idx, embedding_idx] = column_indices(&headers, path)?;

    let mut records = Vec::new();
    let mut problems = Vec::new();

    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(err) if err.is_io_error() => return Err(read_error(err)),
            Err(err) => {
                let line = err.position().map(|p| p.line());
                warn!("Skipping unreadable row (line {:?}) in {:?}: {}", line, path, err);
                problems.push(LoadProblem::MalformedRecord {
                    line,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let field = |idx: usize| row.get(idx).unwrap_or_default().to_string();
        let song_name = field(name_idx);

        match parse_embedding(&field(embedding_idx)) {
            Ok(embedding) => records.push(TrackRecord {
                identity: TrackIdentity::new(song_name, field(artist_idx)),
                song_uri: field(uri_idx),
                embedding,
            }),
            Err(reason) => {
                warn!("Error parsing embedding for {}: {}", song_name, reason);
                problems.push(LoadProblem::MalformedEmbedding { song_name, reason });
            }
        }
    }

    let table = EmbeddingTable::build(path.to_path_buf(), records, problems);

    info!(
        "Loaded {} songs with {}-dimensional embeddings from {:?}",
        table.len(),
        table.dimension,
        path
    );
    if !table.problems.is_empty() {
        warn!("Dropped {} rows from {:?}", table.problems.len(), path);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_table(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn record(name: &str, embedding: Vec<f64>) -> TrackRecord {
        TrackRecord {
            identity: TrackIdentity::new(name, "Artist"),
            song_uri: format!("spotify:track:{}", name),
            embedding,
        }
    }

    #[test]
    fn test_parse_embedding_list() {
        assert_eq!(
            parse_embedding("[0.5, -1, 2e-1]").unwrap(),
            vec![0.5, -1.0, 0.2]
        );
        assert_eq!(parse_embedding("  [1.0]  ").unwrap(), vec![1.0]);
    }

    #[test]
    fn test_parse_embedding_tuple() {
        assert_eq!(parse_embedding("(1, 2, 3)").unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_parse_embedding_trailing_comma() {
        assert_eq!(parse_embedding("(1,)").unwrap(), vec![1.0]);
        assert_eq!(parse_embedding("[1, 2,]").unwrap(), vec![1.0, 2.0]);
        assert_eq!(parse_embedding("(0.5, -1 , )").unwrap(), vec![0.5, -1.0]);
        assert!(parse_embedding("[1,,]").is_err());
        assert!(parse_embedding("(,)").is_err());
        assert!(parse_embedding("[,]").is_err());
    }

    #[test]
    fn test_parse_embedding_rejects_garbage() {
        assert!(parse_embedding("").is_err());
        assert!(parse_embedding("[]").is_err());
        assert!(parse_embedding("[1, 'a']").is_err());
        assert!(parse_embedding("not a list").is_err());
        assert!(parse_embedding("[1, NaN]").is_err());
        assert!(parse_embedding("{\"a\": 1}").is_err());
    }

    #[test]
    fn test_load_table_preserves_order_and_dimension() {
        let dir = TempDir::new().unwrap();
        let path = write_table(
            &dir,
            "emb.csv",
            "song_name,artist,song_uri,embedding\n\
             One,A,spotify:track:1,\"[1.0, 2.0]\"\n\
             Two,B,spotify:track:2,\"[3.0, 4.0]\"\n\
             Three,C,spotify:track:3,\"[5.0, 6.0]\"\n",
        );

        let table = load_embedding_table(&path).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.dimension, 2);
        assert!(table.problems.is_empty());
        let names: Vec<&str> = table.records.iter().map(|r| r.song_name()).collect();
        assert_eq!(names, vec!["One", "Two", "Three"]);
        assert_eq!(table.feature_matrix()[1], vec![3.0, 4.0]);
        assert_eq!(table.records[2].song_uri, "spotify:track:3");
    }

    #[test]
    fn test_load_table_skips_malformed_embeddings() {
        let dir = TempDir::new().unwrap();
        let path = write_table(
            &dir,
            "emb.csv",
            "song_name,artist,song_uri,embedding\n\
             Good,A,u1,\"[1.0, 2.0]\"\n\
             Bad,B,u2,\"[1.0, oops]\"\n\
             AlsoGood,C,u3,\"[0.0, 0.0]\"\n",
        );

        let table = load_embedding_table(&path).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.problems.len(), 1);
        assert!(matches!(
            &table.problems[0],
            LoadProblem::MalformedEmbedding { song_name, .. } if song_name == "Bad"
        ));
    }

    #[test]
    fn test_load_table_drops_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = write_table(
            &dir,
            "emb.csv",
            "song_name,artist,song_uri,embedding\n\
             Short,A,u1,\"[1.0]\"\n\
             One,A,u2,\"[1.0, 2.0]\"\n\
             Two,B,u3,\"[3.0, 4.0]\"\n",
        );

        let table = load_embedding_table(&path).unwrap();

        assert_eq!(table.dimension, 2);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.problems,
            vec![LoadProblem::DimensionMismatch {
                identity: TrackIdentity::new("Short", "A"),
                expected: 2,
                actual: 1,
            }]
        );
    }

    #[test]
    fn test_load_table_accepts_any_column_order_and_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_table(
            &dir,
            "emb.csv",
            "embedding,album,artist,song_uri,song_name\n\
             \"[1, 2]\",X,Band,u1,Tune\n",
        );

        let table = load_embedding_table(&path).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].identity, TrackIdentity::new("Tune", "Band"));
        assert_eq!(table.records[0].song_uri, "u1");
    }

    #[test]
    fn test_load_table_missing_columns_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_table(&dir, "emb.csv", "song_name,artist\nA,B\n");

        let err = load_embedding_table(&path).unwrap_err();

        match err {
            EmbeddingTableError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["song_uri", "embedding"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_load_table_skips_record_with_wrong_field_count() {
        let dir = TempDir::new().unwrap();
        let path = write_table(
            &dir,
            "emb.csv",
            "song_name,artist,song_uri,embedding\n\
             Broken,A\n\
             Fine,B,u2,\"[1.0]\"\n",
        );

        let table = load_embedding_table(&path).unwrap();

        assert_eq!(table.len(), 1);
        assert!(matches!(
            table.problems[0],
            LoadProblem::MalformedRecord { .. }
        ));
    }

    #[test]
    fn test_load_nonexistent_file_fails() {
        let result = load_embedding_table(Path::new("/nonexistent/embeddings.csv"));
        assert!(matches!(result, Err(EmbeddingTableError::Read { .. })));
    }

    #[test]
    fn test_read_error_keeps_cause_out_of_message() {
        let dir = TempDir::new().unwrap();
        let err = load_embedding_table(&dir.path().join("missing.csv")).unwrap_err();

        let message = err.to_string();
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(message.starts_with("Failed to read embedding table"));
        assert!(!message.contains(&cause));
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert!(chain.starts_with(&format!("{}: {}", message, cause)));
    }

    #[test]
    fn test_dominant_dimension_tie_prefers_first_seen() {
        let table = EmbeddingTable::from_records(
            "mem",
            vec![
                record("a", vec![1.0, 2.0, 3.0]),
                record("b", vec![1.0, 2.0]),
            ],
        );
        assert_eq!(table.dimension, 3);
        assert_eq!(table.len(), 1);
        assert_eq!(table.problems.len(), 1);
    }

    #[test]
    fn test_empty_table_has_zero_dimension() {
        let table = EmbeddingTable::from_records("mem", vec![]);
        assert!(table.is_empty());
        assert_eq!(table.dimension, 0);
    }
}

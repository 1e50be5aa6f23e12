//! Track records and the tables they travel in.
//!
//! - `embedding_table`: parses one per-track embedding CSV
//! - `merge`: reconciles several embedding tables into one feature matrix
//! - `result_table`: writes and reloads clustered results

mod embedding_table;
mod merge;
mod result_table;

pub use embedding_table::{
    load_embedding_table, parse_embedding, EmbeddingTable, EmbeddingTableError, LoadProblem,
};
pub use merge::{
    merge_embedding_tables, merge_tables, MergeError, MergeProblem, MergedFeatureMatrix,
    PartialTrack,
};
pub use result_table::{
    load_clustered_table, write_clustered_table, ClusteredTrack, ResultTableError,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The join key across embedding sources.
///
/// Compared exactly as given: no case folding and no whitespace trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackIdentity {
    pub song_name: String,
    pub artist: String,
}

impl TrackIdentity {
    pub fn new(song_name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            song_name: song_name.into(),
            artist: artist.into(),
        }
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' by '{}'", self.song_name, self.artist)
    }
}

/// A track with its embedding, as loaded from an embedding table.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub identity: TrackIdentity,
    /// Either a web locator or a native service URI.
    pub song_uri: String,
    pub embedding: Vec<f64>,
}

impl TrackRecord {
    pub fn song_name(&self) -> &str {
        &self.identity.song_name
    }

    pub fn artist(&self) -> &str {
        &self.identity.artist
    }
}

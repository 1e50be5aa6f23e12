//! The clustered result table: one `(song_name, artist, song_uri, cluster)`
//! row per track.

use super::embedding_table::{ARTIST_COLUMN, SONG_NAME_COLUMN, SONG_URI_COLUMN};
use super::{TrackIdentity, TrackRecord};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const CLUSTER_COLUMN: &str = "cluster";

#[derive(Debug, Error)]
pub enum ResultTableError {
    #[error("Failed to read clustered table {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write clustered table {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Clustered table {path:?} is missing required columns: {missing:?}")]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("Invalid cluster value {value:?} for {song_name:?} at line {line}")]
    InvalidCluster {
        line: u64,
        song_name: String,
        value: String,
    },
}

/// One row of the clustered result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteredTrack {
    pub song_name: String,
    pub artist: String,
    pub song_uri: String,
    /// `-1` marks noise.
    pub cluster: i32,
}

impl ClusteredTrack {
    pub fn from_record(record: &TrackRecord, cluster: i32) -> Self {
        Self {
            song_name: record.identity.song_name.clone(),
            artist: record.identity.artist.clone(),
            song_uri: record.song_uri.clone(),
            cluster,
        }
    }

    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(self.song_name.clone(), self.artist.clone())
    }
}

/// Write rows (header included) to `path`, replacing any existing file.
pub fn write_clustered_table(path: &Path, rows: &[ClusteredTrack]) -> Result<(), ResultTableError> {
    let write_error = |source: csv::Error| ResultTableError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(write_error)?;
    for row in rows {
        writer.serialize(row).map_err(write_error)?;
    }
    writer
        .flush()
        .map_err(|e| write_error(csv::Error::from(e)))?;

    info!("Saved {} clustered songs to {:?}", rows.len(), path);
    Ok(())
}

/// Reload a table written by [`write_clustered_table`] (or by hand).
///
/// Every required column must be present and every cluster cell must be an
/// integer; either violation fails the whole load.
pub fn load_clustered_table(path: &Path) -> Result<Vec<ClusteredTrack>, ResultTableError> {
    let read_error = |source: csv::Error| ResultTableError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(read_error)?;
    let headers = reader.headers().map_err(read_error)?.clone();

    let required = [SONG_NAME_COLUMN, ARTIST_COLUMN, SONG_URI_COLUMN, CLUSTER_COLUMN];
    let positions: Vec<Option<usize>> = required
        .iter()
        .map(|name| headers.iter().position(|h| h.trim() == *name))
        .collect();

    let missing: Vec<String> = required
        .iter()
        .zip(&positions)
        .filter(|(_, position)| position.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ResultTableError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }
    let positions: Vec<usize> = positions.into_iter().flatten().collect();
    let (name_idx, artist_idx, uri_idx, cluster_idx) =
        (positions[0], positions[1], positions[2], positions[3]);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(read_error)?;
        let field = |idx: usize| record.get(idx).unwrap_or_default().to_string();

        let raw_cluster = field(cluster_idx);
        let cluster = raw_cluster.trim().parse::<i32>().map_err(|_| {
            ResultTableError::InvalidCluster {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                song_name: field(name_idx),
                value: raw_cluster.clone(),
            }
        })?;

        rows.push(ClusteredTrack {
            song_name: field(name_idx),
            artist: field(artist_idx),
            song_uri: field(uri_idx),
            cluster,
        });
    }

    info!("Loaded {} clustered songs from {:?}", rows.len(), path);
    Ok(rows)
}

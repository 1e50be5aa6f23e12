//! Test fixture creation for embedding and result tables

use super::constants::EMBEDDING_HEADER;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// One line of an embedding CSV.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingRow {
    pub song_name: &'static str,
    pub artist: &'static str,
    pub song_uri: &'static str,
    pub embedding: &'static [f64],
}

impl EmbeddingRow {
    pub const fn new(
        song_name: &'static str,
        artist: &'static str,
        song_uri: &'static str,
        embedding: &'static [f64],
    ) -> Self {
        Self {
            song_name,
            artist,
            song_uri,
            embedding,
        }
    }

    fn to_csv_line(self) -> String {
        let values: Vec<String> = self.embedding.iter().map(|v| v.to_string()).collect();
        format!(
            "{},{},{},\"[{}]\"",
            self.song_name,
            self.artist,
            self.song_uri,
            values.join(", ")
        )
    }
}

/// A temporary directory holding the files of one test run.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes an embedding CSV with the standard header.
    pub fn write_embeddings(&self, name: &str, rows: &[EmbeddingRow]) -> PathBuf {
        let mut content = String::from(EMBEDDING_HEADER);
        content.push('\n');
        for row in rows {
            content.push_str(&row.to_csv_line());
            content.push('\n');
        }
        self.write_raw(name, &content)
    }

    /// Writes arbitrary content, for malformed input cases.
    pub fn write_raw(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).expect("Failed to write fixture");
        path
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

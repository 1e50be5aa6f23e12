use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub algorithm: Option<String>,
    pub normalize: Option<bool>,
    pub output: Option<String>,
    pub plot_output: Option<String>,
    pub curves_json: Option<String>,
    pub quiet_tracks: Option<bool>,

    // Per-engine and feature configs
    pub kmeans: Option<KMeansFileConfig>,
    pub hdbscan: Option<HdbscanFileConfig>,
    pub playlists: Option<PlaylistsFileConfig>,
    pub spotify: Option<SpotifyFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct KMeansFileConfig {
    pub clusters: Option<usize>,
    pub max_k: Option<usize>,
    pub seed: Option<u64>,
    pub n_init: Option<usize>,
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct HdbscanFileConfig {
    pub min_cluster_size: Option<usize>,
    pub min_samples: Option<usize>,
    pub epsilon: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PlaylistsFileConfig {
    pub create: Option<bool>,
    pub name: Option<String>,
    pub public: Option<bool>,
    pub include_noise: Option<bool>,
    pub timeout_sec: Option<u64>,
}

/// Non-secret Spotify settings. Secrets stay in the environment.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SpotifyFileConfig {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

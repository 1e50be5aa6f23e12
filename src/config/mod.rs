mod file_config;

pub use file_config::{
    FileConfig, HdbscanFileConfig, KMeansFileConfig, PlaylistsFileConfig, SpotifyFileConfig,
};

use crate::clustering::{Algorithm, ClusteringMethod, DensityParams, KMeansParams};
use crate::playlists::SpotifyCredentials;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub csv_files: Vec<PathBuf>,
    pub clusters: Option<usize>,
    pub max_k: usize,
    pub seed: u64,
    pub algorithm: Algorithm,
    pub min_cluster_size: usize,
    pub min_samples: Option<usize>,
    pub hdbscan_epsilon: f64,
    pub normalize: bool,
    pub output: PathBuf,
    pub plot_output: PathBuf,
    pub curves_json: Option<PathBuf>,
    pub quiet_tracks: bool,
    pub create_playlists: bool,
    pub playlist_name: String,
    pub public_playlists: bool,
    pub include_noise_playlist: bool,
    pub playlist_only: bool,
    pub http_timeout_sec: u64,
    pub spotify: SpotifyCredentials,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            csv_files: Vec::new(),
            clusters: None,
            max_k: 10,
            seed: 42,
            algorithm: Algorithm::Kmeans,
            min_cluster_size: 5,
            min_samples: None,
            hdbscan_epsilon: 0.0,
            normalize: true,
            output: PathBuf::from("clustered_songs.csv"),
            plot_output: PathBuf::from("cluster_optimization.svg"),
            curves_json: None,
            quiet_tracks: false,
            create_playlists: false,
            playlist_name: "Music Cluster".to_string(),
            public_playlists: false,
            include_noise_playlist: false,
            playlist_only: false,
            http_timeout_sec: 30,
            spotify: SpotifyCredentials::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    /// Load embeddings, cluster and write the result table.
    Cluster { inputs: Vec<PathBuf> },
    /// Reload an existing result table and only create playlists.
    PlaylistOnly { table: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ClusteringSettings {
    pub method: ClusteringMethod,
    pub normalize: bool,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub result_table: PathBuf,
    pub plot: PathBuf,
    pub curves_json: Option<PathBuf>,
    pub quiet_tracks: bool,
}

#[derive(Debug, Clone)]
pub struct PlaylistSettings {
    pub create: bool,
    pub name_template: String,
    pub public: bool,
    pub include_noise: bool,
    pub timeout: Duration,
}

/// Client settings and tokens for the playlist service.
pub type SpotifySettings = SpotifyCredentials;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RunMode,
    pub clustering: ClusteringSettings,
    pub output: OutputSettings,
    pub playlists: PlaylistSettings,
    pub spotify: SpotifySettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        if cli.csv_files.is_empty() {
            bail!("At least one CSV file must be given");
        }
        for path in &cli.csv_files {
            if !path.exists() {
                bail!("Input file does not exist: {:?}", path);
            }
            if !path.is_file() {
                bail!("Input path is not a file: {:?}", path);
            }
        }

        let mode = if cli.playlist_only {
            if cli.csv_files.len() != 1 {
                bail!(
                    "Playlist-only mode takes exactly one clustered CSV file, got {}",
                    cli.csv_files.len()
                );
            }
            RunMode::PlaylistOnly {
                table: cli.csv_files[0].clone(),
            }
        } else {
            RunMode::Cluster {
                inputs: cli.csv_files.clone(),
            }
        };

        let algorithm = match file.algorithm.as_deref() {
            Some(name) => name.parse::<Algorithm>()?,
            None => cli.algorithm,
        };

        // K-means settings - merge file config with CLI
        let km_file = file.kmeans.unwrap_or_default();
        let kmeans = KMeansParams {
            n_clusters: km_file.clusters.or(cli.clusters),
            max_k: km_file.max_k.unwrap_or(cli.max_k),
            seed: km_file.seed.unwrap_or(cli.seed),
            n_init: km_file.n_init.unwrap_or(KMeansParams::default().n_init),
            max_iterations: km_file
                .max_iterations
                .unwrap_or(KMeansParams::default().max_iterations),
            tolerance: km_file.tolerance.unwrap_or(KMeansParams::default().tolerance),
        };
        if kmeans.n_clusters == Some(0) {
            bail!("Number of clusters must be at least 1");
        }
        if kmeans.n_clusters.is_none() && kmeans.max_k < 2 {
            bail!("max_k must be at least 2, got {}", kmeans.max_k);
        }
        if kmeans.n_init == 0 || kmeans.max_iterations == 0 {
            bail!("n_init and max_iterations must be at least 1");
        }
        if !kmeans.tolerance.is_finite() || kmeans.tolerance < 0.0 {
            bail!("tolerance must be a non-negative number, got {}", kmeans.tolerance);
        }

        let hd_file = file.hdbscan.unwrap_or_default();
        let density = DensityParams {
            min_cluster_size: hd_file.min_cluster_size.unwrap_or(cli.min_cluster_size),
            min_samples: hd_file.min_samples.or(cli.min_samples),
            cluster_selection_epsilon: hd_file.epsilon.unwrap_or(cli.hdbscan_epsilon),
        };
        let method = match algorithm {
            Algorithm::Kmeans => ClusteringMethod::Centroid(kmeans),
            Algorithm::Hdbscan => {
                density.hdbscan_config().validate()?;
                ClusteringMethod::Density(density)
            }
        };

        let output = OutputSettings {
            result_table: file.output.map(PathBuf::from).unwrap_or_else(|| cli.output.clone()),
            plot: file
                .plot_output
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.plot_output.clone()),
            curves_json: file
                .curves_json
                .map(PathBuf::from)
                .or_else(|| cli.curves_json.clone()),
            quiet_tracks: file.quiet_tracks.unwrap_or(cli.quiet_tracks),
        };

        let pl_file = file.playlists.unwrap_or_default();
        let playlists = PlaylistSettings {
            // Playlist-only mode exists to create playlists.
            create: cli.playlist_only || pl_file.create.unwrap_or(cli.create_playlists),
            name_template: pl_file.name.unwrap_or_else(|| cli.playlist_name.clone()),
            public: pl_file.public.unwrap_or(cli.public_playlists),
            include_noise: pl_file.include_noise.unwrap_or(cli.include_noise_playlist),
            timeout: Duration::from_secs(pl_file.timeout_sec.unwrap_or(cli.http_timeout_sec)),
        };
        if playlists.name_template.trim().is_empty() {
            bail!("Playlist name must not be empty");
        }

        let sp_file = file.spotify.unwrap_or_default();
        let spotify = SpotifySettings {
            client_id: sp_file.client_id.or_else(|| cli.spotify.client_id.clone()),
            redirect_uri: sp_file
                .redirect_uri
                .or_else(|| cli.spotify.redirect_uri.clone()),
            ..cli.spotify.clone()
        };

        Ok(Self {
            mode,
            clustering: ClusteringSettings {
                method,
                normalize: file.normalize.unwrap_or(cli.normalize),
            },
            output,
            playlists,
            spotify,
        })
    }
}

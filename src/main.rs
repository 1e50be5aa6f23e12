use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use playlist_clusterer::cli_style::{
    get_styles, print_banner, print_error, print_info, print_success, print_warning,
};
use playlist_clusterer::clustering::Algorithm;
use playlist_clusterer::config::{AppConfig, CliConfig, FileConfig, RunMode};
use playlist_clusterer::pipeline::{self, PlaylistStep};
use playlist_clusterer::playlists::{
    PlaylistCreator, PlaylistError, SpotifyCredentials, SpotifySession,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// Cluster songs by their embeddings and optionally turn the clusters into
/// playlists.
#[derive(Parser, Debug)]
#[command(styles=get_styles(), version)]
struct CliArgs {
    /// Embedding CSV files (song_name, artist, song_uri, embedding). With
    /// --playlist-only, a single clustered result table.
    #[clap(required = true, value_parser = parse_path)]
    pub csv_files: Vec<PathBuf>,

    /// Number of k-means clusters. Chosen automatically when omitted.
    #[clap(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Largest k tried by the automatic search.
    #[clap(long, default_value_t = 10)]
    pub max_k: usize,

    /// Seed for k-means initialization.
    #[clap(long, default_value_t = 42)]
    pub seed: u64,

    /// Clustering algorithm.
    #[clap(long, value_enum, default_value_t = Algorithm::Kmeans)]
    pub algorithm: Algorithm,

    /// HDBSCAN minimum cluster size.
    #[clap(long, default_value_t = 5)]
    pub min_cluster_size: usize,

    /// HDBSCAN min samples. Defaults to the minimum cluster size.
    #[clap(long)]
    pub min_samples: Option<usize>,

    /// HDBSCAN cluster selection epsilon.
    #[clap(long, default_value_t = 0.0)]
    pub hdbscan_epsilon: f64,

    /// Cluster the raw features instead of standardized ones.
    #[clap(long)]
    pub no_normalize: bool,

    /// Where to write the clustered result table.
    #[clap(short, long, default_value = "clustered_songs.csv", value_parser = parse_path)]
    pub output: PathBuf,

    /// Where to write the k selection plot (automatic k only).
    #[clap(long, default_value = "cluster_optimization.svg", value_parser = parse_path)]
    pub plot_output: PathBuf,

    /// Also dump the k selection curves as JSON.
    #[clap(long, value_parser = parse_path)]
    pub curves_json: Option<PathBuf>,

    /// Print cluster sizes only, without listing every song.
    #[clap(long)]
    pub quiet_tracks: bool,

    /// Create one playlist per cluster.
    #[clap(long)]
    pub create_playlists: bool,

    /// Playlist name prefix; the cluster number is appended.
    #[clap(long, default_value = "Music Cluster")]
    pub playlist_name: String,

    /// Make created playlists public.
    #[clap(long)]
    pub public_playlists: bool,

    /// Also create a playlist for noise songs (HDBSCAN).
    #[clap(long)]
    pub include_noise_playlist: bool,

    /// Skip clustering and create playlists from an existing result table.
    #[clap(long, alias = "from-clustered")]
    pub playlist_only: bool,

    /// Optional TOML config file. Its values override command line options.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Timeout in seconds for playlist service requests.
    #[clap(long, default_value_t = 30)]
    pub http_timeout_sec: u64,

    #[clap(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub spotify_client_id: Option<String>,

    #[clap(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    #[clap(long, env = "SPOTIFY_REDIRECT_URI")]
    pub spotify_redirect_uri: Option<String>,

    #[clap(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    pub spotify_access_token: Option<String>,

    #[clap(long, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    pub spotify_refresh_token: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            csv_files: self.csv_files.clone(),
            clusters: self.clusters,
            max_k: self.max_k,
            seed: self.seed,
            algorithm: self.algorithm,
            min_cluster_size: self.min_cluster_size,
            min_samples: self.min_samples,
            hdbscan_epsilon: self.hdbscan_epsilon,
            normalize: !self.no_normalize,
            output: self.output.clone(),
            plot_output: self.plot_output.clone(),
            curves_json: self.curves_json.clone(),
            quiet_tracks: self.quiet_tracks,
            create_playlists: self.create_playlists,
            playlist_name: self.playlist_name.clone(),
            public_playlists: self.public_playlists,
            include_noise_playlist: self.include_noise_playlist,
            playlist_only: self.playlist_only,
            http_timeout_sec: self.http_timeout_sec,
            spotify: SpotifyCredentials {
                client_id: self.spotify_client_id.clone(),
                client_secret: self.spotify_client_secret.clone(),
                redirect_uri: self.spotify_redirect_uri.clone(),
                access_token: self.spotify_access_token.clone(),
                refresh_token: self.spotify_refresh_token.clone(),
            },
        }
    }
}

fn spotify_creator(
    credentials: SpotifyCredentials,
    timeout: Duration,
) -> Result<Box<dyn PlaylistCreator>, PlaylistError> {
    Ok(Box::new(SpotifySession::new(credentials, timeout)?))
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };

    let config = match AppConfig::resolve(&cli_args.to_cli_config(), file_config) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("{:#}", e));
            return Err(e);
        }
    };

    match &config.mode {
        RunMode::Cluster { inputs } => {
            print_banner("Clustering songs by embedding");
            print_info(&format!("{} input file(s)", inputs.len()));
        }
        RunMode::PlaylistOnly { table } => {
            print_banner("Creating playlists from clusters");
            print_info(&format!("Result table: {}", table.display()));
        }
    }

    let credentials = config.spotify.clone();
    let timeout = config.playlists.timeout;
    let mut make_creator = || spotify_creator(credentials.clone(), timeout);

    let summary = match pipeline::run(&config, &mut make_creator) {
        Ok(summary) => summary,
        Err(e) => {
            print_error(&format!("{:#}", e));
            return Err(e);
        }
    };

    pipeline::print_run_summary(&summary);

    match &summary.playlists {
        PlaylistStep::NotRequested => {}
        PlaylistStep::Done(result) if result.failed_count() > 0 => print_warning(&format!(
            "{} of {} playlists could not be created",
            result.failed_count(),
            result.results.len()
        )),
        PlaylistStep::Done(result) if result.results.is_empty() => {
            print_warning("No valid playlists to create")
        }
        PlaylistStep::Done(result) => {
            print_success(&format!("Created {} playlists", result.created_count()))
        }
        PlaylistStep::Failed(reason) => {
            print_warning(&format!("Playlists were not created: {}", reason))
        }
    }

    if let Some(table) = &summary.result_table {
        print_success(&format!("Results saved to {}", table.display()));
    }

    Ok(())
}

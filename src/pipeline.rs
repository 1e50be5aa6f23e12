//! End-to-end runs: clustering mode and playlist-only mode.

use crate::cli_style::{
    print_key_value, print_key_value_highlight, print_section_footer, print_section_header,
};
use crate::clustering::{
    run_clustering, Algorithm, ClusteringOutcome, CurveRenderer, JsonCurveRenderer, StandardScaler,
    SvgCurveRenderer,
};
use crate::config::{AppConfig, RunMode};
use crate::playlists::{
    materialize_playlists, MaterializeOptions, MaterializeSummary, PlaylistCreator, PlaylistError,
};
use crate::report::{print_clustering_metrics, ClusterReport};
use crate::tracks::{
    load_clustered_table, merge_embedding_tables, write_clustered_table, ClusteredTrack,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Opens a playlist session on demand; only called when playlists are
/// actually requested.
pub type CreatorFactory<'a> =
    dyn FnMut() -> Result<Box<dyn PlaylistCreator>, PlaylistError> + 'a;

/// Playlist step result as seen by the caller.
#[derive(Debug)]
pub enum PlaylistStep {
    NotRequested,
    Done(MaterializeSummary),
    /// The session could not be used at all (e.g. authentication).
    Failed(String),
}

#[derive(Debug)]
pub struct RunSummary {
    pub rows: Vec<ClusteredTrack>,
    pub report: ClusterReport,
    /// `None` in playlist-only mode.
    pub outcome: Option<ClusteringOutcome>,
    pub result_table: Option<PathBuf>,
    pub curve_files: Vec<PathBuf>,
    pub playlists: PlaylistStep,
    pub partial_tracks: usize,
}

pub fn run(config: &AppConfig, make_creator: &mut CreatorFactory<'_>) -> Result<RunSummary> {
    match &config.mode {
        RunMode::Cluster { inputs } => run_cluster_mode(config, inputs, make_creator),
        RunMode::PlaylistOnly { table } => run_playlist_only(config, table, make_creator),
    }
}

fn run_cluster_mode(
    config: &AppConfig,
    inputs: &[PathBuf],
    make_creator: &mut CreatorFactory<'_>,
) -> Result<RunSummary> {
    info!("Loading embeddings from {} file(s)...", inputs.len());
    let merged = merge_embedding_tables(inputs).context("Failed to load song embeddings")?;
    info!(
        "Clustering {} songs with {}-dimensional features",
        merged.len(),
        merged.dimension
    );

    let mut features = merged.feature_matrix();
    if config.clustering.normalize {
        info!("Normalizing features...");
        features = StandardScaler::fit_transform(&features);
    }

    let outcome =
        run_clustering(&features, &config.clustering.method).context("Clustering failed")?;

    let rows: Vec<ClusteredTrack> = merged
        .records
        .iter()
        .zip(&outcome.assignment)
        .map(|(record, &label)| ClusteredTrack::from_record(record, label))
        .collect();

    print_clustering_metrics(&outcome);
    let report = ClusterReport::from_rows(&rows);
    if config.output.quiet_tracks {
        report.print_summary();
    } else {
        report.print_full();
    }

    let curve_files = write_curves(config, &outcome);

    let algorithm = Some(outcome.method.algorithm());
    let playlists = if config.playlists.create {
        // Session failures are reported; the result table is still written.
        match create_playlists(config, &rows, algorithm, make_creator) {
            Ok(summary) => PlaylistStep::Done(summary),
            Err(e) => {
                error!("Playlist creation failed: {:#}", e);
                PlaylistStep::Failed(format!("{:#}", e))
            }
        }
    } else {
        PlaylistStep::NotRequested
    };

    let table = &config.output.result_table;
    write_clustered_table(table, &rows)
        .with_context(|| format!("Failed to write results to {:?}", table))?;
    info!("Results saved to {:?}", table);

    Ok(RunSummary {
        rows,
        report,
        outcome: Some(outcome),
        result_table: Some(table.clone()),
        curve_files,
        playlists,
        partial_tracks: merged.partial_tracks.len(),
    })
}

fn run_playlist_only(
    config: &AppConfig,
    table: &Path,
    make_creator: &mut CreatorFactory<'_>,
) -> Result<RunSummary> {
    info!("Loading clustered songs from {:?}", table);
    let rows = load_clustered_table(table)
        .with_context(|| format!("Failed to load clustered table {:?}", table))?;

    let report = ClusterReport::from_rows(&rows);
    report.print_summary();

    let summary = create_playlists(config, &rows, None, make_creator)?;

    Ok(RunSummary {
        rows,
        report,
        outcome: None,
        result_table: None,
        curve_files: Vec::new(),
        playlists: PlaylistStep::Done(summary),
        partial_tracks: 0,
    })
}

/// Optimization curves only exist when k was chosen automatically.
///
/// Curves are diagnostics: a file that cannot be written is logged and
/// left out, the run goes on.
fn write_curves(config: &AppConfig, outcome: &ClusteringOutcome) -> Vec<PathBuf> {
    let Some(selection) = &outcome.selection else {
        return Vec::new();
    };

    let svg = SvgCurveRenderer::default();
    let mut targets: Vec<(&dyn CurveRenderer, &Path)> = vec![(&svg, config.output.plot.as_path())];
    if let Some(path) = &config.output.curves_json {
        targets.push((&JsonCurveRenderer, path.as_path()));
    }

    let mut written = Vec::new();
    for (renderer, path) in targets {
        match renderer.write_to(selection, path) {
            Ok(()) => written.push(path.to_path_buf()),
            Err(e) => warn!("Failed to write optimization curves to {:?}: {:#}", path, e),
        }
    }
    written
}

fn create_playlists(
    config: &AppConfig,
    rows: &[ClusteredTrack],
    algorithm: Option<Algorithm>,
    make_creator: &mut CreatorFactory<'_>,
) -> Result<MaterializeSummary> {
    let options = MaterializeOptions {
        name_template: config.playlists.name_template.clone(),
        public: config.playlists.public,
        include_noise: config.playlists.include_noise,
        algorithm,
        ..MaterializeOptions::default()
    };

    let mut creator = make_creator().context("Failed to open playlist session")?;
    let summary = materialize_playlists(rows, &options, creator.as_mut())
        .context("Failed to create playlists")?;

    if !summary.invalid_uris.is_empty() {
        warn!("{} songs had invalid track URIs", summary.invalid_uris.len());
    }
    Ok(summary)
}

/// Final overview, printed after all stages ran.
pub fn print_run_summary(summary: &RunSummary) {
    print_section_header("Run Summary");
    print_key_value_highlight("Songs", &summary.report.total_tracks.to_string());
    print_key_value("Clusters", &summary.report.n_clusters.to_string());
    if summary.report.noise_count > 0 {
        print_key_value("Noise", &summary.report.noise_count.to_string());
    }
    if summary.partial_tracks > 0 {
        print_key_value("Not in every source", &summary.partial_tracks.to_string());
    }
    if let Some(table) = &summary.result_table {
        print_key_value("Result table", &table.display().to_string());
    }
    for path in &summary.curve_files {
        print_key_value("Curves", &path.display().to_string());
    }

    match &summary.playlists {
        PlaylistStep::NotRequested => {}
        PlaylistStep::Done(result) => {
            print_key_value("Playlists created", &result.created_count().to_string());
            if result.failed_count() > 0 {
                print_key_value("Playlists failed", &result.failed_count().to_string());
            }
            if !result.skipped_clusters.is_empty() {
                print_key_value("Clusters skipped", &result.skipped_clusters.len().to_string());
            }
            for created in result.results.iter().filter_map(|r| r.outcome.as_ref().ok()) {
                if let Some(url) = &created.url {
                    print_key_value(&created.name, url);
                }
            }
        }
        PlaylistStep::Failed(reason) => print_key_value("Playlists", reason),
    }
    print_section_footer();
}

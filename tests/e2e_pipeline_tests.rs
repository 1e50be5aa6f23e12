//! End-to-end tests for the clustering run
//!
//! Load → merge → normalize → cluster → write → reload → report.

mod common;

use common::{
    RecordingCreator, TestWorkspace, CALM_SONGS, LOUD_SONGS, TWO_MOODS, TWO_MOODS_LYRICS,
};
use playlist_clusterer::clustering::{
    run_clustering, ClusteringMethod, DensityParams, KMeansParams, NOISE_LABEL,
};
use playlist_clusterer::config::{AppConfig, CliConfig, FileConfig};
use playlist_clusterer::pipeline::{self, PlaylistStep, RunSummary};
use playlist_clusterer::playlists::{PlaylistCreator, PlaylistError};
use playlist_clusterer::report::ClusterReport;
use playlist_clusterer::tracks::{
    load_clustered_table, merge_embedding_tables, ClusteredTrack, MergeError,
};
use std::collections::HashMap;
use std::path::PathBuf;

fn cli(workspace: &TestWorkspace, inputs: Vec<PathBuf>) -> CliConfig {
    CliConfig {
        csv_files: inputs,
        output: workspace.path("clustered_songs.csv"),
        plot_output: workspace.path("cluster_optimization.svg"),
        quiet_tracks: true,
        ..CliConfig::default()
    }
}

fn run_without_playlists(config: &AppConfig) -> RunSummary {
    let mut factory = || -> Result<Box<dyn PlaylistCreator>, PlaylistError> {
        panic!("playlists were not requested")
    };
    pipeline::run(config, &mut factory).unwrap()
}

fn labels_by_song(rows: &[ClusteredTrack]) -> HashMap<String, i32> {
    rows.iter()
        .map(|row| (row.song_name.clone(), row.cluster))
        .collect()
}

fn assert_two_moods_split(labels: &HashMap<String, i32>) {
    let calm = labels[CALM_SONGS[0]];
    let loud = labels[LOUD_SONGS[0]];
    assert_ne!(calm, loud);
    assert_ne!(calm, NOISE_LABEL);
    assert_ne!(loud, NOISE_LABEL);
    for song in CALM_SONGS {
        if let Some(&label) = labels.get(song) {
            assert_eq!(label, calm, "{} should be calm", song);
        }
    }
    for song in LOUD_SONGS {
        if let Some(&label) = labels.get(song) {
            assert_eq!(label, loud, "{} should be loud", song);
        }
    }
}

#[test]
fn test_forced_k_single_source() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_embeddings("audio.csv", TWO_MOODS);
    let cli = CliConfig {
        clusters: Some(2),
        ..cli(&workspace, vec![input])
    };
    let config = AppConfig::resolve(&cli, None).unwrap();

    let summary = run_without_playlists(&config);

    assert_eq!(summary.rows.len(), TWO_MOODS.len());
    assert_eq!(summary.report.n_clusters, 2);
    assert_two_moods_split(&labels_by_song(&summary.rows));
    // Forced k never draws the optimization curves.
    assert!(summary.curve_files.is_empty());
    assert!(!workspace.exists("cluster_optimization.svg"));
}

#[test]
fn test_auto_k_writes_curves_and_picks_two() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_embeddings("audio.csv", TWO_MOODS);
    let cli = CliConfig {
        curves_json: Some(workspace.path("curves.json")),
        ..cli(&workspace, vec![input])
    };
    let config = AppConfig::resolve(&cli, None).unwrap();

    let summary = run_without_playlists(&config);

    let outcome = summary.outcome.as_ref().unwrap();
    let selection = outcome.selection.as_ref().unwrap();
    assert_eq!(selection.chosen_k, 2);
    assert_eq!(selection.curves.ks, vec![2, 3, 4, 5, 6, 7]);
    assert_eq!(summary.curve_files.len(), 2);

    let svg = std::fs::read_to_string(workspace.path("cluster_optimization.svg")).unwrap();
    assert!(svg.contains("Silhouette Score for Optimal k"));
    let json = std::fs::read_to_string(workspace.path("curves.json")).unwrap();
    assert!(json.contains("\"chosen_k\": 2"));
}

#[test]
fn test_unwritable_plot_keeps_result_table() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_embeddings("audio.csv", TWO_MOODS);
    let cli = CliConfig {
        plot_output: workspace.path("missing_dir/cluster_optimization.svg"),
        curves_json: Some(workspace.path("curves.json")),
        ..cli(&workspace, vec![input])
    };
    let config = AppConfig::resolve(&cli, None).unwrap();

    let summary = run_without_playlists(&config);

    assert!(workspace.exists("clustered_songs.csv"));
    assert_eq!(summary.result_table, Some(workspace.path("clustered_songs.csv")));
    // The json dump does not depend on the plot.
    assert_eq!(summary.curve_files, vec![workspace.path("curves.json")]);
    assert!(!workspace.exists("missing_dir"));
    let labels = labels_by_song(&summary.rows);
    assert_two_moods_split(&labels);
}

#[test]
fn test_result_table_reloads_to_same_mapping() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_embeddings("audio.csv", TWO_MOODS);
    let cli = CliConfig {
        clusters: Some(3),
        ..cli(&workspace, vec![input])
    };
    let config = AppConfig::resolve(&cli, None).unwrap();

    let summary = run_without_playlists(&config);
    let reloaded = load_clustered_table(&workspace.path("clustered_songs.csv")).unwrap();

    assert_eq!(reloaded, summary.rows);
    let mapping: HashMap<_, _> = reloaded.iter().map(|r| (r.identity(), r.cluster)).collect();
    for row in &summary.rows {
        assert_eq!(mapping[&row.identity()], row.cluster);
    }
    assert_eq!(ClusterReport::from_rows(&reloaded), summary.report);
}

#[test]
fn test_two_sources_keep_complete_tracks_in_first_source_order() {
    let workspace = TestWorkspace::new();
    let audio = workspace.write_embeddings("audio.csv", TWO_MOODS);
    let lyrics = workspace.write_embeddings("lyrics.csv", TWO_MOODS_LYRICS);

    let merged = merge_embedding_tables(&[audio.clone(), lyrics.clone()]).unwrap();
    assert_eq!(merged.dimension, 3);
    assert_eq!(merged.partial_tracks.len(), 2);
    let names: Vec<&str> = merged.records.iter().map(|r| r.song_name()).collect();
    assert_eq!(
        names,
        vec!["Still Water", "Low Tide", "Fog", "Moss", "Thunder", "Riot"]
    );
    assert_eq!(merged.records[0].embedding, vec![0.0, 0.1, -5.0]);

    let cli = CliConfig {
        clusters: Some(2),
        ..cli(&workspace, vec![audio, lyrics])
    };
    let config = AppConfig::resolve(&cli, None).unwrap();
    let summary = run_without_playlists(&config);

    assert_eq!(summary.rows.len(), 6);
    assert_eq!(summary.partial_tracks, 2);
    // The locator comes from the first source, untouched.
    assert_eq!(
        summary.rows[2].song_uri,
        "https://open.spotify.com/track/0VjIjW4GlUZAMYd2vXMi3b?si=abc"
    );
    assert_two_moods_split(&labels_by_song(&summary.rows));
}

#[test]
fn test_disjoint_sources_are_fatal() {
    let workspace = TestWorkspace::new();
    let calm = workspace.write_embeddings("calm.csv", &TWO_MOODS[..4]);
    let loud = workspace.write_embeddings("loud.csv", &TWO_MOODS[4..]);

    let result = merge_embedding_tables(&[calm.clone(), loud.clone()]);
    assert!(matches!(result, Err(MergeError::NoCompleteTracks { .. })));

    let config = AppConfig::resolve(&cli(&workspace, vec![calm, loud]), None).unwrap();
    let mut factory = || -> Result<Box<dyn PlaylistCreator>, PlaylistError> {
        panic!("playlists were not requested")
    };
    let err = pipeline::run(&config, &mut factory).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to load song embeddings"));
    assert!(!workspace.exists("clustered_songs.csv"));
}

#[test]
fn test_malformed_rows_are_skipped() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_raw(
        "messy.csv",
        "song_name,artist,song_uri,embedding\n\
         A,X,spotify:track:A1,\"[0.0, 0.0]\"\n\
         B,X,spotify:track:B1,\"not a vector\"\n\
         C,X,spotify:track:C1,\"[0.1, 0.0]\"\n\
         D,X,spotify:track:D1,\"[1.0, 2.0, 3.0]\"\n\
         E,Y,spotify:track:E1,\"[9.0, 9.0]\"\n\
         F,Y,spotify:track:F1,\"[9.1, 9.0]\"\n",
    );
    let cli = CliConfig {
        clusters: Some(2),
        ..cli(&workspace, vec![input])
    };
    let config = AppConfig::resolve(&cli, None).unwrap();

    let summary = run_without_playlists(&config);

    let labels = labels_by_song(&summary.rows);
    assert_eq!(labels.len(), 4);
    assert!(!labels.contains_key("B"));
    assert!(!labels.contains_key("D"));
    assert_eq!(labels["A"], labels["C"]);
    assert_eq!(labels["E"], labels["F"]);
    assert_ne!(labels["A"], labels["E"]);
}

#[test]
fn test_hdbscan_from_config_file_marks_outlier_as_noise() {
    let workspace = TestWorkspace::new();
    let mut content = String::from("song_name,artist,song_uri,embedding\n");
    for row in TWO_MOODS {
        let values: Vec<String> = row.embedding.iter().map(|v| v.to_string()).collect();
        content.push_str(&format!(
            "{},{},{},\"[{}]\"\n",
            row.song_name,
            row.artist,
            row.song_uri,
            values.join(", ")
        ));
    }
    content.push_str("Lost Signal,Nobody,spotify:track:0000000000000000000000,\"[50.0, -50.0]\"\n");
    let input = workspace.write_raw("audio.csv", &content);

    let config_path = workspace.write_raw(
        "config.toml",
        r#"
        algorithm = "hdbscan"
        normalize = false

        [hdbscan]
        min_cluster_size = 3
        "#,
    );
    let file_config = FileConfig::load(&config_path).unwrap();
    let config = AppConfig::resolve(&cli(&workspace, vec![input]), Some(file_config)).unwrap();

    let summary = run_without_playlists(&config);

    let labels = labels_by_song(&summary.rows);
    assert_eq!(labels["Lost Signal"], NOISE_LABEL);
    assert_split_ignoring("Lost Signal", &labels);
    assert_eq!(summary.report.n_clusters, 2);
    assert_eq!(summary.report.noise_count, 1);

    let outcome = summary.outcome.as_ref().unwrap();
    assert_eq!(outcome.cluster_sizes.get(&NOISE_LABEL), Some(&1));
    // HDBSCAN never draws the optimization curves.
    assert!(summary.curve_files.is_empty());
}

fn assert_split_ignoring(song: &str, labels: &HashMap<String, i32>) {
    let rest: HashMap<String, i32> = labels
        .iter()
        .filter(|(name, _)| name.as_str() != song)
        .map(|(name, &label)| (name.clone(), label))
        .collect();
    assert_two_moods_split(&rest);
}

#[test]
fn test_engines_share_one_call_site() {
    let features: Vec<Vec<f64>> = TWO_MOODS.iter().map(|r| r.embedding.to_vec()).collect();

    let centroid = run_clustering(
        &features,
        &ClusteringMethod::Centroid(KMeansParams {
            n_clusters: Some(2),
            ..KMeansParams::default()
        }),
    )
    .unwrap();
    let density = run_clustering(
        &features,
        &ClusteringMethod::Density(DensityParams {
            min_cluster_size: 3,
            ..DensityParams::default()
        }),
    )
    .unwrap();

    for outcome in [&centroid, &density] {
        assert_eq!(outcome.assignment.len(), features.len());
        assert_eq!(outcome.n_clusters, 2);
        let total: usize = outcome.cluster_sizes.values().sum();
        assert_eq!(total, features.len());
    }
    assert!(centroid.inertia.is_some());
    assert!(density.inertia.is_none());
}

#[test]
fn test_session_failure_keeps_result_table() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_embeddings("audio.csv", TWO_MOODS);
    let cli = CliConfig {
        clusters: Some(2),
        create_playlists: true,
        ..cli(&workspace, vec![input])
    };
    let config = AppConfig::resolve(&cli, None).unwrap();

    let mut factory = || -> Result<Box<dyn PlaylistCreator>, PlaylistError> {
        Err(PlaylistError::MissingCredentials("no client id".to_string()))
    };
    let summary = pipeline::run(&config, &mut factory).unwrap();

    assert!(matches!(summary.playlists, PlaylistStep::Failed(_)));
    assert!(workspace.exists("clustered_songs.csv"));
}

#[test]
fn test_fresh_run_creates_one_playlist_per_cluster() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_embeddings("audio.csv", TWO_MOODS);
    let cli = CliConfig {
        clusters: Some(2),
        create_playlists: true,
        playlist_name: "Mood".to_string(),
        ..cli(&workspace, vec![input])
    };
    let config = AppConfig::resolve(&cli, None).unwrap();

    let mut factory = || -> Result<Box<dyn PlaylistCreator>, PlaylistError> {
        Ok(Box::new(RecordingCreator::default()))
    };
    let summary = pipeline::run(&config, &mut factory).unwrap();

    let PlaylistStep::Done(result) = &summary.playlists else {
        panic!("playlists should have been created");
    };
    assert_eq!(result.created_count(), 2);
    assert!(result.invalid_uris.is_empty());
    let clusters: Vec<i32> = result.results.iter().map(|r| r.cluster).collect();
    assert_eq!(clusters, vec![0, 1]);
    let names: Vec<String> = result
        .results
        .iter()
        .map(|r| r.outcome.as_ref().unwrap().name.clone())
        .collect();
    assert_eq!(names, vec!["Mood 0", "Mood 1"]);
}

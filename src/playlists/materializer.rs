//! Turning clusters into playlist requests and submitting them.

use super::creator::PlaylistCreator;
use super::models::{PlaylistError, PlaylistFailure, PlaylistOutcome, PlaylistRequest};
use super::uri::TrackUriScheme;
use crate::clustering::{Algorithm, NOISE_LABEL};
use crate::tracks::ClusteredTrack;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    /// Playlists are named `"{name_template} {cluster}"`.
    pub name_template: String,
    pub public: bool,
    pub include_noise: bool,
    /// Named in the description; `None` for reloaded tables.
    pub algorithm: Option<Algorithm>,
    pub scheme: TrackUriScheme,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            name_template: "Music Cluster".to_string(),
            public: false,
            include_noise: false,
            algorithm: None,
            scheme: TrackUriScheme::default(),
        }
    }
}

/// A track whose locator could not be turned into a native URI.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidTrackUri {
    pub cluster: i32,
    pub song_name: String,
    pub song_uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPlaylist {
    pub cluster: i32,
    pub request: PlaylistRequest,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistPlan {
    pub playlists: Vec<PlannedPlaylist>,
    pub invalid_uris: Vec<InvalidTrackUri>,
    /// Clusters left out because none of their tracks had a valid URI.
    pub skipped_clusters: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPlaylistResult {
    pub cluster: i32,
    pub outcome: PlaylistOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializeSummary {
    pub results: Vec<ClusterPlaylistResult>,
    pub invalid_uris: Vec<InvalidTrackUri>,
    pub skipped_clusters: Vec<i32>,
}

impl MaterializeSummary {
    pub fn created_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }
}

pub fn playlist_description(algorithm: Option<Algorithm>, track_count: usize) -> String {
    match algorithm {
        Some(algorithm) => format!(
            "Auto-generated playlist from {} clustering. Contains {} similar songs.",
            algorithm, track_count
        ),
        None => format!(
            "Auto-generated playlist from clustering. Contains {} similar songs.",
            track_count
        ),
    }
}

/// One request per cluster (ascending label), with web locators converted to
/// native URIs. Noise is left out unless `include_noise` is set.
pub fn build_playlist_requests(rows: &[ClusteredTrack], options: &MaterializeOptions) -> PlaylistPlan {
    let mut clusters: BTreeMap<i32, Vec<&ClusteredTrack>> = BTreeMap::new();
    for row in rows {
        if row.cluster == NOISE_LABEL && !options.include_noise {
            continue;
        }
        clusters.entry(row.cluster).or_default().push(row);
    }

    let mut plan = PlaylistPlan::default();
    for (cluster, tracks) in clusters {
        let mut track_uris = Vec::with_capacity(tracks.len());
        let mut invalid_in_cluster = 0;

        for track in tracks {
            match options.scheme.to_native(&track.song_uri) {
                Some(uri) => track_uris.push(uri),
                None => {
                    warn!(
                        "Invalid track URI for '{}' in cluster {}: {:?}",
                        track.song_name, cluster, track.song_uri
                    );
                    invalid_in_cluster += 1;
                    plan.invalid_uris.push(InvalidTrackUri {
                        cluster,
                        song_name: track.song_name.clone(),
                        song_uri: track.song_uri.clone(),
                    });
                }
            }
        }

        if invalid_in_cluster > 0 {
            warn!("{} invalid URIs in cluster {}", invalid_in_cluster, cluster);
        }
        if track_uris.is_empty() {
            warn!("Skipping cluster {}: no valid track URIs", cluster);
            plan.skipped_clusters.push(cluster);
            continue;
        }

        plan.playlists.push(PlannedPlaylist {
            cluster,
            request: PlaylistRequest {
                name: format!("{} {}", options.name_template, cluster),
                description: playlist_description(options.algorithm, track_uris.len()),
                track_uris,
                public: options.public,
            },
        });
    }

    plan
}

/// Build the requests and submit them all through `creator`.
///
/// Per-playlist failures are collected in the summary; only a session-level
/// failure (for example authentication) is returned as an error.
pub fn materialize_playlists(
    rows: &[ClusteredTrack],
    options: &MaterializeOptions,
    creator: &mut dyn PlaylistCreator,
) -> Result<MaterializeSummary, PlaylistError> {
    let plan = build_playlist_requests(rows, options);

    let mut summary = MaterializeSummary {
        results: Vec::new(),
        invalid_uris: plan.invalid_uris,
        skipped_clusters: plan.skipped_clusters,
    };

    if plan.playlists.is_empty() {
        warn!("No valid playlists to create");
        return Ok(summary);
    }

    info!("Creating {} playlists...", plan.playlists.len());
    let requests: Vec<PlaylistRequest> = plan.playlists.iter().map(|p| p.request.clone()).collect();
    let mut outcomes = creator.create_playlists(&requests)?.into_iter();

    for planned in plan.playlists {
        let outcome = outcomes.next().unwrap_or_else(|| {
            Err(PlaylistFailure {
                name: planned.request.name.clone(),
                error: "no outcome returned for this playlist".to_string(),
            })
        });

        match &outcome {
            Ok(created) => info!(
                "Created playlist '{}' for cluster {} with {} tracks",
                created.name, planned.cluster, created.tracks_added
            ),
            Err(failure) => error!(
                "Failed to create playlist '{}' for cluster {}: {}",
                failure.name, planned.cluster, failure.error
            ),
        }

        summary.results.push(ClusterPlaylistResult {
            cluster: planned.cluster,
            outcome,
        });
    }

    info!(
        "Playlists created: {}, failed: {}",
        summary.created_count(),
        summary.failed_count()
    );
    Ok(summary)
}

//! Human readable summaries of a clustering.

use crate::cli_style::{
    print_empty_list, print_group_title, print_key_value, print_key_value_highlight,
    print_list_item, print_section_footer, print_section_header, TableBuilder,
};
use crate::clustering::{ClusteringMethod, ClusteringOutcome, NOISE_LABEL};
use crate::tracks::ClusteredTrack;
use std::collections::BTreeMap;

/// Tracks grouped by cluster label.
///
/// Labels are kept in ascending integer order, so noise (`-1`) comes first.
/// Within a group tracks keep their table order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterReport {
    pub groups: BTreeMap<i32, Vec<ClusteredTrack>>,
    pub total_tracks: usize,
    /// Number of non-noise labels.
    pub n_clusters: usize,
    pub noise_count: usize,
}

impl ClusterReport {
    pub fn from_rows(rows: &[ClusteredTrack]) -> Self {
        let mut groups: BTreeMap<i32, Vec<ClusteredTrack>> = BTreeMap::new();
        for row in rows {
            groups.entry(row.cluster).or_default().push(row.clone());
        }

        let noise_count = groups.get(&NOISE_LABEL).map(|g| g.len()).unwrap_or(0);
        let n_clusters = groups.keys().filter(|&&label| label != NOISE_LABEL).count();

        Self {
            groups,
            total_tracks: rows.len(),
            n_clusters,
            noise_count,
        }
    }

    pub fn cluster_sizes(&self) -> BTreeMap<i32, usize> {
        self.groups
            .iter()
            .map(|(&label, tracks)| (label, tracks.len()))
            .collect()
    }

    pub fn group_title(label: i32, size: usize) -> String {
        let songs = if size == 1 { "song" } else { "songs" };
        if label == NOISE_LABEL {
            format!("Noise ({} {})", size, songs)
        } else {
            format!("Cluster {} ({} {})", label, size, songs)
        }
    }

    /// Totals plus a table of cluster sizes.
    pub fn print_summary(&self) {
        print_section_header("Cluster Summary");
        print_key_value("Total songs", &self.total_tracks.to_string());
        print_key_value_highlight("Clusters", &self.n_clusters.to_string());
        if self.noise_count > 0 {
            print_key_value("Noise songs", &self.noise_count.to_string());
        }

        if self.groups.is_empty() {
            print_empty_list("No songs to report");
        } else {
            let mut table = TableBuilder::new(vec!["Cluster", "Songs"]);
            for (label, size) in self.cluster_sizes() {
                let name = if label == NOISE_LABEL {
                    "noise".to_string()
                } else {
                    label.to_string()
                };
                table.add_row(vec![name, size.to_string()]);
            }
            table.print();
        }
        print_section_footer();
    }

    /// Summary followed by every track of every cluster.
    pub fn print_full(&self) {
        self.print_summary();

        print_section_header("Cluster Contents");
        for (&label, tracks) in &self.groups {
            println!();
            print_group_title(&Self::group_title(label, tracks.len()));
            for track in tracks {
                print_list_item(&format!("{} - {}", track.song_name, track.artist), 2);
            }
        }
        print_section_footer();
    }
}

/// Quality figures of a fresh clustering run.
pub fn print_clustering_metrics(outcome: &ClusteringOutcome) {
    print_section_header("Clustering Results");
    print_key_value_highlight("Algorithm", &outcome.method.algorithm().to_string());

    match &outcome.method {
        ClusteringMethod::Centroid(_) => {
            if let Some(selection) = &outcome.selection {
                print_key_value("Optimal k", &selection.chosen_k.to_string());
            }
            if let Some(inertia) = outcome.inertia {
                print_key_value("Inertia", &format!("{:.4}", inertia));
            }
        }
        ClusteringMethod::Density(params) => {
            print_key_value("Min cluster size", &params.min_cluster_size.to_string());
            print_key_value("Noise points", &outcome.noise_count.to_string());
            for (label, size) in &outcome.undersized_clusters {
                print_key_value(
                    "Undersized cluster",
                    &format!("{} ({} songs)", label, size),
                );
            }
        }
    }

    print_key_value("Clusters", &outcome.n_clusters.to_string());
    let silhouette = outcome
        .silhouette
        .map(|s| format!("{:.4}", s))
        .unwrap_or_else(|| "n/a".to_string());
    print_key_value("Silhouette score", &silhouette);
    print_section_footer();
}

//! Automatic choice of the k-means cluster count by silhouette.

use super::kmeans::{fit_kmeans, KMeansConfig};
use super::silhouette::silhouette_score;
use super::ClusteringError;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct KSearchConfig {
    /// Largest k tried; the search also stops at `n_samples - 1`.
    pub max_k: usize,
    pub kmeans: KMeansConfig,
    pub show_progress: bool,
}

impl Default for KSearchConfig {
    fn default() -> Self {
        Self {
            max_k: 10,
            kmeans: KMeansConfig::default(),
            show_progress: false,
        }
    }
}

/// Inertia and silhouette per tried k, index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionCurves {
    pub ks: Vec<usize>,
    pub inertias: Vec<f64>,
    pub silhouettes: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KSelection {
    pub chosen_k: usize,
    pub curves: SelectionCurves,
}

impl KSelection {
    pub fn chosen_silhouette(&self) -> Option<f64> {
        self.curves
            .ks
            .iter()
            .position(|&k| k == self.chosen_k)
            .and_then(|idx| self.curves.silhouettes[idx])
    }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if visible {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.set_message("Searching for optimal k");
    pb
}

/// Fit k-means for every k in `[2, min(max_k, n - 1)]` and keep the k with
/// the highest silhouette. Ties go to the smaller k.
pub fn select_k(points: &[Vec<f64>], config: &KSearchConfig) -> Result<KSelection, ClusteringError> {
    let upper = config.max_k.min(points.len().saturating_sub(1));
    if upper < 2 {
        return Err(ClusteringError::NotEnoughSamples {
            samples: points.len(),
            max_k: config.max_k,
        });
    }

    let ks: Vec<usize> = (2..=upper).collect();
    let pb = progress_bar(ks.len() as u64, config.show_progress);

    let mut inertias = Vec::with_capacity(ks.len());
    let mut silhouettes = Vec::with_capacity(ks.len());
    for &k in &ks {
        let model = fit_kmeans(points, k, &config.kmeans)?;
        let labels: Vec<i32> = model.labels.iter().map(|&l| l as i32).collect();
        let silhouette = silhouette_score(points, &labels);

        debug!(
            "k={}: inertia {:.4}, silhouette {:?}",
            k, model.inertia, silhouette
        );
        inertias.push(model.inertia);
        silhouettes.push(silhouette);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let mut chosen = 0;
    for idx in 1..ks.len() {
        let best = silhouettes[chosen].unwrap_or(f64::NEG_INFINITY);
        if silhouettes[idx].unwrap_or(f64::NEG_INFINITY) > best {
            chosen = idx;
        }
    }

    let chosen_k = ks[chosen];
    info!(
        "Optimal number of clusters: {} (silhouette {:.4})",
        chosen_k,
        silhouettes[chosen].unwrap_or(f64::NAN)
    );

    Ok(KSelection {
        chosen_k,
        curves: SelectionCurves {
            ks,
            inertias,
            silhouettes,
        },
    })
}

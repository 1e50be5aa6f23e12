//! Clustering of feature matrices.
//!
//! Two engines share one entry point, [`run_clustering`]: a centroid
//! partition (k-means, with automatic k selection when no k is given) and a
//! density partition (HDBSCAN, which may leave points as noise).

pub mod curves;
mod distance;
pub mod hdbscan;
pub mod kmeans;
mod normalize;
pub mod selection;
mod silhouette;

pub use curves::{CurveRenderError, CurveRenderer, JsonCurveRenderer, SvgCurveRenderer};
pub use hdbscan::{fit_hdbscan, HdbscanConfig, HdbscanModel};
pub use kmeans::{fit_kmeans, KMeansConfig, KMeansModel};
pub use normalize::StandardScaler;
pub use selection::{select_k, KSearchConfig, KSelection, SelectionCurves};
pub use silhouette::{silhouette_excluding_noise, silhouette_score};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Label reserved for points a density partition leaves unclustered.
pub const NOISE_LABEL: i32 = -1;

#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("Cannot cluster an empty feature matrix")]
    EmptyInput,

    #[error("Feature rows have inconsistent lengths: row {row} has {actual}, expected {expected}")]
    RaggedInput {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid clustering parameter: {0}")]
    InvalidParameter(String),

    #[error("Not enough samples ({samples}) to search for k in [2, {max_k}]; at least 3 are needed")]
    NotEnoughSamples { samples: usize, max_k: usize },

    #[error("Unknown clustering algorithm '{0}', expected 'kmeans' or 'hdbscan'")]
    UnknownAlgorithm(String),
}

/// Algorithm names as accepted on the command line and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Kmeans,
    Hdbscan,
}

impl FromStr for Algorithm {
    type Err = ClusteringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" => Ok(Algorithm::Kmeans),
            "hdbscan" => Ok(Algorithm::Hdbscan),
            _ => Err(ClusteringError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Kmeans => write!(f, "K-means"),
            Algorithm::Hdbscan => write!(f, "HDBSCAN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansParams {
    /// Forced cluster count; `None` searches for the best k.
    pub n_clusters: Option<usize>,
    pub max_k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        let defaults = KMeansConfig::default();
        Self {
            n_clusters: None,
            max_k: 10,
            seed: defaults.seed,
            n_init: defaults.n_init,
            max_iterations: defaults.max_iterations,
            tolerance: defaults.tolerance,
        }
    }
}

impl KMeansParams {
    fn kmeans_config(&self) -> KMeansConfig {
        KMeansConfig {
            seed: self.seed,
            n_init: self.n_init,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityParams {
    pub min_cluster_size: usize,
    /// Defaults to `min_cluster_size` when unset.
    pub min_samples: Option<usize>,
    pub cluster_selection_epsilon: f64,
}

impl Default for DensityParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: None,
            cluster_selection_epsilon: 0.0,
        }
    }
}

impl DensityParams {
    pub fn hdbscan_config(&self) -> HdbscanConfig {
        HdbscanConfig {
            min_cluster_size: self.min_cluster_size,
            min_samples: self.min_samples.unwrap_or(self.min_cluster_size),
            cluster_selection_epsilon: self.cluster_selection_epsilon,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClusteringMethod {
    Centroid(KMeansParams),
    Density(DensityParams),
}

impl ClusteringMethod {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            ClusteringMethod::Centroid(_) => Algorithm::Kmeans,
            ClusteringMethod::Density(_) => Algorithm::Hdbscan,
        }
    }
}

/// Everything a clustering run produces, whichever engine ran.
#[derive(Debug, Clone)]
pub struct ClusteringOutcome {
    /// One label per input row.
    pub assignment: Vec<i32>,
    pub method: ClusteringMethod,
    /// Number of real (non-noise) clusters.
    pub n_clusters: usize,
    pub cluster_sizes: BTreeMap<i32, usize>,
    pub noise_count: usize,
    pub silhouette: Option<f64>,
    /// Only set for centroid partitions.
    pub inertia: Option<f64>,
    /// Set when k was chosen automatically.
    pub selection: Option<KSelection>,
    /// Real clusters smaller than the configured minimum size.
    pub undersized_clusters: Vec<(i32, usize)>,
}

fn check_matrix(features: &[Vec<f64>]) -> Result<(), ClusteringError> {
    let expected = features.first().map(|r| r.len()).ok_or(ClusteringError::EmptyInput)?;
    if expected == 0 {
        return Err(ClusteringError::EmptyInput);
    }
    if let Some((row, r)) = features.iter().enumerate().find(|(_, r)| r.len() != expected) {
        return Err(ClusteringError::RaggedInput {
            row,
            expected,
            actual: r.len(),
        });
    }
    Ok(())
}

fn count_labels(assignment: &[i32]) -> BTreeMap<i32, usize> {
    let mut sizes = BTreeMap::new();
    for &label in assignment {
        *sizes.entry(label).or_insert(0) += 1;
    }
    sizes
}

/// Non-noise clusters smaller than `min_cluster_size`, each one logged.
fn undersized_clusters(
    cluster_sizes: &BTreeMap<i32, usize>,
    min_cluster_size: usize,
) -> Vec<(i32, usize)> {
    let undersized: Vec<(i32, usize)> = cluster_sizes
        .iter()
        .filter(|(&label, &size)| label != NOISE_LABEL && size < min_cluster_size)
        .map(|(&label, &size)| (label, size))
        .collect();
    for (label, size) in &undersized {
        warn!(
            "Cluster {} has {} songs, below the minimum cluster size of {}",
            label, size, min_cluster_size
        );
    }
    undersized
}

/// Cluster `features` with the configured engine.
pub fn run_clustering(
    features: &[Vec<f64>],
    method: &ClusteringMethod,
) -> Result<ClusteringOutcome, ClusteringError> {
    check_matrix(features)?;

    match method {
        ClusteringMethod::Centroid(params) => run_centroid(features, params, method),
        ClusteringMethod::Density(params) => run_density(features, params, method),
    }
}

fn run_centroid(
    features: &[Vec<f64>],
    params: &KMeansParams,
    method: &ClusteringMethod,
) -> Result<ClusteringOutcome, ClusteringError> {
    let config = params.kmeans_config();

    let (k, selection) = match params.n_clusters {
        Some(k) => (k, None),
        None => {
            info!("Finding optimal number of clusters (max k = {})...", params.max_k);
            let search = KSearchConfig {
                max_k: params.max_k,
                kmeans: config.clone(),
                show_progress: true,
            };
            let selection = select_k(features, &search)?;
            (selection.chosen_k, Some(selection))
        }
    };

    info!("Performing K-means clustering with k={}...", k);
    let model = fit_kmeans(features, k, &config)?;
    let assignment: Vec<i32> = model.labels.iter().map(|&l| l as i32).collect();
    let silhouette = silhouette_score(features, &assignment);
    let cluster_sizes = count_labels(&assignment);

    info!(
        "K-means produced {} clusters (inertia {:.4}, silhouette {:?})",
        cluster_sizes.len(),
        model.inertia,
        silhouette
    );

    Ok(ClusteringOutcome {
        n_clusters: cluster_sizes.len(),
        assignment,
        method: method.clone(),
        cluster_sizes,
        noise_count: 0,
        silhouette,
        inertia: Some(model.inertia),
        selection,
        undersized_clusters: Vec::new(),
    })
}

fn run_density(
    features: &[Vec<f64>],
    params: &DensityParams,
    method: &ClusteringMethod,
) -> Result<ClusteringOutcome, ClusteringError> {
    let config = params.hdbscan_config();
    info!(
        "Performing HDBSCAN clustering with min_cluster_size={}, min_samples={}, epsilon={}...",
        config.min_cluster_size, config.min_samples, config.cluster_selection_epsilon
    );

    let model = fit_hdbscan(features, &config)?;
    let cluster_sizes = count_labels(&model.labels);
    let noise_count = cluster_sizes.get(&NOISE_LABEL).copied().unwrap_or(0);

    let undersized_clusters = undersized_clusters(&cluster_sizes, config.min_cluster_size);

    let silhouette = if model.n_clusters > 1 {
        silhouette_excluding_noise(features, &model.labels)
    } else {
        None
    };

    info!(
        "HDBSCAN found {} clusters and {} noise points",
        model.n_clusters, noise_count
    );

    Ok(ClusteringOutcome {
        n_clusters: model.n_clusters,
        cluster_sizes,
        noise_count,
        silhouette,
        inertia: None,
        selection: None,
        undersized_clusters,
        assignment: model.labels,
        method: method.clone(),
    })
}

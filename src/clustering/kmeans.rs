//! Lloyd's k-means with k-means++ seeding.

use super::distance::squared_euclidean;
use super::ClusteringError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

/// Knobs for a single k-means fit with a known `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    pub seed: u64,
    /// Number of independently seeded runs; the lowest inertia wins.
    pub n_init: usize,
    pub max_iterations: usize,
    /// Relative convergence threshold, scaled by the mean column variance.
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansModel {
    pub centroids: Vec<Vec<f64>>,
    /// One label in `[0, k)` per input point.
    pub labels: Vec<usize>,
    /// Sum of squared distances of points to their centroid.
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeansModel {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

pub fn fit_kmeans(
    points: &[Vec<f64>],
    k: usize,
    config: &KMeansConfig,
) -> Result<KMeansModel, ClusteringError> {
    if points.is_empty() {
        return Err(ClusteringError::EmptyInput);
    }
    if k == 0 || k > points.len() {
        return Err(ClusteringError::InvalidParameter(format!(
            "number of clusters must be between 1 and {}, got {}",
            points.len(),
            k
        )));
    }
    if config.n_init == 0 {
        return Err(ClusteringError::InvalidParameter(
            "n_init must be at least 1".to_string(),
        ));
    }

    let shift_threshold = config.tolerance * mean_column_variance(points);

    let mut best: Option<KMeansModel> = None;
    for run in 0..config.n_init {
        let seed = config.seed.wrapping_add(run as u64);
        let model = fit_single(points, k, config.max_iterations, shift_threshold, seed);
        debug!(
            "k-means run {} (k={}, seed={}): inertia {:.4} after {} iterations",
            run, k, seed, model.inertia, model.iterations
        );
        match &best {
            Some(current) if current.inertia <= model.inertia => {}
            _ => best = Some(model),
        }
    }

    best.ok_or_else(|| ClusteringError::InvalidParameter("no k-means run completed".to_string()))
}

fn fit_single(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
    shift_threshold: f64,
    seed: u64,
) -> KMeansModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = kmeans_plus_plus_init(points, k, &mut rng);
    let mut labels: Vec<usize> = Vec::new();
    let mut iterations = 0;

    for _ in 0..max_iterations.max(1) {
        iterations += 1;

        let nearest: Vec<(usize, f64)> = points
            .par_iter()
            .map(|point| nearest_centroid(point, &centroids))
            .collect();
        let (mut new_labels, mut distances): (Vec<usize>, Vec<f64>) = nearest.into_iter().unzip();

        relocate_empty_clusters(&mut new_labels, &mut distances, k);

        let new_centroids = compute_centroids(points, &new_labels, k);
        let shift: f64 = centroids
            .iter()
            .zip(&new_centroids)
            .map(|(old, new)| squared_euclidean(old, new))
            .sum();

        let unchanged = new_labels == labels;
        labels = new_labels;
        centroids = new_centroids;

        if unchanged || shift <= shift_threshold {
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(point, &label)| squared_euclidean(point, &centroids[label]))
        .sum();

    KMeansModel {
        centroids,
        labels,
        inertia,
        iterations,
    }
}

fn kmeans_plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())].clone());

    let mut closest: Vec<f64> = points
        .iter()
        .map(|point| squared_euclidean(point, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let selected = if total > 0.0 {
            let threshold = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut selected = points.len() - 1;
            for (idx, &d) in closest.iter().enumerate() {
                cumulative += d;
                if cumulative >= threshold && d > 0.0 {
                    selected = idx;
                    break;
                }
            }
            selected
        } else {
            // Every point sits on a centroid already.
            rng.random_range(0..points.len())
        };

        let centroid = points[selected].clone();
        for (d, point) in closest.iter_mut().zip(points) {
            *d = d.min(squared_euclidean(point, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Index of the closest centroid (lowest index on ties) and the squared
/// distance to it.
fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, centroid) in centroids.iter().enumerate() {
        let d = squared_euclidean(point, centroid);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best
}

/// Give every empty cluster the point farthest from its centre, taken from a
/// cluster that can spare one.
fn relocate_empty_clusters(labels: &mut [usize], distances: &mut [f64], k: usize) {
    let mut counts = vec![0usize; k];
    for &label in labels.iter() {
        counts[label] += 1;
    }

    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }
        let donor = (0..labels.len())
            .filter(|&idx| counts[labels[idx]] > 1)
            .fold(None, |best: Option<usize>, idx| match best {
                Some(b) if distances[b] >= distances[idx] => Some(b),
                _ => Some(idx),
            });

        if let Some(idx) = donor {
            debug!("Relocating point {} to empty cluster {}", idx, empty);
            counts[labels[idx]] -= 1;
            labels[idx] = empty;
            counts[empty] = 1;
            distances[idx] = 0.0;
        }
    }
}

fn compute_centroids(points: &[Vec<f64>], labels: &[usize], k: usize) -> Vec<Vec<f64>> {
    let dimension = points[0].len();
    let mut sums = vec![vec![0.0; dimension]; k];
    let mut counts = vec![0usize; k];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (sum, value) in sums[label].iter_mut().zip(point) {
            *sum += value;
        }
    }

    for (sum, &count) in sums.iter_mut().zip(&counts) {
        if count > 0 {
            sum.iter_mut().for_each(|v| *v /= count as f64);
        }
    }
    sums
}

fn mean_column_variance(points: &[Vec<f64>]) -> f64 {
    let n = points.len() as f64;
    let dimension = points[0].len();
    if dimension == 0 {
        return 0.0;
    }

    let mut total = 0.0;
    for col in 0..dimension {
        let mean = points.iter().map(|p| p[col]).sum::<f64>() / n;
        total += points.iter().map(|p| (p[col] - mean).powi(2)).sum::<f64>() / n;
    }
    total / dimension as f64
}

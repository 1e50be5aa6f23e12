use rayon::prelude::*;

#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Full symmetric matrix of euclidean distances, row `i` holds the distances
/// from point `i` to every point.
pub fn pairwise_distances(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    points
        .par_iter()
        .map(|a| points.iter().map(|b| euclidean(a, b)).collect())
        .collect()
}

//! Silhouette coefficient.

use super::distance::euclidean;
use super::NOISE_LABEL;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Mean silhouette over all points, treating every label (noise included) as
/// a cluster.
///
/// Returns `None` when the score is undefined: fewer than 2 distinct labels
/// or as many labels as points. A point alone in its cluster scores 0.
pub fn silhouette_score(points: &[Vec<f64>], labels: &[i32]) -> Option<f64> {
    if points.len() != labels.len() {
        return None;
    }

    let mut members: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        members.entry(label).or_default().push(idx);
    }

    let n_labels = members.len();
    if n_labels < 2 || n_labels > points.len() - 1 {
        return None;
    }

    let scores: Vec<f64> = (0..points.len())
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            let own_members = &members[&own];
            if own_members.len() <= 1 {
                return 0.0;
            }

            let mut a = 0.0;
            let mut b = f64::INFINITY;
            for (&label, indices) in &members {
                let total: f64 = indices
                    .iter()
                    .filter(|&&j| j != i)
                    .map(|&j| euclidean(&points[i], &points[j]))
                    .sum();
                if label == own {
                    a = total / (indices.len() - 1) as f64;
                } else {
                    b = b.min(total / indices.len() as f64);
                }
            }

            let denominator = a.max(b);
            if denominator > 0.0 {
                (b - a) / denominator
            } else {
                0.0
            }
        })
        .collect();

    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Silhouette over the non-noise points only.
///
/// `None` unless at least two real clusters remain once noise is removed.
pub fn silhouette_excluding_noise(points: &[Vec<f64>], labels: &[i32]) -> Option<f64> {
    let (kept_points, kept_labels): (Vec<Vec<f64>>, Vec<i32>) = points
        .iter()
        .zip(labels)
        .filter(|(_, &label)| label != NOISE_LABEL)
        .map(|(point, &label)| (point.clone(), label))
        .unzip();

    silhouette_score(&kept_points, &kept_labels)
}

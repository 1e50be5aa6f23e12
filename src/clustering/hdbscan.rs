//! HDBSCAN: density-based hierarchical clustering with excess-of-mass
//! cluster selection.
//!
//! The pipeline is the textbook one:
//!
//! 1. core distance of every point (distance to its `min_samples`-th
//!    neighbour, the point itself included)
//! 2. mutual reachability graph and its minimum spanning tree (Prim)
//! 3. single-linkage hierarchy built from the sorted MST edges
//! 4. condensed tree, where splits smaller than `min_cluster_size` are
//!    points falling out of their parent
//! 5. excess-of-mass selection, never selecting the root
//! 6. optional epsilon merging of clusters born below the threshold
//!
//! Points that do not end up under a selected cluster get the noise label.

use super::distance::pairwise_distances;
use super::{ClusteringError, NOISE_LABEL};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::debug;

/// Resolved HDBSCAN parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HdbscanConfig {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub cluster_selection_epsilon: f64,
}

impl HdbscanConfig {
    pub fn new(min_cluster_size: usize) -> Self {
        Self {
            min_cluster_size,
            min_samples: min_cluster_size,
            cluster_selection_epsilon: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ClusteringError> {
        if self.min_cluster_size < 2 {
            return Err(ClusteringError::InvalidParameter(format!(
                "min_cluster_size must be at least 2, got {}",
                self.min_cluster_size
            )));
        }
        if self.min_samples < 1 {
            return Err(ClusteringError::InvalidParameter(
                "min_samples must be at least 1".to_string(),
            ));
        }
        if !self.cluster_selection_epsilon.is_finite() || self.cluster_selection_epsilon < 0.0 {
            return Err(ClusteringError::InvalidParameter(format!(
                "cluster_selection_epsilon must be a non-negative number, got {}",
                self.cluster_selection_epsilon
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HdbscanModel {
    /// Cluster labels in `[0, n_clusters)`, or `-1` for noise.
    pub labels: Vec<i32>,
    pub n_clusters: usize,
}

#[derive(Debug, Clone, Copy)]
struct LinkageNode {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CondensedEdge {
    parent: usize,
    child: usize,
    lambda: f64,
    child_size: usize,
}

pub fn fit_hdbscan(points: &[Vec<f64>], config: &HdbscanConfig) -> Result<HdbscanModel, ClusteringError> {
    config.validate()?;

    let n = points.len();
    if n < 2 {
        return Ok(HdbscanModel {
            labels: vec![NOISE_LABEL; n],
            n_clusters: 0,
        });
    }

    let distances = pairwise_distances(points);
    let core = core_distances(&distances, config.min_samples);
    let mst = minimum_spanning_tree(&distances, &core);
    let linkage = single_linkage(mst, n);
    let condensed = condense_tree(&linkage, n, config.min_cluster_size);
    let selected = select_clusters(&condensed, n, config.cluster_selection_epsilon);
    let labels = label_points(&condensed, n, &selected);

    debug!(
        "HDBSCAN condensed tree has {} edges, {} clusters selected",
        condensed.len(),
        selected.len()
    );

    Ok(HdbscanModel {
        labels,
        n_clusters: selected.len(),
    })
}

fn core_distances(distances: &[Vec<f64>], min_samples: usize) -> Vec<f64> {
    distances
        .par_iter()
        .map(|row| {
            let mut sorted = row.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            sorted[(min_samples - 1).min(sorted.len() - 1)]
        })
        .collect()
}

/// Prim's algorithm over the mutual reachability graph, computed lazily
/// from the raw distances and core distances.
fn minimum_spanning_tree(distances: &[Vec<f64>], core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = distances.len();
    let reach = |i: usize, j: usize| distances[i][j].max(core[i]).max(core[j]);

    let mut in_tree = vec![false; n];
    let mut min_dist = vec![f64::INFINITY; n];
    let mut min_edge = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    in_tree[0] = true;
    for j in 1..n {
        min_dist[j] = reach(0, j);
    }

    for _ in 1..n {
        let mut next = None;
        let mut best = f64::INFINITY;
        for j in 0..n {
            if !in_tree[j] && (next.is_none() || min_dist[j] < best) {
                best = min_dist[j];
                next = Some(j);
            }
        }
        let Some(next) = next else { break };

        in_tree[next] = true;
        edges.push((min_edge[next], next, best));

        for j in 0..n {
            if !in_tree[j] {
                let d = reach(next, j);
                if d < min_dist[j] {
                    min_dist[j] = d;
                    min_edge[j] = next;
                }
            }
        }
    }

    edges.sort_by(|a, b| a.2.total_cmp(&b.2));
    edges
}

/// Merge the sorted MST edges into a dendrogram. Node `n + i` is created by
/// the i-th edge; nodes below `n` are the points.
fn single_linkage(mst: Vec<(usize, usize, f64)>, n: usize) -> Vec<LinkageNode> {
    let mut parent: Vec<usize> = (0..2 * n - 1).collect();
    let mut size = vec![1usize; 2 * n - 1];

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut nodes = Vec::with_capacity(n - 1);
    for (idx, (a, b, distance)) in mst.into_iter().enumerate() {
        let left = find(&mut parent, a);
        let right = find(&mut parent, b);
        let node = n + idx;
        size[node] = size[left] + size[right];
        parent[left] = node;
        parent[right] = node;
        nodes.push(LinkageNode {
            left,
            right,
            distance,
            size: size[node],
        });
    }
    nodes
}

fn node_size(linkage: &[LinkageNode], n: usize, node: usize) -> usize {
    if node < n {
        1
    } else {
        linkage[node - n].size
    }
}

/// Every node of the dendrogram below (and including) `start`, top down.
fn descendants(linkage: &[LinkageNode], n: usize, start: usize) -> Vec<usize> {
    let mut order = Vec::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        order.push(node);
        if node >= n {
            let LinkageNode { left, right, .. } = linkage[node - n];
            queue.push_back(left);
            queue.push_back(right);
        }
    }
    order
}

fn lambda_for(distance: f64) -> f64 {
    if distance > 0.0 {
        (1.0 / distance).min(f64::MAX)
    } else {
        f64::MAX
    }
}

/// Collapse the dendrogram into the condensed tree. Cluster ids start at `n`
/// (the root) and grow in creation order.
fn condense_tree(linkage: &[LinkageNode], n: usize, min_cluster_size: usize) -> Vec<CondensedEdge> {
    let root = 2 * n - 2;
    let mut relabel = vec![0usize; 2 * n - 1];
    let mut ignore = vec![false; 2 * n - 1];
    let mut next_label = n + 1;
    relabel[root] = n;

    let mut edges = Vec::new();

    for node in descendants(linkage, n, root) {
        if ignore[node] || node < n {
            continue;
        }

        let LinkageNode {
            left,
            right,
            distance,
            ..
        } = linkage[node - n];
        let lambda = lambda_for(distance);
        let left_count = node_size(linkage, n, left);
        let right_count = node_size(linkage, n, right);
        let parent = relabel[node];

        let fall_out = |edges: &mut Vec<CondensedEdge>, ignore: &mut Vec<bool>, child: usize| {
            for sub in descendants(linkage, n, child) {
                if sub < n {
                    edges.push(CondensedEdge {
                        parent,
                        child: sub,
                        lambda,
                        child_size: 1,
                    });
                }
                ignore[sub] = true;
            }
        };

        match (left_count >= min_cluster_size, right_count >= min_cluster_size) {
            (true, true) => {
                for (child, count) in [(left, left_count), (right, right_count)] {
                    relabel[child] = next_label;
                    edges.push(CondensedEdge {
                        parent,
                        child: next_label,
                        lambda,
                        child_size: count,
                    });
                    next_label += 1;
                }
            }
            (false, false) => {
                fall_out(&mut edges, &mut ignore, left);
                fall_out(&mut edges, &mut ignore, right);
            }
            (false, true) => {
                relabel[right] = parent;
                fall_out(&mut edges, &mut ignore, left);
            }
            (true, false) => {
                relabel[left] = parent;
                fall_out(&mut edges, &mut ignore, right);
            }
        }
    }

    edges
}

/// Excess of mass stability of every condensed cluster.
fn stabilities(condensed: &[CondensedEdge], n: usize) -> BTreeMap<usize, f64> {
    let mut births: HashMap<usize, f64> = HashMap::from([(n, 0.0)]);
    for edge in condensed.iter().filter(|e| e.child >= n) {
        births.insert(edge.child, edge.lambda);
    }

    let mut stability: BTreeMap<usize, f64> = births.keys().map(|&c| (c, 0.0)).collect();
    for edge in condensed {
        let birth = births.get(&edge.parent).copied().unwrap_or(0.0);
        *stability.entry(edge.parent).or_insert(0.0) += (edge.lambda - birth) * edge.child_size as f64;
    }
    stability
}

/// Clusters of the condensed tree below `start`, excluding `start`.
fn cluster_descendants(children: &HashMap<usize, Vec<usize>>, start: usize) -> Vec<usize> {
    let mut found = Vec::new();
    let mut queue: VecDeque<usize> = children.get(&start).cloned().unwrap_or_default().into();
    while let Some(cluster) = queue.pop_front() {
        found.push(cluster);
        if let Some(grand) = children.get(&cluster) {
            queue.extend(grand.iter().copied());
        }
    }
    found
}

fn select_clusters(condensed: &[CondensedEdge], n: usize, epsilon: f64) -> BTreeSet<usize> {
    let mut stability = stabilities(condensed, n);

    let cluster_edges: Vec<&CondensedEdge> = condensed.iter().filter(|e| e.child_size > 1).collect();
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut parent_of: HashMap<usize, usize> = HashMap::new();
    let mut birth_lambda: HashMap<usize, f64> = HashMap::new();
    for edge in &cluster_edges {
        children.entry(edge.parent).or_default().push(edge.child);
        parent_of.insert(edge.child, edge.parent);
        birth_lambda.insert(edge.child, edge.lambda);
    }

    // Root excluded: a single all-encompassing cluster is never selected.
    let candidates: Vec<usize> = stability.keys().rev().copied().filter(|&c| c != n).collect();
    let mut is_cluster: BTreeMap<usize, bool> = candidates.iter().map(|&c| (c, true)).collect();

    for &node in &candidates {
        let subtree: f64 = children
            .get(&node)
            .map(|kids| kids.iter().map(|k| stability[k]).sum::<f64>())
            .unwrap_or(0.0);

        if subtree > stability[&node] {
            is_cluster.insert(node, false);
            stability.insert(node, subtree);
        } else {
            for sub in cluster_descendants(&children, node) {
                is_cluster.insert(sub, false);
            }
        }
    }

    let selected: BTreeSet<usize> = is_cluster
        .into_iter()
        .filter_map(|(cluster, keep)| keep.then_some(cluster))
        .collect();

    if epsilon > 0.0 && !cluster_edges.is_empty() {
        epsilon_merge(&selected, &children, &parent_of, &birth_lambda, n, epsilon)
    } else {
        selected
    }
}

/// Replace every selected cluster born below `epsilon` (as a distance) by
/// its closest ancestor that was born above it, stopping below the root.
///
/// The result never nests: a selected cluster that ends up under a merged
/// ancestor is dropped and its points take the ancestor's label. The
/// reference HDBSCAN implementation keeps such a cluster and labels points by
/// the deepest selection instead. Siblings share a birth distance, so the two
/// only differ when a selection was born exactly at `epsilon`.
fn epsilon_merge(
    selected: &BTreeSet<usize>,
    children: &HashMap<usize, Vec<usize>>,
    parent_of: &HashMap<usize, usize>,
    birth_lambda: &HashMap<usize, f64>,
    root: usize,
    epsilon: f64,
) -> BTreeSet<usize> {
    let birth_distance = |cluster: usize| 1.0 / birth_lambda[&cluster];

    let mut merged = BTreeSet::new();
    let mut processed = BTreeSet::new();

    for &leaf in selected {
        if birth_distance(leaf) >= epsilon {
            merged.insert(leaf);
            continue;
        }
        if processed.contains(&leaf) {
            continue;
        }

        let mut current = leaf;
        loop {
            let parent = parent_of[&current];
            if parent == root || birth_distance(parent) > epsilon {
                current = if parent == root { current } else { parent };
                break;
            }
            current = parent;
        }

        merged.insert(current);
        processed.extend(cluster_descendants(children, current));
    }

    // A leaf kept before its ancestor was picked would nest inside it.
    let nested: BTreeSet<usize> = merged
        .iter()
        .flat_map(|&cluster| cluster_descendants(children, cluster))
        .collect();
    merged.difference(&nested).copied().collect()
}

fn label_points(condensed: &[CondensedEdge], n: usize, selected: &BTreeSet<usize>) -> Vec<i32> {
    let label_of: HashMap<usize, i32> = selected
        .iter()
        .enumerate()
        .map(|(label, &cluster)| (cluster, label as i32))
        .collect();

    let mut parent_of: HashMap<usize, usize> = HashMap::with_capacity(condensed.len());
    for edge in condensed {
        parent_of.insert(edge.child, edge.parent);
    }

    (0..n)
        .map(|point| {
            let mut node = parent_of.get(&point).copied();
            while let Some(cluster) = node {
                if let Some(&label) = label_of.get(&cluster) {
                    return label;
                }
                node = parent_of.get(&cluster).copied();
            }
            NOISE_LABEL
        })
        .collect()
}

//! Embedding-space clustering and representative-segment selection.
//!
//! Given one vector per segment, a seeded k-means partitions the vectors
//! into K groups and the segment nearest each center stands in for its
//! whole group. The seed is fixed so repeated runs over identical input
//! produce identical selections; ties on distance break toward the lowest
//! segment index for the same reason.
//!
//! K can also be chosen automatically with an elbow sweep over candidate
//! counts — see [`auto_cluster_count`].

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chunker::Segment;

/// Seed for the k-means++ initialization. Fixed: selection must be
/// reproducible across runs on identical input.
pub const DEFAULT_SEED: u64 = 42;

const MAX_ITERATIONS: usize = 100;

/// Relative inertia improvement below which adding another cluster is not
/// worth it (the "knee" of the elbow sweep).
const KNEE_THRESHOLD: f64 = 0.1;

/// Result of one k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centers: Vec<Vec<f64>>,
    /// Cluster index per input vector.
    pub assignments: Vec<usize>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
}

/// Seeded k-means over fixed-dimension vectors.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    seed: u64,
}

impl KMeans {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            seed: DEFAULT_SEED,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit K centers to `vectors` with k-means++ initialization and Lloyd
    /// iterations.
    ///
    /// Callers must supply at least `k` vectors, all of the same
    /// dimensionality; [`select_representatives`] guards the count and the
    /// embedding layer guards the dimensions.
    #[must_use]
    pub fn fit(&self, vectors: &[Vec<f32>]) -> KMeansFit {
        debug_assert!(vectors.len() >= self.k, "need at least k vectors");

        let mut centers = self.initial_centers(vectors);
        let mut assignments = vec![0usize; vectors.len()];

        for iteration in 0..MAX_ITERATIONS {
            let mut changed = false;
            for (i, vector) in vectors.iter().enumerate() {
                let nearest = nearest_center(vector, &centers);
                if assignments[i] != nearest {
                    assignments[i] = nearest;
                    changed = true;
                }
            }
            if !changed && iteration > 0 {
                break;
            }

            // Recompute each center as the mean of its members; a cluster
            // that lost all members keeps its previous center.
            let dims = centers[0].len();
            let mut sums = vec![vec![0.0f64; dims]; self.k];
            let mut counts = vec![0usize; self.k];
            for (i, vector) in vectors.iter().enumerate() {
                counts[assignments[i]] += 1;
                for (d, value) in vector.iter().enumerate() {
                    sums[assignments[i]][d] += f64::from(*value);
                }
            }
            for (cluster, count) in counts.iter().enumerate() {
                if *count > 0 {
                    for value in &mut sums[cluster] {
                        *value /= *count as f64;
                    }
                    centers[cluster] = std::mem::take(&mut sums[cluster]);
                }
            }
        }

        let inertia = vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| squared_distance(vector, &centers[assignments[i]]))
            .sum();

        KMeansFit {
            centers,
            assignments,
            inertia,
        }
    }

    /// k-means++ seeding: first center uniform, each further center drawn
    /// proportionally to squared distance from the nearest existing one.
    fn initial_centers(&self, vectors: &[Vec<f32>]) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centers: Vec<Vec<f64>> = Vec::with_capacity(self.k);
        centers.push(widen(&vectors[rng.random_range(0..vectors.len())]));

        while centers.len() < self.k {
            let weights: Vec<f64> = vectors
                .iter()
                .map(|vector| {
                    centers
                        .iter()
                        .map(|center| squared_distance(vector, center))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = weights.iter().sum();

            let chosen = if total > 0.0 {
                let mut target = rng.random::<f64>() * total;
                let mut index = vectors.len() - 1;
                for (i, weight) in weights.iter().enumerate() {
                    if target <= *weight {
                        index = i;
                        break;
                    }
                    target -= weight;
                }
                index
            } else {
                // All vectors coincide with existing centers; any pick is
                // equivalent, so take the lowest unused index.
                weights.iter().position(|w| *w == 0.0).unwrap_or(0)
            };

            centers.push(widen(&vectors[chosen]));
        }

        centers
    }
}

fn widen(vector: &[f32]) -> Vec<f64> {
    vector.iter().copied().map(f64::from).collect()
}

fn squared_distance(a: &[f32], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = f64::from(*x) - y;
            diff * diff
        })
        .sum()
}

fn nearest_center(vector: &[f32], centers: &[Vec<f64>]) -> usize {
    let mut best = 0usize;
    let mut best_distance = f64::INFINITY;
    for (index, center) in centers.iter().enumerate() {
        let distance = squared_distance(vector, center);
        // Strict comparison keeps the lowest index on ties.
        if distance < best_distance {
            best_distance = distance;
            best = index;
        }
    }
    best
}

/// Pick one representative segment per cluster.
///
/// * Fewer segments than `k`: clustering is skipped and all segments come
///   back unchanged, in document order.
/// * Otherwise: k-means with the fixed seed; for each center the segment
///   whose vector lies nearest (ties to the lowest index) is selected.
///   Duplicates collapse, so the result has at most `k` distinct segments,
///   sorted by original document index.
#[must_use]
pub fn select_representatives(
    segments: Vec<Segment>,
    vectors: &[Vec<f32>],
    k: usize,
) -> Vec<Segment> {
    debug_assert_eq!(segments.len(), vectors.len());
    if segments.len() < k || k == 0 {
        return segments;
    }

    let fit = KMeans::new(k).fit(vectors);

    let mut selected: BTreeSet<usize> = BTreeSet::new();
    for center in &fit.centers {
        let mut best = 0usize;
        let mut best_distance = f64::INFINITY;
        for (index, vector) in vectors.iter().enumerate() {
            let distance = squared_distance(vector, center);
            if distance < best_distance {
                best_distance = distance;
                best = index;
            }
        }
        selected.insert(best);
    }

    segments
        .into_iter()
        .filter(|segment| selected.contains(&segment.index))
        .collect()
}

/// Inertia for each candidate cluster count `1..=max_k`.
#[must_use]
pub fn inertia_profile(vectors: &[Vec<f32>], max_k: usize) -> Vec<f64> {
    let max_k = max_k.min(vectors.len()).max(1);
    (1..=max_k)
        .map(|k| KMeans::new(k).fit(vectors).inertia)
        .collect()
}

/// Elbow heuristic: the smallest K after which the marginal inertia
/// reduction falls below the knee threshold.
///
/// Heuristic by nature — implementations may legitimately disagree by ±1
/// cluster, so callers should treat the result as a good default, not a
/// contract.
#[must_use]
pub fn auto_cluster_count(vectors: &[Vec<f32>], max_k: usize) -> usize {
    let profile = inertia_profile(vectors, max_k);

    for k in 1..profile.len() {
        let previous = profile[k - 1];
        if previous <= f64::EPSILON {
            return k;
        }
        let reduction = (previous - profile[k]) / previous;
        if reduction < KNEE_THRESHOLD {
            return k;
        }
    }
    profile.len()
}

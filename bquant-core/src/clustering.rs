//! K-means over a normalized numeric feature subset (§4.4 step 7).
//!
//! Deliberately small: this is the one optional, seeded piece of the pipeline
//! builder, not a general clustering library. Z-score normalization per
//! column, k-means++-free random initialization seeded from the pipeline's
//! `SeedHierarchy`, Lloyd's algorithm to a fixed iteration cap or until
//! assignments stop changing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone)]
pub struct KMeansResult {
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub sizes: Vec<usize>,
}

/// Runs k-means over `rows` (each a fixed-length numeric feature vector),
/// after per-column z-score normalization. Returns `None` if there are fewer
/// rows than `k` or any row's length disagrees with the rest.
pub fn kmeans(rows: &[Vec<f64>], k: usize, seed: u64) -> Option<KMeansResult> {
    if k == 0 || rows.len() < k {
        return None;
    }
    let dims = rows[0].len();
    if dims == 0 || rows.iter().any(|r| r.len() != dims) {
        return None;
    }

    let normalized = normalize_columns(rows, dims);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..normalized.len()).collect();
    indices.shuffle(&mut rng);
    let mut centroids: Vec<Vec<f64>> = indices[..k].iter().map(|&i| normalized[i].clone()).collect();

    let mut assignments = vec![0usize; normalized.len()];
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, row) in normalized.iter().enumerate() {
            let nearest = nearest_centroid(row, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (row, &cluster) in normalized.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for d in 0..dims {
                sums[cluster][d] += row[d];
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            for d in 0..dims {
                centroids[c][d] = sums[c][d] / counts[c] as f64;
            }
        }

        if !changed {
            break;
        }
    }

    let mut sizes = vec![0usize; k];
    for &a in &assignments {
        sizes[a] += 1;
    }

    Some(KMeansResult { assignments, centroids, sizes })
}

fn normalize_columns(rows: &[Vec<f64>], dims: usize) -> Vec<Vec<f64>> {
    let n = rows.len() as f64;
    let mut means = vec![0.0; dims];
    for row in rows {
        for d in 0..dims {
            means[d] += row[d];
        }
    }
    for m in &mut means {
        *m /= n;
    }

    let mut std_devs = vec![0.0; dims];
    for row in rows {
        for d in 0..dims {
            std_devs[d] += (row[d] - means[d]).powi(2);
        }
    }
    for s in &mut std_devs {
        *s = (*s / n).sqrt();
        if *s < 1e-12 {
            *s = 1.0;
        }
    }

    rows.iter()
        .map(|row| (0..dims).map(|d| (row[d] - means[d]) / std_devs[d]).collect())
        .collect()
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(row, c)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_obvious_clusters() {
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| if i < 10 { vec![0.0, 0.0] } else { vec![100.0, 100.0] })
            .collect();
        let result = kmeans(&rows, 2, 7).unwrap();
        let first_cluster = result.assignments[0];
        for &a in &result.assignments[..10] {
            assert_eq!(a, first_cluster);
        }
        let second_cluster = result.assignments[10];
        assert_ne!(first_cluster, second_cluster);
        for &a in &result.assignments[10..] {
            assert_eq!(a, second_cluster);
        }
    }

    #[test]
    fn deterministic_given_same_seed() {
        let rows: Vec<Vec<f64>> = (0..12).map(|i| vec![(i % 4) as f64, (i % 3) as f64]).collect();
        let a = kmeans(&rows, 3, 99).unwrap();
        let b = kmeans(&rows, 3, 99).unwrap();
        assert_eq!(a.assignments, b.assignments);
    }

    #[test]
    fn fewer_rows_than_k_returns_none() {
        let rows = vec![vec![1.0, 2.0]];
        assert!(kmeans(&rows, 3, 1).is_none());
    }
}

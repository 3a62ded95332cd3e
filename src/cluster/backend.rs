// Partitioning backends.
//
// The engine only needs "give me k labels for these vectors, reproducibly
// for this seed". KMeans is the default: linfa's k-means++ seeding and
// Lloyd iterations, restarted `n_runs` times with the lowest-inertia run
// kept. The RNG is seeded by the caller, so the same input and seed always
// produce the same labels.

use std::collections::HashSet;

use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans as LinfaKMeans;
use ndarray::{Array1, Array2};
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use tracing::debug;

use crate::vector::VectorError;

/// A swappable partitioning algorithm.
pub trait ClusterBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Assign each vector a label in `0..k`. Labels are only meaningful
    /// relative to each other. Must be deterministic for a given seed.
    fn partition(&self, vectors: &[Vec<f64>], k: usize, seed: u64)
        -> Result<Vec<usize>, VectorError>;
}

/// k-means with k-means++ initialization and restarts.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_runs: usize,
    pub max_iter: u64,
    /// Stop once inertia improves by less than this between iterations.
    pub tolerance: f64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            n_runs: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

impl ClusterBackend for KMeans {
    fn name(&self) -> &str {
        "kmeans"
    }

    fn partition(
        &self,
        vectors: &[Vec<f64>],
        k: usize,
        seed: u64,
    ) -> Result<Vec<usize>, VectorError> {
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };
        let dim = first.len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                found: bad.len(),
            });
        }

        // k-means++ needs a fresh point for every center it draws
        let k = k.clamp(1, distinct_points(vectors));
        if k == 1 || dim == 0 {
            return Ok(vec![0; vectors.len()]);
        }

        let records = Array2::from_shape_vec(
            (vectors.len(), dim),
            vectors.iter().flatten().copied().collect(),
        )
        .map_err(|e| VectorError::Clustering(e.to_string()))?;
        let dataset = DatasetBase::from(records.clone());

        let model = LinfaKMeans::params_with_rng(k, Xoshiro256Plus::seed_from_u64(seed))
            .n_runs(self.n_runs.max(1))
            .max_n_iterations(self.max_iter)
            .tolerance(self.tolerance)
            .fit(&dataset)
            .map_err(|e| VectorError::Clustering(e.to_string()))?;

        let labels: Array1<usize> = model.predict(&records);
        debug!(k, points = vectors.len(), "k-means fit finished");
        Ok(labels.to_vec())
    }
}

/// Number of distinct points, compared bit for bit.
fn distinct_points(vectors: &[Vec<f64>]) -> usize {
    vectors
        .iter()
        .map(|v| v.iter().map(|x| x.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ]
    }

    #[test]
    fn test_separates_obvious_blobs() {
        let labels = KMeans::default().partition(&blobs(), 2, 42).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_same_seed_same_labels() {
        let km = KMeans::default();
        let a = km.partition(&blobs(), 3, 7).unwrap();
        let b = km.partition(&blobs(), 3, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input() {
        assert!(KMeans::default().partition(&[], 3, 42).unwrap().is_empty());
    }

    #[test]
    fn test_k_larger_than_n_is_capped() {
        let labels = KMeans::default()
            .partition(&[vec![1.0], vec![2.0]], 5, 42)
            .unwrap();
        assert!(labels.iter().all(|&l| l < 2));
    }

    #[test]
    fn test_identical_points_share_one_label() {
        let vectors = vec![vec![1.0, 1.0]; 4];
        let labels = KMeans::default().partition(&vectors, 2, 42).unwrap();
        assert_eq!(labels, vec![0; 4]);
    }

    #[test]
    fn test_distinct_points() {
        assert_eq!(distinct_points(&[vec![1.0], vec![1.0], vec![2.0]]), 2);
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let err = KMeans::default()
            .partition(&[vec![1.0, 0.0], vec![1.0]], 2, 42)
            .unwrap_err();
        assert_eq!(
            err,
            VectorError::DimensionMismatch {
                expected: 2,
                found: 1
            }
        );
    }
}

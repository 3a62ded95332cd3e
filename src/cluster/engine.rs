// Cluster policy: pick k, run the backend with a fixed seed, and turn raw
// labels into stable cluster ids with summaries.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::db::models::{ClusterAssignment, ClusterSummary};
use crate::vector::VectorError;

use super::backend::{ClusterBackend, KMeans};

pub const DEFAULT_CLUSTER_SEED: u64 = 42;

const MIN_CLUSTERS: usize = 2;
const MAX_CLUSTERS: usize = 5;

/// Cluster count for `n` pages: round(sqrt(n)) clamped to [2, 5], and never
/// more than `n`.
pub fn choose_k(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let k = ((n as f64).sqrt().round() as usize).clamp(MIN_CLUSTERS, MAX_CLUSTERS);
    k.min(n)
}

/// Assignments plus one summary per cluster, ordered by cluster id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterOutput {
    pub k: usize,
    pub assignments: Vec<ClusterAssignment>,
    pub summaries: Vec<ClusterSummary>,
    /// Pages left out because their embedding dimension didn't match.
    pub skipped_pages: usize,
}

pub struct ClusterEngine {
    backend: Arc<dyn ClusterBackend>,
    seed: u64,
}

impl ClusterEngine {
    pub fn new(backend: Arc<dyn ClusterBackend>, seed: u64) -> Self {
        Self { backend, seed }
    }

    /// The default k-means backend.
    pub fn kmeans(seed: u64) -> Self {
        Self::new(Arc::new(KMeans::default()), seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Cluster `(url, embedding)` pairs, returning one assignment per input
    /// in input order.
    pub fn cluster_assign(
        &self,
        items: &[(String, Vec<f64>)],
    ) -> Result<Vec<ClusterAssignment>, VectorError> {
        Ok(self.cluster(items)?.assignments)
    }

    /// Like `cluster_assign`, with per-cluster summaries.
    ///
    /// Cluster ids are renumbered by first appearance, so the first input
    /// is always in cluster 0 whatever the backend's raw labels were.
    pub fn cluster(&self, items: &[(String, Vec<f64>)]) -> Result<ClusterOutput, VectorError> {
        let k = choose_k(items.len());
        if k == 0 {
            return Ok(ClusterOutput::default());
        }

        let vectors: Vec<Vec<f64>> = items.iter().map(|(_, v)| v.clone()).collect();
        let raw = self.backend.partition(&vectors, k, self.seed)?;

        let mut remap: HashMap<usize, usize> = HashMap::new();
        let assignments: Vec<ClusterAssignment> = items
            .iter()
            .zip(raw)
            .map(|((url, _), label)| {
                let next = remap.len();
                let cluster_id = *remap.entry(label).or_insert(next);
                ClusterAssignment {
                    url: url.clone(),
                    cluster_id,
                }
            })
            .collect();

        let mut summaries: Vec<ClusterSummary> = (0..remap.len())
            .map(|cluster_id| ClusterSummary {
                cluster_id,
                label: format!("Cluster {cluster_id}"),
                page_count: 0,
                urls: Vec::new(),
            })
            .collect();
        for a in &assignments {
            let summary = &mut summaries[a.cluster_id];
            summary.page_count += 1;
            summary.urls.push(a.url.clone());
        }

        info!(
            backend = self.backend.name(),
            pages = items.len(),
            k,
            clusters = summaries.len(),
            seed = self.seed,
            "Clustering complete"
        );

        Ok(ClusterOutput {
            k,
            assignments,
            summaries,
            skipped_pages: 0,
        })
    }
}

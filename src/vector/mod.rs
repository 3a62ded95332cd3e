// Vector math: fixed-dimension embedding comparisons.
//
// Everything downstream (conflict detection, content scoring, clustering)
// compares embeddings through these functions, so the sentinel rules live
// here: empty or zero-norm inputs compare as 0.0, unequal non-empty
// dimensions are a DimensionMismatch.

pub mod error;
pub mod math;

pub use error::VectorError;
pub use math::{
    average_similarity_to_cluster, batch_threshold_search, centroid, cosine_similarity,
    k_nearest_neighbors, l2_distance, normalize, Neighbor,
};

/// An embedding vector. All vectors compared with one another must share
/// the deployment's fixed dimension; the all-zero vector means "no content".
pub type Embedding = Vec<f64>;

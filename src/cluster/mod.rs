// Topical clustering of a site's pages.
//
// `engine` owns the policy (how many clusters, which seed, stable labels);
// `backend` owns the partitioning algorithm behind the ClusterBackend trait.

pub mod backend;
pub mod engine;

pub use backend::{ClusterBackend, KMeans};
pub use engine::{choose_k, ClusterEngine, ClusterOutput, DEFAULT_CLUSTER_SEED};

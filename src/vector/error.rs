// Error taxonomy for vector operations.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorError {
    /// Two non-empty vectors of different lengths were compared.
    #[error("vector dimensions must match: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// An operation that needs at least one vector was given none.
    #[error("cannot compute over an empty set of vectors")]
    EmptyInput,

    /// The partitioning backend rejected its input or failed to converge.
    #[error("clustering failed: {0}")]
    Clustering(String),
}

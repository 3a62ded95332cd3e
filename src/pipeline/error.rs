use thiserror::Error;

use crate::vector::VectorError;

/// Failures of an analysis pass.
///
/// A missing competitor set is not here: it yields the neutral score.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A store could not be read or written. Safe to retry the whole pass.
    #[error("{store} unavailable: {source:#}")]
    StoreUnavailable {
        store: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error("embedding failed: {0:#}")]
    Embedding(#[source] anyhow::Error),

    /// The pass was aborted before its results were applied.
    #[error("analysis interrupted: {0}")]
    Interrupted(String),
}

impl AnalysisError {
    pub fn unavailable(store: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::StoreUnavailable {
            store,
            source: source.into(),
        }
    }

    /// Whether rerunning the same pass could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. } | Self::Interrupted(_))
    }
}

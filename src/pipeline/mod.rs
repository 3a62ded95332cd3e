// Per-site analysis passes.
//
// Each pass reads a snapshot through the store traits, runs the pure core
// (conflict detection, scoring, clustering), and writes the results back.
// Passes that delete-then-rebuild a site's rows hold that site's lock for
// the whole read-compute-write sequence.

pub mod cannibalization;
pub mod clustering;
pub mod content;
pub mod embed;
pub mod error;
pub mod site_lock;

pub use error::AnalysisError;
pub use site_lock::SiteLocks;

use crate::scoring::PersistenceStatus;

/// A pass result plus whether it reached the result sink.
#[derive(Debug, Clone)]
pub struct Analyzed<T> {
    pub result: T,
    pub persistence: PersistenceStatus,
}

impl<T> Analyzed<T> {
    pub fn is_persisted(&self) -> bool {
        matches!(self.persistence, PersistenceStatus::Persisted)
    }
}

/// Turn a write-back result into a persistence status, logging failures.
pub(crate) fn persistence_of(site_id: &str, what: &str, write: anyhow::Result<()>) -> PersistenceStatus {
    match write {
        Ok(()) => PersistenceStatus::Persisted,
        Err(e) => {
            tracing::warn!(site_id, what, error = %e, "Results computed but write-back failed");
            PersistenceStatus::ComputedButNotPersisted {
                reason: format!("{e:#}"),
            }
        }
    }
}

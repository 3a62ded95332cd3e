// Topical clustering for one site.
//
// The partitioning runs as one blocking unit. If it doesn't finish, nothing
// is written: the previous clustering stays in place until a rerun
// succeeds. Assignments and summaries are replaced in one transaction.
//
// Pages whose embedding dimension differs from the site's majority are left
// out of the partition and counted, not treated as fatal.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cluster::{ClusterEngine, ClusterOutput};
use crate::db::traits::{PageSource, ResultSink};

use super::{persistence_of, AnalysisError, Analyzed, SiteLocks};

pub async fn run(
    source: &dyn PageSource,
    sink: &dyn ResultSink,
    locks: &SiteLocks,
    engine: Arc<ClusterEngine>,
    site_id: &str,
) -> Result<Analyzed<ClusterOutput>, AnalysisError> {
    let _guard = locks.acquire(site_id).await;

    let pages = source
        .fetch_pages(site_id)
        .await
        .map_err(|e| AnalysisError::unavailable("page source", e))?;

    let embedded: Vec<(String, Vec<f64>)> = pages
        .into_iter()
        .filter_map(|p| Some((p.url, p.embedding?)))
        .collect();
    let (items, skipped_pages) = drop_mismatched(site_id, embedded);

    if items.is_empty() {
        warn!(site_id, "No embedded pages to cluster");
    }
    info!(site_id, pages = items.len(), "Starting clustering");

    let mut output = tokio::task::spawn_blocking(move || engine.cluster(&items))
        .await
        .map_err(|e| AnalysisError::Interrupted(format!("clustering task: {e}")))??;
    output.skipped_pages = skipped_pages;

    let write = sink
        .replace_clusters(site_id, &output.assignments, &output.summaries)
        .await;
    let persistence = persistence_of(site_id, "clusters", write);

    Ok(Analyzed {
        result: output,
        persistence,
    })
}

/// Keep pages whose embedding has the most common dimension. Ties go to the
/// larger dimension.
fn drop_mismatched(
    site_id: &str,
    items: Vec<(String, Vec<f64>)>,
) -> (Vec<(String, Vec<f64>)>, usize) {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for (_, embedding) in &items {
        *counts.entry(embedding.len()).or_default() += 1;
    }
    let Some(dimension) = counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(dim, _)| *dim)
    else {
        return (items, 0);
    };

    let total = items.len();
    let kept: Vec<_> = items
        .into_iter()
        .filter(|(url, embedding)| {
            let ok = embedding.len() == dimension;
            if !ok {
                warn!(
                    site_id,
                    url = %url,
                    expected = dimension,
                    found = embedding.len(),
                    "Skipping page with mismatched embedding dimension"
                );
            }
            ok
        })
        .collect();
    let skipped = total - kept.len();
    (kept, skipped)
}

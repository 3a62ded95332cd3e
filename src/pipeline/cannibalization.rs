// Conflict-graph rebuild for one site.
//
// 1. Take the site's writer lock
// 2. Fetch the page snapshot
// 3. Detect conflicts off the async runtime
// 4. Replace the site's conflict edges, then update page statuses
//
// The replace is a single delete-then-insert transaction, so rerunning the
// pass after any failure converges to the same state.

use std::sync::Arc;

use tracing::info;

use crate::cannibalization::{detect_conflicts_sharded, CannibalizationReport};
use crate::db::models::PageResult;
use crate::db::traits::{PageSource, ResultSink};

use super::{persistence_of, AnalysisError, Analyzed, SiteLocks};

pub async fn run(
    source: &dyn PageSource,
    sink: &dyn ResultSink,
    locks: &SiteLocks,
    site_id: &str,
    threshold: f64,
    shards: usize,
) -> Result<Analyzed<CannibalizationReport>, AnalysisError> {
    let _guard = locks.acquire(site_id).await;

    let pages = source
        .fetch_pages(site_id)
        .await
        .map_err(|e| AnalysisError::unavailable("page source", e))?;
    info!(site_id, pages = pages.len(), threshold, "Starting cannibalization analysis");

    let pages = Arc::new(pages);
    let report = {
        let pages = Arc::clone(&pages);
        tokio::task::spawn_blocking(move || detect_conflicts_sharded(&pages, threshold, shards))
            .await
            .map_err(|e| AnalysisError::Interrupted(format!("conflict detection task: {e}")))?
    };

    let statuses: Vec<PageResult> = report
        .statuses
        .iter()
        .map(|(url, status)| PageResult {
            site_id: site_id.to_string(),
            url: url.clone(),
            cannibalization_status: Some(*status),
            ..Default::default()
        })
        .collect();

    let write = async {
        sink.replace_conflicts(site_id, &report.edges).await?;
        sink.save_page_results(&statuses).await
    };
    let persistence = persistence_of(site_id, "conflicts", write.await);

    Ok(Analyzed {
        result: report,
        persistence,
    })
}

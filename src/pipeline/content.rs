// Content scoring pass: score every page that has content and a keyword.
//
// Pages are independent, so they're scored concurrently with
// `buffer_unordered`. Each page embeds its content, pulls competitors for
// its keyword, and writes its own result. One page failing doesn't stop
// the rest.

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::db::traits::{PageSource, ResultSink};
use crate::scoring::{ContentScorer, ScoreOutcome};

use super::AnalysisError;

/// Outcomes of one scoring pass.
#[derive(Debug, Default)]
pub struct ScoringRun {
    /// Scored pages, sorted by URL.
    pub outcomes: Vec<ScoreOutcome>,
    /// Pages that couldn't be scored, with the reason.
    pub failures: Vec<(String, String)>,
    /// Pages without content or keyword.
    pub skipped: usize,
}

impl ScoringRun {
    pub fn unpersisted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.persistence, crate::scoring::PersistenceStatus::Persisted))
            .count()
    }
}

pub async fn run(
    source: &dyn PageSource,
    sink: &dyn ResultSink,
    scorer: &ContentScorer,
    site_id: &str,
    concurrency: usize,
    show_progress: bool,
) -> Result<ScoringRun, AnalysisError> {
    let pages = source
        .fetch_pages(site_id)
        .await
        .map_err(|e| AnalysisError::unavailable("page source", e))?;

    let total = pages.len();
    let work: Vec<(String, String, String)> = pages
        .into_iter()
        .filter_map(|p| Some((p.url, p.content?, p.target_keyword?)))
        .collect();
    let skipped = total - work.len();

    info!(site_id, pages = work.len(), skipped, concurrency, "Scoring page content");

    let pb = if show_progress {
        let pb = ProgressBar::new(work.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Scoring [{bar:30}] {pos}/{len} ({eta})")
                .expect("valid template"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let results: Vec<(String, Result<ScoreOutcome, AnalysisError>)> =
        stream::iter(work.into_iter().map(|(url, content, keyword)| {
            let pb = &pb;
            async move {
                let result = scorer
                    .score_page(sink, site_id, &url, &content, &keyword)
                    .await;
                pb.inc(1);
                (url, result)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    pb.finish_and_clear();

    let mut run = ScoringRun {
        skipped,
        ..Default::default()
    };
    for (url, result) in results {
        match result {
            Ok(outcome) => run.outcomes.push(outcome),
            Err(e) => {
                warn!(url, error = %e, "Failed to score page, skipping");
                run.failures.push((url, e.to_string()));
            }
        }
    }
    run.outcomes.sort_by(|a, b| a.url.cmp(&b.url));
    run.failures.sort();

    info!(
        site_id,
        scored = run.outcomes.len(),
        failed = run.failures.len(),
        "Content scoring complete"
    );

    Ok(run)
}

// Embedding backfill: embed every page that has content but no vector.
//
// Texts go to the provider in batches. Every returned vector must have the
// configured dimension; a provider that disagrees stops the pass before
// anything inconsistent is stored.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::db::Database;
use crate::embeddings::EmbeddingProvider;
use crate::vector::VectorError;

use super::AnalysisError;

const BATCH_SIZE: usize = 32;

/// Embed pages missing an embedding. Returns how many were stored.
pub async fn run(
    db: &dyn Database,
    embedder: &dyn EmbeddingProvider,
    site_id: &str,
    dimension: usize,
    show_progress: bool,
) -> Result<usize, AnalysisError> {
    if embedder.dimension() != dimension {
        return Err(VectorError::DimensionMismatch {
            expected: dimension,
            found: embedder.dimension(),
        }
        .into());
    }

    let pages = db
        .fetch_pages(site_id)
        .await
        .map_err(|e| AnalysisError::unavailable("page source", e))?;

    let pending: Vec<(String, String)> = pages
        .into_iter()
        .filter(|p| p.embedding.is_none())
        .filter_map(|p| Some((p.url, p.content?)))
        .collect();

    info!(site_id, pending = pending.len(), "Backfilling embeddings");

    let pb = if show_progress {
        let pb = ProgressBar::new(pending.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Embedding [{bar:30}] {pos}/{len} ({eta})")
                .expect("valid template"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut stored = 0;
    for batch in pending.chunks(BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .await
            .map_err(AnalysisError::Embedding)?;

        for ((url, _), vector) in batch.iter().zip(&vectors) {
            if vector.len() != dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: dimension,
                    found: vector.len(),
                }
                .into());
            }
            db.save_page_embedding(site_id, url, vector)
                .await
                .map_err(|e| AnalysisError::unavailable("result sink", e))?;
            stored += 1;
        }
        pb.inc(batch.len() as u64);
    }

    pb.finish_and_clear();
    info!(site_id, stored, "Embedding backfill complete");
    Ok(stored)
}

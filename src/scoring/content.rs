// Competitive alignment: how close a page's content sits to the pages
// already ranking for its keyword.
//
// The top-ranking competitors' embeddings are averaged into an "ideal"
// profile. The page's score is its cosine similarity to that centroid,
// x100 and rounded to two decimals. With no competitor data the score is
// the neutral 50.0.
//
// This is independent of the composite score; it measures alignment only.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::db::models::PageResult;
use crate::db::traits::{CompetitorSource, ResultSink};
use crate::embeddings::EmbeddingProvider;
use crate::pipeline::AnalysisError;
use crate::vector::{centroid, cosine_similarity, VectorError};

use super::depth::content_depth;

/// Score reported when there is nothing to compare against.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Default number of competitors pulled per keyword.
pub const DEFAULT_COMPETITOR_LIMIT: usize = 10;

/// A computed alignment score and how many competitors fed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentScore {
    pub score: f64,
    pub competitor_count: usize,
}

/// Whether a computed score made it to the result sink.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceStatus {
    Persisted,
    /// The score is valid but the write failed; the caller still gets it.
    ComputedButNotPersisted { reason: String },
}

/// Result of scoring one page end to end.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub url: String,
    pub score: f64,
    pub depth: f64,
    pub competitor_count: usize,
    pub persistence: PersistenceStatus,
}

/// Score an embedding against competitor embeddings.
///
/// Returns the neutral score when `competitors` is empty. A competitor set
/// of mixed dimensions, or one that doesn't match the content, is an error.
pub fn alignment_score(content_embedding: &[f64], competitors: &[Vec<f64>]) -> Result<f64, VectorError> {
    if competitors.is_empty() {
        return Ok(NEUTRAL_SCORE);
    }
    let ideal = centroid(competitors)?;
    let similarity = cosine_similarity(content_embedding, &ideal)?;
    Ok(round2(similarity * 100.0))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Scores page content against ranking competitors.
///
/// Holds its collaborators explicitly: the embedding provider is injected,
/// never a process-wide model.
pub struct ContentScorer {
    embedder: Arc<dyn EmbeddingProvider>,
    competitors: Arc<dyn CompetitorSource>,
    competitor_limit: usize,
}

impl ContentScorer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        competitors: Arc<dyn CompetitorSource>,
        competitor_limit: usize,
    ) -> Self {
        Self {
            embedder,
            competitors,
            competitor_limit,
        }
    }

    /// Embed `content` and score it against `competitor_embeddings`.
    pub async fn content_score(
        &self,
        content: &str,
        target_keyword: &str,
        competitor_embeddings: &[Vec<f64>],
    ) -> Result<ContentScore, AnalysisError> {
        let embedding = self
            .embedder
            .embed(content)
            .await
            .map_err(AnalysisError::Embedding)?;

        if competitor_embeddings.is_empty() {
            warn!(keyword = target_keyword, "No SERP data for keyword, using neutral score");
        }

        let score = alignment_score(&embedding, competitor_embeddings)?;
        Ok(ContentScore {
            score,
            competitor_count: competitor_embeddings.len(),
        })
    }

    /// Look up competitors for the keyword, then score.
    pub async fn score_for_keyword(
        &self,
        content: &str,
        target_keyword: &str,
    ) -> Result<ContentScore, AnalysisError> {
        let competitors = self
            .competitors
            .top_competitor_embeddings(target_keyword, self.competitor_limit)
            .await
            .map_err(|e| AnalysisError::unavailable("competitor source", e))?;
        self.content_score(content, target_keyword, &competitors).await
    }

    /// Score a page and write the result back.
    ///
    /// A failed write doesn't lose the score: it comes back with
    /// `ComputedButNotPersisted` instead of an error.
    pub async fn score_page(
        &self,
        sink: &dyn ResultSink,
        site_id: &str,
        url: &str,
        content: &str,
        target_keyword: &str,
    ) -> Result<ScoreOutcome, AnalysisError> {
        let computed = self.score_for_keyword(content, target_keyword).await?;
        let depth = content_depth(content);

        info!(url, keyword = target_keyword, score = computed.score, "Content score calculated");

        let write = PageResult {
            site_id: site_id.to_string(),
            url: url.to_string(),
            content_score: Some(computed.score),
            content_depth: Some(depth),
            competitor_count: Some(computed.competitor_count as u32),
            cannibalization_status: None,
        };

        let persistence = match sink.save_page_results(std::slice::from_ref(&write)).await {
            Ok(()) => PersistenceStatus::Persisted,
            Err(e) => {
                warn!(url, error = %e, "Score computed but write-back failed");
                PersistenceStatus::ComputedButNotPersisted {
                    reason: format!("{e:#}"),
                }
            }
        };

        Ok(ScoreOutcome {
            url: url.to_string(),
            score: computed.score,
            depth,
            competitor_count: computed.competitor_count,
            persistence,
        })
    }
}

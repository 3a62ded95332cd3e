// Composition tests: the analysis passes end to end against in-memory
// SQLite, with a deterministic embedding provider standing in for the
// model. No network or filesystem access.
//
//   import -> embed -> cannibalization -> score -> cluster -> report

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use apexseo::cluster::ClusterEngine;
use apexseo::db::models::{
    CannibalizationStatus, ClusterAssignment, ClusterSummary, ConflictEdge, PageRecord,
    PageResult, SerpResult,
};
use apexseo::db::{CompetitorSource, Database, PageSource, ResultSink, SqliteDatabase};
use apexseo::embeddings::EmbeddingProvider;
use apexseo::pipeline::{self, AnalysisError, SiteLocks};
use apexseo::scoring::{ContentScorer, PersistenceStatus};

const SITE: &str = "ex.com";

/// Embeds known texts to fixed vectors; anything else maps to zeros.
struct TableEmbedder {
    table: HashMap<String, Vec<f64>>,
}

impl TableEmbedder {
    fn new(entries: &[(&str, Vec<f64>)]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    fn dimension(&self) -> usize {
        3
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        Ok(self.table.get(text).cloned().unwrap_or_else(|| vec![0.0; 3]))
    }
}

/// A sink whose page writes always fail; conflict and cluster writes pass
/// through.
struct FlakySink(Arc<SqliteDatabase>);

#[async_trait]
impl ResultSink for FlakySink {
    async fn save_page_results(&self, _results: &[PageResult]) -> Result<()> {
        anyhow::bail!("database is locked")
    }

    async fn replace_conflicts(&self, site_id: &str, edges: &[ConflictEdge]) -> Result<()> {
        self.0.replace_conflicts(site_id, edges).await
    }

    async fn replace_clusters(
        &self,
        site_id: &str,
        assignments: &[ClusterAssignment],
        summaries: &[ClusterSummary],
    ) -> Result<()> {
        self.0.replace_clusters(site_id, assignments, summaries).await
    }
}

struct DownSource;

#[async_trait]
impl PageSource for DownSource {
    async fn fetch_pages(&self, _site_id: &str) -> Result<Vec<PageRecord>> {
        anyhow::bail!("connection refused")
    }
}

fn page(slug: &str, keyword: &str, content: &str, embedding: Option<Vec<f64>>) -> PageRecord {
    PageRecord {
        id: format!("{SITE}/{slug}"),
        url: format!("https://{SITE}/{slug}"),
        embedding,
        target_keyword: Some(keyword.to_string()),
        content: Some(content.to_string()),
    }
}

/// Two near-duplicate pages on different keywords, one same-keyword twin,
/// and one unrelated page.
async fn seeded_db() -> Arc<SqliteDatabase> {
    let db = Arc::new(SqliteDatabase::in_memory().unwrap());
    let pages = [
        page("running-shoes", "running shoes", "best running shoes", Some(vec![1.0, 0.1, 0.0])),
        page("jogging-shoes", "jogging shoes", "top jogging shoes", Some(vec![1.0, 0.12, 0.0])),
        page("shoe-care", "shoe care", "how to clean shoes", Some(vec![0.0, 0.0, 1.0])),
        page("running-shoes-2", "running shoes", "running shoes guide", Some(vec![1.0, 0.1, 0.0])),
    ];
    for p in &pages {
        db.upsert_page(SITE, p).await.unwrap();
    }
    for (position, embedding) in [(1, vec![1.0, 0.0, 0.0]), (2, vec![0.0, 1.0, 0.0])] {
        db.upsert_serp_result(&SerpResult {
            keyword: "running shoes".to_string(),
            position,
            page_url: format!("https://competitor{position}.com/"),
            embedding,
        })
        .await
        .unwrap();
    }
    db
}

fn scorer(db: &Arc<SqliteDatabase>) -> ContentScorer {
    let embedder = TableEmbedder::new(&[
        ("best running shoes", vec![1.0, 1.0, 0.0]),
        ("running shoes guide", vec![1.0, 0.0, 0.0]),
    ]);
    let competitors: Arc<dyn CompetitorSource> = db.clone();
    ContentScorer::new(Arc::new(embedder), competitors, 10)
}

// ============================================================
// Cannibalization rebuild
// ============================================================

#[tokio::test]
async fn cannibalization_pass_persists_edges_and_statuses() {
    let db = seeded_db().await;
    let locks = SiteLocks::new();

    let analyzed = pipeline::cannibalization::run(db.as_ref(), db.as_ref(), &locks, SITE, 0.85, 2)
        .await
        .unwrap();
    assert!(analyzed.is_persisted());

    // jogging-shoes conflicts with both running-shoes pages; the two
    // running-shoes pages share a keyword and don't conflict with each other
    assert_eq!(analyzed.result.total_conflicts, 2);
    assert_eq!(analyzed.result.pages_analyzed, 4);

    let stored = db.get_conflicts(SITE).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|e| e.keyword_a != e.keyword_b));

    let summaries = db.get_page_summaries(SITE).await.unwrap();
    let status = |slug: &str| {
        summaries
            .iter()
            .find(|s| s.url.ends_with(&format!("/{slug}")))
            .and_then(|s| s.cannibalization_status)
    };
    assert_eq!(status("jogging-shoes"), Some(CannibalizationStatus::Conflict));
    assert_eq!(status("running-shoes"), Some(CannibalizationStatus::Conflict));
    assert_eq!(status("shoe-care"), Some(CannibalizationStatus::Ok));
}

#[tokio::test]
async fn cannibalization_rerun_replaces_previous_edges() {
    let db = seeded_db().await;
    let locks = SiteLocks::new();

    pipeline::cannibalization::run(db.as_ref(), db.as_ref(), &locks, SITE, 0.85, 1)
        .await
        .unwrap();
    pipeline::cannibalization::run(db.as_ref(), db.as_ref(), &locks, SITE, 0.85, 1)
        .await
        .unwrap();
    assert_eq!(db.get_conflicts(SITE).await.unwrap().len(), 2);

    // A stricter threshold rebuilds from scratch
    pipeline::cannibalization::run(db.as_ref(), db.as_ref(), &locks, SITE, 0.99999, 1)
        .await
        .unwrap();
    assert!(db.get_conflicts(SITE).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_rebuilds_of_one_site_converge() {
    let db = seeded_db().await;
    let locks = Arc::new(SiteLocks::new());

    let runs = (0..4).map(|_| {
        let db = db.clone();
        let locks = locks.clone();
        tokio::spawn(async move {
            pipeline::cannibalization::run(db.as_ref(), db.as_ref(), &locks, SITE, 0.85, 2)
                .await
                .map(|a| a.result.total_conflicts)
        })
    });
    for run in futures::future::join_all(runs).await {
        assert_eq!(run.unwrap().unwrap(), 2);
    }
    assert_eq!(db.get_conflicts(SITE).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unavailable_page_source_is_retryable() {
    let db = seeded_db().await;
    let err = pipeline::cannibalization::run(&DownSource, db.as_ref(), &SiteLocks::new(), SITE, 0.85, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::StoreUnavailable { .. }));
    assert!(err.is_retryable());
}

// ============================================================
// Content scoring
// ============================================================

#[tokio::test]
async fn score_pass_writes_scores_and_depth() {
    let db = seeded_db().await;
    let scorer = scorer(&db);

    let run = pipeline::content::run(db.as_ref(), db.as_ref(), &scorer, SITE, 4, false)
        .await
        .unwrap();
    assert_eq!(run.outcomes.len(), 4);
    assert!(run.failures.is_empty());
    assert_eq!(run.unpersisted(), 0);

    let by_url = |slug: &str| {
        run.outcomes
            .iter()
            .find(|o| o.url.ends_with(&format!("/{slug}")))
            .unwrap()
    };
    // Centroid of the competitors is [0.5, 0.5, 0]
    assert!((by_url("running-shoes").score - 100.0).abs() < 1e-9);
    assert_eq!(by_url("running-shoes-2").score, 70.71);
    assert_eq!(by_url("running-shoes").competitor_count, 2);
    // No SERP data for these keywords
    assert_eq!(by_url("shoe-care").score, 50.0);
    assert_eq!(by_url("jogging-shoes").competitor_count, 0);

    let summaries = db.get_page_summaries(SITE).await.unwrap();
    assert!(summaries.iter().all(|s| s.content_score.is_some()));
    assert!(summaries.iter().all(|s| s.content_depth.is_some()));
    assert!(summaries.iter().all(|s| s.content_score_updated_at.is_some()));
}

#[tokio::test]
async fn failed_write_still_returns_score() {
    let db = seeded_db().await;
    let scorer = scorer(&db);
    let sink = FlakySink(db.clone());

    let outcome = scorer
        .score_page(&sink, SITE, "https://ex.com/running-shoes", "best running shoes", "running shoes")
        .await
        .unwrap();

    assert!((outcome.score - 100.0).abs() < 1e-9);
    assert!(matches!(
        outcome.persistence,
        PersistenceStatus::ComputedButNotPersisted { .. }
    ));
    let summaries = db.get_page_summaries(SITE).await.unwrap();
    assert!(summaries.iter().all(|s| s.content_score.is_none()));
}

#[tokio::test]
async fn cannibalization_reports_unsaved_statuses() {
    let db = seeded_db().await;
    let sink = FlakySink(db.clone());

    let analyzed = pipeline::cannibalization::run(db.as_ref(), &sink, &SiteLocks::new(), SITE, 0.85, 1)
        .await
        .unwrap();
    assert_eq!(analyzed.result.total_conflicts, 2);
    assert!(!analyzed.is_persisted());
}

// ============================================================
// Clustering and embedding backfill
// ============================================================

#[tokio::test]
async fn cluster_pass_persists_assignments() {
    let db = seeded_db().await;
    let engine = Arc::new(ClusterEngine::kmeans(42));

    let analyzed = pipeline::clustering::run(db.as_ref(), db.as_ref(), &SiteLocks::new(), engine.clone(), SITE)
        .await
        .unwrap();
    assert!(analyzed.is_persisted());
    assert_eq!(analyzed.result.k, 2);

    let stored = db.get_clusters(SITE).await.unwrap();
    assert_eq!(stored.len(), analyzed.result.summaries.len());
    let summaries = db.get_page_summaries(SITE).await.unwrap();
    assert!(summaries.iter().all(|s| s.cluster_id.is_some()));

    // shoe-care sits alone on its own axis
    let shoe_care = summaries.iter().find(|s| s.url.ends_with("/shoe-care")).unwrap();
    let others: Vec<_> = summaries
        .iter()
        .filter(|s| !s.url.ends_with("/shoe-care"))
        .map(|s| s.cluster_id)
        .collect();
    assert!(others.iter().all(|c| *c != shoe_care.cluster_id));

    // Same seed, same snapshot, same ids
    let again = pipeline::clustering::run(db.as_ref(), db.as_ref(), &SiteLocks::new(), engine, SITE)
        .await
        .unwrap();
    assert_eq!(again.result.assignments, analyzed.result.assignments);
}

#[tokio::test]
async fn cluster_pass_skips_page_with_wrong_dimension() {
    let db = seeded_db().await;
    db.upsert_page(SITE, &page("legacy", "old widgets", "legacy page", Some(vec![1.0, 0.0])))
        .await
        .unwrap();
    let engine = Arc::new(ClusterEngine::kmeans(42));

    let analyzed = pipeline::clustering::run(db.as_ref(), db.as_ref(), &SiteLocks::new(), engine, SITE)
        .await
        .unwrap();
    assert!(analyzed.is_persisted());
    assert_eq!(analyzed.result.skipped_pages, 1);
    assert_eq!(analyzed.result.assignments.len(), 4);
    assert!(analyzed
        .result
        .assignments
        .iter()
        .all(|a| !a.url.ends_with("/legacy")));

    let summaries = db.get_page_summaries(SITE).await.unwrap();
    let legacy = summaries.iter().find(|s| s.url.ends_with("/legacy")).unwrap();
    assert!(legacy.cluster_id.is_none());
    assert_eq!(
        summaries.iter().filter(|s| s.cluster_id.is_some()).count(),
        4
    );
}

#[tokio::test]
async fn embed_pass_fills_missing_embeddings() {
    let db = Arc::new(SqliteDatabase::in_memory().unwrap());
    db.upsert_page(SITE, &page("a", "alpha", "alpha text", None)).await.unwrap();
    db.upsert_page(SITE, &page("b", "beta", "beta text", Some(vec![0.0, 1.0, 0.0])))
        .await
        .unwrap();

    let embedder = TableEmbedder::new(&[("alpha text", vec![1.0, 0.0, 0.0])]);
    let stored = pipeline::embed::run(db.as_ref(), &embedder, SITE, 3, false).await.unwrap();
    assert_eq!(stored, 1);

    let pages = db.fetch_pages(SITE).await.unwrap();
    assert_eq!(pages[0].embedding, Some(vec![1.0, 0.0, 0.0]));
    assert_eq!(pages[1].embedding, Some(vec![0.0, 1.0, 0.0]));
}

#[tokio::test]
async fn embed_pass_rejects_wrong_dimension() {
    let db = Arc::new(SqliteDatabase::in_memory().unwrap());
    db.upsert_page(SITE, &page("a", "alpha", "alpha text", None)).await.unwrap();

    let err = pipeline::embed::run(db.as_ref(), &TableEmbedder::new(&[]), SITE, 384, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Vector(_)));
    assert!(db.fetch_pages(SITE).await.unwrap()[0].embedding.is_none());
}

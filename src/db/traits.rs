// Store traits: the narrow interfaces between the analysis core and the
// outside world.
//
// PageSource, CompetitorSource, and ResultSink are what the pipelines need.
// `Database` adds the housekeeping the CLI uses (import, reports, run state).
// SqliteDatabase implements all of them; tests can implement just one.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    ClusterAssignment, ClusterSummary, ConflictEdge, PageRecord, PageResult, PageSummary,
    SerpResult,
};

/// Where page snapshots come from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// All pages for a site, ordered by URL.
    async fn fetch_pages(&self, site_id: &str) -> Result<Vec<PageRecord>>;
}

/// Where competitor embeddings come from.
#[async_trait]
pub trait CompetitorSource: Send + Sync {
    /// Embeddings of the top-ranking pages for `keyword`, best rank first,
    /// at most `limit` of them.
    async fn top_competitor_embeddings(&self, keyword: &str, limit: usize)
        -> Result<Vec<Vec<f64>>>;
}

/// Where derived results go.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Update derived fields on pages. `None` fields are left untouched.
    async fn save_page_results(&self, results: &[PageResult]) -> Result<()>;

    /// Replace every conflict edge for a site with `edges`, atomically.
    async fn replace_conflicts(&self, site_id: &str, edges: &[ConflictEdge]) -> Result<()>;

    /// Replace a site's cluster assignments and summaries, atomically.
    async fn replace_clusters(
        &self,
        site_id: &str,
        assignments: &[ClusterAssignment],
        summaries: &[ClusterSummary],
    ) -> Result<()>;
}

#[async_trait]
pub trait Database: PageSource + CompetitorSource + ResultSink {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Import ---

    /// Insert or update a page snapshot for a site.
    async fn upsert_page(&self, site_id: &str, page: &PageRecord) -> Result<()>;

    /// Store a freshly computed embedding for one page.
    async fn save_page_embedding(&self, site_id: &str, url: &str, embedding: &[f64]) -> Result<()>;

    /// Insert or update a SERP competitor row.
    async fn upsert_serp_result(&self, result: &SerpResult) -> Result<()>;

    // --- Reports ---

    /// Derived fields for every page of a site, ordered by URL.
    async fn get_page_summaries(&self, site_id: &str) -> Result<Vec<PageSummary>>;

    /// Stored conflict edges for a site.
    async fn get_conflicts(&self, site_id: &str) -> Result<Vec<ConflictEdge>>;

    /// Stored cluster summaries for a site.
    async fn get_clusters(&self, site_id: &str) -> Result<Vec<ClusterSummary>>;

    /// Distinct site ids with at least one page.
    async fn list_sites(&self) -> Result<Vec<String>>;

    // --- Run state ---

    /// Get a run state value by key (e.g., "last_cannibalization_at:site-1").
    async fn get_run_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a run state value (upsert).
    async fn set_run_state(&self, key: &str, value: &str) -> Result<()>;
}

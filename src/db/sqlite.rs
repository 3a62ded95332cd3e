// SqliteDatabase: rusqlite backend implementing the store traits.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{
    ClusterAssignment, ClusterSummary, ConflictEdge, PageRecord, PageResult, PageSummary,
    SerpResult,
};
use super::queries;
use super::traits::{CompetitorSource, Database, PageSource, ResultSink};

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// A fresh in-memory database with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl PageSource for SqliteDatabase {
    async fn fetch_pages(&self, site_id: &str) -> Result<Vec<PageRecord>> {
        let conn = self.conn.lock().await;
        queries::fetch_pages(&conn, site_id)
    }
}

#[async_trait]
impl CompetitorSource for SqliteDatabase {
    async fn top_competitor_embeddings(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<Vec<f64>>> {
        let conn = self.conn.lock().await;
        queries::top_competitor_embeddings(&conn, keyword, limit)
    }
}

#[async_trait]
impl ResultSink for SqliteDatabase {
    async fn save_page_results(&self, results: &[PageResult]) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::save_page_results(&conn, results)
    }

    async fn replace_conflicts(&self, site_id: &str, edges: &[ConflictEdge]) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::replace_conflicts(&conn, site_id, edges)
    }

    async fn replace_clusters(
        &self,
        site_id: &str,
        assignments: &[ClusterAssignment],
        summaries: &[ClusterSummary],
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::replace_clusters(&conn, site_id, assignments, summaries)
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn upsert_page(&self, site_id: &str, page: &PageRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_page(&conn, site_id, page)
    }

    async fn save_page_embedding(&self, site_id: &str, url: &str, embedding: &[f64]) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::save_page_embedding(&conn, site_id, url, embedding)
    }

    async fn upsert_serp_result(&self, result: &SerpResult) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_serp_result(&conn, result)
    }

    async fn get_page_summaries(&self, site_id: &str) -> Result<Vec<PageSummary>> {
        let conn = self.conn.lock().await;
        queries::get_page_summaries(&conn, site_id)
    }

    async fn get_conflicts(&self, site_id: &str) -> Result<Vec<ConflictEdge>> {
        let conn = self.conn.lock().await;
        queries::get_conflicts(&conn, site_id)
    }

    async fn get_clusters(&self, site_id: &str) -> Result<Vec<ClusterSummary>> {
        let conn = self.conn.lock().await;
        queries::get_clusters(&conn, site_id)
    }

    async fn list_sites(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        queries::list_sites(&conn)
    }

    async fn get_run_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        queries::get_run_state(&conn, key)
    }

    async fn set_run_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::set_run_state(&conn, key, value)
    }
}

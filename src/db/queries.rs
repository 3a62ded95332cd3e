// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{
    CannibalizationStatus, ClusterAssignment, ClusterSummary, ConflictEdge, PageRecord, PageResult,
    PageSummary, SerpResult,
};

fn parse_embedding(json: Option<String>) -> Result<Option<Vec<f64>>> {
    json.map(|j| serde_json::from_str(&j).context("Stored embedding is not a JSON float array"))
        .transpose()
}

// --- Pages ---

/// Insert a page snapshot, or refresh the snapshot fields of an existing one.
/// Derived fields (scores, status, cluster) are left as they were.
pub fn upsert_page(conn: &Connection, site_id: &str, page: &PageRecord) -> Result<()> {
    let embedding_json = page
        .embedding
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO pages (id, site_id, url, target_keyword, content, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            site_id = ?2,
            url = ?3,
            target_keyword = ?4,
            content = ?5,
            embedding = ?6",
        params![
            page.id,
            site_id,
            page.url,
            page.target_keyword,
            page.content,
            embedding_json,
        ],
    )?;
    Ok(())
}

/// All pages of a site, ordered by URL.
pub fn fetch_pages(conn: &Connection, site_id: &str) -> Result<Vec<PageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, url, embedding, target_keyword, content
         FROM pages
         WHERE site_id = ?1
         ORDER BY url",
    )?;

    let rows = stmt.query_map(params![site_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut pages = Vec::new();
    for row in rows {
        let (id, url, embedding, target_keyword, content) = row?;
        pages.push(PageRecord {
            embedding: parse_embedding(embedding)
                .with_context(|| format!("Bad embedding for {url}"))?,
            id,
            url,
            target_keyword,
            content,
        });
    }
    Ok(pages)
}

pub fn save_page_embedding(
    conn: &Connection,
    site_id: &str,
    url: &str,
    embedding: &[f64],
) -> Result<()> {
    let json = serde_json::to_string(embedding)?;
    let updated = conn.execute(
        "UPDATE pages SET embedding = ?3 WHERE site_id = ?1 AND url = ?2",
        params![site_id, url, json],
    )?;
    if updated == 0 {
        anyhow::bail!("No page {url} for site {site_id}");
    }
    Ok(())
}

/// Apply result-sink writes in one transaction. `None` fields keep their
/// stored value; writing a content score also stamps its update time.
pub fn save_page_results(conn: &Connection, results: &[PageResult]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "UPDATE pages SET
                content_score = COALESCE(?3, content_score),
                content_depth = COALESCE(?4, content_depth),
                competitor_count = COALESCE(?5, competitor_count),
                cannibalization_status = COALESCE(?6, cannibalization_status),
                content_score_updated_at = CASE
                    WHEN ?3 IS NOT NULL THEN datetime('now')
                    ELSE content_score_updated_at
                END
             WHERE site_id = ?1 AND url = ?2",
        )?;
        for r in results {
            stmt.execute(params![
                r.site_id,
                r.url,
                r.content_score,
                r.content_depth,
                r.competitor_count,
                r.cannibalization_status.map(|s| s.as_str()),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn get_page_summaries(conn: &Connection, site_id: &str) -> Result<Vec<PageSummary>> {
    let mut stmt = conn.prepare(
        "SELECT url, target_keyword, embedding IS NOT NULL, content_score, content_depth,
                competitor_count, cannibalization_status, cluster_id, content_score_updated_at
         FROM pages
         WHERE site_id = ?1
         ORDER BY url",
    )?;

    let rows = stmt.query_map(params![site_id], |row| {
        let status: Option<String> = row.get(6)?;
        let cluster_id: Option<i64> = row.get(7)?;
        Ok(PageSummary {
            url: row.get(0)?,
            target_keyword: row.get(1)?,
            has_embedding: row.get(2)?,
            content_score: row.get(3)?,
            content_depth: row.get(4)?,
            competitor_count: row.get(5)?,
            cannibalization_status: status.as_deref().and_then(CannibalizationStatus::parse),
            cluster_id: cluster_id.map(|c| c as usize),
            content_score_updated_at: row.get(8)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn list_sites(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT site_id FROM pages ORDER BY site_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// --- Conflict graph ---

/// Delete every stored edge for the site, then insert `edges`, in one
/// transaction. Readers never see a half-rebuilt graph.
pub fn replace_conflicts(conn: &Connection, site_id: &str, edges: &[ConflictEdge]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM conflict_edges WHERE site_id = ?1",
        params![site_id],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO conflict_edges
                (site_id, page_a_id, page_b_id, url_a, url_b, similarity, keyword_a, keyword_b, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for edge in edges {
            stmt.execute(params![
                site_id,
                edge.page_a_id,
                edge.page_b_id,
                edge.url_a,
                edge.url_b,
                edge.similarity,
                edge.keyword_a,
                edge.keyword_b,
                edge.detected_at.to_rfc3339(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn get_conflicts(conn: &Connection, site_id: &str) -> Result<Vec<ConflictEdge>> {
    let mut stmt = conn.prepare(
        "SELECT page_a_id, page_b_id, url_a, url_b, similarity, keyword_a, keyword_b, detected_at
         FROM conflict_edges
         WHERE site_id = ?1
         ORDER BY url_a, url_b",
    )?;

    let rows = stmt.query_map(params![site_id], |row| {
        let detected_at: String = row.get(7)?;
        let detected_at = DateTime::parse_from_rfc3339(&detected_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
            })?;
        Ok(ConflictEdge {
            page_a_id: row.get(0)?,
            page_b_id: row.get(1)?,
            url_a: row.get(2)?,
            url_b: row.get(3)?,
            similarity: row.get(4)?,
            keyword_a: row.get(5)?,
            keyword_b: row.get(6)?,
            detected_at,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// --- Clusters ---

/// Clear the site's previous clustering and store the new one, in one
/// transaction.
pub fn replace_clusters(
    conn: &Connection,
    site_id: &str,
    assignments: &[ClusterAssignment],
    summaries: &[ClusterSummary],
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE pages SET cluster_id = NULL WHERE site_id = ?1",
        params![site_id],
    )?;
    tx.execute("DELETE FROM clusters WHERE site_id = ?1", params![site_id])?;
    {
        let mut assign = tx.prepare(
            "UPDATE pages SET cluster_id = ?3 WHERE site_id = ?1 AND url = ?2",
        )?;
        for a in assignments {
            assign.execute(params![site_id, a.url, a.cluster_id as i64])?;
        }

        let mut insert = tx.prepare(
            "INSERT INTO clusters (site_id, cluster_id, label, page_count)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for s in summaries {
            insert.execute(params![
                site_id,
                s.cluster_id as i64,
                s.label,
                s.page_count as i64
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn get_clusters(conn: &Connection, site_id: &str) -> Result<Vec<ClusterSummary>> {
    let mut stmt = conn.prepare(
        "SELECT cluster_id, label, page_count FROM clusters
         WHERE site_id = ?1
         ORDER BY cluster_id",
    )?;
    let mut clusters = stmt
        .query_map(params![site_id], |row| {
            let cluster_id: i64 = row.get(0)?;
            let page_count: i64 = row.get(2)?;
            Ok(ClusterSummary {
                cluster_id: cluster_id as usize,
                label: row.get(1)?,
                page_count: page_count as usize,
                urls: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut members = conn.prepare(
        "SELECT url FROM pages WHERE site_id = ?1 AND cluster_id = ?2 ORDER BY url",
    )?;
    for cluster in &mut clusters {
        cluster.urls = members
            .query_map(params![site_id, cluster.cluster_id as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
    }
    Ok(clusters)
}

// --- SERP competitors ---

pub fn upsert_serp_result(conn: &Connection, result: &SerpResult) -> Result<()> {
    let json = serde_json::to_string(&result.embedding)?;
    conn.execute(
        "INSERT INTO serp_results (keyword, position, page_url, embedding)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(keyword, page_url) DO UPDATE SET position = ?2, embedding = ?4",
        params![result.keyword, result.position, result.page_url, json],
    )?;
    Ok(())
}

/// Competitor embeddings for a keyword, best position first.
pub fn top_competitor_embeddings(
    conn: &Connection,
    keyword: &str,
    limit: usize,
) -> Result<Vec<Vec<f64>>> {
    let mut stmt = conn.prepare(
        "SELECT embedding FROM serp_results
         WHERE keyword = ?1
         ORDER BY position ASC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![keyword, limit as i64], |row| row.get::<_, String>(0))?;

    let mut embeddings = Vec::new();
    for json in rows {
        let json = json?;
        embeddings.push(
            serde_json::from_str(&json).context("Stored SERP embedding is not a JSON float array")?,
        );
    }
    Ok(embeddings)
}

// --- Run state ---

pub fn get_run_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM run_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

pub fn set_run_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO run_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

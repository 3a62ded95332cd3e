// Database schema: table creation and migrations.
//
// A `schema_version` table tracks which migrations have run; each migration
// is a function that executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// Idempotent, so it runs on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Page snapshots plus the fields derived from them
        CREATE TABLE IF NOT EXISTS pages (
            id TEXT PRIMARY KEY,
            site_id TEXT NOT NULL,
            url TEXT NOT NULL,
            target_keyword TEXT,
            content TEXT,
            embedding TEXT,                     -- JSON array of floats
            content_score REAL,                 -- competitive alignment, 50.0 = no SERP data
            competitor_count INTEGER,
            content_score_updated_at TEXT,
            cannibalization_status TEXT,        -- 'ok' / 'conflict'
            cluster_id INTEGER,
            UNIQUE (site_id, url)
        );

        -- Current conflict graph per site (rebuilt wholesale on every run)
        CREATE TABLE IF NOT EXISTS conflict_edges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id TEXT NOT NULL,
            page_a_id TEXT NOT NULL,
            page_b_id TEXT NOT NULL,
            url_a TEXT NOT NULL,
            url_b TEXT NOT NULL,
            similarity REAL NOT NULL,
            keyword_a TEXT NOT NULL,
            keyword_b TEXT NOT NULL,
            detected_at TEXT NOT NULL
        );

        -- Ranking competitor pages per keyword
        CREATE TABLE IF NOT EXISTS serp_results (
            keyword TEXT NOT NULL,
            position INTEGER NOT NULL,
            page_url TEXT NOT NULL,
            embedding TEXT NOT NULL,
            PRIMARY KEY (keyword, page_url)
        );

        CREATE TABLE IF NOT EXISTS clusters (
            site_id TEXT NOT NULL,
            cluster_id INTEGER NOT NULL,
            label TEXT NOT NULL,
            page_count INTEGER NOT NULL,
            PRIMARY KEY (site_id, cluster_id)
        );

        -- Last-run timestamps and similar bookkeeping
        CREATE TABLE IF NOT EXISTS run_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_pages_site
            ON pages(site_id, url);

        CREATE INDEX IF NOT EXISTS idx_conflicts_site
            ON conflict_edges(site_id);

        CREATE INDEX IF NOT EXISTS idx_serp_keyword
            ON serp_results(keyword, position);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: content_depth column on pages, recorded by the
    // content scoring pass alongside content_score.
    run_migration(conn, 2, |c| {
        c.execute_batch("ALTER TABLE pages ADD COLUMN content_depth REAL;")
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, pages, conflict_edges, serp_results, clusters, run_state
        assert_eq!(table_count(&conn).unwrap(), 6);
    }

    #[test]
    fn test_migration_v2_adds_content_depth() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO pages (id, site_id, url, content_depth) VALUES ('p1', 's1', 'https://a', 42.5)",
            [],
        )
        .unwrap();
        let depth: f64 = conn
            .query_row("SELECT content_depth FROM pages WHERE id = 'p1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!((depth - 42.5).abs() < f64::EPSILON);
    }
}

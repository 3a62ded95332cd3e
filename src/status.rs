// System status display: DB stats, sites, and when each pass last ran.

use anyhow::Result;
use std::path::Path;

use crate::db::models::CannibalizationStatus;
use crate::db::Database;

/// Passes whose last successful run is recorded per site.
pub const PASSES: [&str; 4] = ["embed", "cannibalization", "score", "cluster"];

/// run_state key for the last run of `pass` over `site_id`.
pub fn run_state_key(pass: &str, site_id: &str) -> String {
    format!("last_{pass}:{site_id}")
}

/// Record that `pass` just completed for `site_id`.
pub async fn record_run(db: &dyn Database, pass: &str, site_id: &str) -> Result<()> {
    let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    db.set_run_state(&run_state_key(pass, site_id), &now).await
}

/// Display system status to the terminal.
pub async fn show(db: &dyn Database, db_display_path: &str) -> Result<()> {
    if !Path::new(db_display_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `apexseo init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!(
        "Database: {} ({}, {} tables)",
        db_display_path,
        file_size,
        db.table_count().await?
    );

    let sites = db.list_sites().await?;
    if sites.is_empty() {
        println!("Sites: none imported yet");
        println!("  Run `apexseo import <file>` to load a site snapshot");
        return Ok(());
    }

    println!("Sites: {}", sites.len());
    for site_id in &sites {
        let pages = db.get_page_summaries(site_id).await?;
        let embedded = pages.iter().filter(|p| p.has_embedding).count();
        let scored = pages.iter().filter(|p| p.content_score.is_some()).count();
        let conflicts = pages
            .iter()
            .filter(|p| p.cannibalization_status == Some(CannibalizationStatus::Conflict))
            .count();
        println!(
            "\n  {}: {} pages, {} embedded, {} scored, {} in conflict",
            site_id,
            pages.len(),
            embedded,
            scored,
            conflicts
        );

        for pass in PASSES {
            let last = db
                .get_run_state(&run_state_key(pass, site_id))
                .await?
                .unwrap_or_else(|| "never".to_string());
            println!("    Last {pass}: {last}");
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

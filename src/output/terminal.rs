// Colored terminal output for conflict reports, scores, and clusters.
//
// main.rs calls into here after each pass; nothing in this module touches
// the store.

use colored::Colorize;

use crate::cannibalization::CannibalizationReport;
use crate::cluster::ClusterOutput;
use crate::db::models::{CannibalizationStatus, ConflictEdge, PageSummary};
use crate::pipeline::content::ScoringRun;
use crate::scoring::{CompositeInputs, PersistenceStatus, ScoreWeights};

use super::truncate_chars;

const URL_WIDTH: usize = 56;

/// Display the result of a conflict-graph rebuild.
pub fn display_cannibalization(report: &CannibalizationReport, persistence: &PersistenceStatus) {
    println!(
        "\n{}",
        format!(
            "=== Cannibalization ({} pages, threshold {:.2}) ===",
            report.pages_analyzed, report.threshold
        )
        .bold()
    );
    println!();

    if report.edges.is_empty() {
        println!("  {} No conflicting pages found", "ok".green());
    } else {
        println!(
            "  {:>5}  {:<width$}  {}",
            "Sim".dimmed(),
            "Page".dimmed(),
            "Keyword".dimmed(),
            width = URL_WIDTH + 3,
        );
        println!("  {}", "-".repeat(URL_WIDTH + 30).dimmed());

        for edge in &report.edges {
            println!(
                "  {}  {:<width$}  {}",
                colorize_similarity(edge.similarity),
                truncate_chars(&edge.url_a, URL_WIDTH),
                edge.keyword_a,
                width = URL_WIDTH + 3,
            );
            println!(
                "  {:>5}  {:<width$}  {}",
                "vs".dimmed(),
                truncate_chars(&edge.url_b, URL_WIDTH),
                edge.keyword_b,
                width = URL_WIDTH + 3,
            );
        }
        println!();
        println!(
            "  {} {} conflicting pairs",
            "!".bright_red(),
            report.total_conflicts
        );
    }

    if report.skipped_pairs > 0 {
        println!(
            "  {} {} pairs skipped (embedding dimensions differ)",
            "~".yellow(),
            report.skipped_pairs
        );
    }
    display_persistence(persistence);
}

/// Display a content scoring run.
pub fn display_scoring_run(run: &ScoringRun) {
    println!(
        "\n{}",
        format!("=== Content Scores ({} pages) ===", run.outcomes.len()).bold()
    );
    println!();

    if !run.outcomes.is_empty() {
        println!(
            "  {:<width$}  {:>6}  {:>6}  {:>5}",
            "Page".dimmed(),
            "Score".dimmed(),
            "Depth".dimmed(),
            "Comp".dimmed(),
            width = URL_WIDTH + 3,
        );
        println!("  {}", "-".repeat(URL_WIDTH + 26).dimmed());
    }

    for outcome in &run.outcomes {
        let saved = match outcome.persistence {
            PersistenceStatus::Persisted => String::new(),
            PersistenceStatus::ComputedButNotPersisted { .. } => " (not saved)".yellow().to_string(),
        };
        println!(
            "  {:<width$}  {}  {:>6.1}  {:>5}{}",
            truncate_chars(&outcome.url, URL_WIDTH),
            colorize_score(outcome.score),
            outcome.depth,
            outcome.competitor_count,
            saved,
            width = URL_WIDTH + 3,
        );
    }

    println!();
    if run.skipped > 0 {
        println!(
            "  {} {} pages skipped (no content or target keyword)",
            "~".yellow(),
            run.skipped
        );
    }
    for (url, reason) in &run.failures {
        println!("  {} {}: {}", "!".red(), truncate_chars(url, URL_WIDTH), reason.dimmed());
    }
    let unsaved = run.unpersisted();
    if unsaved > 0 {
        println!(
            "  {} {} scores computed but not saved; rerun to persist",
            "!".bright_red(),
            unsaved
        );
    }
}

/// Display cluster summaries.
pub fn display_clusters(output: &ClusterOutput, persistence: &PersistenceStatus) {
    if output.assignments.is_empty() {
        println!("No embedded pages to cluster. Run `apexseo embed` first.");
        return;
    }

    println!(
        "\n{}",
        format!(
            "=== Clusters ({} pages, k={}) ===",
            output.assignments.len(),
            output.k
        )
        .bold()
    );

    for summary in &output.summaries {
        println!(
            "\n  {} {}",
            summary.label.cyan().bold(),
            format!("({} pages)", summary.page_count).dimmed()
        );
        for url in &summary.urls {
            println!("    {}", truncate_chars(url, URL_WIDTH + 10));
        }
    }
    if output.skipped_pages > 0 {
        println!(
            "\n  {}",
            format!(
                "{} page(s) skipped: embedding dimension didn't match the rest of the site",
                output.skipped_pages
            )
            .yellow()
        );
    }
    println!();
    display_persistence(persistence);
}

/// Display the stored per-page summary for a site.
pub fn display_site_report(site_id: &str, pages: &[PageSummary], conflicts: &[ConflictEdge]) {
    if pages.is_empty() {
        println!("No pages for site '{site_id}'. Run `apexseo import` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Site Report: {} ({} pages) ===", site_id, pages.len()).bold()
    );
    println!();
    println!(
        "  {:<width$}  {:<20}  {:>6}  {:>6}  {:>3}  {:<8}",
        "Page".dimmed(),
        "Keyword".dimmed(),
        "Score".dimmed(),
        "Depth".dimmed(),
        "Cl".dimmed(),
        "Status".dimmed(),
        width = URL_WIDTH + 3,
    );
    println!("  {}", "-".repeat(URL_WIDTH + 56).dimmed());

    for page in pages {
        let score = page
            .content_score
            .map(colorize_score)
            .unwrap_or_else(|| format!("{:>6}", "-").dimmed().to_string());
        let depth = page
            .content_depth
            .map(|d| format!("{d:>6.1}"))
            .unwrap_or_else(|| format!("{:>6}", "-"));
        let cluster = page
            .cluster_id
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let keyword = truncate_chars(page.target_keyword.as_deref().unwrap_or("-"), 17);
        let embedded = if page.has_embedding { "" } else { " (no embedding)" };

        println!(
            "  {:<width$}  {:<20}  {}  {}  {:>3}  {}{}",
            truncate_chars(&page.url, URL_WIDTH),
            keyword,
            score,
            depth,
            cluster,
            colorize_status(page.cannibalization_status),
            embedded.dimmed(),
            width = URL_WIDTH + 3,
        );
    }

    println!();
    let in_conflict = pages
        .iter()
        .filter(|p| p.cannibalization_status == Some(CannibalizationStatus::Conflict))
        .count();
    if in_conflict > 0 {
        println!(
            "  {} {} pages in {} conflicting pairs",
            "!".bright_red(),
            in_conflict,
            conflicts.len()
        );
    }
}

/// Display a composite score and its breakdown.
pub fn display_composite(inputs: &CompositeInputs, weights: &ScoreWeights, score: f64) {
    let authority = (inputs.tspr * 10.0).min(100.0);
    println!("\n{}", "=== Composite Score ===".bold());
    println!(
        "  Authority: {:>6.1} x {:.2}  (TSPR {:.2})",
        authority, weights.authority_weight, inputs.tspr
    );
    println!("  Depth:     {:>6.1} x {:.2}", inputs.depth, weights.depth_weight);
    println!("  UX:        {:>6.1} x {:.2}", inputs.ux, weights.ux_weight);
    if inputs.risk > 0.0 {
        println!("  Risk:      {:>6.1}", -inputs.risk);
    }
    println!("  Score:     {}/100", colorize_score(score));
}

fn display_persistence(persistence: &PersistenceStatus) {
    if let PersistenceStatus::ComputedButNotPersisted { reason } = persistence {
        println!(
            "  {} Results computed but not saved: {}",
            "!".bright_red(),
            reason.dimmed()
        );
    }
}

fn colorize_similarity(similarity: f64) -> colored::ColoredString {
    let s = format!("{similarity:>5.2}");
    if similarity >= 0.95 {
        s.red().bold()
    } else {
        s.bright_red()
    }
}

/// Colorize a 0-100 score: green when strong, yellow middling, red weak.
fn colorize_score(score: f64) -> String {
    let s = format!("{score:>6.1}");
    if score >= 70.0 {
        s.green().to_string()
    } else if score >= 40.0 {
        s.yellow().to_string()
    } else {
        s.red().to_string()
    }
}

fn colorize_status(status: Option<CannibalizationStatus>) -> colored::ColoredString {
    match status {
        Some(CannibalizationStatus::Conflict) => "conflict".red().bold(),
        Some(CannibalizationStatus::Ok) => "ok".green(),
        None => "-".dimmed(),
    }
}

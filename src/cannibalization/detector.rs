// All-pairs conflict detection over one site's pages.
//
// Two pages conflict when their target keywords differ and their embeddings
// have cosine similarity at or above the threshold. Pages that share a
// keyword are never flagged: that overlap is deliberate.
//
// The comparison is exact and O(n²). Site page counts run from tens to low
// thousands, which an exact pass handles comfortably. Rows of the pair
// matrix can be spread over a rayon pool with `detect_conflicts_sharded`,
// one task per row. The result is identical to the single-threaded pass.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::models::{CannibalizationStatus, ConflictEdge, PageRecord};
use crate::vector::cosine_similarity;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Outcome of one detection pass.
#[derive(Debug, Clone, Serialize)]
pub struct CannibalizationReport {
    /// URL -> conflicting URLs, for pages with at least one conflict.
    pub conflicts: BTreeMap<String, Vec<String>>,
    pub total_conflicts: usize,
    pub pages_analyzed: usize,
    pub threshold: f64,
    /// Edges to persist, in detection order.
    #[serde(skip)]
    pub edges: Vec<ConflictEdge>,
    /// Status for every input page (participating or not), by URL.
    #[serde(skip)]
    pub statuses: Vec<(String, CannibalizationStatus)>,
    /// Pairs skipped because their embeddings had different dimensions.
    #[serde(skip)]
    pub skipped_pairs: usize,
}

/// A page that has both an embedding and a target keyword.
struct Participant<'a> {
    page: &'a PageRecord,
    embedding: &'a [f64],
    keyword: &'a str,
}

struct PairHit {
    i: usize,
    j: usize,
    similarity: f64,
}

struct RowScan {
    hits: Vec<PairHit>,
    skipped: usize,
}

/// Detect conflicts across `pages` in a single thread.
pub fn detect_conflicts(pages: &[PageRecord], threshold: f64) -> CannibalizationReport {
    detect_conflicts_sharded(pages, threshold, 1)
}

/// Detect conflicts, scanning rows of the pair matrix on a rayon pool of
/// `shards` threads. Output does not depend on the shard count.
pub fn detect_conflicts_sharded(
    pages: &[PageRecord],
    threshold: f64,
    shards: usize,
) -> CannibalizationReport {
    let participants = participants(pages);
    let n = participants.len();

    let scan_all = || -> Vec<RowScan> {
        (0..n)
            .into_par_iter()
            .map(|i| scan_row(&participants, i, threshold))
            .collect()
    };

    let scans: Vec<RowScan> = if shards <= 1 {
        (0..n)
            .map(|i| scan_row(&participants, i, threshold))
            .collect()
    } else {
        match ThreadPoolBuilder::new().num_threads(shards).build() {
            Ok(pool) => pool.install(scan_all),
            Err(e) => {
                warn!(shards, error = %e, "Could not build scan pool, using the global pool");
                scan_all()
            }
        }
    };

    build_report(pages, &participants, scans, threshold, Utc::now())
}

/// Filter to pages with an embedding and a keyword, sorted by URL so the
/// output doesn't depend on store ordering.
fn participants(pages: &[PageRecord]) -> Vec<Participant<'_>> {
    let mut participants: Vec<Participant<'_>> = pages
        .iter()
        .filter_map(|page| {
            Some(Participant {
                page,
                embedding: page.embedding.as_deref()?,
                keyword: page.target_keyword.as_deref()?,
            })
        })
        .collect();
    participants.sort_by(|a, b| a.page.url.cmp(&b.page.url));
    participants
}

/// Compare row i against every j > i.
fn scan_row(participants: &[Participant<'_>], i: usize, threshold: f64) -> RowScan {
    let mut scan = RowScan {
        hits: Vec::new(),
        skipped: 0,
    };

    let a = &participants[i];
    for (j, b) in participants.iter().enumerate().skip(i + 1) {
        if a.keyword == b.keyword {
            continue;
        }
        match cosine_similarity(a.embedding, b.embedding) {
            Ok(similarity) if similarity >= threshold => {
                scan.hits.push(PairHit { i, j, similarity });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(url_a = %a.page.url, url_b = %b.page.url, error = %e, "Skipping page pair");
                scan.skipped += 1;
            }
        }
    }

    scan
}

fn build_report(
    pages: &[PageRecord],
    participants: &[Participant<'_>],
    scans: Vec<RowScan>,
    threshold: f64,
    detected_at: DateTime<Utc>,
) -> CannibalizationReport {
    let mut conflicts: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut edges = Vec::new();
    let mut in_conflict: HashSet<&str> = HashSet::new();
    let mut skipped_pairs = 0;

    // Scans arrive in row order (indexed collect) and hits within a scan are in (i, j) order
    for scan in scans {
        skipped_pairs += scan.skipped;
        for PairHit { i, j, similarity } in scan.hits {
            let (a, b) = (&participants[i], &participants[j]);

            warn!(
                url_a = %a.page.url,
                keyword_a = a.keyword,
                url_b = %b.page.url,
                keyword_b = b.keyword,
                similarity = %format!("{similarity:.2}"),
                "Cannibalization detected"
            );

            conflicts
                .entry(a.page.url.clone())
                .or_default()
                .push(b.page.url.clone());
            in_conflict.insert(&a.page.url);
            in_conflict.insert(&b.page.url);

            edges.push(ConflictEdge {
                page_a_id: a.page.id.clone(),
                page_b_id: b.page.id.clone(),
                url_a: a.page.url.clone(),
                url_b: b.page.url.clone(),
                similarity,
                keyword_a: a.keyword.to_string(),
                keyword_b: b.keyword.to_string(),
                detected_at,
            });
        }
    }

    let statuses = pages
        .iter()
        .map(|p| {
            let status = if in_conflict.contains(p.url.as_str()) {
                CannibalizationStatus::Conflict
            } else {
                CannibalizationStatus::Ok
            };
            (p.url.clone(), status)
        })
        .collect();

    info!(
        pages_analyzed = participants.len(),
        total_conflicts = edges.len(),
        threshold,
        "Cannibalization analysis complete"
    );

    CannibalizationReport {
        conflicts,
        total_conflicts: edges.len(),
        pages_analyzed: participants.len(),
        threshold,
        edges,
        statuses,
        skipped_pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, kw: Option<&str>, emb: Option<Vec<f64>>) -> PageRecord {
        PageRecord {
            id: format!("id:{url}"),
            url: url.to_string(),
            embedding: emb,
            target_keyword: kw.map(str::to_string),
            content: None,
        }
    }

    #[test]
    fn test_scan_row_only_looks_forward() {
        let pages = vec![
            page("https://a", Some("x"), Some(vec![1.0, 0.0])),
            page("https://b", Some("y"), Some(vec![1.0, 0.0])),
            page("https://c", Some("z"), Some(vec![1.0, 0.0])),
        ];
        let p = participants(&pages);
        assert_eq!(scan_row(&p, 0, 0.85).hits.len(), 2);
        assert_eq!(scan_row(&p, 1, 0.85).hits.len(), 1);
        assert!(scan_row(&p, 2, 0.85).hits.is_empty());
    }

    #[test]
    fn test_participants_sorted_and_filtered() {
        let pages = vec![
            page("https://b", Some("x"), Some(vec![1.0])),
            page("https://a", Some("y"), Some(vec![1.0])),
            page("https://c", None, Some(vec![1.0])),
            page("https://d", Some("z"), None),
        ];
        let p = participants(&pages);
        let urls: Vec<_> = p.iter().map(|p| p.page.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b"]);
    }

    #[test]
    fn test_mismatched_pair_is_skipped_not_fatal() {
        let pages = vec![
            page("https://a", Some("x"), Some(vec![1.0, 0.0])),
            page("https://b", Some("y"), Some(vec![1.0, 0.0, 0.0])),
            page("https://c", Some("z"), Some(vec![1.0, 0.0])),
        ];
        let report = detect_conflicts(&pages, 0.85);
        assert_eq!(report.skipped_pairs, 2);
        assert_eq!(report.total_conflicts, 1);
        assert_eq!(report.conflicts["https://a"], vec!["https://c".to_string()]);
    }

    #[test]
    fn test_non_participants_marked_ok() {
        let pages = vec![
            page("https://a", Some("x"), Some(vec![1.0, 0.0])),
            page("https://b", Some("y"), Some(vec![1.0, 0.0])),
            page("https://c", None, None),
        ];
        let report = detect_conflicts(&pages, 0.85);
        let status_of = |url: &str| {
            report
                .statuses
                .iter()
                .find(|(u, _)| u == url)
                .map(|(_, s)| *s)
                .unwrap()
        };
        assert_eq!(status_of("https://a"), CannibalizationStatus::Conflict);
        assert_eq!(status_of("https://b"), CannibalizationStatus::Conflict);
        assert_eq!(status_of("https://c"), CannibalizationStatus::Ok);
        assert_eq!(report.pages_analyzed, 2);
    }
}

// Unit tests for conflict detection.
//
// Same-keyword exemption, threshold inclusivity, deterministic ordering,
// and that sharding the pair scan never changes the result.

use apexseo::cannibalization::{detect_conflicts, detect_conflicts_sharded};
use apexseo::db::models::{CannibalizationStatus, PageRecord};

fn page(url: &str, keyword: &str, embedding: Vec<f64>) -> PageRecord {
    PageRecord {
        id: format!("page:{url}"),
        url: url.to_string(),
        embedding: Some(embedding),
        target_keyword: Some(keyword.to_string()),
        content: None,
    }
}

/// A unit vector at `angle` radians in the plane.
fn at(angle: f64) -> Vec<f64> {
    vec![angle.cos(), angle.sin()]
}

fn status_of(statuses: &[(String, CannibalizationStatus)], url: &str) -> CannibalizationStatus {
    statuses
        .iter()
        .find(|(u, _)| u == url)
        .map(|(_, s)| *s)
        .unwrap_or_else(|| panic!("no status for {url}"))
}

// ============================================================
// Pair rules
// ============================================================

#[test]
fn same_keyword_never_conflicts() {
    let pages = vec![
        page("https://ex.com/a", "blue widgets", vec![1.0, 0.0]),
        page("https://ex.com/b", "blue widgets", vec![1.0, 0.0]),
    ];
    for threshold in [0.0, 0.5, 0.85, 1.0] {
        let report = detect_conflicts(&pages, threshold);
        assert_eq!(report.total_conflicts, 0, "threshold {threshold}");
        assert!(report.conflicts.is_empty());
    }
}

#[test]
fn similar_pages_with_different_keywords_conflict_once() {
    // cos(acos(0.95)) = 0.95
    let pages = vec![
        page("https://ex.com/a", "blue widgets", at(0.0)),
        page("https://ex.com/b", "widgets in blue", at(0.95_f64.acos())),
    ];
    let report = detect_conflicts(&pages, 0.85);

    assert_eq!(report.total_conflicts, 1);
    assert_eq!(report.edges.len(), 1);
    assert!((report.edges[0].similarity - 0.95).abs() < 1e-9);
    assert_eq!(
        report.conflicts["https://ex.com/a"],
        vec!["https://ex.com/b".to_string()]
    );
    assert_eq!(status_of(&report.statuses, "https://ex.com/a"), CannibalizationStatus::Conflict);
    assert_eq!(status_of(&report.statuses, "https://ex.com/b"), CannibalizationStatus::Conflict);
}

#[test]
fn threshold_is_inclusive() {
    let pages = vec![
        page("https://ex.com/a", "x", vec![1.0, 0.0]),
        page("https://ex.com/b", "y", vec![1.0, 0.0]),
    ];
    assert_eq!(detect_conflicts(&pages, 1.0).total_conflicts, 1);
}

#[test]
fn dissimilar_pages_are_ok() {
    let pages = vec![
        page("https://ex.com/a", "x", vec![1.0, 0.0]),
        page("https://ex.com/b", "y", vec![0.0, 1.0]),
    ];
    let report = detect_conflicts(&pages, 0.85);
    assert_eq!(report.total_conflicts, 0);
    assert_eq!(status_of(&report.statuses, "https://ex.com/a"), CannibalizationStatus::Ok);
    assert_eq!(status_of(&report.statuses, "https://ex.com/b"), CannibalizationStatus::Ok);
}

// ============================================================
// Edge cases
// ============================================================

#[test]
fn empty_page_set() {
    let report = detect_conflicts(&[], 0.85);
    assert!(report.conflicts.is_empty());
    assert_eq!(report.total_conflicts, 0);
    assert_eq!(report.pages_analyzed, 0);
    assert_eq!(report.threshold, 0.85);
}

#[test]
fn single_page_has_no_conflicts() {
    let report = detect_conflicts(&[page("https://ex.com/a", "x", vec![1.0])], 0.85);
    assert_eq!(report.total_conflicts, 0);
    assert_eq!(report.pages_analyzed, 1);
}

#[test]
fn pages_missing_embedding_or_keyword_are_not_analyzed() {
    let mut no_keyword = page("https://ex.com/b", "y", vec![1.0, 0.0]);
    no_keyword.target_keyword = None;
    let mut no_embedding = page("https://ex.com/c", "z", vec![1.0, 0.0]);
    no_embedding.embedding = None;

    let pages = vec![page("https://ex.com/a", "x", vec![1.0, 0.0]), no_keyword, no_embedding];
    let report = detect_conflicts(&pages, 0.5);

    assert_eq!(report.pages_analyzed, 1);
    assert_eq!(report.total_conflicts, 0);
    assert_eq!(report.statuses.len(), 3);
}

// ============================================================
// Determinism
// ============================================================

#[test]
fn output_is_independent_of_input_order() {
    let forward = vec![
        page("https://ex.com/c", "c", at(0.02)),
        page("https://ex.com/a", "a", at(0.0)),
        page("https://ex.com/b", "b", at(0.01)),
    ];
    let mut backward = forward.clone();
    backward.reverse();

    let a = detect_conflicts(&forward, 0.9);
    let b = detect_conflicts(&backward, 0.9);

    assert_eq!(a.conflicts, b.conflicts);
    // Sorted by URL: a conflicts with b and c, b with c
    assert_eq!(
        a.conflicts["https://ex.com/a"],
        vec!["https://ex.com/b".to_string(), "https://ex.com/c".to_string()]
    );
    assert_eq!(a.conflicts["https://ex.com/b"], vec!["https://ex.com/c".to_string()]);
    assert_eq!(a.total_conflicts, 3);
}

#[test]
fn sharded_scan_matches_single_thread() {
    let pages: Vec<PageRecord> = (0..40)
        .map(|i| {
            page(
                &format!("https://ex.com/{i:02}"),
                &format!("kw{}", i % 7),
                at(i as f64 * 0.05),
            )
        })
        .collect();

    let single = detect_conflicts(&pages, 0.97);
    assert!(single.total_conflicts > 0);

    for shards in [2, 3, 8, 64] {
        let sharded = detect_conflicts_sharded(&pages, 0.97, shards);
        assert_eq!(sharded.conflicts, single.conflicts, "shards = {shards}");
        assert_eq!(sharded.total_conflicts, single.total_conflicts);
        assert_eq!(sharded.statuses, single.statuses);

        let pairs = |r: &apexseo::cannibalization::CannibalizationReport| -> Vec<(String, String)> {
            r.edges
                .iter()
                .map(|e| (e.url_a.clone(), e.url_b.clone()))
                .collect()
        };
        assert_eq!(pairs(&sharded), pairs(&single));
    }
}

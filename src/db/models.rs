// Data models: the records that flow between the page store, the analysis
// core, and the result sink.
//
// They live apart from the SQL so the core modules can use them without
// depending on rusqlite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A page snapshot from the page store.
///
/// Only pages with both an embedding and a target keyword take part in
/// cannibalization detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub embedding: Option<Vec<f64>>,
    #[serde(default)]
    pub target_keyword: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Whether a page currently cannibalizes (or is cannibalized by) another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CannibalizationStatus {
    Ok,
    Conflict,
}

impl CannibalizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CannibalizationStatus::Ok => "ok",
            CannibalizationStatus::Conflict => "conflict",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(CannibalizationStatus::Ok),
            "conflict" => Some(CannibalizationStatus::Conflict),
            _ => None,
        }
    }
}

impl std::fmt::Display for CannibalizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Two pages with different target keywords whose embeddings are at or
/// above the similarity threshold. Stored a -> b, but a conflict is
/// symmetric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEdge {
    pub page_a_id: String,
    pub page_b_id: String,
    pub url_a: String,
    pub url_b: String,
    pub similarity: f64,
    pub keyword_a: String,
    pub keyword_b: String,
    pub detected_at: DateTime<Utc>,
}

/// A write to the result sink. `None` fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub site_id: String,
    pub url: String,
    pub content_score: Option<f64>,
    pub content_depth: Option<f64>,
    pub competitor_count: Option<u32>,
    pub cannibalization_status: Option<CannibalizationStatus>,
}

/// One page's topical cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub url: String,
    pub cluster_id: usize,
}

/// One cluster with its member pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub label: String,
    pub page_count: usize,
    pub urls: Vec<String>,
}

/// A ranking competitor page for a keyword, with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerpResult {
    pub keyword: String,
    pub position: u32,
    pub page_url: String,
    pub embedding: Vec<f64>,
}

/// Import format: one site's pages plus the SERP competitors for its keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSnapshot {
    pub site_id: String,
    #[serde(default)]
    pub pages: Vec<PageRecord>,
    #[serde(default)]
    pub serp: Vec<SerpResult>,
}

/// Derived fields for one page, as read back for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub target_keyword: Option<String>,
    pub has_embedding: bool,
    pub content_score: Option<f64>,
    pub content_depth: Option<f64>,
    pub competitor_count: Option<u32>,
    pub cannibalization_status: Option<CannibalizationStatus>,
    pub cluster_id: Option<usize>,
    pub content_score_updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [CannibalizationStatus::Ok, CannibalizationStatus::Conflict] {
            assert_eq!(CannibalizationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CannibalizationStatus::parse("unknown"), None);
    }

    #[test]
    fn test_page_record_optional_fields_default() {
        let page: PageRecord =
            serde_json::from_str(r#"{"id":"p1","url":"https://example.com/a"}"#).unwrap();
        assert!(page.embedding.is_none());
        assert!(page.target_keyword.is_none());
        assert!(page.content.is_none());
    }
}

// Keyword cannibalization: pages that compete for different keywords
// while serving near-duplicate content.

pub mod detector;

pub use detector::{
    detect_conflicts, detect_conflicts_sharded, CannibalizationReport,
    DEFAULT_SIMILARITY_THRESHOLD,
};

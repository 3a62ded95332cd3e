// Content quality scoring: depth heuristic, composite authority score,
// and competitive alignment against SERP competitors.

pub mod composite;
pub mod content;
pub mod depth;

pub use composite::{composite_score, CompositeInputs, ScoreWeights};
pub use content::{ContentScore, ContentScorer, PersistenceStatus, ScoreOutcome, NEUTRAL_SCORE};
pub use depth::content_depth;

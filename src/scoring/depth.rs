// Content depth heuristic.
//
// A logistic curve over word count, centered at 500 words:
//
//   depth = 100 / (1 + e^(-0.002 * (words - 500)))
//
// 50 at 500 words, ~73 at 1000, ~88 at 1500, ~95 at 2000. Longer content
// always scores higher, with diminishing returns.

/// Steepness of the logistic curve.
const DEPTH_STEEPNESS: f64 = 0.002;
/// Word count that scores exactly 50.
const DEPTH_MIDPOINT_WORDS: f64 = 500.0;

/// Depth score in [0, 100) for a page's text. Empty text scores 0.0.
pub fn content_depth(text: &str) -> f64 {
    let word_count = text.split_whitespace().count();
    if word_count == 0 {
        return 0.0;
    }
    100.0 / (1.0 + (-DEPTH_STEEPNESS * (word_count as f64 - DEPTH_MIDPOINT_WORDS)).exp())
}

// Composite authority score: the headline quality metric for a page.
//
// Blends three 0-100 signals and subtracts a risk penalty:
//
//   authority = min(100, tspr * 10)
//   weighted  = authority * authority_weight + depth * depth_weight + ux * ux_weight
//   score     = max(0, weighted - risk)
//
// TSPR (topic-sensitive PageRank) arrives on a 0-10 scale from the link
// graph, hence the x10. The floor keeps a heavy risk penalty from going
// negative. There's no ceiling beyond what the inputs and weights imply.

use serde::{Deserialize, Serialize};

/// Configurable weights for the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight on the TSPR-derived authority signal (default 0.4)
    pub authority_weight: f64,
    /// Weight on content depth (default 0.4)
    pub depth_weight: f64,
    /// Weight on the UX signal (default 0.2)
    pub ux_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            authority_weight: 0.4,
            depth_weight: 0.4,
            ux_weight: 0.2,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.authority_weight + self.depth_weight + self.ux_weight
    }
}

/// Signals for one page. `risk` defaults to 0 and `ux` to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeInputs {
    pub tspr: f64,
    pub depth: f64,
    pub risk: f64,
    pub ux: f64,
}

impl CompositeInputs {
    pub fn new(tspr: f64, depth: f64) -> Self {
        Self {
            tspr,
            depth,
            risk: 0.0,
            ux: 100.0,
        }
    }

    pub fn with_risk(mut self, risk: f64) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_ux(mut self, ux: f64) -> Self {
        self.ux = ux;
        self
    }
}

/// Compute the composite score for one page.
pub fn composite_score(inputs: &CompositeInputs, weights: &ScoreWeights) -> f64 {
    let authority = (inputs.tspr * 10.0).min(100.0);
    let weighted = authority * weights.authority_weight
        + inputs.depth * weights.depth_weight
        + inputs.ux * weights.ux_weight;
    (weighted - inputs.risk).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_signals_maxed() {
        let score = composite_score(&CompositeInputs::new(10.0, 100.0), &ScoreWeights::default());
        assert!((score - 100.0).abs() < 1e-9, "Expected 100.0, got {score}");
    }

    #[test]
    fn test_floor_enforced() {
        let inputs = CompositeInputs::new(0.0, 0.0).with_risk(50.0).with_ux(0.0);
        assert_eq!(composite_score(&inputs, &ScoreWeights::default()), 0.0);
    }

    #[test]
    fn test_authority_capped_at_100() {
        // tspr 25 -> authority 250, capped to 100
        let inputs = CompositeInputs::new(25.0, 0.0).with_ux(0.0);
        let score = composite_score(&inputs, &ScoreWeights::default());
        assert!((score - 40.0).abs() < 1e-9, "Expected 40.0, got {score}");
    }

    #[test]
    fn test_mid_range() {
        // authority 50*0.4 + depth 60*0.4 + ux 80*0.2 - risk 10 = 20 + 24 + 16 - 10 = 50
        let inputs = CompositeInputs::new(5.0, 60.0).with_ux(80.0).with_risk(10.0);
        let score = composite_score(&inputs, &ScoreWeights::default());
        assert!((score - 50.0).abs() < 1e-9, "Expected 50.0, got {score}");
    }

    #[test]
    fn test_custom_weights() {
        let weights = ScoreWeights {
            authority_weight: 0.0,
            depth_weight: 1.0,
            ux_weight: 0.0,
        };
        let score = composite_score(&CompositeInputs::new(10.0, 42.0), &weights);
        assert!((score - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((ScoreWeights::default().total() - 1.0).abs() < 1e-12);
    }
}
